//! Left join of books and genres by Goodreads id.
//!
//! Every book row is preserved. Books with no genre match carry `tags:
//! None`; duplicate identifiers on the genre side produce one output row per
//! match (standard join semantics, cross-product).

use crate::goodreads::BookRecord;
use crate::hardcover::GenreRecord;
use serde::Serialize;
use std::collections::HashMap;

/// A book record joined with its Hardcover tags.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRecord {
    /// The scraped book record
    #[serde(flatten)]
    pub book: BookRecord,
    /// Tag list from Hardcover; `None` when the id had no match
    pub tags: Option<Vec<String>>,
}

/// Left-join book records with genre records on the external identifier.
pub fn merge_books_and_genres(
    books: &[BookRecord],
    genres: &[GenreRecord],
) -> Vec<MergedRecord> {
    // Group genre records by id so duplicates multiply instead of shadowing
    // each other.
    let mut by_id: HashMap<&str, Vec<&GenreRecord>> = HashMap::new();
    for genre in genres {
        by_id.entry(genre.external_id.as_str()).or_default().push(genre);
    }

    let mut merged = Vec::with_capacity(books.len());
    for book in books {
        match by_id.get(book.external_id.as_str()) {
            Some(matches) => {
                for genre in matches {
                    merged.push(MergedRecord {
                        book: book.clone(),
                        tags: Some(genre.tags.clone()),
                    });
                }
            }
            None => merged.push(MergedRecord {
                book: book.clone(),
                tags: None,
            }),
        }
    }

    merged
}
