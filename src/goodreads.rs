//! Goodreads review-list scraping.
//!
//! Fetches a user's shelved books from the paginated `table#books` endpoint
//! and normalizes each row into a [`BookRecord`]. Column positions are
//! resolved from the header row, every cell keeps both its displayed text
//! and its first hyperlink target, and each field is extracted
//! independently: a cell that does not match its pattern becomes a missing
//! value, never an error.

use crate::dates::normalize_scraped_date;
use crate::error::{BookblendError, Result};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Goodreads base URL
pub const DEFAULT_GOODREADS_URL: &str = "https://www.goodreads.com";

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// One shelved book, normalized from a review-list table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Book title
    pub title: String,
    /// Author ("Last, First" as displayed)
    pub author: String,
    /// Page count
    pub page_count: Option<u32>,
    /// Community average rating
    pub average_rating: Option<f64>,
    /// Total number of community ratings
    pub total_ratings: Option<u64>,
    /// Publication year
    pub publication_year: Option<i32>,
    /// The shelf owner's own rating, 1-5
    pub user_rating: Option<u8>,
    /// Date the owner finished the book
    pub date_read: Option<NaiveDate>,
    /// Date the book was added to the shelf
    pub date_added: Option<NaiveDate>,
    /// Whether the owner has read the book at least once
    pub read_flag: bool,
    /// Numeric Goodreads id from the title cell's hyperlink; join key for
    /// genre enrichment
    pub external_id: String,
}

/// Client for the Goodreads HTML endpoints.
pub struct GoodreadsClient {
    client: reqwest::Client,
    pub(crate) base_url: String,
}

impl GoodreadsClient {
    /// Create a client against the default Goodreads base URL.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_GOODREADS_URL)
    }

    /// Create a client against a custom base URL (mirrors, test servers).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BookblendError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch and parse one page of a user's book list.
    ///
    /// An empty result means the page had no rows, which signals the end of
    /// pagination to [`fetch_all_books`](Self::fetch_all_books).
    pub async fn fetch_books_page(&self, user_id: u64, page: u32) -> Result<Vec<BookRecord>> {
        let url = build_list_url(&self.base_url, user_id, page)?;
        debug!(user_id, page, url = %url, "Fetching book list page");

        let html = self.fetch_html(url.as_str()).await?;
        parse_books_table(&html)
    }

    /// Fetch every page of a user's book list, in page order.
    ///
    /// Starts at page 1 and stops at the first page that parses to zero
    /// rows; there is no other bound, the remote service is trusted to
    /// eventually return an empty page.
    pub async fn fetch_all_books(&self, user_id: u64) -> Result<Vec<BookRecord>> {
        info!(user_id, "Fetching all shelved books");
        collect_paged(|page| self.fetch_books_page(user_id, page)).await
    }

    /// Fetch a URL and return the response body as text.
    pub(crate) async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookblendError::Api {
                code: status.as_u16() as i32,
                message: format!("HTTP error: {}", status),
            });
        }

        response.text().await.map_err(BookblendError::Network)
    }
}

/// Build the review-list URL for one page of a user's shelf.
fn build_list_url(base_url: &str, user_id: u64, page: u32) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/review/list/{}", base_url, user_id))
        .map_err(|e| BookblendError::Config(format!("Invalid base URL: {}", e)))?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url)
}

/// Drive a page-fetching closure from page 1 until the first empty page,
/// accumulating results in page order.
async fn collect_paged<F, Fut>(mut fetch_page: F) -> Result<Vec<BookRecord>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<BookRecord>>>,
{
    let mut all_books = Vec::new();
    let mut page = 1u32;

    loop {
        let batch = fetch_page(page).await?;
        if batch.is_empty() {
            info!(page, "Page is empty, pagination complete");
            break;
        }
        info!(page, count = batch.len(), "Parsed page");
        all_books.extend(batch);
        page += 1;
    }

    Ok(all_books)
}

/// A table cell: displayed text (whitespace-collapsed) plus the first
/// embedded hyperlink target, if any.
#[derive(Debug, Clone)]
struct RawCell {
    text: String,
    link: Option<String>,
}

/// Column positions resolved from the header row.
///
/// The review table carries two columns literally headed "rating": the
/// first is the community average, the second the shelf owner's own rating.
/// The "started" column holds the date read and the "read" column the date
/// added; that is how the site labels them.
#[derive(Debug, Default)]
struct ColumnIndex {
    title: Option<usize>,
    author: Option<usize>,
    pages: Option<usize>,
    avg_rating: Option<usize>,
    total_ratings: Option<usize>,
    pub_date: Option<usize>,
    user_rating: Option<usize>,
    votes: Option<usize>,
    started: Option<usize>,
    read: Option<usize>,
}

fn resolve_columns(headers: &[String]) -> ColumnIndex {
    let mut cols = ColumnIndex::default();

    for (idx, name) in headers.iter().enumerate() {
        match name.to_lowercase().as_str() {
            "title" if cols.title.is_none() => cols.title = Some(idx),
            "author" if cols.author.is_none() => cols.author = Some(idx),
            "pages" if cols.pages.is_none() => cols.pages = Some(idx),
            "rating" => {
                if cols.avg_rating.is_none() {
                    cols.avg_rating = Some(idx);
                } else if cols.user_rating.is_none() {
                    cols.user_rating = Some(idx);
                }
            }
            "ratings" if cols.total_ratings.is_none() => cols.total_ratings = Some(idx),
            "pub" if cols.pub_date.is_none() => cols.pub_date = Some(idx),
            "votes" if cols.votes.is_none() => cols.votes = Some(idx),
            "started" if cols.started.is_none() => cols.started = Some(idx),
            "read" if cols.read.is_none() => cols.read = Some(idx),
            _ => {}
        }
    }

    cols
}

/// Compiled extraction patterns, built once per table parse.
struct Patterns {
    /// First run of digits; serves both ids in hrefs and plain counts
    integer: Regex,
    decimal: Regex,
    pub_year: Regex,
    user_rating: Regex,
    date_read: Regex,
    date_added: Regex,
    times_read: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            integer: compile(r"(\d+)")?,
            decimal: compile(r"(\d+\.\d+)")?,
            // Year may be preceded by "month day, "
            pub_year: compile(r"(?:\b\d{1,2},\s)?(\d{1,4})\b")?,
            user_rating: compile(r"'s rating\s*(.*)$")?,
            date_read: compile(r"date read\s*(.*)")?,
            date_added: compile(r"date added\s*(.*)")?,
            times_read: compile(r"# times read\s*(\d+)")?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| BookblendError::Parse(e.to_string()))
}

/// Parse one page's `table#books` element into normalized records.
///
/// A present table with no body rows yields an empty vector (end of
/// pagination); a missing table is a structural failure.
pub fn parse_books_table(html: &str) -> Result<Vec<BookRecord>> {
    let document = Html::parse_document(html);

    let table_selector =
        Selector::parse("table#books").map_err(|e| BookblendError::Parse(e.to_string()))?;
    let row_selector = Selector::parse("tr").map_err(|e| BookblendError::Parse(e.to_string()))?;
    let header_selector =
        Selector::parse("th").map_err(|e| BookblendError::Parse(e.to_string()))?;
    let cell_selector = Selector::parse("td").map_err(|e| BookblendError::Parse(e.to_string()))?;
    let link_selector =
        Selector::parse("a[href]").map_err(|e| BookblendError::Parse(e.to_string()))?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| BookblendError::Parse("table#books not found".to_string()))?;

    let headers: Vec<String> = table
        .select(&header_selector)
        .map(|th| collapsed_text(&th))
        .collect();
    if headers.is_empty() {
        return Err(BookblendError::Parse(
            "table#books has no header row".to_string(),
        ));
    }

    let cols = resolve_columns(&headers);
    let patterns = Patterns::new()?;

    let mut records = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<RawCell> = row
            .select(&cell_selector)
            .map(|td| RawCell {
                text: collapsed_text(&td),
                link: td
                    .select(&link_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
            })
            .collect();

        // Header row and spacer rows have no data cells.
        if cells.is_empty() {
            continue;
        }

        match parse_row(&cells, &cols, &patterns) {
            Some(record) => records.push(record),
            None => warn!("Skipping malformed book row (no title link with numeric id)"),
        }
    }

    Ok(records)
}

/// Normalize one row of cells into a record.
///
/// Returns `None` only for malformed rows: those without a title cell or
/// without a numeric id in the title cell's hyperlink. Every other
/// extraction failure degrades to a missing field.
fn parse_row(cells: &[RawCell], cols: &ColumnIndex, patterns: &Patterns) -> Option<BookRecord> {
    let title_cell = cells.get(cols.title?)?;
    let external_id = title_cell
        .link
        .as_deref()
        .and_then(|href| first_capture(&patterns.integer, href))?;

    let title = strip_label(&title_cell.text, "title ").to_string();

    let author = cell_text(cells, cols.author)
        .map(|text| strip_label(text, "author ").replacen(" *", "", 1).trim().to_string())
        .unwrap_or_default();

    let page_count = cell_text(cells, cols.pages)
        .and_then(|text| first_capture(&patterns.integer, text))
        .and_then(|n| n.parse().ok());

    let average_rating = cell_text(cells, cols.avg_rating)
        .and_then(|text| first_capture(&patterns.decimal, text))
        .and_then(|n| n.parse().ok());

    let total_ratings = cell_text(cells, cols.total_ratings)
        .map(|text| text.replace(',', ""))
        .and_then(|text| first_capture(&patterns.integer, &text))
        .and_then(|n| n.parse().ok());

    let publication_year = cell_text(cells, cols.pub_date)
        .map(|text| strip_label(text, "date pub ").to_string())
        .and_then(|text| first_capture(&patterns.pub_year, &text))
        .and_then(|n| n.parse().ok());

    let user_rating = cell_text(cells, cols.user_rating)
        .and_then(|text| first_capture(&patterns.user_rating, text))
        .and_then(|phrase| rating_from_phrase(&phrase));

    let date_read = cell_text(cells, cols.started)
        .and_then(|text| first_capture(&patterns.date_read, text))
        .and_then(|date| normalize_scraped_date(&date));

    let date_added = cell_text(cells, cols.read)
        .and_then(|text| first_capture(&patterns.date_added, text))
        .and_then(|date| normalize_scraped_date(&date));

    let read_flag = cell_text(cells, cols.votes)
        .and_then(|text| first_capture(&patterns.times_read, text))
        .and_then(|n| n.parse::<u64>().ok())
        .map(|n| n > 0)
        .unwrap_or(false);

    Some(BookRecord {
        title,
        author,
        page_count,
        average_rating,
        total_ratings,
        publication_year,
        user_rating,
        date_read,
        date_added,
        read_flag,
        external_id,
    })
}

/// Map the site's rating phrase onto the 1-5 scale.
pub fn rating_from_phrase(phrase: &str) -> Option<u8> {
    match phrase.trim().to_lowercase().as_str() {
        "did not like it" => Some(1),
        "it was ok" => Some(2),
        "liked it" => Some(3),
        "really liked it" => Some(4),
        "it was amazing" => Some(5),
        _ => None,
    }
}

fn cell_text(cells: &[RawCell], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| cells.get(i)).map(|cell| cell.text.as_str())
}

/// Strip a leading cell-label marker (e.g. "title ", "date pub ") if
/// present. A no-op on already-normalized text.
fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    text.strip_prefix(label).unwrap_or(text).trim()
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Element text with runs of whitespace collapsed to single spaces.
fn collapsed_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKS_PAGE: &str = r##"
    <html><body>
    <table id="books">
      <tr id="header">
        <th>cover</th><th>title</th><th>author</th><th>isbn</th><th>pages</th>
        <th>rating</th><th>ratings</th><th>pub</th><th>rating</th><th>votes</th>
        <th>started</th><th>read</th>
      </tr>
      <tbody>
        <tr class="bookalike review">
          <td><img src="cover.jpg"/></td>
          <td>title <a href="https://www.goodreads.com/book/show/11870085-the-fault-in-our-stars">The Fault in Our Stars</a></td>
          <td>author <a href="/author/show/1406384.John_Green">Green, John</a> *</td>
          <td>0525478817</td>
          <td>313 pp</td>
          <td>avg rating 4.15</td>
          <td>ratings 3,944,154</td>
          <td>date pub Jan 10, 2012</td>
          <td>Tyler's rating it was amazing</td>
          <td># times read 1</td>
          <td>date read Mar 15, 2020</td>
          <td>date added Feb 2019</td>
        </tr>
        <tr class="bookalike review">
          <td></td>
          <td>title <a href="/book/show/2165.The_Great_Gatsby">The Great Gatsby</a></td>
          <td>author <a href="/author/show/3190.F_Scott_Fitzgerald">Fitzgerald, F. Scott</a></td>
          <td></td>
          <td>unknown</td>
          <td>avg rating</td>
          <td>ratings</td>
          <td>date pub 1925</td>
          <td>Tyler's rating</td>
          <td># times read</td>
          <td>date read not set</td>
          <td>date added Jul 5, 2021</td>
        </tr>
        <tr class="bookalike review">
          <td></td>
          <td>title No Link Here</td>
          <td>author Nobody</td>
          <td></td><td></td><td></td><td></td><td></td><td></td><td></td><td></td><td></td>
        </tr>
      </tbody>
    </table>
    </body></html>
    "##;

    const EMPTY_PAGE: &str = r##"
    <html><body>
    <table id="books">
      <tr id="header"><th>cover</th><th>title</th><th>author</th></tr>
      <tbody></tbody>
    </table>
    </body></html>
    "##;

    #[test]
    fn test_parse_books_table_full_row() {
        let records = parse_books_table(BOOKS_PAGE).expect("parse failed");
        assert_eq!(records.len(), 2);

        let book = &records[0];
        assert_eq!(book.title, "The Fault in Our Stars");
        assert_eq!(book.author, "Green, John");
        assert_eq!(book.external_id, "11870085");
        assert_eq!(book.page_count, Some(313));
        assert_eq!(book.average_rating, Some(4.15));
        assert_eq!(book.total_ratings, Some(3_944_154));
        assert_eq!(book.publication_year, Some(2012));
        assert_eq!(book.user_rating, Some(5));
        assert_eq!(
            book.date_read,
            chrono::NaiveDate::from_ymd_opt(2020, 3, 15)
        );
        assert_eq!(
            book.date_added,
            chrono::NaiveDate::from_ymd_opt(2019, 2, 1)
        );
        assert!(book.read_flag);
    }

    #[test]
    fn test_missing_fields_become_missing() {
        let records = parse_books_table(BOOKS_PAGE).expect("parse failed");
        let book = &records[1];

        assert_eq!(book.title, "The Great Gatsby");
        assert_eq!(book.external_id, "2165");
        assert_eq!(book.page_count, None);
        assert_eq!(book.average_rating, None);
        assert_eq!(book.total_ratings, None);
        assert_eq!(book.publication_year, Some(1925));
        assert_eq!(book.user_rating, None);
        assert_eq!(book.date_read, None);
        assert_eq!(
            book.date_added,
            chrono::NaiveDate::from_ymd_opt(2021, 7, 5)
        );
        assert!(!book.read_flag);
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        // The third fixture row has no title hyperlink, so no external id
        // can be extracted; the row is dropped without affecting the others.
        let records = parse_books_table(BOOKS_PAGE).expect("parse failed");
        assert!(records.iter().all(|r| !r.external_id.is_empty()));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_empty_table_yields_no_records() {
        let records = parse_books_table(EMPTY_PAGE).expect("parse failed");
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_table_is_structural_failure() {
        let result = parse_books_table("<html><body><p>no table</p></body></html>");
        assert!(result.is_err());
    }

    #[test]
    fn test_build_list_url() {
        let url = build_list_url("https://www.goodreads.com", 42944663, 3)
            .expect("Failed to build URL");
        assert_eq!(
            url.as_str(),
            "https://www.goodreads.com/review/list/42944663?page=3"
        );
    }

    #[test]
    fn test_rating_vocabulary() {
        assert_eq!(rating_from_phrase("did not like it"), Some(1));
        assert_eq!(rating_from_phrase("it was ok"), Some(2));
        assert_eq!(rating_from_phrase("liked it"), Some(3));
        assert_eq!(rating_from_phrase("really liked it"), Some(4));
        assert_eq!(rating_from_phrase("it was amazing"), Some(5));
        assert_eq!(rating_from_phrase("meh"), None);
        assert_eq!(rating_from_phrase(""), None);
    }

    #[test]
    fn test_label_stripping_is_idempotent() {
        let once = strip_label("title The Fault in Our Stars", "title ");
        let twice = strip_label(once, "title ");
        assert_eq!(once, "The Fault in Our Stars");
        assert_eq!(once, twice);

        let year = strip_label("date pub 1925", "date pub ");
        assert_eq!(strip_label(year, "date pub "), "1925");
    }

    #[test]
    fn test_numeric_extraction_is_idempotent() {
        let patterns = Patterns::new().expect("patterns failed");
        let first = first_capture(&patterns.decimal, "avg rating 4.15").expect("no match");
        let second = first_capture(&patterns.decimal, &first).expect("no match");
        assert_eq!(first, "4.15");
        assert_eq!(first, second);
    }

    #[test]
    fn test_publication_year_patterns() {
        let patterns = Patterns::new().expect("patterns failed");
        assert_eq!(
            first_capture(&patterns.pub_year, "Jan 10, 2012").as_deref(),
            Some("2012")
        );
        assert_eq!(
            first_capture(&patterns.pub_year, "1925").as_deref(),
            Some("1925")
        );
        assert_eq!(first_capture(&patterns.pub_year, "unknown"), None);
    }

    #[tokio::test]
    async fn test_pagination_stops_at_first_empty_page() {
        fn book(id: &str) -> BookRecord {
            BookRecord {
                external_id: id.to_string(),
                ..Default::default()
            }
        }

        // Three non-empty pages, then an empty one; the page after the
        // empty one must never be reached.
        let pages = vec![
            vec![book("1")],
            vec![book("2"), book("3")],
            vec![book("4")],
            vec![],
            vec![book("99")],
        ];

        let collected = collect_paged(|page| {
            let batch = pages.get((page - 1) as usize).cloned().unwrap_or_default();
            async move { Ok(batch) }
        })
        .await
        .expect("pagination failed");

        let ids: Vec<&str> = collected.iter().map(|b| b.external_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_pagination_propagates_structural_failures() {
        let result = collect_paged(|page| async move {
            if page == 1 {
                Err(BookblendError::Parse("table#books not found".to_string()))
            } else {
                Ok(vec![])
            }
        })
        .await;
        assert!(result.is_err());
    }
}
