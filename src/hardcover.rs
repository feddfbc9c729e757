//! Hardcover GraphQL client for genre tags.
//!
//! Hardcover maps external platform identifiers onto its own catalog; one
//! batched query resolves a whole shelf's worth of Goodreads ids to their
//! tag lists. Identifiers Hardcover does not know are simply absent from
//! the response, which is not an error.

use crate::error::{BookblendError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Hardcover GraphQL endpoint
const HARDCOVER_API_URL: &str = "https://hardcover-production.hasura.app/v1/graphql";

/// Hardcover's platform id for Goodreads in `book_mappings`
const GOODREADS_PLATFORM_ID: u8 = 1;

/// Genre tags for one external identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreRecord {
    /// Goodreads book id as known to Hardcover
    pub external_id: String,
    /// Tag names in the order Hardcover returns them; possibly empty
    pub tags: Vec<String>,
}

/// Hardcover API client.
pub struct HardcoverClient {
    client: Client,
    bearer_token: String,
    api_url: String,
}

impl HardcoverClient {
    /// Create a new client with the given bearer token.
    pub fn new(bearer_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BookblendError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            bearer_token: bearer_token.to_string(),
            api_url: HARDCOVER_API_URL.to_string(),
        })
    }

    /// Fetch genre tags for a batch of Goodreads ids in one query.
    ///
    /// Returns one record per identifier present in the response; ids the
    /// service does not know yield no record.
    pub async fn fetch_genres(&self, external_ids: &[String]) -> Result<Vec<GenreRecord>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = build_genre_query(external_ids);
        let body = serde_json::json!({ "query": query, "variables": {} });

        debug!(count = external_ids.len(), "Sending Hardcover batch query");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BookblendError::Api {
                code: status.as_u16() as i32,
                message: format!("Hardcover API error: {} - {}", status, error_text),
            });
        }

        let parsed: GraphqlResponse = response.json().await.map_err(|e| {
            BookblendError::Parse(format!("Failed to parse Hardcover response: {}", e))
        })?;

        if let Some(error) = parsed.errors.first() {
            return Err(BookblendError::Api {
                code: 200,
                message: format!("Hardcover GraphQL error: {}", error.message),
            });
        }

        let mappings = parsed
            .data
            .ok_or_else(|| BookblendError::Parse("Hardcover response has no data".to_string()))?
            .book_mappings;

        let records = flatten_mappings(mappings);
        info!(
            requested = external_ids.len(),
            found = records.len(),
            "Hardcover lookup complete"
        );

        Ok(records)
    }
}

/// Build the batched `book_mappings` query for a list of Goodreads ids.
fn build_genre_query(external_ids: &[String]) -> String {
    let ids = external_ids
        .iter()
        .map(|id| format!("\"{}\"", id))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"query GetBooksByGoodreadsIds {{
  book_mappings(
    where: {{platform: {{id: {{_eq: {platform}}}}}, external_id: {{_in: [{ids}]}}}}
  ) {{
    external_id
    book {{
      taggings {{
        tag {{
          tag
        }}
      }}
    }}
  }}
}}"#,
        platform = GOODREADS_PLATFORM_ID,
        ids = ids
    )
}

/// Flatten the nested mapping -> book -> taggings -> tag structure into one
/// record per identifier, preserving tag order.
fn flatten_mappings(mappings: Vec<BookMapping>) -> Vec<GenreRecord> {
    mappings
        .into_iter()
        .map(|mapping| GenreRecord {
            external_id: mapping.external_id,
            tags: mapping
                .book
                .taggings
                .into_iter()
                .map(|tagging| tagging.tag.tag)
                .collect(),
        })
        .collect()
}

// === Hardcover GraphQL Response Types ===

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    book_mappings: Vec<BookMapping>,
}

#[derive(Debug, Deserialize)]
struct BookMapping {
    external_id: String,
    book: MappedBook,
}

#[derive(Debug, Deserialize)]
struct MappedBook {
    #[serde(default)]
    taggings: Vec<Tagging>,
}

#[derive(Debug, Deserialize)]
struct Tagging {
    tag: Tag,
}

#[derive(Debug, Deserialize)]
struct Tag {
    tag: String,
}
