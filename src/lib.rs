//! # bookblend
//!
//! Goodreads shelf scraper with Hardcover genre enrichment.
//!
//! ## Modules
//!
//! - [`goodreads`] - Goodreads review-list scraping and pagination
//! - [`profile`] - Goodreads user profile scraping
//! - [`hardcover`] - Hardcover GraphQL client for genre tags
//! - [`merge`] - Left join of books and genres by Goodreads id
//! - [`dates`] - Scraped-date normalization
//! - [`config`] - Environment secrets
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bookblend::goodreads::GoodreadsClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GoodreadsClient::new()?;
//!     let books = client.fetch_all_books(42944663).await?;
//!     println!("Shelved books: {}", books.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod goodreads;
pub mod hardcover;
pub mod merge;
pub mod profile;

pub use error::{BookblendError, Result};
