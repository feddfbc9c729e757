//! bookblend - Goodreads shelf scraper with Hardcover genre enrichment
//!
//! Scrapes a Goodreads user's shelved books, enriches them with genre tags
//! from the Hardcover GraphQL API, and left-joins the two by Goodreads id.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! bookblend books 42944663
//! bookblend profile 42944663
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! bookblend serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bookblend::{
    config::{Secrets, HARDCOVER_TOKEN_VAR},
    goodreads::{BookRecord, GoodreadsClient},
    hardcover::{GenreRecord, HardcoverClient},
    merge::{merge_books_and_genres, MergedRecord},
    profile::UserProfile,
    BookblendError,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Goodreads shelf scraper with Hardcover genre enrichment
#[derive(Parser)]
#[command(name = "bookblend")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a user's shelved books, enrich with genres, and save CSVs
    Books {
        /// Numeric Goodreads user id
        user_id: u64,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Scrape a user's profile page and print it as JSON
    Profile {
        /// Numeric Goodreads user id
        user_id: u64,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    // Secrets are read once at startup and stay read-only.
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Books { user_id, output } => run_books_pipeline(user_id, output, &secrets).await,
        Commands::Profile { user_id } => run_profile(user_id).await,
        Commands::Serve { port, host } => run_server(host, port, secrets).await,
    }
}

// ============================================================================
// Books Pipeline
// ============================================================================

async fn run_books_pipeline(user_id: u64, output_dir: PathBuf, secrets: &Secrets) -> Result<()> {
    // Create output folder
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_folder = output_dir.join(format!("{}_{}", timestamp, user_id));
    std::fs::create_dir_all(&output_folder).context("Failed to create output directory")?;

    println!("Output folder: {}", output_folder.display());

    // ===========================================
    // STAGE 1: Goodreads Scrape
    // ===========================================
    println!("\n--- Stage 1: Goodreads Shelf Scrape ---");

    let goodreads = GoodreadsClient::new()?;
    let books = goodreads.fetch_all_books(user_id).await?;

    if books.is_empty() {
        println!("No shelved books found for user {}.", user_id);
        return Ok(());
    }

    println!("Found {} shelved books.", books.len());

    let books_path = output_folder.join("1_books.csv");
    save_csv(&books_path, &books)?;

    // ===========================================
    // STAGE 2: Hardcover Genre Enrichment
    // ===========================================
    let genres = if let Ok(token) = secrets.require_hardcover_token() {
        println!("\n--- Stage 2: Hardcover Genre Enrichment ---");

        let hardcover = HardcoverClient::new(token)?;
        let ids = unique_ids(&books);

        println!("Looking up {} unique ids...", ids.len());
        let genres = hardcover.fetch_genres(&ids).await?;
        println!("Hardcover: {} / {} matched", genres.len(), ids.len());

        let genres_path = output_folder.join("2_genres.csv");
        let genre_rows: Vec<GenreCsvRow> = genres.iter().map(GenreCsvRow::from).collect();
        save_csv(&genres_path, &genre_rows)?;

        genres
    } else {
        println!(
            "\n--- Stage 2: Skipped ({} not set) ---",
            HARDCOVER_TOKEN_VAR
        );
        Vec::new()
    };

    // ===========================================
    // STAGE 3: Merge
    // ===========================================
    println!("\n--- Stage 3: Merging Books and Genres ---");

    let merged = merge_books_and_genres(&books, &genres);
    let merged_rows: Vec<MergedCsvRow> = merged.iter().map(MergedCsvRow::from).collect();

    let merged_path = output_folder.join("3_merged.csv");
    save_csv(&merged_path, &merged_rows)?;
    println!("Merged dataset: {} rows", merged_rows.len());

    println!("\n✓ Pipeline complete. Results in: {}", output_folder.display());
    Ok(())
}

async fn run_profile(user_id: u64) -> Result<()> {
    let goodreads = GoodreadsClient::new()?;
    let profile = goodreads.fetch_profile(user_id).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

/// Collect each book's external id, deduplicated, in first-seen order.
fn unique_ids(books: &[BookRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    books
        .iter()
        .filter(|b| seen.insert(b.external_id.as_str()))
        .map(|b| b.external_id.clone())
        .collect()
}

// ============================================================================
// CSV Output
// ============================================================================

/// Genre record flattened for CSV (tags joined into one column).
#[derive(Serialize)]
struct GenreCsvRow {
    external_id: String,
    tags: String,
}

impl From<&GenreRecord> for GenreCsvRow {
    fn from(genre: &GenreRecord) -> Self {
        Self {
            external_id: genre.external_id.clone(),
            tags: genre.tags.join(", "),
        }
    }
}

/// Merged record flattened for CSV.
#[derive(Serialize)]
struct MergedCsvRow {
    title: String,
    author: String,
    page_count: Option<u32>,
    average_rating: Option<f64>,
    total_ratings: Option<u64>,
    publication_year: Option<i32>,
    user_rating: Option<u8>,
    date_read: Option<NaiveDate>,
    date_added: Option<NaiveDate>,
    read_flag: bool,
    external_id: String,
    tags: String,
}

impl From<&MergedRecord> for MergedCsvRow {
    fn from(merged: &MergedRecord) -> Self {
        let book = &merged.book;
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            page_count: book.page_count,
            average_rating: book.average_rating,
            total_ratings: book.total_ratings,
            publication_year: book.publication_year,
            user_rating: book.user_rating,
            date_read: book.date_read,
            date_added: book.date_added,
            read_flag: book.read_flag,
            external_id: book.external_id.clone(),
            tags: merged.tags.as_ref().map(|t| t.join(", ")).unwrap_or_default(),
        }
    }
}

/// Save data to CSV file
fn save_csv<T: Serialize>(path: &std::path::Path, data: &[T]) -> Result<()> {
    if data.is_empty() {
        println!("No data to save to {:?}", path);
        return Ok(());
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context("Failed to create CSV writer")?;

    for item in data {
        wtr.serialize(item).context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    println!("Saved: {:?}", path);
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

struct AppState {
    goodreads: GoodreadsClient,
    hardcover_token: Option<String>,
    api_key: String,
}

async fn run_server(host: String, port: u16, secrets: Secrets) -> Result<()> {
    // The inbound API key is the one secret the server cannot run without.
    let api_key = secrets.require_api_key()?.to_string();
    if secrets.hardcover_token.is_none() {
        info!(
            "{} not set; /books responses will carry no tags",
            HARDCOVER_TOKEN_VAR
        );
    }

    let app_state = Arc::new(AppState {
        goodreads: GoodreadsClient::new()?,
        hardcover_token: secrets.hardcover_token.clone(),
        api_key,
    });

    let protected = Router::new()
        .route("/users/{user_id}/books", get(books_handler))
        .route("/users/{user_id}/profile", get(profile_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_api_key,
        ));

    let app = Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    info!(host = %host, port = port, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Reject requests whose `X-API-Key` header does not match the configured
/// secret.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if provided == Some(state.api_key.as_str()) {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "401: Invalid API Key").into_response()
    }
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Merged books response
#[derive(Serialize)]
struct BooksResponse {
    status: String,
    count: usize,
    results: Vec<MergedRecord>,
}

/// Full scrape + enrich + merge for one user.
async fn books_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<u64>,
) -> std::result::Result<Json<BooksResponse>, (StatusCode, String)> {
    info!(user_id, "Books request");

    let books = state
        .goodreads
        .fetch_all_books(user_id)
        .await
        .map_err(upstream_error)?;

    let genres = match state.hardcover_token.as_deref() {
        Some(token) if !books.is_empty() => {
            let hardcover = HardcoverClient::new(token).map_err(upstream_error)?;
            hardcover
                .fetch_genres(&unique_ids(&books))
                .await
                .map_err(upstream_error)?
        }
        _ => Vec::new(),
    };

    let results = merge_books_and_genres(&books, &genres);
    Ok(Json(BooksResponse {
        status: "success".to_string(),
        count: results.len(),
        results,
    }))
}

/// Profile scrape for one user.
async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<u64>,
) -> std::result::Result<Json<UserProfile>, (StatusCode, String)> {
    info!(user_id, "Profile request");

    let profile = state
        .goodreads
        .fetch_profile(user_id)
        .await
        .map_err(upstream_error)?;

    Ok(Json(profile))
}

/// Structural failures from the scrape layer surface as 502s.
fn upstream_error(err: BookblendError) -> (StatusCode, String) {
    error!(error = %err, "Upstream request failed");
    (StatusCode::BAD_GATEWAY, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str) -> BookRecord {
        BookRecord {
            external_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unique_ids_preserves_first_seen_order() {
        let books = vec![book("3"), book("1"), book("3"), book("2")];
        assert_eq!(unique_ids(&books), ["3", "1", "2"]);
    }

    #[test]
    fn test_merged_csv_row_joins_tags() {
        let merged = MergedRecord {
            book: book("1"),
            tags: Some(vec!["Fantasy".to_string(), "Classics".to_string()]),
        };
        let row = MergedCsvRow::from(&merged);
        assert_eq!(row.tags, "Fantasy, Classics");

        let unmatched = MergedRecord {
            book: book("2"),
            tags: None,
        };
        assert_eq!(MergedCsvRow::from(&unmatched).tags, "");
    }

    #[test]
    fn test_save_csv_writes_header_and_rows() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("books.csv");

        let books = vec![book("11870085"), book("2165")];
        save_csv(&path, &books).expect("Failed to save CSV");

        let contents = std::fs::read_to_string(&path).expect("Failed to read CSV");
        let mut lines = contents.lines();
        let header = lines.next().expect("CSV has no header");
        assert!(header.contains("external_id"));
        assert_eq!(lines.count(), 2);
    }
}
