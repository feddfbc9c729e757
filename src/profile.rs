//! Goodreads user profile scraping.
//!
//! Extracts a fixed set of ten text fields from a user's profile page. Each
//! field is matched independently and falls back to an empty string when its
//! element or pattern is absent; building a profile never fails, however
//! mangled the page.

use crate::error::Result;
use crate::goodreads::GoodreadsClient;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scraped profile fields. All fields default to `""` on extraction failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Numeric user id from the canonical profile link
    pub user_id: String,
    /// Display name from the `og:title` meta
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    /// Total shelved books, from the page title
    pub books_shelved: String,
    pub number_of_friends: String,
    /// Count on the "read" shelf
    pub books_read: String,
    pub currently_reading_count: String,
    pub to_read_count: String,
}

impl GoodreadsClient {
    /// Fetch and parse one user's profile page.
    pub async fn fetch_profile(&self, user_id: u64) -> Result<UserProfile> {
        let url = format!("{}/user/show/{}", self.base_url, user_id);
        debug!(user_id, url = %url, "Fetching profile page");

        let html = self.fetch_html(&url).await?;
        Ok(parse_profile(&html))
    }
}

/// Parse a profile page into a [`UserProfile`].
///
/// The shelf-count patterns include the left-to-right mark the site embeds
/// after shelf names (`&lrm;` in the raw HTML).
pub fn parse_profile(html: &str) -> UserProfile {
    let document = Html::parse_document(html);
    let page_text = document.root_element().text().collect::<String>();

    let user_id = attr_of(&document, r#"link[rel="canonical"]"#, "href")
        .and_then(|href| {
            href.rsplit('/')
                .next()
                .and_then(|segment| segment.split('-').next())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let books_shelved = text_of(&document, "title")
        .and_then(|title| capture_count(&title, r"(\d{1,3}(?:,\d{3})*|\d+)\s+books"))
        .unwrap_or_default();

    UserProfile {
        user_id,
        full_name: attr_of(&document, r#"meta[property="og:title"]"#, "content")
            .unwrap_or_default(),
        first_name: attr_of(&document, r#"meta[property="profile:first_name"]"#, "content")
            .unwrap_or_default(),
        last_name: attr_of(&document, r#"meta[property="profile:last_name"]"#, "content")
            .unwrap_or_default(),
        username: attr_of(&document, r#"meta[property="profile:username"]"#, "content")
            .unwrap_or_default(),
        books_shelved,
        number_of_friends: capture_count(&page_text, r" Friends \((\d+)\)").unwrap_or_default(),
        books_read: capture_count(
            &page_text,
            r"read\x{200E}?\s*\(.*?(\d{1,3}(?:,\d{3})*|\d+)\)",
        )
        .unwrap_or_default(),
        currently_reading_count: capture_count(
            &page_text,
            r"currently-reading\x{200E}\s*\((\d{1,3}(?:,\d{3})*|\d+)\)",
        )
        .unwrap_or_default(),
        to_read_count: capture_count(
            &page_text,
            r"to-read\x{200E}\s*\((\d{1,3}(?:,\d{3})*|\d+)\)",
        )
        .unwrap_or_default(),
    }
}

/// First attribute value matching the selector, if any.
fn attr_of(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr(attr)
        .map(|v| v.trim().to_string())
}

/// First element text matching the selector, if any.
fn text_of(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

/// First capture group of the pattern, thousands separators stripped.
fn capture_count(text: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(',', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_PAGE: &str = r##"
    <html>
      <head>
        <title>Tyler Smith (1,524 books)</title>
        <link rel="canonical" href="https://www.goodreads.com/user/show/42944663-tyler-smith"/>
        <meta property="og:title" content="Tyler Smith"/>
        <meta property="profile:first_name" content="Tyler"/>
        <meta property="profile:last_name" content="Smith"/>
        <meta property="profile:username" content="tsmith"/>
      </head>
      <body>
        <div class="shelves">
          <a href="/review/list/42944663?shelf=read">read&lrm; (312)</a>
          <a href="/review/list/42944663?shelf=currently-reading">currently-reading&lrm; (3)</a>
          <a href="/review/list/42944663?shelf=to-read">to-read&lrm; (1,209)</a>
        </div>
        <div class="friends">Tyler's Friends (42)</div>
      </body>
    </html>
    "##;

    #[test]
    fn test_parse_full_profile() {
        let profile = parse_profile(PROFILE_PAGE);

        assert_eq!(profile.user_id, "42944663");
        assert_eq!(profile.full_name, "Tyler Smith");
        assert_eq!(profile.first_name, "Tyler");
        assert_eq!(profile.last_name, "Smith");
        assert_eq!(profile.username, "tsmith");
        assert_eq!(profile.books_shelved, "1524");
        assert_eq!(profile.number_of_friends, "42");
        assert_eq!(profile.books_read, "312");
        assert_eq!(profile.currently_reading_count, "3");
        assert_eq!(profile.to_read_count, "1209");
    }

    #[test]
    fn test_missing_field_does_not_affect_others() {
        // Same page with the og:title meta and the friends block removed.
        let page = PROFILE_PAGE
            .replace(r#"<meta property="og:title" content="Tyler Smith"/>"#, "")
            .replace(r#"<div class="friends">Tyler's Friends (42)</div>"#, "");
        let profile = parse_profile(&page);

        assert_eq!(profile.full_name, "");
        assert_eq!(profile.number_of_friends, "");
        // Everything else still populates.
        assert_eq!(profile.user_id, "42944663");
        assert_eq!(profile.first_name, "Tyler");
        assert_eq!(profile.books_read, "312");
        assert_eq!(profile.to_read_count, "1209");
    }

    #[test]
    fn test_empty_page_yields_empty_profile() {
        let profile = parse_profile("<html><body></body></html>");
        assert_eq!(profile, UserProfile::default());
    }

    #[test]
    fn test_canonical_link_without_name_suffix() {
        let page = r#"<html><head>
            <link rel="canonical" href="https://www.goodreads.com/user/show/123"/>
        </head><body></body></html>"#;
        assert_eq!(parse_profile(page).user_id, "123");
    }
}
