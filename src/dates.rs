//! Scraped-date normalization.
//!
//! Goodreads renders dates in three shapes: exact ("Mar 15, 2020"),
//! month-only ("Mar 2020"), and the sentinel "not set". Month-only values
//! get a default day of 1 inserted before parsing.

use chrono::NaiveDate;

/// Formats for Goodreads dates: abbreviated month names first, full names
/// second (`%b` and `%B` each match only their own form).
const DATE_FORMATS: [&str; 2] = ["%b %d, %Y", "%B %d, %Y"];

/// Normalize a scraped date string into a calendar date.
///
/// Returns `None` for the "not set" sentinel and for anything that does not
/// parse; extraction failures never propagate.
pub fn normalize_scraped_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains("not set") {
        return None;
    }

    let tokens: Vec<&str> = raw.split_whitespace().collect();
    // Two tokens means "Month Year": insert the default day.
    let candidate = if tokens.len() == 2 {
        format!("{} 1, {}", tokens[0], tokens[1])
    } else {
        tokens.join(" ")
    };

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_year_gets_default_day() {
        assert_eq!(
            normalize_scraped_date("March 2020"),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
        assert_eq!(
            normalize_scraped_date("Sep 2018"),
            NaiveDate::from_ymd_opt(2018, 9, 1)
        );
    }

    #[test]
    fn test_exact_date_parses_unchanged() {
        assert_eq!(
            normalize_scraped_date("March 15, 2020"),
            NaiveDate::from_ymd_opt(2020, 3, 15)
        );
        assert_eq!(
            normalize_scraped_date("Jan 02, 2023"),
            NaiveDate::from_ymd_opt(2023, 1, 2)
        );
    }

    #[test]
    fn test_full_and_abbreviated_month_names_agree() {
        assert_eq!(
            normalize_scraped_date("March 15, 2020"),
            normalize_scraped_date("Mar 15, 2020")
        );
        assert_eq!(
            normalize_scraped_date("September 2018"),
            normalize_scraped_date("Sep 2018")
        );
        assert_eq!(
            normalize_scraped_date("March 2020"),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
    }

    #[test]
    fn test_not_set_is_missing() {
        assert_eq!(normalize_scraped_date("not set"), None);
        assert_eq!(normalize_scraped_date("date read not set"), None);
    }

    #[test]
    fn test_garbage_is_missing() {
        assert_eq!(normalize_scraped_date(""), None);
        assert_eq!(normalize_scraped_date("sometime soon"), None);
        assert_eq!(normalize_scraped_date("13 2020 extra"), None);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(
            normalize_scraped_date("  Mar   15,  2020 "),
            NaiveDate::from_ymd_opt(2020, 3, 15)
        );
    }
}
