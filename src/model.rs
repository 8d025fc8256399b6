use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A bookmark as submitted by an ingestion client, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookmarkInput {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// Import sources sometimes send `false` where a string is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Flag(bool),
}

impl Description {
    pub fn into_text(self) -> Option<String> {
        match self {
            Description::Text(s) => non_empty(Some(s)),
            Description::Flag(_) => None,
        }
    }
}

impl From<String> for Description {
    fn from(s: String) -> Self {
        Description::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub lease_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// Applies the ingestion rules to a submitted bookmark. The url must
    /// already have been validated as non-blank.
    pub fn from_input(input: BookmarkInput, now: DateTime<Utc>) -> Self {
        let url = input.url.trim().to_string();

        let title = non_empty(input.title).filter(|t| *t != url);

        Bookmark {
            title,
            description: input.description.and_then(Description::into_text),
            tags: normalize_tags(input.tags),
            created_at: input.time.unwrap_or(now),
            lease_at: None,
            url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCrawl {
    pub url: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicBookmark {
    pub url: String,
    pub title: Option<String>,
    pub time: DateTime<Utc>,
}

/// Trims and treats the empty string as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Drops blank and duplicate tags; an empty result is absent.
pub fn normalize_tags(tags: Option<Vec<String>>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.unwrap_or_default() {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }

    if out.is_empty() { None } else { Some(out) }
}

/// Fixed-width UTC form, so stored timestamps compare correctly as text.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(url: &str) -> BookmarkInput {
        BookmarkInput {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_title_equal_to_url_is_dropped() {
        let now = Utc::now();
        let b = Bookmark::from_input(
            BookmarkInput {
                title: Some("https://a".to_string()),
                ..input("https://a")
            },
            now,
        );
        assert_eq!(b.title, None);

        let b = Bookmark::from_input(
            BookmarkInput {
                title: Some("  ".to_string()),
                ..input("https://a")
            },
            now,
        );
        assert_eq!(b.title, None);
    }

    #[test]
    fn test_missing_time_defaults_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = Bookmark::from_input(input("https://a"), now);
        assert_eq!(b.created_at, now);

        let then = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let b = Bookmark::from_input(
            BookmarkInput {
                time: Some(then),
                ..input("https://a")
            },
            now,
        );
        assert_eq!(b.created_at, then);
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize_tags(None), None);
        assert_eq!(normalize_tags(Some(vec![])), None);
        assert_eq!(normalize_tags(Some(vec!["".into(), " ".into()])), None);
        assert_eq!(
            normalize_tags(Some(vec!["rust".into(), " db ".into(), "rust".into()])),
            Some(vec!["rust".to_string(), "db".to_string()])
        );
    }

    #[test]
    fn test_description_decodes_string_or_bool() {
        let b: BookmarkInput =
            serde_json::from_str(r#"{"url":"https://a","description":false}"#).unwrap();
        assert_eq!(b.description, Some(Description::Flag(false)));
        assert_eq!(b.description.and_then(Description::into_text), None);

        let b: BookmarkInput =
            serde_json::from_str(r#"{"url":"https://a","description":"notes"}"#).unwrap();
        assert_eq!(
            b.description.and_then(Description::into_text),
            Some("notes".to_string())
        );
    }

    #[test]
    fn test_ts_text_orders_like_time() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 9).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap();
        assert!(format_ts(a) < format_ts(b));
        assert_eq!(format_ts(a), "2024-01-01T00:00:09.000Z");
        assert_eq!(parse_ts(&format_ts(b)).unwrap(), b);
    }
}
