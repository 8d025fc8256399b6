//! Pinboard export decoding.
//!
//! Pinboard calls the page title `description` and the notes `extended`.
//! Some exports carry `"description": false` for untitled bookmarks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{BookmarkInput, Description};

#[derive(Debug, Deserialize)]
pub struct PinboardBookmark {
    pub href: String,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default)]
    pub extended: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl From<PinboardBookmark> for BookmarkInput {
    fn from(pb: PinboardBookmark) -> Self {
        let tags: Vec<String> = pb.tags.split_whitespace().map(str::to_string).collect();

        BookmarkInput {
            url: pb.href,
            title: pb.description.and_then(Description::into_text),
            description: Some(Description::Text(pb.extended)),
            tags: if tags.is_empty() { None } else { Some(tags) },
            time: pb.time,
        }
    }
}

pub fn parse_export(json: &str) -> Result<Vec<BookmarkInput>> {
    let bookmarks: Vec<PinboardBookmark> =
        serde_json::from_str(json).context("parsing pinboard export")?;
    Ok(bookmarks.into_iter().map(BookmarkInput::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXPORT: &str = r#"[
        {"href":"https://a.example","description":"A page","extended":"notes","meta":"x","hash":"h",
         "time":"2022-10-30T12:00:00Z","shared":"yes","toread":"no","tags":"rust  publish"},
        {"href":"https://b.example","description":false,"extended":"","time":"2021-01-01T00:00:00Z","tags":""}
    ]"#;

    #[test]
    fn test_parse_export() {
        let items = parse_export(EXPORT).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].url, "https://a.example");
        assert_eq!(items[0].title.as_deref(), Some("A page"));
        assert_eq!(
            items[0].tags,
            Some(vec!["rust".to_string(), "publish".to_string()])
        );
        assert_eq!(
            items[0].time,
            Some(Utc.with_ymd_and_hms(2022, 10, 30, 12, 0, 0).unwrap())
        );

        assert_eq!(items[1].title, None);
        assert_eq!(items[1].tags, None);
        assert_eq!(
            items[1].description.clone().and_then(Description::into_text),
            None
        );
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(parse_export(r#"{"href":"https://a"}"#).is_err());
    }
}
