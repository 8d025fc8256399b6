use serde::{Deserialize, Serialize};

use crate::model::BookmarkInput;

#[derive(Debug, Serialize, Deserialize)]
pub struct AddBookmarkRequest {
    pub bookmarks: Vec<BookmarkInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddBookmarkResponse {
    pub status: String,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddCrawlRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddCrawlResponse {
    pub status: String,
    pub title_filled: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PendingCrawlsResponse {
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Every failed call answers with this envelope. `partial` tells the caller
/// that some of its work was committed before the failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<usize>,
}

impl ErrorResponse {
    pub fn failed(msg: &str) -> Self {
        ErrorResponse {
            error: true,
            message: msg.to_owned(),
            partial: false,
            committed: None,
        }
    }

    pub fn partial(msg: &str, committed: usize) -> Self {
        ErrorResponse {
            error: true,
            message: msg.to_owned(),
            partial: true,
            committed: Some(committed),
        }
    }
}
