use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.96 Safari/537.36";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Turns a url into its title and visible text.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<Rendered>;
}

/// Fetches the raw document over http. Pages that build their content with
/// scripts come back with whatever the server sent.
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("building renderer http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<Rendered> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract(&html)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector {css}: {e:?}"))
}

pub fn extract(html: &str) -> Result<Rendered> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let body = match document.select(&selector("body")?).next() {
        Some(body) => {
            let mut lines = vec![];
            for node in body.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element())
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
                let text = text.trim();
                if !hidden && !text.is_empty() {
                    lines.push(text.to_string());
                }
            }
            Some(lines.join("\n")).filter(|b| !b.is_empty())
        }
        None => None,
    };

    Ok(Rendered { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_and_visible_text() {
        let html = r#"<html><head><title> Hello </title><style>p{}</style></head>
            <body><h1>Heading</h1><script>var x = 1;</script><p>Some <b>text</b></p></body></html>"#;
        let rendered = extract(html).unwrap();
        assert_eq!(rendered.title.as_deref(), Some("Hello"));
        assert_eq!(rendered.body.as_deref(), Some("Heading\nSome\ntext"));
    }

    #[test]
    fn test_extract_empty_document() {
        let rendered = extract("<html><head></head><body>  </body></html>").unwrap();
        assert_eq!(rendered, Rendered::default());
    }
}
