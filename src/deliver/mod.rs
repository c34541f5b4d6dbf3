use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// A file posted alongside the recap text.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub path: PathBuf,
    /// Name the file is published under
    pub file_name: String,
}

/// External posting collaborator: delivers the recap to the room's text
/// surface. Only delivery transport failures are retried upstream;
/// formatting is settled before this boundary.
#[async_trait]
pub trait RecapPoster: Send + Sync {
    async fn post(&self, room: &str, text: &str, attachments: &[Attachment]) -> Result<()>;
}

/// Split text into parts under `limit` characters, breaking at line
/// boundaries. Lines longer than the limit are hard-split on char
/// boundaries so no part ever exceeds the platform ceiling.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut count = 0usize;

    let mut push_buf = |buf: &mut Vec<&str>, count: &mut usize, parts: &mut Vec<String>| {
        if !buf.is_empty() {
            parts.push(buf.join("\n"));
            buf.clear();
            *count = 0;
        }
    };

    for line in text.lines() {
        if line.len() > limit {
            push_buf(&mut buf, &mut count, &mut parts);
            let mut rest = line;
            while !rest.is_empty() {
                let end = rest
                    .char_indices()
                    .take_while(|(i, _)| *i < limit)
                    .last()
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(rest.len());
                parts.push(rest[..end].to_string());
                rest = &rest[end..];
            }
            continue;
        }

        if count + line.len() + 1 > limit {
            push_buf(&mut buf, &mut count, &mut parts);
        }
        buf.push(line);
        count += line.len() + 1;
    }
    push_buf(&mut buf, &mut count, &mut parts);

    parts
}

/// Posts recaps through a platform webhook.
pub struct WebhookPoster {
    url: String,
    message_limit: usize,
    http: reqwest::Client,
}

impl WebhookPoster {
    pub fn new(url: &str, message_limit: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build delivery HTTP client")?;

        Ok(Self {
            url: url.to_string(),
            message_limit,
            http,
        })
    }
}

#[async_trait]
impl RecapPoster for WebhookPoster {
    async fn post(&self, room: &str, text: &str, attachments: &[Attachment]) -> Result<()> {
        for part in split_message(text, self.message_limit) {
            let resp = self
                .http
                .post(&self.url)
                .json(&json!({ "content": part }))
                .send()
                .await
                .context("recap post failed")?;

            if !resp.status().is_success() {
                bail!("recap post returned {}", resp.status());
            }
        }

        for attachment in attachments {
            let bytes = tokio::fs::read(&attachment.path)
                .await
                .with_context(|| format!("read attachment {}", attachment.path.display()))?;

            let form = reqwest::multipart::Form::new().part(
                "file1",
                reqwest::multipart::Part::bytes(bytes).file_name(attachment.file_name.clone()),
            );

            let resp = self
                .http
                .post(&self.url)
                .multipart(form)
                .send()
                .await
                .context("attachment post failed")?;

            if !resp.status().is_success() {
                bail!("attachment post returned {}", resp.status());
            }
        }

        info!(room, attachments = attachments.len(), "recap delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text_is_one_part() {
        let parts = split_message("a short recap\nwith two lines", 1900);
        assert_eq!(parts, vec!["a short recap\nwith two lines".to_string()]);
    }

    #[test]
    fn test_split_breaks_at_line_boundaries() {
        let text = "first line\nsecond line\nthird line";
        let parts = split_message(text, 24);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "first line\nsecond line");
        assert_eq!(parts[1], "third line");
    }

    #[test]
    fn test_split_never_exceeds_limit() {
        let long_line = "x".repeat(5000);
        let parts = split_message(&long_line, 1900);
        assert!(parts.iter().all(|p| p.len() <= 1900));
        assert_eq!(parts.concat().len(), 5000);
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_message("", 1900).is_empty());
    }
}
