//! Telegram Bot API client: sends messages (the `Notifier` for reminders and
//! command replies) and long-polls for incoming commands.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::record::OwnerKey;
use crate::notifier::{DeliveryError, Notifier};

const API_BASE: &str = "https://api.telegram.org";
/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: OwnerKey,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: OwnerKey,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    delivery_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, delivery_timeout: Duration) -> Result<Self, DeliveryError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: format!("{API_BASE}/bot{token}"),
            delivery_timeout,
        })
    }

    /// Sends `text` as one or more HTML messages, splitting on line breaks.
    pub async fn send_message(&self, chat_id: OwnerKey, text: &str) -> Result<(), DeliveryError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let body = SendMessageRequest {
                chat_id,
                text: &chunk,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            };
            let _: serde_json::Value = self
                .call("sendMessage", &body, self.delivery_timeout)
                .await?;
        }
        debug!("Delivered message to chat {chat_id}");
        Ok(())
    }

    /// Long-polls for updates after `offset`, waiting up to `poll_timeout`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, DeliveryError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        // Allow the HTTP round trip on top of the server-side wait.
        let deadline = poll_timeout + self.delivery_timeout;
        self.call("getUpdates", &body, deadline).await
    }

    async fn call<B, T>(&self, method: &str, body: &B, deadline: Duration) -> Result<T, DeliveryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .timeout(deadline)
            .json(body)
            .send()
            .await
            .map_err(timeout_or_http)?;

        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await.map_err(timeout_or_http)?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => {
                let description = description.unwrap_or_else(|| "no description".to_string());
                warn!("Telegram {method} failed with {status}: {description}");
                Err(DeliveryError::Api {
                    status: status.as_u16(),
                    description,
                })
            }
        }
    }
}

fn timeout_or_http(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Http(e)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn deliver(&self, owner: OwnerKey, text: &str) -> Result<(), DeliveryError> {
        self.send_message(owner, text).await
    }
}

/// Splits `text` into chunks of at most `max_chars` characters, breaking on
/// newlines where possible and hard-splitting lines that are longer on their own.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());

        if current_len + separator + line_len <= max_chars {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(max_chars.max(1)).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                chunks.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Escapes text interpolated into `parse_mode=HTML` messages.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_single_chunk() {
        assert_eq!(split_message("a\nb", 10), vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_split_prefers_line_boundaries() {
        let chunks = split_message("aaaa\nbbbb\ncc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cc".to_string()]);
    }

    #[test]
    fn test_overlong_line_is_hard_split() {
        let chunks = split_message("abcdefg\nhi", 3);
        assert_eq!(chunks, vec!["abc", "def", "g", "hi"]);
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        let text = "ж".repeat(5);
        assert_eq!(split_message(&text, 5), vec![text.clone()]);
    }

    #[test]
    fn test_empty_message_has_no_chunks() {
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
    }

    #[test]
    fn test_update_deserializes_without_message() {
        let update: Update = serde_json::from_str(r#"{"update_id": 5}"#).unwrap();
        assert_eq!(update.update_id, 5);
        assert!(update.message.is_none());
    }
}
