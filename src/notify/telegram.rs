//! Telegram Bot API delivery.

use super::{DeliveryError, DeliverySink, OutboundMessage};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Posts messages to one chat through `sendMessage`.
pub struct TelegramSink {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, DeliveryError> {
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(DeliveryError::NotConfigured(
                "telegram bot token and chat id are required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    /// Point the sink at a different API host (e.g. a local bot API server).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DeliverySink for TelegramSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message.content,
            "parse_mode": "Markdown",
        });

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            TelegramSink::new("", "123"),
            Err(DeliveryError::NotConfigured(_))
        ));
        assert!(matches!(
            TelegramSink::new("token", " "),
            Err(DeliveryError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_endpoint_and_debug_hide_token() {
        let sink = TelegramSink::new("123:abc", "42")
            .unwrap()
            .with_api_base("http://localhost:8081/");
        assert_eq!(sink.endpoint(), "http://localhost:8081/bot123:abc/sendMessage");
        assert!(!format!("{:?}", sink).contains("123:abc"));
    }
}
