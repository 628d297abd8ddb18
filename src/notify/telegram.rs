// src/notify/telegram.rs
// Thin Telegram Bot API client: sendMessage for notifications plus the small
// surface the long-polling command loop needs (getMe, getUpdates,
// deleteWebhook).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{MessageTransport, SendOptions};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Long-poll duration for getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct TelegramApi {
    base_url: String,
    token: String,
    client: Client,
}

/// Standard Bot API envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotProfile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Point the client at a different server (mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("telegram {method} request"))?
            .error_for_status()
            .with_context(|| format!("telegram {method} status"))?;

        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("telegram {method} body"))?;
        if !envelope.ok {
            return Err(anyhow!(
                "telegram {method} rejected: {}",
                envelope.description.unwrap_or_else(|| "no description".into())
            ));
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("telegram {method}: ok without result"))
    }

    pub async fn get_me(&self) -> Result<BotProfile> {
        self.call("getMe", json!({}), Duration::from_secs(10)).await
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                json!({ "drop_pending_updates": true }),
                Duration::from_secs(10),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": POLL_TIMEOUT_SECS }),
            // Request timeout must outlast the server-side poll window.
            Duration::from_secs(POLL_TIMEOUT_SECS + 10),
        )
        .await
    }
}

#[async_trait::async_trait]
impl MessageTransport for TelegramApi {
    async fn send_message(&self, chat: &str, text: &str, opts: SendOptions) -> Result<()> {
        let mut body = json!({
            "chat_id": chat,
            "text": text,
            "disable_web_page_preview": !opts.link_preview,
        });
        if opts.html {
            body["parse_mode"] = json!("HTML");
        }
        if let Some(rows) = &opts.reply_keyboard {
            let keyboard: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| row.iter().map(|b| json!({ "text": b })).collect())
                .collect();
            body["reply_markup"] = json!({ "keyboard": keyboard, "resize_keyboard": true });
        }

        let _: serde_json::Value = self
            .call("sendMessage", body, Duration::from_secs(10))
            .await?;
        Ok(())
    }
}
