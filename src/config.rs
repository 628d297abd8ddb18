// src/config.rs
// Runtime configuration, loaded from environment variables (.env friendly).

use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_LISTING_URL: &str = "https://kwork.ru/projects";
pub const DEFAULT_PROXY_TEST_URL: &str = "https://api.ipify.org?format=json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot credential. Missing token is a startup failure.
    pub bot_token: String,
    /// Destination chat for scheduled notifications. When absent the bot runs
    /// in reply-only mode: only command-triggered checks deliver anything.
    pub chat_id: Option<String>,
    /// Users allowed to drive the monitor. Empty list leaves commands open.
    pub admin_ids: Vec<i64>,
    pub check_interval: Duration,
    pub send_delay: Duration,
    pub listing_url: String,
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
    pub fetch_retry_delay: Duration,
    pub proxy_string: String,
    pub proxy_test_url: String,
    pub proxy_timeout: Duration,
    pub max_requests_per_proxy: u32,
    pub port: u16,
}

impl Config {
    /// Read configuration from the environment. Only `BOT_TOKEN` is required;
    /// everything else falls back to a sensible default.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            bail!("BOT_TOKEN is not set; refusing to start");
        }

        let chat_id = std::env::var("CHAT_ID")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let admin_ids = std::env::var("ADMIN_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .collect();

        Ok(Self {
            bot_token,
            chat_id,
            admin_ids,
            check_interval: Duration::from_secs(env_u64("CHECK_INTERVAL", 600)),
            send_delay: Duration::from_millis(env_u64("SEND_DELAY_MS", 1000)),
            listing_url: std::env::var("KWORK_URL")
                .unwrap_or_else(|_| DEFAULT_LISTING_URL.to_string()),
            fetch_timeout: Duration::from_secs(env_u64("FETCH_TIMEOUT", 10)),
            fetch_retries: env_u64("FETCH_RETRIES", 3) as u32,
            fetch_retry_delay: Duration::from_millis(env_u64("FETCH_RETRY_DELAY_MS", 2000)),
            proxy_string: std::env::var("PROXY_STRING").unwrap_or_default(),
            proxy_test_url: std::env::var("PROXY_TEST_URL")
                .unwrap_or_else(|_| DEFAULT_PROXY_TEST_URL.to_string()),
            proxy_timeout: Duration::from_secs(env_u64("PROXY_TIMEOUT", 10)),
            max_requests_per_proxy: env_u64("MAX_REQUESTS_PER_PROXY", 6) as u32,
            port: env_u64("PORT", 8000) as u16,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    /// Compact config for tests and demos: no proxies, short delays, bogus token.
    fn default() -> Self {
        Self {
            bot_token: "test-token".into(),
            chat_id: Some("1000".into()),
            admin_ids: Vec::new(),
            check_interval: Duration::from_secs(600),
            send_delay: Duration::from_millis(5),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            fetch_timeout: Duration::from_secs(2),
            fetch_retries: 3,
            fetch_retry_delay: Duration::from_millis(5),
            proxy_string: String::new(),
            proxy_test_url: DEFAULT_PROXY_TEST_URL.to_string(),
            proxy_timeout: Duration::from_secs(2),
            max_requests_per_proxy: 6,
            port: 8000,
        }
    }
}
