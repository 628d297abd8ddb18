// src/kwork/fetch.rs
// Listing page fetcher: browser-like headers, fixed retry budget, optional
// rotation through a proxy pool. Exhausting all attempts yields `None`, never
// a hard error; a failed fetch must not take the monitor down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::proxy::{ProxyEndpoint, ProxySource};

/// Responses shorter than this are treated as blocked/empty and retried.
const MIN_BODY_LEN: usize = 100;

/// Current outbound route for listing requests.
#[derive(Debug, Clone)]
enum Route {
    Direct,
    Proxied(ProxyEndpoint),
}

pub struct Fetcher {
    listing_url: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    proxies: Option<Arc<dyn ProxySource>>,
    route: Route,
    client: Client,
}

impl Fetcher {
    pub fn new(cfg: &Config, proxies: Option<Arc<dyn ProxySource>>) -> Self {
        let route = match proxies.as_ref().and_then(|p| p.next_endpoint()) {
            Some(endpoint) => Route::Proxied(endpoint),
            None => Route::Direct,
        };

        let mut fetcher = Self {
            listing_url: cfg.listing_url.clone(),
            timeout: cfg.fetch_timeout,
            retries: cfg.fetch_retries.max(1),
            retry_delay: cfg.fetch_retry_delay,
            proxies,
            route,
            client: Client::new(),
        };
        fetcher.rebuild_client();
        fetcher
    }

    /// Fetch the raw listing page markup, or `None` after the retry budget is
    /// spent. 403/429 responses and network errors rotate the proxy route
    /// before the next attempt.
    pub async fn fetch_listing_page(&mut self) -> Option<String> {
        for attempt in 1..=self.retries {
            counter!("kwork_fetch_attempts_total").increment(1);
            tracing::info!(url = %self.listing_url, attempt, retries = self.retries, route = %self.route_name(), "fetching listing page");

            match self.attempt().await {
                Ok(body) => {
                    self.mark_route(true);
                    counter!("kwork_pages_fetched_total").increment(1);
                    return Some(body);
                }
                Err(e) => {
                    counter!("kwork_fetch_failures_total").increment(1);
                    tracing::warn!(error = %e, attempt, "fetch attempt failed");
                    self.mark_route(false);
                    self.rotate_route();
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::error!("could not fetch listing page after all attempts");
        None
    }

    async fn attempt(&mut self) -> Result<String> {
        let resp = self
            .client
            .get(&self.listing_url)
            .send()
            .await
            .context("listing GET failed")?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            anyhow::bail!("blocked by target (status {status})");
        }
        if !status.is_success() {
            anyhow::bail!("unexpected status {status}");
        }

        let body = resp.text().await.context("reading listing body")?;
        if body.len() < MIN_BODY_LEN {
            anyhow::bail!("suspiciously short body ({} bytes)", body.len());
        }
        Ok(body)
    }

    /// Switch to the pool's next endpoint, or direct when the pool has
    /// nothing left to offer.
    fn rotate_route(&mut self) {
        let next = match self.proxies.as_ref().and_then(|p| p.next_endpoint()) {
            Some(endpoint) => {
                tracing::info!(host = %endpoint.host, port = endpoint.port, country = %endpoint.country, "switched proxy");
                Route::Proxied(endpoint)
            }
            None => {
                if self.proxies.is_some() {
                    tracing::warn!("no proxy available, falling back to direct connection");
                }
                Route::Direct
            }
        };
        self.route = next;
        self.rebuild_client();
    }

    fn mark_route(&self, success: bool) {
        if let (Route::Proxied(endpoint), Some(proxies)) = (&self.route, self.proxies.as_ref()) {
            if success {
                proxies.mark_success(&endpoint.url);
            } else {
                proxies.mark_failure(&endpoint.url);
            }
        }
    }

    /// The client carries the headers, timeout and proxy, so a route change
    /// means a rebuild. An unusable proxy URL degrades to direct.
    fn rebuild_client(&mut self) {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .default_headers(browser_headers());

        if let Route::Proxied(endpoint) = &self.route {
            match reqwest::Proxy::all(&endpoint.url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => {
                    tracing::warn!(error = %e, url = %endpoint.url, "invalid proxy url, going direct");
                    self.route = Route::Direct;
                    builder = Client::builder()
                        .timeout(self.timeout)
                        .default_headers(browser_headers());
                }
            }
        }

        self.client = builder.build().unwrap_or_default();
    }

    fn route_name(&self) -> String {
        match &self.route {
            Route::Direct => "direct".to_string(),
            Route::Proxied(p) => format!("{}:{}", p.host, p.port),
        }
    }
}

/// Header set mimicking a desktop Chrome visit, to reduce the chance of the
/// listing request being rejected as a bot.
fn browser_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        "User-Agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        ),
    );
    h.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    h.insert(
        "Accept-Language",
        HeaderValue::from_static("ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3"),
    );
    h.insert("DNT", HeaderValue::from_static("1"));
    h.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    h.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
    h.insert("Referer", HeaderValue::from_static("https://kwork.ru/"));
    h.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    h.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    h.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
    h.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    h
}
