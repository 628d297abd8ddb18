// src/proxy.rs
// Rotating pool of outbound proxy endpoints. Entries come from the
// PROXY_STRING env var as a comma-separated list of http(s)://, socks4://,
// socks5:// or ss:// URLs, each optionally tagged with a `#Country` comment.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use url::Url;

/// An endpoint deactivates after this many failures.
const MAX_FAILURES: u32 = 3;

/// Supplies candidate outbound routes. Injected into the fetcher so tests can
/// fake proxy behavior without touching the network.
pub trait ProxySource: Send + Sync {
    /// Next usable endpoint, or `None` when the pool is empty.
    fn next_endpoint(&self) -> Option<ProxyEndpoint>;
    fn mark_success(&self, url: &str);
    fn mark_failure(&self, url: &str);
    fn summary(&self) -> ProxySummary;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// "http", "socks4" or "socks5" (ss:// entries are reduced to socks5).
    pub scheme: String,
    /// URL handed to the HTTP client, e.g. `socks5://1.2.3.4:1080`.
    pub url: String,
    pub host: String,
    pub port: u16,
    pub country: String,
    /// The entry as it appeared in PROXY_STRING, for operator-facing output.
    pub original: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyStats {
    pub success_count: u32,
    pub fail_count: u32,
    pub total_requests: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxySummary {
    pub total_proxies: usize,
    pub active_proxies: usize,
    pub total_requests: u32,
    pub success_rate: f64,
    pub proxies: Vec<ProxyEntrySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyEntrySummary {
    pub url: String,
    pub host: String,
    pub port: u16,
    pub country: String,
    pub original: String,
    pub stats: ProxyStats,
}

struct Pool {
    endpoints: Vec<ProxyEndpoint>,
    stats: HashMap<String, ProxyStats>,
    cursor: usize,
    max_requests_per_proxy: u32,
}

pub struct ProxyManager {
    inner: Mutex<Pool>,
}

impl ProxyManager {
    /// Build a manager from a PROXY_STRING value. Returns `None` when the
    /// string yields no usable endpoints (the caller then goes direct).
    pub fn from_proxy_string(proxy_string: &str, max_requests_per_proxy: u32) -> Option<Self> {
        let endpoints = parse_proxy_string(proxy_string);
        if endpoints.is_empty() {
            return None;
        }

        tracing::info!(count = endpoints.len(), "loaded proxy endpoints");
        for (i, p) in endpoints.iter().enumerate() {
            tracing::info!(n = i + 1, scheme = %p.scheme, host = %p.host, port = p.port, country = %p.country, "proxy");
        }

        let stats = endpoints
            .iter()
            .map(|p| {
                (
                    p.url.clone(),
                    ProxyStats {
                        is_active: true,
                        ..ProxyStats::default()
                    },
                )
            })
            .collect();

        Some(Self {
            inner: Mutex::new(Pool {
                endpoints,
                stats,
                cursor: 0,
                max_requests_per_proxy,
            }),
        })
    }

    /// Reachability probe: request the echo endpoint through the candidate
    /// with a short timeout. Validation only, no stats mutation.
    pub async fn probe(endpoint: &ProxyEndpoint, test_url: &str, timeout: Duration) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(timeout)
            .proxy(match reqwest::Proxy::all(&endpoint.url) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, url = %endpoint.url, "invalid proxy url");
                    return false;
                }
            })
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "probe client build failed");
                return false;
            }
        };

        match client.get(test_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(host = %endpoint.host, "proxy probe ok");
                true
            }
            Ok(resp) => {
                tracing::warn!(host = %endpoint.host, status = %resp.status(), "proxy probe bad status");
                false
            }
            Err(e) => {
                tracing::warn!(host = %endpoint.host, error = %e, "proxy probe failed");
                false
            }
        }
    }

    /// Probe candidates in rotation order and return the first working one.
    /// Marks each probed endpoint's stats along the way. `None` means the
    /// pool is exhausted and the caller should fall back to direct requests.
    pub async fn first_working(&self, test_url: &str, timeout: Duration) -> Option<ProxyEndpoint> {
        let count = self.inner.lock().expect("proxy mutex poisoned").endpoints.len();
        for _ in 0..count {
            let candidate = self.next_endpoint()?;
            if Self::probe(&candidate, test_url, timeout).await {
                self.mark_success(&candidate.url);
                return Some(candidate);
            }
            self.mark_failure(&candidate.url);
        }
        None
    }
}

impl ProxySource for ProxyManager {
    /// Round-robin over active endpoints that still have request budget.
    /// When every endpoint is exhausted or inactive, the pool is refreshed
    /// (stats reset) and the search restarts.
    fn next_endpoint(&self) -> Option<ProxyEndpoint> {
        let mut pool = self.inner.lock().expect("proxy mutex poisoned");
        if pool.endpoints.is_empty() {
            return None;
        }

        for _ in 0..pool.endpoints.len() {
            let candidate = pool.endpoints[pool.cursor].clone();
            pool.cursor = (pool.cursor + 1) % pool.endpoints.len();

            let budget = pool.max_requests_per_proxy;
            let stats = pool.stats.get(&candidate.url);
            if stats.is_some_and(|s| s.is_active && s.total_requests < budget) {
                return Some(candidate);
            }
        }

        tracing::warn!("all proxies exhausted or inactive, refreshing pool");
        for stats in pool.stats.values_mut() {
            stats.is_active = true;
            stats.total_requests = 0;
        }

        let candidate = pool.endpoints[pool.cursor].clone();
        pool.cursor = (pool.cursor + 1) % pool.endpoints.len();
        Some(candidate)
    }

    fn mark_success(&self, url: &str) {
        let mut pool = self.inner.lock().expect("proxy mutex poisoned");
        if let Some(stats) = pool.stats.get_mut(url) {
            stats.success_count += 1;
            stats.total_requests += 1;
        }
    }

    fn mark_failure(&self, url: &str) {
        let mut pool = self.inner.lock().expect("proxy mutex poisoned");
        if let Some(stats) = pool.stats.get_mut(url) {
            stats.fail_count += 1;
            stats.total_requests += 1;
            if stats.fail_count >= MAX_FAILURES {
                stats.is_active = false;
                tracing::warn!(url, "proxy deactivated after repeated failures");
            }
        }
    }

    fn summary(&self) -> ProxySummary {
        let pool = self.inner.lock().expect("proxy mutex poisoned");
        let total_requests: u32 = pool.stats.values().map(|s| s.total_requests).sum();
        let total_success: u32 = pool.stats.values().map(|s| s.success_count).sum();
        let success_rate = if total_requests > 0 {
            (f64::from(total_success) / f64::from(total_requests) * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        ProxySummary {
            total_proxies: pool.endpoints.len(),
            active_proxies: pool.stats.values().filter(|s| s.is_active).count(),
            total_requests,
            success_rate,
            proxies: pool
                .endpoints
                .iter()
                .map(|p| ProxyEntrySummary {
                    url: p.url.clone(),
                    host: p.host.clone(),
                    port: p.port,
                    country: p.country.clone(),
                    original: p.original.clone(),
                    stats: pool.stats.get(&p.url).cloned().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Parse a comma-separated proxy list. Unknown formats are skipped with a
/// warning; a broken entry never fails the whole list.
pub fn parse_proxy_string(proxy_string: &str) -> Vec<ProxyEndpoint> {
    let mut out = Vec::new();
    for entry in proxy_string.split(',') {
        let original = entry.trim();
        if original.is_empty() {
            continue;
        }

        let (spec, country) = split_country_comment(original);
        let parsed = if spec.starts_with("ss://") {
            parse_shadowsocks(spec)
        } else if ["http://", "https://", "socks4://", "socks5://"]
            .iter()
            .any(|p| spec.starts_with(p))
        {
            parse_plain_url(spec)
        } else {
            tracing::warn!(entry = spec, "unknown proxy format");
            None
        };

        match parsed {
            Some(mut p) => {
                p.country = country;
                p.original = original.to_string();
                out.push(p);
            }
            None => tracing::warn!(entry = spec, "unparsable proxy entry"),
        }
    }
    out
}

/// Split off a trailing `#Country` comment; the first word of the comment
/// (URL-encoding and emoji removed) becomes the country tag.
fn split_country_comment(entry: &str) -> (&str, String) {
    match entry.split_once('#') {
        Some((spec, comment)) => {
            let cleaned = comment.replace("%20", " ");
            let country = cleaned
                .split_whitespace()
                .find(|w| w.chars().any(|c| c.is_alphanumeric()))
                .map(|w| w.chars().filter(|c| (*c as u32) < 0x10000).collect())
                .unwrap_or_else(|| "Unknown".to_string());
            (spec.trim(), country)
        }
        None => (entry, "Unknown".to_string()),
    }
}

fn parse_plain_url(spec: &str) -> Option<ProxyEndpoint> {
    let parsed = Url::parse(spec).ok()?;
    let scheme = match parsed.scheme() {
        "http" | "https" => "http".to_string(),
        other => other.to_string(),
    };
    let host = parsed.host_str()?.to_string();
    let port = parsed.port().unwrap_or(match parsed.scheme() {
        "http" => 80,
        "https" => 443,
        "socks4" | "socks5" => 1080,
        _ => 80,
    });

    Some(ProxyEndpoint {
        scheme,
        url: spec.to_string(),
        host,
        port,
        country: String::new(),
        original: String::new(),
    })
}

/// Reduce an `ss://` entry to a plain socks5 endpoint. The host:port pair is
/// taken from the URL itself or, failing that, from its base64 payload.
fn parse_shadowsocks(spec: &str) -> Option<ProxyEndpoint> {
    static RE_HOST_PORT: OnceCell<Regex> = OnceCell::new();
    let re = RE_HOST_PORT.get_or_init(|| {
        Regex::new(r"([0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}):([0-9]{1,5})").unwrap()
    });

    let body = spec.strip_prefix("ss://")?;

    let socks5_from = |text: &str| -> Option<ProxyEndpoint> {
        let caps = re.captures(text)?;
        let host = caps.get(1)?.as_str().to_string();
        let port: u16 = caps.get(2)?.as_str().parse().ok()?;
        Some(ProxyEndpoint {
            scheme: "socks5".to_string(),
            url: format!("socks5://{host}:{port}"),
            host,
            port,
            country: String::new(),
            original: String::new(),
        })
    };

    if let Some(p) = socks5_from(body) {
        return Some(p);
    }

    // Base64-encoded form: ss://<b64(method:pass@host:port)>[?plugin]
    let mut b64 = body.split('?').next().unwrap_or(body).to_string();
    let padding = (4 - b64.len() % 4) % 4;
    b64.push_str(&"=".repeat(padding));
    let decoded = base64::engine::general_purpose::STANDARD.decode(b64).ok()?;
    socks5_from(&String::from_utf8_lossy(&decoded))
}

/// Convenience for wiring: build a manager from config, logging the outcome.
pub fn manager_from_config(cfg: &crate::config::Config) -> Option<ProxyManager> {
    if cfg.proxy_string.trim().is_empty() {
        tracing::warn!("no proxies configured, using direct connection");
        return None;
    }
    let manager = ProxyManager::from_proxy_string(&cfg.proxy_string, cfg.max_requests_per_proxy);
    if manager.is_none() {
        tracing::warn!("PROXY_STRING yielded no usable endpoints, using direct connection");
    }
    manager
}
