// src/session.rs
// MonitorSession owns all mutable monitoring state: the seen-set, the
// running flag, the halt flag and the periodic check task. Nothing lives in
// process-wide globals; command handlers and HTTP handlers share one session
// behind its internal Arc.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::kwork::{self, extract, fetch::Fetcher, normalize};
use crate::notify::{MessageTransport, Notifier, SendOptions};
use crate::proxy::ProxySource;
use crate::seen::SeenSet;

/// Outcome of a `start` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSignal {
    Started,
    AlreadyRunning,
}

/// Outcome of a `stop` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Stopped,
    NotRunning,
}

/// Counts reported back to the command surface after one check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub fetched: bool,
    pub found: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub monitoring: bool,
    /// Ids ever surfaced, unaffected by seen-set compaction.
    pub processed_count: u64,
    pub tracked_ids: usize,
    pub check_interval_secs: u64,
}

#[derive(Clone)]
pub struct MonitorSession {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    seen: Mutex<SeenSet>,
    // Fetch mutates route/proxy state, so it sits behind an async mutex.
    fetcher: tokio::sync::Mutex<Fetcher>,
    notifier: Notifier,
    transport: Arc<dyn MessageTransport>,
    proxies: Option<Arc<dyn ProxySource>>,
    running: AtomicBool,
    halt: Arc<AtomicBool>,
    // Distinguishes the current timer task from a stale one after a quick
    // stop/start sequence.
    epoch: AtomicU64,
    stop_signal: Notify,
    // Non-reentrancy guard: scheduled ticks try_lock and skip.
    check_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorSession {
    pub fn new(
        cfg: Config,
        transport: Arc<dyn MessageTransport>,
        proxies: Option<Arc<dyn ProxySource>>,
    ) -> Self {
        let halt = Arc::new(AtomicBool::new(false));
        let fetcher = Fetcher::new(&cfg, proxies.clone());
        let notifier = Notifier::new(transport.clone(), cfg.send_delay, halt.clone());

        Self {
            inner: Arc::new(Inner {
                cfg,
                seen: Mutex::new(SeenSet::new()),
                fetcher: tokio::sync::Mutex::new(fetcher),
                notifier,
                transport,
                proxies,
                running: AtomicBool::new(false),
                halt,
                epoch: AtomicU64::new(0),
                stop_signal: Notify::new(),
                check_lock: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    pub fn proxies(&self) -> Option<&Arc<dyn ProxySource>> {
        self.inner.proxies.as_ref()
    }

    /// Arm the periodic trigger. The first check runs immediately; further
    /// checks follow every `check_interval`. Idempotent: a second `start`
    /// reports `AlreadyRunning` and changes nothing.
    pub fn start(&self) -> StartSignal {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return StartSignal::AlreadyRunning;
        }
        self.inner.halt.store(false, Ordering::SeqCst);
        let my_epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let session = self.clone();
        let interval = self.inner.cfg.check_interval;
        let handle = tokio::spawn(async move {
            loop {
                session.scheduled_tick().await;

                if session.timer_is_stale(my_epoch) {
                    break;
                }
                tokio::select! {
                    _ = session.inner.stop_signal.notified() => {}
                    _ = tokio::time::sleep(interval) => {}
                }
                if session.timer_is_stale(my_epoch) {
                    break;
                }
            }
            tracing::info!("monitoring timer stopped");
        });

        *self.inner.timer.lock().expect("timer mutex poisoned") = Some(handle);
        tracing::info!(interval_secs = interval.as_secs(), "monitoring started");
        StartSignal::Started
    }

    /// Disarm the periodic trigger. An in-flight check finishes its pipeline
    /// but its delivery batch stops before the next send (halt flag).
    pub fn stop(&self) -> StopSignal {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return StopSignal::NotRunning;
        }
        self.inner.halt.store(true, Ordering::SeqCst);
        self.inner.stop_signal.notify_waiters();
        // Let the task unwind on its own; dropping the handle only detaches.
        self.inner.timer.lock().expect("timer mutex poisoned").take();
        tracing::info!("monitoring stopped");
        StopSignal::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        let seen = self.inner.seen.lock().expect("seen mutex poisoned");
        SessionStatus {
            monitoring: self.is_running(),
            processed_count: seen.total_seen(),
            tracked_ids: seen.len(),
            check_interval_secs: self.inner.cfg.check_interval.as_secs(),
        }
    }

    /// Run one check cycle now, waiting for any in-flight cycle to finish
    /// first. `reply_to` carries the chat that asked (command surface); it
    /// receives the counts summary and, without a configured CHAT_ID, the
    /// notifications themselves.
    pub async fn check_now(&self, reply_to: Option<&str>) -> CheckReport {
        let _guard = self.inner.check_lock.lock().await;
        self.inner.halt.store(false, Ordering::SeqCst);
        self.run_check(reply_to).await
    }

    /// Timer path: skip the tick when the previous check is still running.
    async fn scheduled_tick(&self) {
        match self.inner.check_lock.try_lock() {
            Ok(_guard) => {
                self.run_check(None).await;
            }
            Err(_) => {
                counter!("kwork_check_ticks_skipped_total").increment(1);
                tracing::warn!("previous check still in flight, skipping tick");
            }
        }
    }

    /// One full cycle: fetch -> extract -> normalize -> dedupe -> notify.
    /// Every stage contains its own failures; this function never errors.
    async fn run_check(&self, reply_to: Option<&str>) -> CheckReport {
        kwork::ensure_metrics_described();
        let mut report = CheckReport::default();

        let page = self.inner.fetcher.lock().await.fetch_listing_page().await;
        let Some(html) = page else {
            if let Some(chat) = reply_to {
                self.reply(chat, "⚠️ <b>Не удалось получить проекты с Kwork</b>")
                    .await;
            }
            return report;
        };
        report.fetched = true;

        let listings = extract::extract_listings(&html);
        let projects = normalize::projects_from_listings(&listings);
        tracing::info!(listings = listings.len(), projects = projects.len(), "page processed");

        let new_projects = {
            let mut seen = self.inner.seen.lock().expect("seen mutex poisoned");
            let fresh = seen.filter_new(projects);
            // Maintenance is an explicit, separate step after filtering.
            let dropped = seen.compact();
            if dropped > 0 {
                tracing::info!(dropped, "seen-set compacted");
            }
            gauge!("kwork_seen_ids").set(seen.len() as f64);
            fresh
        };
        report.found = new_projects.len();
        counter!("kwork_projects_new_total").increment(new_projects.len() as u64);

        if let Some(chat) = reply_to {
            let summary = if new_projects.is_empty() {
                "ℹ️ <b>Новых проектов нет</b>".to_string()
            } else {
                format!("🎉 <b>Найдено новых проектов: {}</b>", new_projects.len())
            };
            self.reply(chat, &summary).await;
        }

        // Reply-only degradation: without CHAT_ID, scheduled checks find and
        // remember projects but deliver nothing.
        let destination = self.inner.cfg.chat_id.as_deref().or(reply_to);
        match destination {
            Some(chat) if !new_projects.is_empty() => {
                report.delivered = self.inner.notifier.notify_batch(chat, &new_projects).await;
            }
            None if !new_projects.is_empty() => {
                tracing::warn!(
                    found = new_projects.len(),
                    "no destination chat configured, skipping delivery"
                );
            }
            _ => {}
        }

        counter!("kwork_check_runs_total").increment(1);
        gauge!("kwork_last_check_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(found = report.found, delivered = report.delivered, "check cycle done");
        report
    }

    /// Best-effort service message to the chat that issued a command.
    async fn reply(&self, chat: &str, text: &str) {
        let opts = SendOptions {
            html: true,
            ..SendOptions::default()
        };
        if let Err(e) = self.inner.transport.send_message(chat, text, opts).await {
            tracing::warn!(error = %e, "service reply failed");
        }
    }

    fn timer_is_stale(&self, my_epoch: u64) -> bool {
        !self.inner.running.load(Ordering::SeqCst)
            || self.inner.epoch.load(Ordering::SeqCst) != my_epoch
    }
}
