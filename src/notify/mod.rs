// src/notify/mod.rs
pub mod telegram;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::counter;

use crate::kwork::types::Project;

/// Per-message delivery options understood by the transport.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub html: bool,
    pub link_preview: bool,
    /// Rows of command buttons shown as a persistent reply keyboard.
    pub reply_keyboard: Option<Vec<Vec<String>>>,
}

impl SendOptions {
    /// Project notifications: HTML formatting, link preview left on so the
    /// chat shows the project card.
    pub fn notification() -> Self {
        Self {
            html: true,
            link_preview: true,
            reply_keyboard: None,
        }
    }
}

/// Black-box messaging sink. Production wires the Telegram Bot API here;
/// tests use a recording fake.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_message(&self, chat: &str, text: &str, opts: SendOptions) -> Result<()>;
}

/// Render the fixed notification template. User-controlled fields are
/// HTML-escaped so a hostile listing cannot break the markup.
pub fn format_project_message(p: &Project) -> String {
    format!(
        "🎯 <b>НОВЫЙ ПРОЕКТ НА KWORK</b>\n\n\
         🏷️ <b>{title}</b>\n\n\
         💰 <b>{price}</b>\n\
         👤 <b>{poster}</b>\n\
         ⏰ <b>{time}</b>\n\n\
         📝 {description}\n\n\
         🔗 <a href=\"{url}\">Открыть проект</a>",
        title = html_escape::encode_text(&p.title),
        price = html_escape::encode_text(&p.price),
        poster = html_escape::encode_text(&p.poster_name),
        time = html_escape::encode_text(&p.time_remaining),
        description = html_escape::encode_text(&p.description),
        url = html_escape::encode_double_quoted_attribute(&p.url),
    )
}

/// Paced, best-effort delivery of project notifications.
pub struct Notifier {
    transport: Arc<dyn MessageTransport>,
    send_delay: Duration,
    halt: Arc<AtomicBool>,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        send_delay: Duration,
        halt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            send_delay,
            halt,
        }
    }

    /// Deliver one project. Failures are logged and reported as `false`,
    /// never propagated.
    pub async fn notify(&self, chat: &str, project: &Project) -> bool {
        let text = format_project_message(project);
        match self
            .transport
            .send_message(chat, &text, SendOptions::notification())
            .await
        {
            Ok(()) => {
                counter!("kwork_notifications_sent_total").increment(1);
                tracing::info!(id = %project.id, title = %project.title, "notification sent");
                true
            }
            Err(e) => {
                counter!("kwork_notifications_failed_total").increment(1);
                tracing::warn!(id = %project.id, error = %e, "notification failed");
                false
            }
        }
    }

    /// Deliver a batch in input order with a fixed inter-message delay. One
    /// failed send does not abort the batch; the halt flag (set by `stop`)
    /// is checked before every send so a long batch can be cut short.
    pub async fn notify_batch(&self, chat: &str, projects: &[Project]) -> usize {
        let mut sent = 0usize;
        for (i, project) in projects.iter().enumerate() {
            if self.halt.load(Ordering::SeqCst) {
                tracing::warn!(
                    remaining = projects.len() - i,
                    "delivery halted, dropping rest of batch"
                );
                break;
            }

            let ok = self.notify(chat, project).await;
            if ok {
                sent += 1;
            }
            if ok && i + 1 < projects.len() {
                tokio::time::sleep(self.send_delay).await;
            }
        }
        sent
    }
}
