// src/commands.rs
// Telegram command surface: a thin dispatch layer mapping chat commands onto
// session operations. Replies carry counts and state, never raw errors —
// those stay in the logs.

use std::sync::Arc;

use anyhow::Result;

use crate::notify::telegram::{Message, TelegramApi, Update};
use crate::notify::{MessageTransport, SendOptions};
use crate::session::{MonitorSession, StartSignal, StopSignal};

const WELCOME: &str = "🚀 <b>Бот для мониторинга Kwork</b>\n\n\
Я отслеживаю новые проекты на Kwork и присылаю уведомления.\n\n\
<b>Основные команды:</b>\n\
/monitor - запустить мониторинг\n\
/stop - остановить мониторинг\n\
/check - проверить сейчас\n\
/status - статус мониторинга\n\
/proxy - статистика прокси\n\
/help - справка";

const HELP: &str = "📚 <b>Справка по командам</b>\n\n\
/start - запустить бота\n\
/help - показать эту справку\n\
/status - статус мониторинга\n\
/ping - проверка связи\n\n\
<b>Команды управления:</b>\n\
/monitor (или /run) - запустить мониторинг\n\
/stop - остановить мониторинг\n\
/check - проверить проекты сейчас\n\
/proxy - статистика прокси\n\n\
<b>Как работает бот:</b>\n\
1. Бот периодически читает первую страницу биржи проектов\n\
2. Новые проекты определяются по id\n\
3. О каждом новом проекте приходит уведомление";

const UNKNOWN: &str = "🤖 <b>Используйте команды для управления ботом</b>\n\n\
Для списка команд отправьте /help";

const ADMIN_ONLY: &str = "⛔ <b>Эта команда доступна только администраторам</b>";

pub struct CommandDispatcher {
    session: MonitorSession,
    transport: Arc<dyn MessageTransport>,
    admin_ids: Vec<i64>,
}

impl CommandDispatcher {
    pub fn new(session: MonitorSession, transport: Arc<dyn MessageTransport>) -> Self {
        let admin_ids = session.config().admin_ids.clone();
        Self {
            session,
            transport,
            admin_ids,
        }
    }

    /// Handle one inbound update. Errors never escape: a failed reply is a
    /// log line, not a crash of the poll loop or webhook handler.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.clone() else {
            return;
        };
        if let Err(e) = self.handle_command(&message, text.trim()).await {
            tracing::warn!(error = %e, "command handling failed");
        }
    }

    async fn handle_command(&self, message: &Message, text: &str) -> Result<()> {
        let chat = message.chat.id.to_string();
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();

        let gated = matches!(command, "/monitor" | "/run" | "/stop" | "/check" | "/proxy");
        if gated && !self.is_admin(message) {
            return self.reply(&chat, ADMIN_ONLY).await;
        }

        match command {
            "/start" => self.cmd_start(&chat).await,
            "/help" => self.reply(&chat, HELP).await,
            "/ping" => self.reply(&chat, "🏓 <b>pong</b>").await,
            "/status" => self.cmd_status(&chat).await,
            "/monitor" | "/run" => self.cmd_monitor(&chat).await,
            "/stop" => self.cmd_stop(&chat).await,
            "/check" => self.cmd_check(&chat).await,
            "/proxy" => self.cmd_proxy(&chat).await,
            _ => self.reply(&chat, UNKNOWN).await,
        }
    }

    /// Empty ADMIN_IDS leaves the control commands open to anyone.
    fn is_admin(&self, message: &Message) -> bool {
        if self.admin_ids.is_empty() {
            return true;
        }
        message
            .from
            .as_ref()
            .is_some_and(|u| self.admin_ids.contains(&u.id))
    }

    /// Welcome message plus the persistent command keyboard, so the main
    /// commands are one tap away.
    async fn cmd_start(&self, chat: &str) -> Result<()> {
        let opts = SendOptions {
            html: true,
            reply_keyboard: Some(main_keyboard()),
            ..SendOptions::default()
        };
        self.transport.send_message(chat, WELCOME, opts).await
    }

    async fn cmd_monitor(&self, chat: &str) -> Result<()> {
        match self.session.start() {
            StartSignal::Started => {
                let cfg = self.session.config();
                let text = format!(
                    "🔍 <b>Мониторинг запущен!</b>\n\n\
                     • Проверка каждые: {} секунд\n\n\
                     <i>Первая проверка...</i>",
                    cfg.check_interval.as_secs()
                );
                self.reply(chat, &text).await
            }
            StartSignal::AlreadyRunning => {
                self.reply(chat, "🔍 <b>Мониторинг уже запущен!</b>").await
            }
        }
    }

    async fn cmd_stop(&self, chat: &str) -> Result<()> {
        match self.session.stop() {
            StopSignal::Stopped => self.reply(chat, "🛑 <b>Мониторинг остановлен</b>").await,
            StopSignal::NotRunning => self.reply(chat, "ℹ️ <b>Мониторинг не запущен</b>").await,
        }
    }

    async fn cmd_check(&self, chat: &str) -> Result<()> {
        self.reply(chat, "🔍 <b>Проверяю новые проекты...</b>")
            .await?;
        // The session sends the counts summary (and, in reply-only mode, the
        // notifications) back to this chat.
        self.session.check_now(Some(chat)).await;
        Ok(())
    }

    async fn cmd_status(&self, chat: &str) -> Result<()> {
        let status = self.session.status();
        let mut text = format!(
            "📊 <b>Статус мониторинга</b>\n\n\
             • <b>Мониторинг:</b> {}\n\
             • <b>Обработано проектов:</b> {}\n\
             • <b>Интервал проверки:</b> {} секунд",
            if status.monitoring {
                "🟢 Активен"
            } else {
                "🔴 Остановлен"
            },
            status.processed_count,
            status.check_interval_secs,
        );

        if let Some(proxies) = self.session.proxies() {
            let s = proxies.summary();
            text.push_str(&format!(
                "\n• <b>Прокси:</b> {}/{} активны\n• <b>Успешность:</b> {}%",
                s.active_proxies, s.total_proxies, s.success_rate
            ));
        }

        self.reply(chat, &text).await
    }

    async fn cmd_proxy(&self, chat: &str) -> Result<()> {
        let Some(proxies) = self.session.proxies() else {
            return self
                .reply(chat, "⚠️ <b>Прокси не настроены</b>")
                .await;
        };

        let s = proxies.summary();
        let mut text = format!(
            "🔧 <b>Статистика прокси</b>\n\n\
             • Всего прокси: {}\n\
             • Активных: {}\n\
             • Всего запросов: {}\n\
             • Успешных: {}%\n\n\
             📋 <b>Список прокси:</b>",
            s.total_proxies, s.active_proxies, s.total_requests, s.success_rate
        );

        for (i, p) in s.proxies.iter().take(10).enumerate() {
            let light = if p.stats.is_active { "🟢" } else { "🔴" };
            text.push_str(&format!(
                "\n{}. {} {}:{} ({}) — запросы {} (✓{} ✗{})",
                i + 1,
                light,
                p.host,
                p.port,
                p.country,
                p.stats.total_requests,
                p.stats.success_count,
                p.stats.fail_count,
            ));
        }
        if s.proxies.len() > 10 {
            text.push_str(&format!("\n\n... и еще {} прокси", s.proxies.len() - 10));
        }

        self.reply(chat, &text).await
    }

    async fn reply(&self, chat: &str, text: &str) -> Result<()> {
        let opts = SendOptions {
            html: true,
            ..SendOptions::default()
        };
        self.transport.send_message(chat, text, opts).await
    }
}

fn main_keyboard() -> Vec<Vec<String>> {
    vec![
        vec!["/monitor".into(), "/stop".into()],
        vec!["/check".into(), "/status".into()],
        vec!["/proxy".into(), "/help".into()],
    ]
}

/// Long-polling update loop for the daemon mode. Runs until the process
/// exits; transient Bot API failures back off and retry.
pub async fn run_update_loop(api: TelegramApi, dispatcher: Arc<CommandDispatcher>) -> Result<()> {
    api.delete_webhook().await?;
    let me = api.get_me().await?;
    tracing::info!(
        id = me.id,
        username = me.username.as_deref().unwrap_or("?"),
        "bot ready, waiting for commands"
    );

    let mut offset = 0i64;
    loop {
        match api.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatcher.handle_update(update).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }
}
