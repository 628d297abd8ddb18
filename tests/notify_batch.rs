// tests/notify_batch.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use kwork_monitor::kwork::Project;
use kwork_monitor::notify::{format_project_message, MessageTransport, Notifier, SendOptions};

/// Records every send; fails on the attempt numbers it is told to.
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail_on: Vec<usize>,
    attempts: Mutex<usize>,
}

impl RecordingTransport {
    fn new(fail_on: Vec<usize>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_on,
            attempts: Mutex::new(0),
        })
    }

    fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_message(&self, chat: &str, text: &str, _opts: SendOptions) -> Result<()> {
        let attempt = {
            let mut n = self.attempts.lock().unwrap();
            *n += 1;
            *n
        };
        if self.fail_on.contains(&attempt) {
            bail!("simulated transport failure on attempt {attempt}");
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat.to_string(), text.to_string()));
        Ok(())
    }
}

fn project(id: &str, title: &str) -> Project {
    Project {
        id: id.to_string(),
        title: title.to_string(),
        description: "Короткое описание...".into(),
        price: "500 руб.".into(),
        poster_name: "customer".into(),
        time_remaining: "4 дня".into(),
        url: format!("https://kwork.ru/projects/view/{id}"),
    }
}

fn projects(n: usize) -> Vec<Project> {
    (1..=n).map(|i| project(&i.to_string(), &format!("Проект {i}"))).collect()
}

fn notifier(transport: Arc<RecordingTransport>, halt: Arc<AtomicBool>) -> Notifier {
    Notifier::new(transport, Duration::from_millis(1), halt)
}

#[tokio::test]
async fn one_failed_send_does_not_abort_the_batch() {
    let transport = RecordingTransport::new(vec![3]);
    let n = notifier(transport.clone(), Arc::new(AtomicBool::new(false)));

    let sent = n.notify_batch("chat", &projects(5)).await;

    assert_eq!(sent, 4, "four of five deliveries succeed");
    assert_eq!(transport.attempts(), 5, "every project is attempted");

    // Delivery order matches input order, minus the failed one.
    let titles: Vec<String> = transport
        .sent()
        .iter()
        .map(|(_, text)| text.lines().nth(2).unwrap_or_default().to_string())
        .collect();
    assert_eq!(titles.len(), 4);
    assert!(titles[0].contains("Проект 1"));
    assert!(titles[3].contains("Проект 5"));
}

#[tokio::test]
async fn halt_flag_cuts_the_batch_short() {
    let transport = RecordingTransport::new(vec![]);
    let halt = Arc::new(AtomicBool::new(false));
    let n = notifier(transport.clone(), halt.clone());

    halt.store(true, Ordering::SeqCst);
    let sent = n.notify_batch("chat", &projects(5)).await;

    assert_eq!(sent, 0, "halted batch sends nothing");
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test]
async fn single_notify_reports_failure_as_false() {
    let transport = RecordingTransport::new(vec![1]);
    let n = notifier(transport.clone(), Arc::new(AtomicBool::new(false)));

    assert!(!n.notify("chat", &project("1", "Проект")).await);
    assert!(n.notify("chat", &project("2", "Проект")).await);
}

#[test]
fn message_template_embeds_and_escapes_fields() {
    let mut p = project("42", "Логотип <срочно> & быстро");
    p.description = "Сделать лого...".into();

    let text = format_project_message(&p);
    assert!(text.starts_with("🎯 <b>НОВЫЙ ПРОЕКТ НА KWORK</b>"));
    assert!(text.contains("Логотип &lt;срочно&gt; &amp; быстро"));
    assert!(text.contains("💰 <b>500 руб.</b>"));
    assert!(text.contains("👤 <b>customer</b>"));
    assert!(text.contains("⏰ <b>4 дня</b>"));
    assert!(text.contains("📝 Сделать лого..."));
    assert!(text.contains(r#"<a href="https://kwork.ru/projects/view/42">Открыть проект</a>"#));
}
