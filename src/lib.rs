// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod commands;
pub mod config;
pub mod kwork;
pub mod metrics;
pub mod notify;
pub mod proxy;
pub mod seen;
pub mod session;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::Config;
pub use crate::kwork::{Project, RawListing};
pub use crate::notify::{format_project_message, MessageTransport, Notifier, SendOptions};
pub use crate::seen::SeenSet;
pub use crate::session::{CheckReport, MonitorSession, StartSignal, StopSignal};
