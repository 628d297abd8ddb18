// src/kwork/mod.rs
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub use types::{Project, RawListing};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("kwork_fetch_attempts_total", "Listing page GET attempts.");
        describe_counter!(
            "kwork_fetch_failures_total",
            "Attempts that ended in a network error, bad status or short body."
        );
        describe_counter!("kwork_pages_fetched_total", "Successfully fetched pages.");
        describe_counter!(
            "kwork_listings_extracted_total",
            "Raw listings recovered from embedded page state."
        );
        describe_counter!(
            "kwork_listings_skipped_total",
            "Listings dropped during normalization (missing id, bad shape)."
        );
        describe_counter!("kwork_projects_new_total", "Projects that passed dedup.");
        describe_counter!("kwork_notifications_sent_total", "Delivered notifications.");
        describe_counter!(
            "kwork_notifications_failed_total",
            "Notification sends that failed."
        );
        describe_counter!("kwork_check_runs_total", "Completed check cycles.");
        describe_counter!(
            "kwork_check_ticks_skipped_total",
            "Scheduled ticks skipped because a check was still in flight."
        );
        describe_gauge!("kwork_last_check_ts", "Unix ts when a check last ran.");
        describe_gauge!("kwork_seen_ids", "Ids currently tracked by the seen-set.");
    });
}
