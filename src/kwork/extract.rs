// src/kwork/extract.rs
// Pulls the raw listing array out of the page markup. Kwork embeds the
// listing state as `window.stateData = {...};` in an inline script; when that
// exact assignment is missing we fall back to scanning every script block.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::kwork::types::RawListing;

const LISTINGS_MARKER: &str = "wantsListData";
const STATE_MARKER: &str = "stateData";

type Strategy = fn(&str) -> Option<Vec<RawListing>>;

/// Ordered extraction strategies; the first one that yields listings wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("state-assignment", from_state_assignment),
    ("script-scan", from_script_scan),
];

/// Extract raw listings from page markup. Malformed JSON and absent fields
/// are non-fatal: the result is simply empty.
pub fn extract_listings(html: &str) -> Vec<RawListing> {
    for (name, strategy) in STRATEGIES {
        if let Some(listings) = strategy(html) {
            tracing::debug!(strategy = name, count = listings.len(), "extracted listings");
            metrics::counter!("kwork_listings_extracted_total").increment(listings.len() as u64);
            return listings;
        }
    }
    tracing::warn!("no listing state found in page markup");
    Vec::new()
}

/// Primary: match the `window.stateData = {...};` assignment and parse it.
fn from_state_assignment(html: &str) -> Option<Vec<RawListing>> {
    static RE_STATE: OnceCell<Regex> = OnceCell::new();
    let re = RE_STATE
        .get_or_init(|| Regex::new(r"(?s)window\.stateData\s*=\s*(\{.*?\});").unwrap());

    let blob = re.captures(html)?.get(1)?.as_str();
    listings_from_json(blob)
}

/// Fallback: scan inline scripts for one that mentions both the state object
/// and the listings field, then take its largest `{...}` substring.
fn from_script_scan(html: &str) -> Option<Vec<RawListing>> {
    static SEL_SCRIPT: OnceCell<Selector> = OnceCell::new();
    let sel = SEL_SCRIPT.get_or_init(|| Selector::parse("script").unwrap());

    let doc = Html::parse_document(html);
    for script in doc.select(sel) {
        let text: String = script.text().collect();
        if !(text.contains(STATE_MARKER) && text.contains(LISTINGS_MARKER)) {
            continue;
        }
        // A script may mention both markers without carrying the object
        // (e.g. a loader stub); keep scanning instead of giving up.
        let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
            continue;
        };
        if start >= end {
            continue;
        }
        if let Some(listings) = listings_from_json(&text[start..=end]) {
            return Some(listings);
        }
    }
    None
}

/// Parse a state blob and navigate to `wantsListData.wants`. Elements that do
/// not deserialize are skipped individually so one odd record cannot poison
/// the whole batch.
fn listings_from_json(blob: &str) -> Option<Vec<RawListing>> {
    let state: Value = match serde_json::from_str(blob) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "state blob is not valid JSON");
            return None;
        }
    };

    let wants = state.get(LISTINGS_MARKER)?.get("wants")?.as_array()?;
    let listings = wants
        .iter()
        .filter_map(|v| match serde_json::from_value::<RawListing>(v.clone()) {
            Ok(l) => Some(l),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable listing");
                None
            }
        })
        .collect();
    Some(listings)
}
