// src/kwork/normalize.rs
// RawListing -> Project. Pure functions, no I/O.

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::kwork::types::{Project, RawListing};

pub const PROJECT_URL_PREFIX: &str = "https://kwork.ru/projects/view/";

const UNTITLED: &str = "Без названия";
const NO_DESCRIPTION: &str = "Без описания";
const NO_PRICE: &str = "Цена не указана";
const ANONYMOUS: &str = "Аноним";
const DESCRIPTION_WORDS: usize = 30;

/// Derive the canonical project from one raw listing. A listing without an id
/// is unusable and rejected; so is a fixed price that cannot be parsed.
pub fn project_from_listing(raw: &RawListing) -> Result<Project> {
    let id = match raw.id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => bail!("listing has no id"),
    };

    let title = raw
        .name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let description = truncate_description(raw.description.as_deref().unwrap_or(NO_DESCRIPTION));
    let price = format_price(raw)?;

    let poster_name = raw
        .user
        .as_ref()
        .and_then(|u| u.username.clone())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    Ok(Project {
        url: format!("{PROJECT_URL_PREFIX}{id}"),
        id,
        title,
        description,
        price,
        poster_name,
        time_remaining: raw.time_left.clone().unwrap_or_default(),
    })
}

/// Normalize a whole batch, isolating per-listing failures: a malformed
/// listing is skipped (and counted), the rest go through.
pub fn projects_from_listings(raw: &[RawListing]) -> Vec<Project> {
    raw.iter()
        .filter_map(|l| match project_from_listing(l) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "skipping listing");
                metrics::counter!("kwork_listings_skipped_total").increment(1);
                None
            }
        })
        .collect()
}

/// Strip markup, fold CRLF into spaces and keep the first 30 words. The
/// trailing ellipsis is appended unconditionally, matching the live feed's
/// observed formatting even for short descriptions.
fn truncate_description(raw: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let text = re_tags.replace_all(raw, "").replace("\r\n", " ");
    let words: Vec<&str> = text.split_whitespace().take(DESCRIPTION_WORDS).collect();
    format!("{}...", words.join(" "))
}

/// Price priority: a non-zero fixed `priceLimit` wins and is rendered without
/// decimals; otherwise a `possiblePriceLimit` hint is used verbatim; otherwise
/// the "not specified" sentinel. The `!= "0"` check is a string comparison,
/// so "0.0" still counts as a fixed price.
fn format_price(raw: &RawListing) -> Result<String> {
    if let Some(limit) = raw.price_limit.as_deref() {
        if !limit.is_empty() && limit != "0" {
            let value: f64 = limit
                .parse()
                .with_context(|| format!("unparsable priceLimit {limit:?}"))?;
            return Ok(format!("{value:.0} руб."));
        }
    }
    match raw.possible_price_limit.as_deref() {
        Some(hint) if !hint.is_empty() => Ok(format!("{hint} руб.")),
        _ => Ok(NO_PRICE.to_string()),
    }
}
