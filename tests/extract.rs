// tests/extract.rs
use kwork_monitor::kwork::extract::extract_listings;

const PAGE: &str = include_str!("fixtures/projects_page.html");

#[test]
fn fixture_page_yields_embedded_listings() {
    let listings = extract_listings(PAGE);
    assert_eq!(listings.len(), 3, "all wants elements are forwarded raw");
    assert_eq!(listings[0].id.as_deref(), Some("42"));
    assert_eq!(listings[1].id.as_deref(), Some("43"));
    assert_eq!(listings[2].id, None, "missing id is the normalizer's call");
}

#[test]
fn minimal_assignment_markup_is_enough() {
    let html = r#"<html><body><script>
        window.stateData = {"wantsListData":{"wants":[{"id":"42","name":"Logo design","priceLimit":"1500"}]}};
    </script></body></html>"#;
    let listings = extract_listings(html);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].name.as_deref(), Some("Logo design"));
}

#[test]
fn fallback_scans_scripts_when_assignment_is_absent() {
    // No `window.stateData =` assignment, but a script still carries the
    // state object with both marker tokens.
    let html = r#"<html><head></head><body>
        <script>console.log("noise");</script>
        <script>window["stateData"] = {"wantsListData":{"wants":[{"id":"77","name":"Верстка"}]}};</script>
    </body></html>"#;
    let listings = extract_listings(html);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id.as_deref(), Some("77"));
}

#[test]
fn malformed_state_json_is_non_fatal() {
    let html = r#"<script>window.stateData = {"wantsListData": oops};</script>"#;
    assert!(extract_listings(html).is_empty());
}

#[test]
fn missing_listings_field_yields_empty() {
    let html = r#"<script>window.stateData = {"header":{"unreadCount":3}};</script>"#;
    assert!(extract_listings(html).is_empty());
}

#[test]
fn page_without_state_yields_empty() {
    assert!(extract_listings("<html><body>Access denied</body></html>").is_empty());
}

#[test]
fn braceless_marker_script_does_not_abort_the_scan() {
    // The first script mentions both marker tokens but carries no object at
    // all; the scan must move on to the script that actually has the state.
    let html = r#"<html><body>
        <script>var hint = "stateData wantsListData";</script>
        <script>window["stateData"] = {"wantsListData":{"wants":[{"id":"5","name":"Баннер"}]}};</script>
    </body></html>"#;
    let listings = extract_listings(html);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id.as_deref(), Some("5"));
}

#[test]
fn undecodable_elements_are_skipped_individually() {
    // "id" as an object cannot become a string; the sibling survives.
    let html = r#"<script>window.stateData = {"wantsListData":{"wants":[{"id":{"nested":true}},{"id":"8"}]}};</script>"#;
    let listings = extract_listings(html);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id.as_deref(), Some("8"));
}
