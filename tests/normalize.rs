// tests/normalize.rs
use kwork_monitor::kwork::normalize::{project_from_listing, projects_from_listings};
use kwork_monitor::kwork::RawListing;

fn listing(json: &str) -> RawListing {
    serde_json::from_str(json).expect("listing json")
}

#[test]
fn fixed_price_beats_possible_price() {
    let p = project_from_listing(&listing(
        r#"{"id":"1","priceLimit":"500","possiblePriceLimit":"800"}"#,
    ))
    .unwrap();
    assert_eq!(p.price, "500 руб.");
}

#[test]
fn zero_fixed_price_falls_back_to_possible_price() {
    let p = project_from_listing(&listing(
        r#"{"id":"1","priceLimit":"0","possiblePriceLimit":"800"}"#,
    ))
    .unwrap();
    assert_eq!(p.price, "800 руб.");
}

#[test]
fn no_usable_price_yields_sentinel() {
    let p = project_from_listing(&listing(r#"{"id":"1","priceLimit":"0"}"#)).unwrap();
    assert_eq!(p.price, "Цена не указана");
}

#[test]
fn long_description_is_cut_to_thirty_words() {
    let words: Vec<String> = (1..=50).map(|i| format!("слово{i}")).collect();
    let p = project_from_listing(&listing(&format!(
        r#"{{"id":"1","description":"{}"}}"#,
        words.join(" ")
    )))
    .unwrap();

    assert!(p.description.ends_with("..."));
    let body = p.description.trim_end_matches("...");
    assert_eq!(body.split_whitespace().count(), 30);
    assert!(body.starts_with("слово1 "));
    assert!(body.ends_with("слово30"));
}

#[test]
fn short_description_keeps_all_words_with_ellipsis() {
    let p =
        project_from_listing(&listing(r#"{"id":"1","description":"всего пять слов тут да"}"#))
            .unwrap();
    assert_eq!(p.description, "всего пять слов тут да...");
}

#[test]
fn listing_without_id_is_dropped() {
    assert!(project_from_listing(&listing(r#"{"name":"Без id"}"#)).is_err());
    assert!(project_from_listing(&listing(r#"{"id":"","name":"Пустой id"}"#)).is_err());

    let batch = [
        listing(r#"{"name":"Без id"}"#),
        listing(r#"{"id":"7","name":"С id"}"#),
    ];
    let projects = projects_from_listings(&batch);
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, "7");
}

#[test]
fn one_malformed_listing_does_not_poison_the_batch() {
    let batch = [
        listing(r#"{"id":"1","priceLimit":"не число"}"#),
        listing(r#"{"id":"2","priceLimit":"900"}"#),
        listing(r#"{"id":"3"}"#),
    ];
    let projects = projects_from_listings(&batch);
    let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "3"]);
}

#[test]
fn placeholders_fill_missing_fields() {
    let p = project_from_listing(&listing(r#"{"id":"99"}"#)).unwrap();
    assert_eq!(p.title, "Без названия");
    assert_eq!(p.poster_name, "Аноним");
    assert_eq!(p.price, "Цена не указана");
    assert_eq!(p.time_remaining, "");
    assert_eq!(p.description, "Без описания...");
    assert_eq!(p.url, "https://kwork.ru/projects/view/99");
}

#[test]
fn poster_name_comes_from_nested_user() {
    let p = project_from_listing(&listing(r#"{"id":"5","user":{"username":"ivan_dev"}}"#))
        .unwrap();
    assert_eq!(p.poster_name, "ivan_dev");
}

#[test]
fn fractional_fixed_price_is_rendered_without_decimals() {
    let p = project_from_listing(&listing(r#"{"id":"1","priceLimit":"1500.25"}"#)).unwrap();
    assert_eq!(p.price, "1500 руб.");
}
