// tests/seen_set.rs
use kwork_monitor::kwork::Project;
use kwork_monitor::seen::{SeenSet, KEEP_AFTER_COMPACT};

fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        title: "t".into(),
        description: "d...".into(),
        price: "Цена не указана".into(),
        poster_name: "Аноним".into(),
        time_remaining: String::new(),
        url: format!("https://kwork.ru/projects/view/{id}"),
    }
}

#[test]
fn filter_new_emits_only_unseen_and_preserves_order() {
    let mut seen = SeenSet::new();
    seen.insert("b");

    let batch = vec![project("a"), project("b"), project("c")];
    let fresh = seen.filter_new(batch);

    let ids: Vec<&str> = fresh.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn second_pass_over_same_batch_is_empty() {
    let mut seen = SeenSet::new();
    let batch = vec![project("1"), project("2"), project("3")];

    let first = seen.filter_new(batch.clone());
    assert_eq!(first.len(), 3);

    let second = seen.filter_new(batch);
    assert!(second.is_empty(), "repeat cycle must yield nothing new");
}

#[test]
fn compaction_bounds_memory_to_most_recent_ids() {
    let mut seen = SeenSet::new();
    for i in 1..=1001u32 {
        seen.insert(&format!("id-{i}"));
        seen.compact();
    }

    assert_eq!(seen.len(), KEEP_AFTER_COMPACT);
    // Exactly the most recently inserted 500 remain: id-502 ..= id-1001.
    assert!(seen.contains("id-1001"));
    assert!(seen.contains("id-502"));
    assert!(!seen.contains("id-501"));
    assert!(!seen.contains("id-1"));
    // The ever-seen counter is unaffected by compaction.
    assert_eq!(seen.total_seen(), 1001);
}

#[test]
fn forgotten_ids_can_resurface_after_compaction() {
    let mut seen = SeenSet::new();
    for i in 0..1001u32 {
        seen.insert(&i.to_string());
    }
    seen.compact();

    // "0" was dropped by compaction, so it counts as new again.
    let fresh = seen.filter_new(vec![project("0")]);
    assert_eq!(fresh.len(), 1);
}
