use riptide_sync::{
    Category, CategoryCounters, Cursor, FilterSelection, ListPayload, ListShape, QueueDirection,
    RawTorrent, SyncEngine, TorrentId,
};

fn entry(id: &str, progress: u32, labels: &[&str]) -> RawTorrent {
    RawTorrent {
        id: Some(id.to_string()),
        name: Some(format!("{id}.iso")),
        status: Some(1),
        progress: Some(progress),
        upload_speed: Some(0),
        download_speed: Some(0),
        queue_position: Some(-1),
        labels: Some(labels.iter().map(|label| (*label).to_string()).collect()),
        ..RawTorrent::default()
    }
}

fn queued(id: &str, slot: i64) -> RawTorrent {
    RawTorrent {
        queue_position: Some(slot),
        ..entry(id, 0, &[])
    }
}

fn ids(values: &[&str]) -> Vec<TorrentId> {
    values.iter().map(|value| TorrentId::from(*value)).collect()
}

fn count(counters: &CategoryCounters, id: &str) -> usize {
    let category = id.parse::<Category>().expect("category id parses");
    counters.get(&category)
}

fn payload(json: &str) -> ListPayload {
    serde_json::from_str(json).expect("payload decodes")
}

#[test]
fn full_then_delta_scenario_keeps_counters_exact() {
    let mut engine = SyncEngine::default();
    assert!(engine.cursor().is_initial());

    let first = engine
        .apply(payload(
            r#"{"cursor": "c1", "full": [
                {"id": "t1", "progress": 1000, "labels": []},
                {"id": "t2", "progress": 500, "labels": ["x"]}
            ]}"#,
        ))
        .expect("initial snapshot applies");
    assert_eq!(first.shape, ListShape::Full);
    assert_eq!(first.report.added, ids(&["t1", "t2"]));
    assert!(first.report.removed.is_empty());

    let counters = engine.counters();
    assert_eq!(count(counters, "all"), 2);
    assert_eq!(count(counters, "completed"), 1);
    assert_eq!(count(counters, "downloading"), 1);
    assert_eq!(count(counters, "no-label"), 1);
    assert_eq!(count(counters, "label:x"), 1);

    let second = engine
        .apply(payload(
            r#"{"cursor": "c2",
                "changed": [{"id": "t1", "progress": 1000, "labels": ["x"]}],
                "removed": ["t2"]}"#,
        ))
        .expect("delta applies");
    assert_eq!(second.shape, ListShape::Delta);
    assert_eq!(second.report.updated, ids(&["t1"]));
    assert_eq!(second.report.removed, ids(&["t2"]));

    let counters = engine.counters();
    assert_eq!(count(counters, "all"), 1);
    assert_eq!(count(counters, "completed"), 1);
    assert_eq!(count(counters, "downloading"), 0);
    assert_eq!(count(counters, "no-label"), 0);
    assert_eq!(count(counters, "label:x"), 1);
    assert!(engine.verify_counters().is_consistent());
    assert_eq!(engine.cursor(), &Cursor::new("c2"));
}

#[test]
fn cursor_advances_on_every_successful_apply() {
    let mut engine = SyncEngine::default();
    let tokens = ["a", "b", "c"];
    for token in tokens {
        let outcome = engine
            .apply(ListPayload::unchanged(token))
            .expect("unchanged payload applies");
        assert!(outcome.report.is_empty());
        assert_eq!(engine.cursor(), &Cursor::new(token));
    }
}

#[test]
fn fallback_snapshot_infers_removals() {
    let mut engine = SyncEngine::default();
    engine
        .apply(ListPayload::full(
            "1",
            vec![entry("A", 0, &[]), entry("B", 0, &["x"]), entry("C", 0, &[])],
        ))
        .expect("initial snapshot applies");

    let outcome = engine
        .apply(ListPayload::full(
            "9",
            vec![entry("A", 0, &[]), entry("C", 0, &[])],
        ))
        .expect("fallback snapshot applies");
    assert_eq!(outcome.report.removed, ids(&["B"]));
    assert_eq!(outcome.report.updated, ids(&["A", "C"]));
    assert_eq!(engine.store().sorted_ids(), ids(&["A", "C"]));
    assert_eq!(count(engine.counters(), "label:x"), 0);
    assert!(engine.verify_counters().is_consistent());
}

#[test]
fn visibility_law_across_dimensions() {
    let mut engine = SyncEngine::default();
    engine
        .apply(ListPayload::full(
            "1",
            vec![
                entry("plain", 100, &[]),
                entry("tagged", 100, &["x"]),
                entry("done", 1_000, &[]),
            ],
        ))
        .expect("snapshot applies");
    assert_eq!(engine.visible_ids(), ids(&["done", "plain", "tagged"]));

    let selection: FilterSelection = [Category::Downloading, Category::NoLabel]
        .into_iter()
        .collect();
    let changes = engine.set_selection(selection);
    assert_eq!(changes.hidden, ids(&["done", "tagged"]));
    assert_eq!(engine.visible_ids(), ids(&["plain"]));

    let changes = engine.set_selection(FilterSelection::new());
    assert_eq!(changes.shown, ids(&["done", "tagged"]));
}

#[test]
fn reorder_respects_queue_bounds() {
    let mut engine = SyncEngine::default();
    engine
        .apply(ListPayload::full(
            "1",
            vec![queued("q1", 1), queued("q2", 2), queued("q3", 3), queued("q4", 4)],
        ))
        .expect("snapshot applies");

    assert!(engine.reorder(&ids(&["q1"]), QueueDirection::Up).is_empty());
    assert_eq!(
        engine.reorder(&ids(&["q1", "q3"]), QueueDirection::Up).ids,
        ids(&["q3"])
    );
    assert_eq!(
        engine.reorder(&ids(&["q2", "q3"]), QueueDirection::Down).ids,
        ids(&["q3", "q2"])
    );
    assert_eq!(
        engine.reorder(&ids(&["q2", "q4"]), QueueDirection::Bottom).ids,
        ids(&["q2"])
    );
}
