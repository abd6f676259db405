use v2scrape::domain::channel::ChannelRecord;
use v2scrape::domain::roster::{
    assign_current_id_to_channels, build_report, delete_channels, get_filtered_keys,
    get_sorted_keys, merge_channel_names, normalize_channel_names, reset_channels, ChannelError,
    ChannelMap,
};

fn rec(count: i64, current_id: i64, last_id: i64, state: i64) -> ChannelRecord {
    ChannelRecord {
        count,
        current_id,
        last_id,
        state,
    }
}

fn sample() -> ChannelMap {
    let mut map = ChannelMap::new();
    map.insert("alpha".into(), rec(4, 100, 130, 1)); // diff 30
    map.insert("beta".into(), rec(2, 10, 200, 1)); // diff 190
    map.insert("gamma".into(), rec(0, 500, 500, 1)); // fully scanned, no configs
    map.insert("delta".into(), rec(7, 1, -1, -4)); // dead
    map.insert("fresh".into(), ChannelRecord::default());
    map
}

#[test]
fn merge_adds_only_unknown_names() {
    let mut map = sample();
    let added = merge_channel_names(
        &mut map,
        vec!["Alpha".to_string(), "new_one".to_string(), "NEW_ONE".to_string()],
    );
    assert_eq!(added, 1);
    assert_eq!(map.get("new_one"), Some(&ChannelRecord::default()));
    assert_eq!(map.get("alpha"), Some(&rec(4, 100, 130, 1)));
}

#[test]
fn normalizing_names_keeps_first_spelling() {
    let map = normalize_channel_names(vec![
        ("Foo".to_string(), rec(1, 1, 1, 1)),
        ("foo".to_string(), rec(2, 2, 2, 2)),
        ("Bar".to_string(), rec(3, 3, 3, 3)),
    ]);
    assert_eq!(map.len(), 2);
    assert_eq!(map["foo"], rec(1, 1, 1, 1));
    assert_eq!(map["bar"], rec(3, 3, 3, 3));
}

#[test]
fn delete_removes_dead_and_exhausted_channels() {
    let mut map = sample();
    let mut deleted = delete_channels(&mut map);
    deleted.sort();
    assert_eq!(deleted, vec!["delta", "gamma"]);
    assert!(map.contains_key("fresh"));
    assert_eq!(map.len(), 3);
}

#[test]
fn sorted_keys_order_by_remaining_posts() {
    let map = sample();
    assert_eq!(get_filtered_keys(&map), vec!["alpha", "beta"]);
    assert_eq!(get_sorted_keys(&map, true, false), vec!["alpha", "beta"]);
    assert_eq!(get_sorted_keys(&map, true, true), vec!["beta", "alpha"]);

    let all = get_sorted_keys(&map, false, false);
    assert_eq!(all.len(), 5);
    assert_eq!(all.last().map(String::as_str), Some("beta"));
}

#[test]
fn offset_moves_close_channels_and_skips_far_ones() {
    let mut map = sample();
    let outcome = assign_current_id_to_channels(&mut map, 50, false);

    assert_eq!(outcome.assigned, vec!["alpha", "gamma"]);
    assert_eq!(outcome.skipped, vec!["beta"]);
    assert_eq!(map["alpha"].current_id, -50);
    assert_eq!(map["beta"], rec(2, 10, 200, 1));
    // Relative cursor resolves against last_id on the next read.
    assert_eq!(map["alpha"].normalized().current_id, 80);
}

#[test]
fn offset_dry_run_changes_nothing() {
    let mut map = sample();
    let before = map.clone();
    let outcome = assign_current_id_to_channels(&mut map, 50, true);
    assert_eq!(outcome.assigned, vec!["alpha", "gamma"]);
    assert_eq!(map, before);
}

#[test]
fn non_positive_offset_is_ignored() {
    let mut map = sample();
    let before = map.clone();
    let outcome = assign_current_id_to_channels(&mut map, 0, false);
    assert!(outcome.assigned.is_empty() && outcome.skipped.is_empty());
    assert_eq!(map, before);
}

#[test]
fn reset_rejects_unknown_fields_before_touching_anything() {
    let mut map = sample();
    let before = map.clone();
    let err = reset_channels(
        &mut map,
        &[("count".into(), 0), ("bogus".into(), 1)],
        None,
        false,
        true,
    )
    .unwrap_err();
    assert_eq!(err, ChannelError::UnknownOverrideFields(vec!["bogus".into()]));
    assert_eq!(map, before);
}

#[test]
fn reset_without_changes_is_skipped() {
    let mut map = sample();
    let selected = reset_channels(&mut map, &[], None, false, false).unwrap();
    assert!(selected.is_empty());
}

#[test]
fn reset_applies_overrides_to_default_selection() {
    let mut map = sample();
    let selected = reset_channels(&mut map, &[("count".into(), 0)], None, false, false).unwrap();
    assert_eq!(selected, vec!["alpha", "beta", "gamma"]);
    assert_eq!(map["alpha"], rec(0, 100, 130, 1));
    assert_eq!(map["delta"], rec(7, 1, -1, -4));
}

#[test]
fn reset_to_defaults_with_predicate() {
    let mut map = sample();
    let dead = |r: &ChannelRecord| r.state < 0;
    let selected = reset_channels(
        &mut map,
        &[("state".into(), 1)],
        Some(&dead),
        false,
        true,
    )
    .unwrap();
    assert_eq!(selected, vec!["delta"]);
    assert_eq!(map["delta"], rec(0, 1, -1, 1));
}

#[test]
fn reset_dry_run_only_reports_selection() {
    let mut map = sample();
    let before = map.clone();
    let selected = reset_channels(&mut map, &[], None, true, true).unwrap();
    assert_eq!(selected.len(), 3);
    assert_eq!(map, before);
}

#[test]
fn report_accumulates_remaining_messages() {
    let report = build_report(&sample());
    assert_eq!(report.total_channels, 5);
    assert_eq!(report.left_to_check(), 2);
    assert_eq!(report.total_messages, 220);
    assert_eq!(report.statuses[0].name, "alpha");
    assert_eq!(report.statuses[0].diff, 30);
    assert_eq!(report.statuses[1].current_id, 10);
}
