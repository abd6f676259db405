use v2scrape::app::maintenance::{apply_maintenance, run_maintenance, MaintenanceOptions};
use v2scrape::domain::channel::ChannelRecord;
use v2scrape::domain::model::PathsConfig;
use v2scrape::domain::roster::ChannelMap;
use v2scrape::infra::file_repo::FileRepo;
use v2scrape::ports::repo::Repo;

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
    map.insert("live".into(), rec(3, 10, 100, 1));
    map.insert("flaky".into(), rec(1, 5, -1, -2));
    map
}

#[test]
fn default_options_only_merge() {
    let mut map = sample();
    let summary =
        apply_maintenance(&mut map, vec!["Live".into(), "new".into()], &MaintenanceOptions::default())
            .unwrap();

    assert_eq!(summary.added, 1);
    assert!(summary.deleted.is_empty());
    assert!(summary.reset.is_empty());
    assert_eq!(map.len(), 3);
    assert_eq!(map["live"], rec(3, 10, 100, 1));
}

#[test]
fn bad_channel_filter_fails_before_any_change() {
    let mut map = sample();
    let opts = MaintenanceOptions {
        channel_filter: Some("state <".into()),
        delete_channels: true,
        ..MaintenanceOptions::default()
    };
    let err = apply_maintenance(&mut map, vec!["new".into()], &opts).unwrap_err();
    assert!(err.starts_with("channel filter"));
    assert_eq!(map, sample());
}

#[test]
fn unknown_reset_field_is_an_error() {
    let mut map = sample();
    let opts = MaintenanceOptions {
        overrides: vec![("posts".into(), 1)],
        dry_run: false,
        ..MaintenanceOptions::default()
    };
    let err = apply_maintenance(&mut map, Vec::new(), &opts).unwrap_err();
    assert!(err.contains("posts"));
}

#[test]
fn channel_filter_selects_reset_targets() {
    let mut map = sample();
    let opts = MaintenanceOptions {
        overrides: vec![("state".into(), 1), ("last_id".into(), 50)],
        channel_filter: Some("state < 0 and count >= 1".into()),
        dry_run: false,
        ..MaintenanceOptions::default()
    };
    let summary = apply_maintenance(&mut map, Vec::new(), &opts).unwrap();

    assert_eq!(summary.reset, vec!["flaky"]);
    assert_eq!(map["flaky"], rec(1, 5, 50, 1));
    assert_eq!(map["live"], rec(3, 10, 100, 1));
}

#[test]
fn dry_run_reports_without_changing_records() {
    let mut map = sample();
    let opts = MaintenanceOptions {
        message_offset: Some(200),
        reset_to_defaults: true,
        ..MaintenanceOptions::default()
    };
    let summary = apply_maintenance(&mut map, Vec::new(), &opts).unwrap();

    assert_eq!(summary.offset.assigned, vec!["live"]);
    assert_eq!(summary.reset, vec!["live"]);
    assert_eq!(map, sample());
}

#[tokio::test]
async fn maintenance_rewrites_state_and_url_list() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PathsConfig {
        channels: dir.path().join("channels.json"),
        urls: dir.path().join("urls.txt"),
        configs_raw: dir.path().join("raw.txt"),
        configs_clean: dir.path().join("clean.txt"),
    };
    std::fs::write(
        &paths.channels,
        r#"{"old": {"count": 0, "current_id": 500, "last_id": 500, "state": 1},
            "keep": {"count": 3, "current_id": 10, "last_id": 100, "state": 1}}"#,
    )
    .unwrap();
    std::fs::write(&paths.urls, "https://t.me/s/Keep\nhttps://t.me/s/new\n").unwrap();

    let repo = FileRepo::new(paths.clone());
    let opts = MaintenanceOptions {
        delete_channels: true,
        message_offset: Some(100),
        dry_run: false,
        ..MaintenanceOptions::default()
    };
    let summary = run_maintenance(&repo, &opts).await.unwrap();

    assert_eq!(summary.added, 1);
    assert_eq!(summary.deleted, vec!["old"]);
    assert_eq!(summary.offset.assigned, vec!["keep"]);

    let channels = repo.load_channels().await.unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels["keep"], rec(3, -100, 100, 1));
    assert_eq!(channels["new"], ChannelRecord::default());

    let urls = std::fs::read_to_string(&paths.urls).unwrap();
    assert_eq!(urls, "https://t.me/s/keep\nhttps://t.me/s/new\n");

    let backups = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("-backup-"))
        .count();
    assert_eq!(backups, 2);
}

#[tokio::test]
async fn maintenance_without_url_list_fails() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FileRepo::new(PathsConfig {
        channels: dir.path().join("channels.json"),
        urls: dir.path().join("urls.txt"),
        configs_raw: dir.path().join("raw.txt"),
        configs_clean: dir.path().join("clean.txt"),
    });
    assert!(run_maintenance(&repo, &MaintenanceOptions::default()).await.is_err());
    assert!(!dir.path().join("channels.json").exists());
}
