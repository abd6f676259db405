use std::time::Duration;

use v2scrape::infra::config::{
    normalize_log_level, validate_batch_extract, validate_batch_update, validate_field_list,
    validate_timeout, ConfigError, ConfigLoader,
};

#[tokio::test]
async fn missing_file_yields_defaults_beside_it() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigLoader::load(&dir.path().join("config.toml")).await.unwrap();

    assert_eq!(cfg.paths.channels, dir.path().join("channels.json"));
    assert_eq!(cfg.paths.urls, dir.path().join("urls.txt"));
    assert_eq!(cfg.paths.configs_raw, dir.path().join("configs-raw.txt"));
    assert_eq!(cfg.paths.configs_clean, dir.path().join("configs-clean.txt"));
    assert_eq!(cfg.scrape.batch_extract, 20);
    assert_eq!(cfg.scrape.batch_update, 100);
    assert_eq!(cfg.scrape.timeout, Duration::from_secs(30));
    assert!(!cfg.scrape.sequential);
    assert!(cfg.cleaner.normalize);
    assert!(cfg.cleaner.duplicate.is_empty());
    assert_eq!(cfg.cleaner.filter, None);
    assert_eq!(cfg.log_level, "info");
}

#[tokio::test]
async fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[paths]
channels = "state/channels.json"
configs_clean = "/tmp/clean.txt"

[scrape]
batch_extract = 5
timeout_seconds = 2.5
sequential = true

[cleaner]
normalize = false
duplicate = "protocol, host port"
sort = ["protocol", "remarks"]
filter = "  port == 443  "
reverse = true

[logging]
level = "DEBUG"
"#,
    )
    .unwrap();

    let cfg = ConfigLoader::load(&path).await.unwrap();
    assert_eq!(cfg.paths.channels, dir.path().join("state/channels.json"));
    assert_eq!(cfg.paths.configs_clean, std::path::PathBuf::from("/tmp/clean.txt"));
    assert_eq!(cfg.scrape.batch_extract, 5);
    assert_eq!(cfg.scrape.timeout, Duration::from_millis(2500));
    assert_eq!(cfg.scrape.extract_width(), 1);
    assert_eq!(cfg.scrape.update_width(), 1);
    assert!(!cfg.cleaner.normalize);
    assert_eq!(cfg.cleaner.duplicate, vec!["protocol", "host", "port"]);
    assert_eq!(cfg.cleaner.sort, vec!["protocol", "remarks"]);
    assert_eq!(cfg.cleaner.filter.as_deref(), Some("port == 443"));
    assert!(cfg.cleaner.reverse);
    assert_eq!(cfg.log_level, "debug");
}

#[tokio::test]
async fn out_of_range_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    for body in [
        "[scrape]\nbatch_extract = 0\n",
        "[scrape]\nbatch_update = 1001\n",
        "[scrape]\ntimeout_seconds = 0.05\n",
        "[scrape]\nuser_agent = \"  \"\n",
        "[cleaner]\nsort = \"host, host\"\n",
        "[logging]\nlevel = \"loud\"\n",
    ] {
        std::fs::write(&path, body).unwrap();
        let err = ConfigLoader::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
    }

    std::fs::write(&path, "[scrape\n").unwrap();
    assert!(matches!(
        ConfigLoader::load(&path).await.unwrap_err(),
        ConfigError::Toml(_)
    ));
}

#[test]
fn validators_check_bounds() {
    assert_eq!(validate_batch_extract(100).unwrap(), 100);
    assert!(validate_batch_extract(101).is_err());
    assert_eq!(validate_batch_update(1).unwrap(), 1);
    assert!(validate_batch_update(0).is_err());
    assert_eq!(validate_timeout(0.1).unwrap(), Duration::from_millis(100));
    assert!(validate_timeout(100.5).is_err());
    assert!(validate_timeout(f64::NAN).is_err());
    assert_eq!(normalize_log_level(" Warn ").unwrap(), "warn");
}

#[test]
fn field_lists_accept_commas_and_spaces() {
    assert_eq!(
        validate_field_list("--sort", "protocol,host  port").unwrap(),
        vec!["protocol", "host", "port"]
    );
    assert!(validate_field_list("--sort", "   ").unwrap().is_empty());
    let err = validate_field_list("--duplicate", "host, bad-name").unwrap_err();
    assert!(err.to_string().contains("--duplicate"));
}
