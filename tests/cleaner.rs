use v2scrape::app::cleaner::{parse_raw_lines, run_cleaner, unquote_line};
use v2scrape::domain::model::{CleanerConfig, PathsConfig};
use v2scrape::domain::pipeline::parse_field_list;
use v2scrape::infra::file_repo::FileRepo;

#[test]
fn lines_are_percent_decoded() {
    assert_eq!(
        unquote_line("  vless%3A%2F%2Fu%40a.com%3A443%3Ftype%3Dws  "),
        "vless://u@a.com:443?type=ws"
    );
    assert_eq!(unquote_line("trojan://p@b.com:443"), "trojan://p@b.com:443");
    // Not UTF-8 once decoded: kept as written.
    assert_eq!(unquote_line("ss://%FF@c.com:1"), "ss://%FF@c.com:1");
}

#[test]
fn raw_lines_yield_matches_in_order() {
    let lines = vec![
        "trojan%3A%2F%2Fp%40b.com%3A443".to_string(),
        "no config here".to_string(),
        "vless://u@a.com:443 hy2://s@d.com:8443".to_string(),
    ];
    let matches = parse_raw_lines(&lines);
    let urls: Vec<&str> = matches.iter().map(|m| m.group("url")).collect();
    assert_eq!(
        urls,
        vec!["trojan://p@b.com:443", "vless://u@a.com:443", "hy2://s@d.com:8443"]
    );
}

#[tokio::test]
async fn cleaner_writes_sorted_normalized_configs() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PathsConfig {
        channels: dir.path().join("channels.json"),
        urls: dir.path().join("urls.txt"),
        configs_raw: dir.path().join("raw.txt"),
        configs_clean: dir.path().join("clean.txt"),
    };
    std::fs::write(
        &paths.configs_raw,
        "vless%3A%2F%2Fu1%40b.example.com%3A443%3Ftype%3Dws%23x\n\
         trojan://pw@a.example.com:443\n\
         trojan://pw@a.example.com:443#again\n\
         \n",
    )
    .unwrap();

    let opts = CleanerConfig {
        duplicate: parse_field_list("protocol,host,port").unwrap(),
        sort: parse_field_list("protocol").unwrap(),
        ..CleanerConfig::default()
    };
    let out = run_cleaner(&FileRepo::new(paths.clone()), &opts).await.unwrap();

    assert_eq!(
        out,
        vec![
            "trojan://pw@a.example.com:443#trojan-a.example.com-443".to_string(),
            "vless://u1@b.example.com:443?type=ws#vless-b.example.com-443".to_string(),
        ]
    );
    let written = std::fs::read_to_string(&paths.configs_clean).unwrap();
    assert_eq!(written, format!("{}\n{}\n", out[0], out[1]));
}
