//! The `clean` command: raw lines in, canonical deduplicated config URLs out.
use tracing::{debug, info};

use crate::domain::model::CleanerConfig;
use crate::domain::pipeline::process_configs;
use crate::domain::proxy::{extract_matches, RawMatch};
use crate::ports::repo::Repo;

/// Percent-decodes a raw line, keeping it as-is when the result is not UTF-8.
pub fn unquote_line(line: &str) -> String {
    let trimmed = line.trim();
    match urlencoding::decode(trimmed) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!(error = %e, "Line does not percent-decode to UTF-8, keeping raw text");
            trimmed.to_string()
        }
    }
}

/// Every recognizer match across `lines`, in line order.
pub fn parse_raw_lines(lines: &[String]) -> Vec<RawMatch> {
    lines
        .iter()
        .flat_map(|line| extract_matches(&unquote_line(line)))
        .collect()
}

pub async fn run_cleaner<R>(repo: &R, opts: &CleanerConfig) -> Result<Vec<String>, String>
where
    R: Repo + ?Sized,
{
    let lines = repo.load_raw_lines().await?;
    let matches = parse_raw_lines(&lines);
    info!(lines = lines.len(), configs = matches.len(), "Loaded configs");

    let clean = process_configs(matches, opts);
    repo.save_clean_configs(&clean).await?;
    info!(count = clean.len(), "Clean configs written");
    Ok(clean)
}
