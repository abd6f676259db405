//! Record pipeline: normalize, filter, deduplicate and sort configs.
use std::{cmp::Ordering, collections::HashSet};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::expr::Condition;
use crate::domain::model::CleanerConfig;
use crate::domain::proxy::{
    normalize_match,
    patterns::{CONFIG_FIELD, FIELD_SEPARATOR},
    ProxyConfig, RawMatch,
};
use crate::domain::value::{FieldSource, Value};

pub const DEFAULT_DUPLICATE_FIELDS: &str = "protocol,host,port";
pub const DEFAULT_SORT_FIELDS: &str = "protocol";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldListError {
    #[error("invalid field name '{0}'")]
    Invalid(String),
    #[error("duplicate field '{0}'")]
    Duplicate(String),
}

/// Parses a comma and/or whitespace separated list of field paths.
pub fn parse_field_list(input: &str) -> Result<Vec<String>, FieldListError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for field in FIELD_SEPARATOR.split(trimmed) {
        if !CONFIG_FIELD.is_match(field) {
            return Err(FieldListError::Invalid(field.to_string()));
        }
        if !seen.insert(field) {
            return Err(FieldListError::Duplicate(field.to_string()));
        }
        fields.push(field.to_string());
    }
    Ok(fields)
}

/// Normalizes every match, dropping the ones that fail validation.
pub fn normalize(matches: &[RawMatch]) -> Vec<ProxyConfig> {
    info!(count = matches.len(), "Normalizing configs");
    let configs: Vec<ProxyConfig> = matches
        .iter()
        .filter_map(|raw| match normalize_match(raw) {
            Ok(config) => Some(config),
            Err(e) => {
                debug!(protocol = %raw.scheme, error = %e, "Dropping config");
                None
            }
        })
        .collect();
    info!(
        count = configs.len(),
        removed = matches.len() - configs.len(),
        "Configs normalized"
    );
    configs
}

/// Keeps records for which `condition` evaluates truthy. A condition that
/// fails to parse matches nothing.
pub fn filter_by_condition<T: FieldSource>(records: Vec<T>, condition: &str) -> Vec<T> {
    info!(count = records.len(), condition, "Filtering configs by condition");
    let total = records.len();

    let compiled = match Condition::compile(condition) {
        Ok(c) => c,
        Err(e) => {
            warn!(condition, error = %e, "Filter condition does not parse, nothing matches");
            return Vec::new();
        }
    };
    debug!(regexes = compiled.regex_count(), "Filter condition compiled");

    let kept: Vec<T> = records.into_iter().filter(|r| compiled.matches(r)).collect();
    info!(count = kept.len(), removed = total - kept.len(), "Filtered configs");
    kept
}

/// First-seen wins among records whose listed fields are all present.
pub fn dedup_by_fields<T: FieldSource>(records: Vec<T>, fields: &[String]) -> Vec<T> {
    if fields.is_empty() {
        warn!("No fields to deduplicate by");
        return records;
    }
    info!(count = records.len(), fields = ?fields, "Removing duplicate configs");
    let total = records.len();

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let unique: Vec<T> = records
        .into_iter()
        .filter(|r| {
            let signature: Option<Vec<String>> = fields
                .iter()
                .map(|f| r.lookup(f).map(|v| v.signature()))
                .collect();
            match signature {
                Some(sig) => seen.insert(sig),
                None => false,
            }
        })
        .collect();

    info!(
        count = unique.len(),
        removed = total - unique.len(),
        "Duplicate removal complete"
    );
    unique
}

/// Stable sort by `fields`. Records missing a field come after the ones that
/// have it in either direction; `reverse` flips only the value order.
pub fn sort_by_fields<T: FieldSource>(records: Vec<T>, fields: &[String], reverse: bool) -> Vec<T> {
    if fields.is_empty() {
        return records;
    }
    info!(count = records.len(), fields = ?fields, reverse, "Sorting configs");

    let mut keyed: Vec<(Vec<Option<Value>>, T)> = records
        .into_iter()
        .map(|r| {
            let key = fields
                .iter()
                .map(|f| r.lookup(f).filter(|v| *v != Value::None))
                .collect();
            (key, r)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, reverse));
    keyed.into_iter().map(|(_, r)| r).collect()
}

fn compare_keys(a: &[Option<Value>], b: &[Option<Value>], reverse: bool) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => {
                let o = x.sort_cmp(y);
                if reverse {
                    o.reverse()
                } else {
                    o
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn stages<T: FieldSource>(records: Vec<T>, opts: &CleanerConfig) -> Vec<T> {
    let mut records = records;
    if let Some(condition) = opts.filter.as_deref().filter(|c| !c.trim().is_empty()) {
        records = filter_by_condition(records, condition);
    }
    if !opts.duplicate.is_empty() {
        records = dedup_by_fields(records, &opts.duplicate);
    }
    if !opts.sort.is_empty() {
        records = sort_by_fields(records, &opts.sort, opts.reverse);
    }
    records
}

fn url_of(record: &dyn FieldSource) -> Option<String> {
    record.lookup("url").map(|v| v.to_string()).filter(|u| !u.is_empty())
}

/// Runs normalize (unless disabled), filter, dedup and sort, returning the
/// output lines in order.
pub fn process_configs(matches: Vec<RawMatch>, opts: &CleanerConfig) -> Vec<String> {
    if opts.normalize {
        let configs = normalize(&matches);
        stages(configs, opts)
            .iter()
            .map(|c| c.url.clone())
            .collect()
    } else {
        stages(matches, opts)
            .iter()
            .filter_map(|m| url_of(m))
            .collect()
    }
}
