//! Bulk operations over the whole channel map.
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::channel::{
    diff_channel_id, get_normalized_current_id, should_delete_channel, should_set_current_id,
    should_update_channel, ChannelRecord, CHANNEL_FIELDS,
};

/// Channel name (lower-case) to its scan progress, in name order.
pub type ChannelMap = BTreeMap<String, ChannelRecord>;

pub const MESSAGE_OFFSET_MIN: i64 = 1;
pub const MESSAGE_OFFSET_MAX: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("unknown override field(s): {}", .0.join(", "))]
    UnknownOverrideFields(Vec<String>),
}

/// Adds a default record for every name not yet tracked. Returns how many were added.
pub fn merge_channel_names<I>(map: &mut ChannelMap, names: I) -> usize
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = names.into_iter().map(|n| n.to_lowercase()).collect();
    names.sort();
    names.dedup();

    let before = map.len();
    for name in names {
        if !map.contains_key(&name) {
            debug!(channel = %name, "Added new channel");
            map.insert(name, ChannelRecord::default());
        }
    }
    let added = map.len() - before;
    info!(old = before, new = map.len(), added, "Merged channel names");
    added
}

/// Lower-cases names, keeping the first record seen for names that collide.
pub fn normalize_channel_names<I>(entries: I) -> ChannelMap
where
    I: IntoIterator<Item = (String, ChannelRecord)>,
{
    let mut out = ChannelMap::new();
    for (name, record) in entries {
        out.entry(name.to_lowercase()).or_insert(record);
    }
    out
}

/// Removes channels that should be deleted, judged on the normalized cursor.
/// Returns the removed names.
pub fn delete_channels(map: &mut ChannelMap) -> Vec<String> {
    let doomed: Vec<String> = map
        .iter()
        .filter(|&(_, r)| should_delete_channel(&r.normalized()))
        .map(|(name, _)| name.clone())
        .collect();

    for name in &doomed {
        if let Some(record) = map.remove(name) {
            debug!(channel = %name, record = ?record, "Deleted channel");
        }
    }
    info!(deleted = doomed.len(), remaining = map.len(), "Channel deletion complete");
    doomed
}

/// Names of channels with posts left to extract.
pub fn get_filtered_keys(map: &ChannelMap) -> Vec<String> {
    map.iter()
        .filter(|&(_, r)| should_update_channel(&r.normalized()))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Names ordered by remaining posts, then by name.
pub fn get_sorted_keys(map: &ChannelMap, apply_filter: bool, reverse: bool) -> Vec<String> {
    let mut names: Vec<String> = if apply_filter {
        get_filtered_keys(map)
    } else {
        map.keys().cloned().collect()
    };
    names.sort_by_cached_key(|name| {
        let diff = map.get(name).map(diff_channel_id).unwrap_or_default();
        (diff, name.clone())
    });
    if reverse {
        names.reverse();
    }
    names
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetOutcome {
    pub assigned: Vec<String>,
    pub skipped: Vec<String>,
}

/// Moves the cursor of every eligible channel to `offset` posts before its end.
///
/// Channels further behind than `offset` are skipped with a warning. A
/// non-positive offset leaves the map untouched.
pub fn assign_current_id_to_channels(
    map: &mut ChannelMap,
    offset: i64,
    dry_run: bool,
) -> OffsetOutcome {
    let mut outcome = OffsetOutcome::default();
    if offset <= 0 {
        warn!(offset, "Invalid message offset, expected a positive integer");
        return outcome;
    }

    for (name, record) in map.iter_mut() {
        if !should_set_current_id(record) {
            continue;
        }
        let diff = diff_channel_id(record);

        if diff > offset {
            if dry_run {
                let dump = serde_json::to_string_pretty(&*record).unwrap_or_default();
                debug!(channel = %name, "Channel state:\n{dump}");
            }
            warn!(channel = %name, diff, offset, "Skipped offset assignment, diff exceeds offset");
            outcome.skipped.push(name.clone());
            continue;
        }

        if dry_run {
            info!(channel = %name, diff, offset, "Offset assignment candidate (dry run)");
        } else {
            record.current_id = -offset;
            info!(
                channel = %name,
                offset = -offset,
                current_id = get_normalized_current_id(record),
                "Applied message offset"
            );
        }
        outcome.assigned.push(name.clone());
    }

    if dry_run {
        info!(
            candidates = outcome.assigned.len(),
            skipped = outcome.skipped.len(),
            "Skipping offset assignment in dry run"
        );
    }
    outcome
}

/// Applies `overrides` (and the defaults when `reset_to_defaults`) to every
/// channel selected by `predicate`. Returns the selected names.
pub fn reset_channels(
    map: &mut ChannelMap,
    overrides: &[(String, i64)],
    predicate: Option<&dyn Fn(&ChannelRecord) -> bool>,
    dry_run: bool,
    reset_to_defaults: bool,
) -> Result<Vec<String>, ChannelError> {
    let unknown: Vec<String> = overrides
        .iter()
        .filter(|(field, _)| !CHANNEL_FIELDS.contains(&field.as_str()))
        .map(|(field, _)| field.clone())
        .collect();
    if !unknown.is_empty() {
        return Err(ChannelError::UnknownOverrideFields(unknown));
    }

    if !reset_to_defaults && overrides.is_empty() {
        debug!(reset_to_defaults, "Channel reset skipped, no overrides requested");
        return Ok(Vec::new());
    }

    let select = |r: &ChannelRecord| match predicate {
        Some(p) => p(r),
        None => should_set_current_id(r),
    };
    let selected: Vec<String> = map
        .iter()
        .filter(|&(_, r)| select(r))
        .map(|(name, _)| name.clone())
        .collect();

    if dry_run {
        info!(count = selected.len(), "Channel reset skipped in dry run");
        return Ok(selected);
    }
    info!(count = selected.len(), "Resetting channels");

    for name in &selected {
        let Some(record) = map.get_mut(name) else {
            continue;
        };
        let before = *record;
        if reset_to_defaults {
            *record = ChannelRecord::default();
        }
        for (field, value) in overrides {
            record.set_field(field, *value);
        }

        for field in CHANNEL_FIELDS {
            let (old, new) = (before.field(field), record.field(field));
            if old != new {
                debug!(
                    channel = %name,
                    field,
                    before = old.unwrap_or_default(),
                    after = new.unwrap_or_default(),
                    "Channel field reset"
                );
            }
        }
    }
    Ok(selected)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub name: String,
    pub current_id: i64,
    pub last_id: i64,
    pub diff: i64,
}

/// Snapshot of extraction work left, with the message total accumulated
/// over the listed channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReport {
    pub statuses: Vec<ChannelStatus>,
    pub total_channels: usize,
    pub total_messages: i64,
}

impl ChannelReport {
    pub fn left_to_check(&self) -> usize {
        self.statuses.len()
    }
}

pub fn build_report(map: &ChannelMap) -> ChannelReport {
    let mut report = ChannelReport {
        total_channels: map.len(),
        ..ChannelReport::default()
    };

    for name in get_sorted_keys(map, true, false) {
        let Some(record) = map.get(&name) else {
            continue;
        };
        let diff = diff_channel_id(record);
        report.total_messages = report.total_messages.saturating_add(diff);
        report.statuses.push(ChannelStatus {
            current_id: get_normalized_current_id(record),
            last_id: record.last_id,
            diff,
            name,
        });
    }
    report
}

/// Logs the report: one line per channel with work left, then the totals.
pub fn log_report(report: &ChannelReport) {
    info!("Channel status");
    for s in &report.statuses {
        info!(
            channel = %s.name,
            current_id = s.current_id,
            last_id = s.last_id,
            diff = s.diff,
            "| <SS> |"
        );
    }
    info!(count = report.total_channels, "Total channels available");
    info!(count = report.left_to_check(), "Channels left to check");
    info!(count = report.total_messages, "Total messages on channels");
}
