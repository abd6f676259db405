//! Channel list maintenance: merge names from the URL list, prune dead channels,
//! move cursors and bulk-reset fields, then persist state and the URL list.
use tracing::{info, warn};

use crate::domain::channel::ChannelRecord;
use crate::domain::expr::Condition;
use crate::domain::roster::{
    assign_current_id_to_channels, build_report, delete_channels, log_report,
    merge_channel_names, reset_channels, ChannelMap, OffsetOutcome,
};
use crate::ports::repo::Repo;

#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    pub delete_channels: bool,
    pub message_offset: Option<i64>,
    pub reset_to_defaults: bool,
    pub overrides: Vec<(String, i64)>,
    /// Expression over `count`, `current_id`, `last_id`, `state` selecting the
    /// channels to reset.
    pub channel_filter: Option<String>,
    /// Offset and reset only log what they would change.
    pub dry_run: bool,
    pub backup: bool,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            delete_channels: false,
            message_offset: None,
            reset_to_defaults: false,
            overrides: Vec::new(),
            channel_filter: None,
            dry_run: true,
            backup: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub added: usize,
    pub deleted: Vec<String>,
    pub offset: OffsetOutcome,
    pub reset: Vec<String>,
}

/// Applies `opts` to `channels` in place. Invalid input (an unparsable
/// channel filter, unknown reset fields) fails before anything is changed.
pub fn apply_maintenance(
    channels: &mut ChannelMap,
    names: Vec<String>,
    opts: &MaintenanceOptions,
) -> Result<MaintenanceSummary, String> {
    let condition = match opts.channel_filter.as_deref().map(str::trim) {
        Some(src) if !src.is_empty() => {
            Some(Condition::compile(src).map_err(|e| format!("channel filter: {e}"))?)
        }
        _ => None,
    };
    let mut summary = MaintenanceSummary {
        added: merge_channel_names(channels, names),
        ..MaintenanceSummary::default()
    };

    if opts.delete_channels {
        summary.deleted = delete_channels(channels);
    }

    if let Some(offset) = opts.message_offset {
        summary.offset = assign_current_id_to_channels(channels, offset, opts.dry_run);
    }

    let predicate = condition
        .as_ref()
        .map(|c| move |r: &ChannelRecord| c.matches(r));
    summary.reset = reset_channels(
        channels,
        &opts.overrides,
        predicate.as_ref().map(|p| p as &dyn Fn(&ChannelRecord) -> bool),
        opts.dry_run,
        opts.reset_to_defaults,
    )
    .map_err(|e| e.to_string())?;

    Ok(summary)
}

/// The `channels` command: load, apply, back up and save.
pub async fn run_maintenance<R>(repo: &R, opts: &MaintenanceOptions) -> Result<MaintenanceSummary, String>
where
    R: Repo + ?Sized,
{
    let mut channels = repo.load_channels().await?;
    let names = repo.load_channel_names().await?;

    let summary = apply_maintenance(&mut channels, names, opts)?;
    info!(
        added = summary.added,
        deleted = summary.deleted.len(),
        offset_assigned = summary.offset.assigned.len(),
        offset_skipped = summary.offset.skipped.len(),
        reset = summary.reset.len(),
        dry_run = opts.dry_run,
        "Channel maintenance complete"
    );

    if opts.backup {
        repo.backup().await?;
    } else {
        warn!("Backups disabled, overwriting channel files in place");
    }

    repo.save_channels(&channels).await?;
    let surviving: Vec<String> = channels.keys().cloned().collect();
    repo.save_channel_urls(&surviving).await?;

    log_report(&build_report(&channels));
    Ok(summary)
}
