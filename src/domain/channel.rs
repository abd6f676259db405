//! Per-channel scan progress: the persisted record, its predicates, and the
//! transition applied after a last-post lookup.
use serde::{Deserialize, Serialize};

use crate::domain::value::{FieldSource, Value};

pub const DEFAULT_COUNT: i64 = 0;
pub const DEFAULT_CURRENT_ID: i64 = 1;
pub const DEFAULT_LAST_ID: i64 = -1;
pub const DEFAULT_STATE: i64 = 0;

pub const CHANNEL_STATE_AVAILABLE: i64 = 1;
pub const CHANNEL_STATE_UNAVAILABLE: i64 = -1;
pub const CHANNEL_FAILED_ATTEMPTS_THRESHOLD: i64 = -3;
pub const CHANNEL_REMOVE_THRESHOLD: i64 = 0;
/// Lowest value a failure streak can drive `state` to.
pub const CHANNEL_STATE_FLOOR: i64 = CHANNEL_FAILED_ATTEMPTS_THRESHOLD - 2;
pub const CHANNEL_MIN_ID_DIFF: i64 = 0;

/// Post IDs covered by one `?after=` page.
pub const POST_PAGE_STEP: i64 = 20;

/// Sentinel returned by a failed first-post lookup.
pub const FIRST_POST_SENTINEL: i64 = DEFAULT_CURRENT_ID;
/// Sentinel returned by a failed last-post lookup.
pub const LAST_POST_SENTINEL: i64 = DEFAULT_LAST_ID;

/// Public preview page of a channel; `?after={id}` pages forward from a post.
pub const CHANNEL_URL_BASE: &str = "https://t.me/s/";

pub fn channel_url(name: &str) -> String {
    format!("{CHANNEL_URL_BASE}{name}")
}

pub fn channel_url_after(name: &str, id: i64) -> String {
    format!("{CHANNEL_URL_BASE}{name}?after={id}")
}

pub const CHANNEL_FIELDS: [&str; 4] = ["count", "current_id", "last_id", "state"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(default)]
    pub count: i64,
    #[serde(default = "default_current_id")]
    pub current_id: i64,
    #[serde(default = "default_last_id")]
    pub last_id: i64,
    #[serde(default)]
    pub state: i64,
}

fn default_current_id() -> i64 {
    DEFAULT_CURRENT_ID
}

fn default_last_id() -> i64 {
    DEFAULT_LAST_ID
}

impl Default for ChannelRecord {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            current_id: DEFAULT_CURRENT_ID,
            last_id: DEFAULT_LAST_ID,
            state: DEFAULT_STATE,
        }
    }
}

impl ChannelRecord {
    pub fn field(&self, name: &str) -> Option<i64> {
        match name {
            "count" => Some(self.count),
            "current_id" => Some(self.current_id),
            "last_id" => Some(self.last_id),
            "state" => Some(self.state),
            _ => None,
        }
    }

    /// Returns false when `name` is not a channel field.
    pub fn set_field(&mut self, name: &str, value: i64) -> bool {
        match name {
            "count" => self.count = value,
            "current_id" => self.current_id = value,
            "last_id" => self.last_id = value,
            "state" => self.state = value,
            _ => return false,
        }
        true
    }

    /// Copy with `current_id` replaced by its normalized value.
    pub fn normalized(&self) -> Self {
        Self {
            current_id: get_normalized_current_id(self),
            ..*self
        }
    }

    /// Applies the outcome of a last-post lookup. A real id marks the channel
    /// available; the failure sentinel extends the failure streak down to
    /// `CHANNEL_STATE_FLOOR`. Returns the previous `last_id` when it changed.
    pub fn apply_last_post_id(&mut self, last_id: i64) -> Option<i64> {
        let previous = self.last_id;
        if last_id != previous {
            self.last_id = last_id;
        }

        if last_id == LAST_POST_SENTINEL {
            self.state = self
                .state
                .saturating_sub(1)
                .min(CHANNEL_STATE_UNAVAILABLE)
                .max(CHANNEL_STATE_FLOOR);
        } else {
            self.state = CHANNEL_STATE_AVAILABLE;
        }

        (last_id != previous).then_some(previous)
    }
}

pub fn is_channel_available(record: &ChannelRecord) -> bool {
    record.last_id != DEFAULT_LAST_ID && record.state == CHANNEL_STATE_AVAILABLE
}

fn is_raw_fully_scanned(record: &ChannelRecord) -> bool {
    is_channel_available(record) && record.current_id >= record.last_id
}

pub fn is_channel_fully_scanned(record: &ChannelRecord) -> bool {
    is_channel_available(record) && get_normalized_current_id(record) >= record.last_id
}

pub fn is_new_channel(record: &ChannelRecord) -> bool {
    *record == ChannelRecord::default()
}

pub fn should_set_current_id(record: &ChannelRecord) -> bool {
    !is_new_channel(record) && is_channel_available(record)
}

pub fn should_update_channel(record: &ChannelRecord) -> bool {
    is_channel_available(record) && !is_channel_fully_scanned(record)
}

pub fn should_delete_channel(record: &ChannelRecord) -> bool {
    if record.state <= CHANNEL_FAILED_ATTEMPTS_THRESHOLD {
        return true;
    }
    if is_new_channel(record) {
        return false;
    }
    record.count <= CHANNEL_REMOVE_THRESHOLD && is_channel_fully_scanned(record)
}

/// Effective resume cursor. Non-positive `current_id` counts back from `last_id`.
pub fn get_normalized_current_id(record: &ChannelRecord) -> i64 {
    if !is_channel_available(record) {
        return DEFAULT_CURRENT_ID;
    }
    if record.current_id <= 0 {
        return record
            .last_id
            .saturating_add(record.current_id)
            .max(DEFAULT_CURRENT_ID);
    }
    if is_raw_fully_scanned(record) {
        return record.last_id;
    }
    record.current_id
}

/// Post IDs still to scan, never negative.
pub fn diff_channel_id(record: &ChannelRecord) -> i64 {
    record
        .last_id
        .saturating_sub(get_normalized_current_id(record))
        .max(CHANNEL_MIN_ID_DIFF)
}

impl FieldSource for ChannelRecord {
    fn field_value(&self, name: &str) -> Option<Value> {
        self.field(name).map(Value::Int)
    }
}
