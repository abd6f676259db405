//! Proxy config recognition and canonicalization.
pub mod codec;
pub mod encoding;
pub mod patterns;
pub mod protocol;
pub mod record;

pub use codec::{normalize_match, CodecError};
pub use patterns::{extract_matches, find_candidates, match_candidate, RawMatch};
pub use protocol::{ProtocolCodec, ProtocolKind};
pub use record::{Credentials, ProxyConfig};

use crate::domain::value::{FieldSource, Value};

/// Raw recognizer output exposes its captured text, as loaded from the raw file
/// when normalization is switched off.
impl FieldSource for RawMatch {
    fn field_value(&self, name: &str) -> Option<Value> {
        if name == "protocol" {
            return Some(Value::Str(self.scheme.clone()));
        }
        self.groups.get(name).map(|v| Value::Str(v.clone()))
    }
}
