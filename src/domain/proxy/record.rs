use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::value::{FieldSource, Value};

/// Protocol-specific secrets carried next to the shared endpoint fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// anytls, hysteria2, trojan
    Password { password: String },
    Shadowsocks { method: String, password: String },
    ShadowsocksR {
        origin: String,
        method: String,
        obfs: String,
        password: String,
    },
    Tuic { uuid: String, password: String },
    Vless { uuid: String },
    Vmess { uuid: String, method: Option<String> },
    Wireguard { privatekey: String },
}

impl Credentials {
    pub fn field(&self, name: &str) -> Option<&str> {
        match (self, name) {
            (Credentials::Password { password }, "password")
            | (Credentials::Shadowsocks { password, .. }, "password")
            | (Credentials::ShadowsocksR { password, .. }, "password")
            | (Credentials::Tuic { password, .. }, "password") => Some(password),
            (Credentials::Shadowsocks { method, .. }, "method")
            | (Credentials::ShadowsocksR { method, .. }, "method") => Some(method),
            (Credentials::Vmess { method, .. }, "method") => method.as_deref(),
            (Credentials::ShadowsocksR { origin, .. }, "origin") => Some(origin),
            (Credentials::ShadowsocksR { obfs, .. }, "obfs") => Some(obfs),
            (Credentials::Tuic { uuid, .. }, "uuid")
            | (Credentials::Vless { uuid }, "uuid")
            | (Credentials::Vmess { uuid, .. }, "uuid") => Some(uuid),
            (Credentials::Wireguard { privatekey }, "privatekey") => Some(privatekey),
            _ => None,
        }
    }
}

/// A validated, canonicalized proxy config. Only built by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub url: String,
    pub name: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub credentials: Credentials,
}

impl FieldSource for ProxyConfig {
    fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "protocol" => Some(Value::Str(self.protocol.clone())),
            "host" => Some(Value::Str(self.host.clone())),
            "port" => Some(Value::Int(i64::from(self.port))),
            "url" => Some(Value::Str(self.url.clone())),
            "name" => Some(Value::Str(self.name.clone())),
            "path" => Some(Value::Str(self.path.clone())),
            "params" => Some(Value::Map(self.params.clone())),
            other => self
                .credentials
                .field(other)
                .map(|v| Value::Str(v.to_string())),
        }
    }
}
