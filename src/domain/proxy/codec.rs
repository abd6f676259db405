//! Per-protocol normalizers: decode nested payloads, fill canonical fields and
//! validate the endpoint.
use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use thiserror::Error;

use super::encoding::{b64decode_safe, b64encode_safe};
use super::patterns::{groups_of, Groups, RawMatch, SSR_PLAIN, SS_PLAIN};
use super::protocol::{ProtocolCodec, ProtocolKind};
use super::record::{Credentials, ProxyConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("undecodable {0} payload")]
    Payload(&'static str),
    #[error("invalid vmess json: {0}")]
    Json(String),
}

/// Fields shared by every protocol, still in text form.
#[derive(Debug, Clone, Default)]
struct Endpoint {
    scheme: String,
    host: String,
    port: String,
    url: String,
    path: String,
    name: String,
    params: BTreeMap<String, String>,
}

impl Endpoint {
    fn from_groups(scheme: &str, groups: &Groups) -> Self {
        let get = |k: &str| groups.get(k).cloned().unwrap_or_default();
        Self {
            scheme: scheme.to_string(),
            host: get("host"),
            port: get("port"),
            url: get("url"),
            path: get("path"),
            name: String::new(),
            params: parse_params(&get("params")),
        }
    }
}

/// Parses a query string into a map, keeping the first value of repeated keys
/// and blank values. Literal `+` stays a plus sign.
pub fn parse_params(query: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (k, v) in parse_params_ordered(query) {
        out.entry(k).or_insert(v);
    }
    out
}

fn parse_params_ordered(query: &str) -> Vec<(String, String)> {
    let escaped = query.replace('+', "%2B");
    let mut seen: Vec<(String, String)> = Vec::new();
    for (k, v) in url::form_urlencoded::parse(escaped.as_bytes()) {
        if seen.iter().any(|(key, _)| *key == k) {
            continue;
        }
        seen.push((k.into_owned(), v.into_owned()));
    }
    seen
}

fn config_name(scheme: &str, host: &str, port: &str) -> String {
    format!("{scheme}-{host}-{port}")
}

/// Validates the endpoint and synthesizes the canonical name and url.
fn finish(
    kind: ProtocolKind,
    mut ep: Endpoint,
    credentials: Credentials,
) -> Result<ProxyConfig, CodecError> {
    if ep.host.is_empty() {
        return Err(CodecError::MissingField("host"));
    }
    if ep.port.is_empty() {
        return Err(CodecError::MissingField("port"));
    }
    if ep.url.is_empty() {
        return Err(CodecError::MissingField("url"));
    }
    let port: u16 = ep
        .port
        .trim()
        .parse()
        .map_err(|_| CodecError::InvalidPort(ep.port.clone()))?;

    if !(kind.keeps_payload_name() && !ep.name.is_empty()) {
        ep.name = config_name(&ep.scheme, &ep.host, &port.to_string());
        ep.url = format!("{}#{}", ep.url, ep.name);
    }

    Ok(ProxyConfig {
        protocol: ep.scheme,
        host: ep.host,
        port,
        url: ep.url,
        name: ep.name,
        path: ep.path,
        params: ep.params,
        credentials,
    })
}

fn base64_group(raw: &RawMatch) -> Option<&str> {
    Some(raw.group("base64")).filter(|b| !b.is_empty())
}

/// anytls, hysteria2 and trojan: `password@host:port`.
pub struct PasswordCodec;

impl ProtocolCodec for PasswordCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let ep = Endpoint::from_groups(&raw.scheme, &raw.groups);
        let credentials = Credentials::Password {
            password: raw.group("password").to_string(),
        };
        finish(raw.kind, ep, credentials)
    }
}

pub struct TuicCodec;

impl ProtocolCodec for TuicCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let ep = Endpoint::from_groups(&raw.scheme, &raw.groups);
        let credentials = Credentials::Tuic {
            uuid: raw.group("uuid").to_string(),
            password: raw.group("password").to_string(),
        };
        finish(raw.kind, ep, credentials)
    }
}

pub struct VlessCodec;

impl ProtocolCodec for VlessCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let ep = Endpoint::from_groups(&raw.scheme, &raw.groups);
        let credentials = Credentials::Vless {
            uuid: raw.group("uuid").to_string(),
        };
        finish(raw.kind, ep, credentials)
    }
}

pub struct WireguardCodec;

impl ProtocolCodec for WireguardCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let ep = Endpoint::from_groups(&raw.scheme, &raw.groups);
        let credentials = Credentials::Wireguard {
            privatekey: raw.group("privatekey").to_string(),
        };
        finish(raw.kind, ep, credentials)
    }
}

/// `ss://method:password@host:port`, or a base64 payload holding either
/// `method:password` (endpoint outside) or the whole `method:password@host:port`.
pub struct ShadowsocksCodec;

impl ProtocolCodec for ShadowsocksCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let groups = match base64_group(raw) {
            Some(payload) => decode_ss(&raw.scheme, payload, raw.group("host"), raw.group("port"))?,
            None => raw.groups.clone(),
        };
        let ep = Endpoint::from_groups(&raw.scheme, &groups);
        let get = |k: &str| groups.get(k).cloned().unwrap_or_default();
        let credentials = Credentials::Shadowsocks {
            method: get("method"),
            password: get("password"),
        };
        finish(raw.kind, ep, credentials)
    }
}

fn decode_ss(scheme: &str, payload: &str, host: &str, port: &str) -> Result<Groups, CodecError> {
    let mut url = format!("{scheme}://{}", b64decode_safe(payload));
    let (host, port) = (host.trim(), port.trim());
    if !host.is_empty() && !port.is_empty() {
        url.push_str(&format!("@{host}:{port}"));
    }

    let caps = SS_PLAIN.captures(&url).ok_or(CodecError::Payload("ss"))?;
    if caps
        .name("password")
        .is_some_and(|p| p.as_str().contains("//"))
    {
        return Err(CodecError::Payload("ss"));
    }
    Ok(groups_of(&SS_PLAIN, &caps))
}

/// `ssr://base64(host:port:origin:method:obfs:base64(password)/?k=base64(v)&...)`.
pub struct ShadowsocksRCodec;

impl ProtocolCodec for ShadowsocksRCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        let payload = base64_group(raw).ok_or(CodecError::Payload("ssr"))?;
        let url = format!("{}://{}", raw.scheme, b64decode_safe(payload));
        let caps = SSR_PLAIN.captures(&url).ok_or(CodecError::Payload("ssr"))?;
        let groups = groups_of(&SSR_PLAIN, &caps);
        let get = |k: &str| groups.get(k).cloned().unwrap_or_default();
        let (host, port) = (get("host"), get("port"));

        let mut params: Vec<(String, String)> = parse_params_ordered(&get("params"))
            .into_iter()
            .map(|(k, v)| (k, b64decode_safe(&v)))
            .collect();

        let fallback = config_name(&raw.scheme, &host, &port);
        match params.iter().position(|(k, _)| k == "remarks") {
            Some(i) if !params[i].1.is_empty() => {}
            Some(i) => params[i].1 = fallback,
            None => params.push(("remarks".to_string(), fallback)),
        }

        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k, b64encode_safe(v))))
            .finish();
        let body = format!(
            "{host}:{port}:{}:{}:{}:{}/?{encoded}",
            get("origin"),
            get("method"),
            get("obfs"),
            get("password"),
        );

        let name = params
            .iter()
            .find(|(k, _)| k == "remarks")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        let ep = Endpoint {
            scheme: raw.scheme.clone(),
            host,
            port,
            url: format!("{}://{}", raw.scheme, b64encode_safe(&body)),
            path: get("path"),
            name,
            params: params.into_iter().collect(),
        };
        let credentials = Credentials::ShadowsocksR {
            origin: get("origin"),
            method: get("method"),
            obfs: get("obfs"),
            password: b64decode_safe(&get("password")),
        };
        finish(raw.kind, ep, credentials)
    }
}

/// `vmess://uuid@host:port` or `vmess://base64(json)`.
pub struct VmessCodec;

impl ProtocolCodec for VmessCodec {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
        match base64_group(raw) {
            Some(payload) => decode_vmess(raw, payload),
            None => {
                let ep = Endpoint::from_groups(&raw.scheme, &raw.groups);
                let credentials = Credentials::Vmess {
                    uuid: raw.group("uuid").to_string(),
                    method: None,
                };
                finish(raw.kind, ep, credentials)
            }
        }
    }
}

fn decode_vmess(raw: &RawMatch, payload: &str) -> Result<ProxyConfig, CodecError> {
    let decoded = b64decode_safe(payload);
    let json_text = match (decoded.find('{'), decoded.rfind('}')) {
        (Some(start), Some(end)) if start < end => &decoded[start..=end],
        _ => return Err(CodecError::Payload("vmess")),
    };

    let mut obj: Map<String, Json> = match serde_json::from_str(json_text) {
        Ok(Json::Object(obj)) => obj,
        Ok(_) => return Err(CodecError::Json("expected an object".into())),
        Err(e) => return Err(CodecError::Json(e.to_string())),
    };

    let name = config_name(
        &raw.scheme,
        &obj.get("add").map(json_display).unwrap_or_else(|| "0.0.0.0".into()),
        &obj.get("port").map(json_display).unwrap_or_else(|| "0".into()),
    );
    obj.insert("ps".to_string(), Json::String(name));

    let compact = serde_json::to_string(&Json::Object(obj.clone()))
        .map_err(|e| CodecError::Json(e.to_string()))?;
    let field = |k: &str| obj.get(k).map(json_field).unwrap_or_default();

    let params = [
        ("alterId", "aid"),
        ("fp", "fp"),
        ("sni", "sni"),
        ("tls", "tls"),
        ("transport", "net"),
        ("type", "type"),
    ]
    .into_iter()
    .map(|(key, src)| (key.to_string(), field(src)))
    .collect();

    let ep = Endpoint {
        scheme: raw.scheme.clone(),
        host: field("add"),
        port: field("port"),
        url: format!("{}://{}", raw.scheme, b64encode_safe(&escape_non_ascii(&compact))),
        path: field("path"),
        name: field("ps"),
        params,
    };
    let credentials = Credentials::Vmess {
        uuid: field("id"),
        method: Some(field("scy")),
    };
    finish(raw.kind, ep, credentials)
}

/// Text used when a json value is formatted into a name.
fn json_display(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        Json::Null => "None".to_string(),
        Json::Bool(true) => "True".to_string(),
        Json::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

/// Text used when a json value becomes a record field; null reads as missing.
fn json_field(v: &Json) -> String {
    match v {
        Json::Null => String::new(),
        other => json_display(other),
    }
}

/// Escapes non-ASCII characters as `\uXXXX` so re-encoded payloads stay ASCII.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

/// Normalizes one recognizer match with its protocol's codec.
pub fn normalize_match(raw: &RawMatch) -> Result<ProxyConfig, CodecError> {
    raw.kind.codec().normalize(raw)
}
