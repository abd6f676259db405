use super::codec::{
    CodecError, PasswordCodec, ShadowsocksCodec, ShadowsocksRCodec, TuicCodec, VlessCodec,
    VmessCodec, WireguardCodec,
};
use super::patterns::RawMatch;
use super::record::ProxyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolKind {
    Anytls,
    Hysteria2,
    Shadowsocks,
    ShadowsocksR,
    Trojan,
    Tuic,
    Vless,
    Vmess,
    Wireguard,
}

impl ProtocolKind {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "anytls" => Some(ProtocolKind::Anytls),
            "hy2" | "hysteria2" => Some(ProtocolKind::Hysteria2),
            "ss" => Some(ProtocolKind::Shadowsocks),
            "ssr" => Some(ProtocolKind::ShadowsocksR),
            "trojan" => Some(ProtocolKind::Trojan),
            "tuic" => Some(ProtocolKind::Tuic),
            "vless" => Some(ProtocolKind::Vless),
            "vmess" => Some(ProtocolKind::Vmess),
            "wireguard" => Some(ProtocolKind::Wireguard),
            _ => None,
        }
    }

    /// Whether a name recovered from the payload survives canonicalization.
    pub fn keeps_payload_name(self) -> bool {
        matches!(self, ProtocolKind::ShadowsocksR | ProtocolKind::Vmess)
    }

    pub fn codec(self) -> &'static dyn ProtocolCodec {
        match self {
            ProtocolKind::Anytls | ProtocolKind::Hysteria2 | ProtocolKind::Trojan => &PasswordCodec,
            ProtocolKind::Shadowsocks => &ShadowsocksCodec,
            ProtocolKind::ShadowsocksR => &ShadowsocksRCodec,
            ProtocolKind::Tuic => &TuicCodec,
            ProtocolKind::Vless => &VlessCodec,
            ProtocolKind::Vmess => &VmessCodec,
            ProtocolKind::Wireguard => &WireguardCodec,
        }
    }
}

/// Turns a recognizer match into a validated config.
pub trait ProtocolCodec: Send + Sync {
    fn normalize(&self, raw: &RawMatch) -> Result<ProxyConfig, CodecError>;
}
