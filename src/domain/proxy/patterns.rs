//! Regex library for config URLs embedded in free text.
//!
//! Text is first split into `{scheme}://{body}` candidates, where a body runs
//! until whitespace, a bare `://` or the start of the next known scheme. Each
//! candidate is then matched against the recognizers for its protocol, which
//! must match from the first character of the candidate.
use std::{collections::BTreeMap, sync::LazyLock};

use regex::{Captures, Regex};

use super::protocol::ProtocolKind;

const SCHEMES: &str = "anytls|hy2|hysteria2|ssr|ss|trojan|tuic|vless|vmess|wireguard";

const HOST: &str = r"(?P<host>[\w\-\[:%\].]+)";
const PORT: &str = r":(?P<port>\d{1,5})";
const TAIL: &str = r"(?P<path>/[^\s?#]*)?(?:\?(?P<params>[^\s#]*))?";
const BASE64: &str = r"(?P<base64>[\w+/\-]+={0,2})";

static SCHEME_START: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"(?P<scheme>{SCHEMES})://")));
static SCHEME_AT: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"^(?:{SCHEMES})://")));

static PASSWORD_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>anytls|hy2|hysteria2|trojan)://(?P<password>.+)@{HOST}{PORT}{TAIL})"
    ))
});

pub(crate) static SS_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>ss)://(?P<method>[^\s:@#]+):(?P<password>.+)@{HOST}{PORT}{TAIL})"
    ))
});

static SS_BASE64: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>ss)://{BASE64}(?:@{HOST}{PORT}{TAIL})?)"
    ))
});

static SSR_BASE64: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?P<url>(?P<protocol>ssr)://{BASE64})")));

pub(crate) static SSR_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>ssr)://{HOST}{PORT}:(?P<origin>[^\s:]+):(?P<method>[^\s:]+):(?P<obfs>[^\s:]+):(?P<password>[\w+\-]+(?:/+[\w+\-]+)*={{0,2}}){TAIL})"
    ))
});

static TUIC_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>tuic)://(?P<uuid>.+):(?P<password>.+)@{HOST}{PORT}{TAIL})"
    ))
});

static VLESS_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>vless)://(?P<uuid>.+)@{HOST}{PORT}{TAIL})"
    ))
});

static VMESS_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>vmess)://(?P<uuid>.+)@{HOST}{PORT}{TAIL})"
    ))
});

static VMESS_BASE64: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?P<url>(?P<protocol>vmess)://{BASE64})")));

static WIREGUARD_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?P<url>(?P<protocol>wireguard)://(?P<privatekey>.+)@{HOST}{PORT}{TAIL})"
    ))
});

/// Matches a public channel link and captures its name.
pub static CHANNEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\bhttps?://t\.me/(?:s/)?(\w+)"));

/// A field path accepted by dedup and sort options.
pub static CONFIG_FIELD: LazyLock<Regex> = LazyLock::new(|| compile(r"^\w+(?:\.\w+)*$"));

/// Separator between field names in a field list.
pub static FIELD_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*,\s*|\s+"));

fn compile(pattern: &str) -> Regex {
    // Patterns are fixed at build time; a failure here is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

/// What a recognizer checks right after the base64 group.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    /// Payload may be followed by `@host:port` or a fragment.
    AtOrFragment,
    FragmentOnly,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Recognizer {
    regex: &'static LazyLock<Regex>,
    boundary: Option<Boundary>,
    /// Password groups that may not contain `//`.
    reject_double_slash: bool,
}

impl ProtocolKind {
    /// Recognizers in the order they are tried.
    pub(crate) fn recognizers(self) -> &'static [Recognizer] {
        const fn plain(regex: &'static LazyLock<Regex>) -> Recognizer {
            Recognizer {
                regex,
                boundary: None,
                reject_double_slash: false,
            }
        }

        static ANYTLS: [Recognizer; 1] = [plain(&PASSWORD_URL)];
        static SS: [Recognizer; 2] = [
            Recognizer {
                regex: &SS_PLAIN,
                boundary: None,
                reject_double_slash: true,
            },
            Recognizer {
                regex: &SS_BASE64,
                boundary: Some(Boundary::AtOrFragment),
                reject_double_slash: false,
            },
        ];
        static SSR: [Recognizer; 1] = [Recognizer {
            regex: &SSR_BASE64,
            boundary: Some(Boundary::FragmentOnly),
            reject_double_slash: false,
        }];
        static TUIC: [Recognizer; 1] = [Recognizer {
            regex: &TUIC_URL,
            boundary: None,
            reject_double_slash: true,
        }];
        static VLESS: [Recognizer; 1] = [plain(&VLESS_URL)];
        static VMESS: [Recognizer; 2] = [
            plain(&VMESS_PLAIN),
            Recognizer {
                regex: &VMESS_BASE64,
                boundary: Some(Boundary::FragmentOnly),
                reject_double_slash: false,
            },
        ];
        static WIREGUARD: [Recognizer; 1] = [plain(&WIREGUARD_URL)];

        match self {
            ProtocolKind::Anytls | ProtocolKind::Hysteria2 | ProtocolKind::Trojan => &ANYTLS,
            ProtocolKind::Shadowsocks => &SS,
            ProtocolKind::ShadowsocksR => &SSR,
            ProtocolKind::Tuic => &TUIC,
            ProtocolKind::Vless => &VLESS,
            ProtocolKind::Vmess => &VMESS,
            ProtocolKind::Wireguard => &WIREGUARD,
        }
    }
}

/// Named groups captured for one candidate. Groups that did not participate are empty.
pub type Groups = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub kind: ProtocolKind,
    /// Scheme exactly as written, e.g. `hy2`.
    pub scheme: String,
    pub groups: Groups,
}

impl RawMatch {
    pub fn group(&self, name: &str) -> &str {
        self.groups.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Collects every named group of `caps`, using empty strings for absent ones.
pub(crate) fn groups_of(regex: &Regex, caps: &Captures<'_>) -> Groups {
    regex
        .capture_names()
        .flatten()
        .map(|name| {
            let value = caps.name(name).map(|m| m.as_str()).unwrap_or("");
            (name.to_string(), value.to_string())
        })
        .collect()
}

/// Splits free text into `{scheme}://{body}` candidates in order of appearance.
pub fn find_candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut from = 0;

    while from < text.len() {
        let Some(caps) = SCHEME_START.captures_at(text, from) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        let body_start = whole.end();
        let body_end = body_end(text, body_start);

        if body_end == body_start {
            // No body here; retry one character further on.
            from = next_char_boundary(text, whole.start());
            continue;
        }

        out.push(&text[whole.start()..body_end]);
        from = body_end;
    }

    out
}

fn body_end(text: &str, start: usize) -> usize {
    for (offset, c) in text[start..].char_indices() {
        let at = start + offset;
        if c.is_whitespace() {
            return at;
        }
        let rest = &text[at..];
        if rest.starts_with("://") || SCHEME_AT.is_match(rest) {
            return at;
        }
    }
    text.len()
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map(|c| at + c.len_utf8())
        .unwrap_or(text.len())
}

/// Runs the protocol recognizers over a single candidate; the first that
/// matches from offset zero wins.
pub fn match_candidate(candidate: &str) -> Option<RawMatch> {
    let caps = SCHEME_START.captures(candidate)?;
    if caps.get(0)?.start() != 0 {
        return None;
    }
    let scheme = caps.name("scheme")?.as_str();
    let kind = ProtocolKind::from_scheme(scheme)?;

    kind.recognizers().iter().find_map(|r| {
        let regex: &Regex = r.regex;
        let caps = regex.captures(candidate)?;
        if caps.get(0)?.start() != 0 {
            return None;
        }
        if let Some(boundary) = r.boundary {
            let end = caps.name("base64")?.end();
            if !boundary_ok(candidate, end, boundary) {
                return None;
            }
        }
        if r.reject_double_slash
            && caps
                .name("password")
                .is_some_and(|p| p.as_str().contains("//"))
        {
            return None;
        }
        Some(RawMatch {
            kind,
            scheme: scheme.to_string(),
            groups: groups_of(regex, &caps),
        })
    })
}

fn boundary_ok(text: &str, at: usize, boundary: Boundary) -> bool {
    match text[at..].chars().next() {
        None => true,
        Some(c) if c.is_whitespace() || c == '#' => true,
        Some('@') => matches!(boundary, Boundary::AtOrFragment),
        Some(_) => false,
    }
}

/// Every recognizable config in `text`, in order of appearance.
pub fn extract_matches(text: &str) -> Vec<RawMatch> {
    find_candidates(text)
        .into_iter()
        .filter_map(match_candidate)
        .collect()
}

/// Lower-cased channel names referenced by links in `text`.
pub fn channel_names(text: &str) -> Vec<String> {
    CHANNEL_NAME
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
        .collect()
}
