//! Target extractor

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(https?://[^\s]+)").expect("valid url regex"));

static CIDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}/\d{1,2}\b").expect("valid cidr regex")
});

static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("valid ip regex"));

static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\.[a-zA-Z]{2,}\b",
    )
    .expect("valid domain regex")
});

/// Kind of target found in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Url,
    Network,
    Ip,
    Domain,
    Unknown,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Url => "url",
            TargetKind::Network => "network",
            TargetKind::Ip => "ip",
            TargetKind::Domain => "domain",
            TargetKind::Unknown => "unknown",
        }
    }

    /// Kinds that address a web application
    pub fn is_web(&self) -> bool {
        matches!(self, TargetKind::Url | TargetKind::Domain)
    }

    /// Kinds that address hosts on a network
    pub fn is_host(&self) -> bool {
        matches!(self, TargetKind::Ip | TargetKind::Network | TargetKind::Domain)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = std::convert::Infallible;

    /// Unrecognised names map to `Unknown`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "url" => TargetKind::Url,
            "network" | "cidr" => TargetKind::Network,
            "ip" => TargetKind::Ip,
            "domain" => TargetKind::Domain,
            _ => TargetKind::Unknown,
        })
    }
}

/// Typed target, produced fresh per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub value: String,
}

impl TargetDescriptor {
    pub fn new(kind: TargetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(TargetKind::Unknown, "")
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == TargetKind::Unknown
    }
}

/// Extract the highest-priority target from free text
///
/// Priority: URL, then CIDR network, then bare IPv4, then domain.
/// Never fails; no match yields `{unknown, ""}`.
pub fn extract_target(text: &str) -> TargetDescriptor {
    let probes: [(&Lazy<Regex>, TargetKind); 4] = [
        (&URL, TargetKind::Url),
        (&CIDR, TargetKind::Network),
        (&IPV4, TargetKind::Ip),
        (&DOMAIN, TargetKind::Domain),
    ];

    for (regex, kind) in probes {
        if let Some(m) = regex.find(text) {
            return TargetDescriptor::new(kind, m.as_str());
        }
    }
    TargetDescriptor::unknown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_url_wins_over_ip() {
        let t = extract_target("scan https://a.b.com/x and 10.0.0.1");
        assert_eq!(t.kind, TargetKind::Url);
        assert_eq!(t.value, "https://a.b.com/x");
    }

    #[test]
    fn test_cidr_before_ip() {
        let t = extract_target("sweep 192.168.1.0/24 please");
        assert_eq!(t, TargetDescriptor::new(TargetKind::Network, "192.168.1.0/24"));
    }

    #[test]
    fn test_bare_ip() {
        let t = extract_target("ports on 10.0.0.1");
        assert_eq!(t, TargetDescriptor::new(TargetKind::Ip, "10.0.0.1"));
    }

    #[test]
    fn test_multi_label_domain() {
        let t = extract_target("enumerate api.staging.example.com now");
        assert_eq!(t, TargetDescriptor::new(TargetKind::Domain, "api.staging.example.com"));
    }

    #[test]
    fn test_no_target() {
        let t = extract_target("hello there");
        assert!(t.is_unknown());
        assert_eq!(t.value, "");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Domain".parse::<TargetKind>().unwrap(), TargetKind::Domain);
        assert_eq!("cidr".parse::<TargetKind>().unwrap(), TargetKind::Network);
        assert_eq!("bogus".parse::<TargetKind>().unwrap(), TargetKind::Unknown);
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let value = serde_json::to_value(TargetDescriptor::new(TargetKind::Ip, "1.2.3.4")).unwrap();
        assert_eq!(value["type"], "ip");
        assert_eq!(value["value"], "1.2.3.4");
    }

    #[quickcheck]
    fn prop_extract_never_panics(text: String) -> bool {
        let t = extract_target(&text);
        t.is_unknown() == t.value.is_empty()
    }
}
