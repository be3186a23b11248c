//! Test kinds and the per-kind rules the generator and reconciler apply.
//!
//! Rules are selected by exact match on the lowercased template name. Any
//! name not listed here is [`TestKind::Other`] and gets the default rules.

use serde_json::{Map, Value};
use std::fmt;

/// Name of the protocol flag added to every `http_simple_request` set.
pub const PROTOCOL_FLAG: &str = "use_https";

/// Protocol flag values, in the order the variants are emitted.
pub const PROTOCOL_FLAG_VALUES: [&str; 2] = ["0", "1"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestKind {
    HttpSimpleRequest,
    Http1Conformance,
    HttpsSni,
    DnsQnameProbing,
    UdpDnsQnameProber,
    Other(String),
}

impl TestKind {
    pub fn from_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        match lowered.as_str() {
            "http_simple_request" => Self::HttpSimpleRequest,
            "http_1_conformance" => Self::Http1Conformance,
            "https_sni" => Self::HttpsSni,
            "dns_qname_probing" => Self::DnsQnameProbing,
            "udp_dns_qname_prober" => Self::UdpDnsQnameProber,
            _ => Self::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::HttpSimpleRequest => "http_simple_request",
            Self::Http1Conformance => "http_1_conformance",
            Self::HttpsSni => "https_sni",
            Self::DnsQnameProbing => "dns_qname_probing",
            Self::UdpDnsQnameProber => "udp_dns_qname_prober",
            Self::Other(name) => name,
        }
    }

    /// Worker_2 must also be reachable from the intranet side.
    pub fn requires_intranet(&self) -> bool {
        matches!(self, Self::HttpsSni | Self::DnsQnameProbing)
    }

    /// Only one direction per unordered worker pair is generated.
    pub fn single_direction(&self) -> bool {
        matches!(self, Self::HttpSimpleRequest)
    }

    /// Every parameter set is emitted twice, once per protocol flag value.
    pub fn doubles_protocol(&self) -> bool {
        matches!(self, Self::HttpSimpleRequest)
    }

    /// Parameters already carry per-element target addresses, so the
    /// responder's `ip` is not injected.
    pub fn carries_own_addresses(&self) -> bool {
        matches!(self, Self::HttpSimpleRequest)
    }

    pub fn injects_identifier(&self) -> bool {
        matches!(self, Self::HttpsSni | Self::DnsQnameProbing)
    }

    /// The domain-like value a test targets, used for lookups by the
    /// operator. `None` for kinds without one.
    pub fn target<'a>(&self, params: &'a Map<String, Value>) -> Option<&'a Value> {
        let value = match self {
            Self::UdpDnsQnameProber => params.get("qname"),
            Self::HttpSimpleRequest => params.get("hostname"),
            Self::HttpsSni => params.get("domain"),
            Self::Http1Conformance => params
                .get("request-data")
                .and_then(|data| data.get("host")),
            Self::DnsQnameProbing | Self::Other(_) => None,
        };
        value.filter(|v| !v.is_null())
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
