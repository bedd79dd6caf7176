//! Client identity resolution — attributes quota and rate-limit usage to a caller.

use axum::http::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Stable key identifying a caller, derived from the network origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Resolve the client identity for an inbound request.
///
/// Proxy-forwarded headers (`X-Forwarded-For`, `X-Real-IP`) are honored only
/// when `trust_forwarded` is set; otherwise the peer address wins and the
/// spoofable headers are ignored.
pub fn resolve_identity(headers: &HeaderMap, peer: SocketAddr, trust_forwarded: bool) -> ClientIdentity {
    if trust_forwarded {
        if let Some(ip) = forwarded_client_ip(headers) {
            return ClientIdentity::new(ip);
        }
    }
    ClientIdentity::from(peer.ip())
}

/// First hop of `X-Forwarded-For`, falling back to `X-Real-IP`.
fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
}
