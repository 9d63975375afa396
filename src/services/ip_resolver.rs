//! Canonical client IP from request metadata.
//!
//! Forwarded headers are trusted as-is, which is only sound behind a reverse
//! proxy that overwrites them. A client reaching the service directly can
//! choose its own address here.

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Stand-in for any client whose address is missing or malformed.
pub const UNSPECIFIED_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Raw `X-Forwarded-For` entries, in header order.
pub fn forwarded_chain(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .collect()
}

/// Picks the first present candidate of: first `X-Forwarded-For` hop,
/// `X-Real-IP`, socket peer. The chosen candidate must parse as an IP; if it
/// does not, the result is [`UNSPECIFIED_IP`] rather than the next candidate.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let candidate = header_candidate(headers, X_FORWARDED_FOR, |raw| {
        raw.split(',').next().map(str::trim).unwrap_or_default()
    })
    .or_else(|| header_candidate(headers, X_REAL_IP, str::trim));

    match candidate {
        Some(Candidate::Text(text)) => parse_ip(&text),
        Some(Candidate::Unreadable) => UNSPECIFIED_IP,
        None => peer.map(|addr| addr.ip()).unwrap_or(UNSPECIFIED_IP),
    }
}

enum Candidate {
    Text(String),
    Unreadable,
}

fn header_candidate(
    headers: &HeaderMap,
    name: &str,
    pick: impl Fn(&str) -> &str,
) -> Option<Candidate> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(raw) => {
            let picked = pick(raw);
            if picked.is_empty() {
                None
            } else {
                Some(Candidate::Text(picked.to_string()))
            }
        }
        Err(_) => Some(Candidate::Unreadable),
    }
}

/// Strict parse; anything that is not a bare IPv4/IPv6 literal maps to the
/// sentinel.
pub fn parse_ip(raw: &str) -> IpAddr {
    raw.trim().parse::<IpAddr>().unwrap_or(UNSPECIFIED_IP)
}
