pub mod auth;
pub mod ban_guard;
pub mod client_ip;
pub mod rate_limit;
pub mod request_guard;
pub mod security_headers;

use std::net::IpAddr;

use crate::services::request_validator::ContentClass;

/// Per-request facts gathered before any handler runs. Inserted by
/// `client_ip` and completed by `request_guard`; dropped with the request.
#[derive(Debug, Clone)]
pub struct ClientRequestContext {
    pub ip: IpAddr,
    pub forwarded_chain: Vec<String>,
    pub payload_size: usize,
    pub content_class: ContentClass,
}
