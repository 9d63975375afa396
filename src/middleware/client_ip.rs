use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::{
    middleware::ClientRequestContext,
    services::{
        ip_resolver::{forwarded_chain, resolve_client_ip},
        request_validator::ContentClass,
    },
};

pub async fn client_ip_middleware(mut req: Request, next: Next) -> Response {
    // Absent when the router is driven without a socket (tests, in-process).
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let context = ClientRequestContext {
        ip: resolve_client_ip(req.headers(), peer),
        forwarded_chain: forwarded_chain(req.headers()),
        payload_size: 0,
        content_class: ContentClass::Empty,
    };
    tracing::trace!(ip = %context.ip, hops = context.forwarded_chain.len(), "Resolved client address");
    req.extensions_mut().insert(context);
    next.run(req).await
}
