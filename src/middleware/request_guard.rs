use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    errors::{AppError, RejectReason},
    handlers::AppState,
    middleware::ClientRequestContext,
    services::metrics,
};

/// Buffers the body (bounded), screens it and the query string, then hands
/// the handler an identical request rebuilt from the buffered bytes.
pub async fn request_guard_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let validator = &state.request_validator;
    let (mut parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let ip = parts
        .extensions
        .get::<ClientRequestContext>()
        .map(|ctx| ctx.ip.to_string())
        .unwrap_or_default();

    let reject = |reason: RejectReason| {
        metrics::record_rejection(reason.code());
        tracing::warn!(ip = %ip, path = %path, reason = reason.code(), "Request rejected by validator");
        AppError::Rejected(reason)
    };

    let declared_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    validator.check_declared_length(declared_length).map_err(reject)?;
    validator.scan_query(&parts.uri).map_err(reject)?;

    let bytes = body::to_bytes(body, validator.max_body_bytes())
        .await
        .map_err(|_| reject(RejectReason::PayloadTooLarge))?;

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let content_class = validator
        .check_content_type(&parts.method, content_type, bytes.len())
        .map_err(reject)?;
    validator.scan_body(&bytes).map_err(reject)?;

    if let Some(ctx) = parts.extensions.get_mut::<ClientRequestContext>() {
        ctx.payload_size = bytes.len();
        ctx.content_class = content_class;
    }
    tracing::trace!(path = %path, bytes = bytes.len(), content = content_class.as_str(), "Request passed screening");

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
