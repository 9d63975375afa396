use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    errors::AppError,
    handlers::AppState,
    middleware::ClientRequestContext,
    services::metrics,
    types::BanSubject,
};

/// Turns banned addresses away before they can spend rate-limit budget or
/// touch any registry.
pub async fn ip_ban_middleware(
    State(state): State<AppState>,
    Extension(context): Extension<ClientRequestContext>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.bans.is_banned(&BanSubject::Ip(context.ip)).await? {
        metrics::record_rejection("banned_ip");
        tracing::warn!(ip = %context.ip, path = %req.uri().path(), "Request from banned IP");
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok(next.run(req).await)
}
