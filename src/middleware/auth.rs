use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{errors::AppError, handlers::AppState, services::metrics};

/// Gate for privileged routes. Inserts the verified `AdminIdentity` for the
/// handler; nothing about the session outlives the request.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).inspect_err(|err| {
        metrics::record_rejection(err.code());
        warn!(path = %req.uri().path(), "Admin route called without a usable credential");
    })?;

    let identity = state.admin_auth.verify(&token).inspect_err(|err| {
        metrics::record_rejection(err.code());
    })?;

    tracing::debug!(admin = %identity.id, path = %req.uri().path(), "Admin credential accepted");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// No `Authorization` header is a missing credential (403); a header that is
/// not a `Bearer` token is an invalid one (401).
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Forbidden("Admin credential required".into()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".into()))
}
