use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    errors::AppError,
    handlers::AppState,
    middleware::ClientRequestContext,
    services::{
        metrics,
        rate_limiter::{Admission, RouteClass},
    },
};

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    Extension(context): Extension<ClientRequestContext>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let class = RouteClass::for_path(req.uri().path());

    match state.rate_limiter.admit(context.ip, class) {
        Admission::Allowed { .. } => Ok(next.run(req).await),
        rejected => {
            let retry_after_secs = rejected.retry_after_secs().unwrap_or(1);
            metrics::record_rate_limited(class.as_str());
            warn!(
                ip = %context.ip,
                route_class = class.as_str(),
                retry_after_secs,
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited { retry_after_secs })
        }
    }
}
