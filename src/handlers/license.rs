use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use tracing::{error, warn};

use crate::{
    errors::AppError,
    extract::ValidatedJson,
    handlers::AppState,
    middleware::ClientRequestContext,
    services::metrics,
    types::{ActivateLicenseRequest, ActivateLicenseResponse, ActivationOutcome, BanSubject},
};

/// Bans are re-read here at point of use; the IP guard upstream does not make
/// this check redundant because the user id only appears in the body.
///
/// Once the license is committed the caller is told it won, even if the user
/// record cannot be written.
pub async fn activate_license_handler(
    State(state): State<AppState>,
    Extension(context): Extension<ClientRequestContext>,
    ValidatedJson(req): ValidatedJson<ActivateLicenseRequest>,
) -> Result<(StatusCode, Json<ActivateLicenseResponse>), AppError> {
    let user_id = req.user_id.trim();

    if state.bans.is_banned(&BanSubject::User(user_id.to_string())).await?
        || state.bans.is_banned(&BanSubject::Ip(context.ip)).await?
    {
        metrics::record_rejection("banned_subject");
        warn!(user_id, ip = %context.ip, "Activation attempt by banned subject");
        return Err(AppError::Forbidden("Access denied".into()));
    }

    let outcome = state.licenses.activate(&req.code, user_id).await?;
    let status = match &outcome {
        ActivationOutcome::Activated(license) => {
            let classification = state.classifier.classify(context.ip).await;
            if classification.is_vpn {
                warn!(user_id, ip = %context.ip, "License activated from a suspected VPN");
            }
            if let Err(err) = state
                .licenses
                .record_user(user_id, license, context.ip, classification.is_vpn)
                .await
            {
                metrics::record_storage_failure("record_user");
                error!(user_id, code = %license.code, error = %err, "Failed to record activating user");
            }
            StatusCode::OK
        }
        ActivationOutcome::AlreadyActivated => StatusCode::CONFLICT,
        ActivationOutcome::NotFound => StatusCode::NOT_FOUND,
    };

    Ok((
        status,
        Json(ActivateLicenseResponse {
            status: outcome.as_str().to_string(),
        }),
    ))
}
