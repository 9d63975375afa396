use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    errors::AppError,
    extract::ValidatedJson,
    handlers::AppState,
    middleware::ClientRequestContext,
    services::ip_resolver::parse_ip,
    types::{IpAddressRequest, IpResponse, VpnClassification},
};

pub async fn get_ip_handler(Extension(context): Extension<ClientRequestContext>) -> Json<IpResponse> {
    Json(IpResponse {
        ip: context.ip.to_string(),
    })
}

/// Classification never fails the request; upstream trouble reads as "not a
/// VPN".
pub async fn vpn_check_handler(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<IpAddressRequest>,
) -> Result<Json<VpnClassification>, AppError> {
    let ip = parse_ip(&req.ip_address);
    Ok(Json(state.classifier.classify(ip).await))
}
