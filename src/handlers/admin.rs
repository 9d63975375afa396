use axum::{
    body::Bytes,
    extract::{Extension, State},
    Json,
};
use std::collections::HashSet;
use tracing::info;

use crate::{
    errors::AppError,
    extract::{optional_validated_json, ValidatedJson},
    handlers::AppState,
    services::ip_resolver::parse_ip,
    types::{
        AdminIdentity, AdminUserView, AdminVerifyRequest, ApiResponse, BanIpRequest, BanRecord,
        BanSubject, BanUserRequest, CreateLicenseRequest, IpAddressRequest, License, Removed,
        SystemStats, UserIdRequest,
    },
};

/// Any failure on this endpoint reads as an invalid credential.
pub async fn verify_handler(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<AdminVerifyRequest>,
) -> Result<Json<AdminIdentity>, AppError> {
    state
        .admin_auth
        .verify(&req.credential)
        .map(Json)
        .map_err(|err| match err {
            AppError::Forbidden(msg) => AppError::Unauthorized(msg),
            other => other,
        })
}

pub async fn ban_user_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    ValidatedJson(req): ValidatedJson<BanUserRequest>,
) -> Result<Json<ApiResponse<BanRecord>>, AppError> {
    let subject = BanSubject::User(req.user_id.trim().to_string());
    let record = state.bans.ban(subject, req.reason, &admin).await?;
    Ok(Json(ApiResponse::ok(record)))
}

pub async fn ban_ip_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    ValidatedJson(req): ValidatedJson<BanIpRequest>,
) -> Result<Json<ApiResponse<BanRecord>>, AppError> {
    let subject = BanSubject::Ip(parse_ip(&req.ip_address));
    let record = state.bans.ban(subject, req.reason, &admin).await?;
    Ok(Json(ApiResponse::ok(record)))
}

pub async fn unban_user_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    ValidatedJson(req): ValidatedJson<UserIdRequest>,
) -> Result<Json<ApiResponse<Removed>>, AppError> {
    let subject = BanSubject::User(req.user_id.trim().to_string());
    unban(&state, subject, &admin).await
}

pub async fn unban_ip_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    ValidatedJson(req): ValidatedJson<IpAddressRequest>,
) -> Result<Json<ApiResponse<Removed>>, AppError> {
    let subject = BanSubject::Ip(parse_ip(&req.ip_address));
    unban(&state, subject, &admin).await
}

async fn unban(
    state: &AppState,
    subject: BanSubject,
    admin: &AdminIdentity,
) -> Result<Json<ApiResponse<Removed>>, AppError> {
    if !state.bans.unban(&subject).await? {
        return Err(AppError::NotFound(format!("{} is not banned", subject)));
    }
    info!(subject = %subject, admin = %admin.id, "Unban requested");
    Ok(Json(ApiResponse::ok(Removed {
        subject: subject.to_string(),
        removed: true,
    })))
}

/// Removes the user record only; licenses keep their activator for audit.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    ValidatedJson(req): ValidatedJson<UserIdRequest>,
) -> Result<Json<ApiResponse<Removed>>, AppError> {
    let user_id = req.user_id.trim();
    if !state.storage.delete_user(user_id).await? {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }
    info!(user_id, admin = %admin.id, "User deleted");
    Ok(Json(ApiResponse::ok(Removed {
        subject: format!("user:{}", user_id),
        removed: true,
    })))
}

pub async fn list_users_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminUserView>>, AppError> {
    let banned: HashSet<String> = state
        .bans
        .list()
        .await?
        .into_iter()
        .filter_map(|record| match record.subject {
            BanSubject::User(id) => Some(id),
            BanSubject::Ip(_) => None,
        })
        .collect();

    let mut users: Vec<AdminUserView> = state
        .storage
        .list_users()
        .await?
        .into_iter()
        .map(|user| AdminUserView {
            banned: banned.contains(&user.id),
            user,
        })
        .collect();
    users.sort_by(|a, b| b.user.created_at.cmp(&a.user.created_at));
    Ok(Json(users))
}

pub async fn list_bans_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<BanRecord>>, AppError> {
    let mut bans = state.bans.list().await?;
    bans.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
    Ok(Json(bans))
}

/// Body is optional; without a `code` one is generated.
pub async fn create_license_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    body: Bytes,
) -> Result<Json<ApiResponse<License>>, AppError> {
    let req: CreateLicenseRequest = optional_validated_json(&body)?;
    let license = state.licenses.issue(req.code.as_deref(), &admin).await?;
    Ok(Json(ApiResponse::ok(license)))
}

pub async fn system_stats_handler(
    State(state): State<AppState>,
) -> Result<Json<SystemStats>, AppError> {
    let users = state.storage.list_users().await?;
    let bans = state.bans.list().await?;
    let licenses = state.licenses.stats().await?;
    let banned_users = bans
        .iter()
        .filter(|b| matches!(b.subject, BanSubject::User(_)))
        .count();

    Ok(Json(SystemStats {
        total_users: users.len(),
        banned_users,
        banned_ips: bans.len() - banned_users,
        total_licenses: licenses.total,
        activated_licenses: licenses.activated,
    }))
}
