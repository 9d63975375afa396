use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    errors::AppError,
    handlers::{admin, health, ip, license, metrics, AppState},
    middleware::{
        auth::admin_auth_middleware, ban_guard::ip_ban_middleware, client_ip::client_ip_middleware,
        rate_limit::rate_limit_middleware, request_guard::request_guard_middleware,
        security_headers::security_headers_middleware,
    },
};

/// Layers run outermost first: CORS, tracing, hardening headers, client IP
/// resolution, request screening, IP ban check, rate limiting, then (admin
/// routes only) credential verification.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/ban-user", post(admin::ban_user_handler))
        .route("/ban-ip", post(admin::ban_ip_handler))
        .route("/unban-user", post(admin::unban_user_handler))
        .route("/unban-ip", post(admin::unban_ip_handler))
        .route("/delete-user", post(admin::delete_user_handler))
        .route("/users", get(admin::list_users_handler))
        .route("/bans", get(admin::list_bans_handler))
        .route("/create-license", post(admin::create_license_handler))
        .route("/system-stats", get(admin::system_stats_handler))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware))
        // Added after the auth layer: the credential arrives in the body here.
        .route("/verify", post(admin::verify_handler));

    Router::new()
        .route("/ip", get(ip::get_ip_handler))
        .route("/vpn-check", post(ip::vpn_check_handler))
        .route("/license/activate", post(license::activate_license_handler))
        .route("/ping", get(health::ping_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/admin", admin_routes)
        .fallback(not_found_handler)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), ip_ban_middleware))
        .layer(from_fn_with_state(state.clone(), request_guard_middleware))
        .layer(from_fn(client_ip_middleware))
        .layer(DefaultBodyLimit::max(state.config.security.max_body_bytes))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

async fn not_found_handler() -> AppError {
    AppError::NotFound("Route not found".into())
}

/// An empty origin list mirrors the caller's origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
