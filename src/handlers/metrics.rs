use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::Encoder;

use crate::errors::AppError;

pub async fn metrics_handler() -> Result<impl IntoResponse, AppError> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = vec![];
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics::{init_metrics, record_rate_limited};

    #[tokio::test]
    async fn exposes_gateway_counters() {
        init_metrics().unwrap();
        record_rate_limited("general");

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("rate_limit_exceeded_total"));
    }
}
