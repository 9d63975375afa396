use axum::{extract::State, Json};

use crate::{handlers::AppState, types::PingResponse};

pub async fn ping_handler(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state.config.ping_message.clone(),
    })
}
