use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::error::AppError;
use crate::relay;
use crate::storage::Quota;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quota", get(quota))
        .route("/api/quota", get(quota))
}

async fn quota(State(state): State<AppState>) -> Result<Json<Quota>, AppError> {
    Ok(Json(relay::quota(&state).await?))
}
