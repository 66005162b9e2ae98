pub mod file;

use axum::Json;

use crate::models::OkResponse;

/// GET /api/health
pub async fn health() -> Json<OkResponse> {
    Json(OkResponse::ok())
}
