use super::repository;
use crate::modules::auth::middleware::Auth;
use crate::types::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;

async fn get_profile(auth: Auth) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "account": repository::summary(&auth.account),
        })),
    )
}

async fn deactivate_profile(State(ctx): State<Arc<Context>>, auth: Auth) -> impl IntoResponse {
    match repository::deactivate_by_id(&ctx.db_conn.pool, auth.account.id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Account deactivated" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new().route("/profile", get(get_profile).delete(deactivate_profile))
}
