use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tablemate_types::api::{Claims, DeviceRegisterRequest};

use crate::auth::AppState;
use crate::error::ApiError;

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeviceRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    register_device(&state, claims.sub, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "registered": true })),
    ))
}

pub async fn unregister(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    unregister_device(&state, claims.sub, token).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// -- Service --

/// Upsert: a token re-registered by another account moves with it.
pub async fn register_device(
    state: &AppState,
    user_id: uuid::Uuid,
    req: DeviceRegisterRequest,
) -> Result<(), ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::Validation("device token required".into()));
    }
    if !matches!(req.platform.as_str(), "ios" | "android" | "web") {
        return Err(ApiError::Validation(
            "platform must be ios, android or web".into(),
        ));
    }

    let db = state.db.clone();
    crate::blocking(move || db.upsert_device(&req.token, &user_id.to_string(), &req.platform))
        .await
}

pub async fn unregister_device(
    state: &AppState,
    user_id: uuid::Uuid,
    token: String,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let deleted =
        crate::blocking(move || db.delete_device(&token, &user_id.to_string())).await?;
    if deleted {
        Ok(())
    } else {
        Err(ApiError::NotFound("device token not found".into()))
    }
}
