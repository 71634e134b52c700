use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use tablemate_db::models::{CheckInRow, ProfileRow};
use tablemate_db::util::{parse_timestamp, parse_uuid};
use tablemate_score::pairwise_score;
use tablemate_types::api::{
    ActiveCheckInResponse, ActiveDinerResponse, CheckInRequest, CheckInResponse, Claims,
    DinerProfile,
};

use crate::auth::AppState;
use crate::error::ApiError;

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let out = check_in(&state, claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn list_at_restaurant(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(restaurant_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(active_diners(&state, claims.sub, restaurant_id).await?))
}

pub async fn active_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(restaurant_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(active_check_in(&state, claims.sub, restaurant_id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(check_in_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_check_in(&state, claims.sub, check_in_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// -- Service --

/// Start a dining session. One active session per user; re-checking in at
/// the same restaurant inside the cooldown window is a Conflict.
pub async fn check_in(
    state: &AppState,
    user_id: Uuid,
    req: CheckInRequest,
) -> Result<CheckInResponse, ApiError> {
    if req.party_size == 0 {
        return Err(ApiError::Validation("party_size must be at least 1".into()));
    }

    let db = state.db.clone();
    let cooldown = state.windows.checkin_cooldown_hours;
    let row = crate::blocking(move || {
        if db.get_restaurant(&req.restaurant_id.to_string())?.is_none() {
            return Ok(None);
        }
        db.create_check_in(
            &Uuid::new_v4().to_string(),
            &user_id.to_string(),
            &req.restaurant_id.to_string(),
            req.party_size,
            req.notes.as_deref(),
            cooldown,
        )
        .map(Some)
    })
    .await?;

    match row {
        None => Err(ApiError::NotFound("restaurant not found".into())),
        Some(None) => Err(ApiError::Conflict(
            "already checked in at this restaurant".into(),
        )),
        Some(Some(row)) => Ok(check_in_response(row)),
    }
}

/// Everyone else dining at the restaurant inside the presence window,
/// ranked by pairwise compatibility with the caller (ties keep recency).
pub async fn active_diners(
    state: &AppState,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<Vec<ActiveDinerResponse>, ApiError> {
    let db = state.db.clone();
    let window = state.windows.presence_window_hours;
    let limit = state.windows.diner_limit;

    let (me, diners) = crate::blocking(move || {
        let me = db.get_profile(&user_id.to_string())?;
        let diners =
            db.active_diners_at(&restaurant_id.to_string(), &user_id.to_string(), window, limit)?;
        Ok((me, diners))
    })
    .await?;

    let me = me.ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    let my_slice = me.slice();

    let mut ranked: Vec<ActiveDinerResponse> = diners
        .into_iter()
        .map(|(check_in, profile)| {
            let score = pairwise_score(&my_slice, &profile.slice());
            ActiveDinerResponse {
                check_in: check_in_response(check_in),
                user: diner_profile(&profile),
                compatibility_score: score,
            }
        })
        .collect();

    // Stable sort: equal scores keep the store's recency order.
    ranked.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
    Ok(ranked)
}

pub async fn active_check_in(
    state: &AppState,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<ActiveCheckInResponse, ApiError> {
    let db = state.db.clone();
    let window = state.windows.active_lookup_window_hours;
    let row = crate::blocking(move || {
        db.active_check_in(&user_id.to_string(), &restaurant_id.to_string(), window)
    })
    .await?;

    Ok(ActiveCheckInResponse {
        checked_in: row.is_some(),
        check_in: row.map(check_in_response),
    })
}

pub async fn delete_check_in(
    state: &AppState,
    user_id: Uuid,
    check_in_id: Uuid,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let deleted = crate::blocking(move || {
        db.delete_check_in(&check_in_id.to_string(), &user_id.to_string())
    })
    .await?;

    if deleted {
        Ok(())
    } else {
        Err(ApiError::NotFound("check-in not found".into()))
    }
}

// -- Conversions --

pub(crate) fn check_in_response(row: CheckInRow) -> CheckInResponse {
    CheckInResponse {
        id: parse_uuid(&row.id),
        user_id: parse_uuid(&row.user_id),
        restaurant_id: parse_uuid(&row.restaurant_id),
        party_size: row.party_size,
        notes: row.notes,
        active: row.active,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn diner_profile(row: &ProfileRow) -> DinerProfile {
    DinerProfile {
        user_id: parse_uuid(&row.user_id),
        username: row.username.clone(),
        conversation_preference: row.conversation_preference.clone(),
        dietary_tags: row.tags(),
        occupation: row.occupation.clone(),
    }
}
