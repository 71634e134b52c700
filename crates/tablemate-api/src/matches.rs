use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use tablemate_db::models::{MatchRow, ProfileRow};
use tablemate_db::util::{parse_timestamp, parse_uuid};
use tablemate_score::{DiscoveryScorer, Scorer, pairwise_score};
use tablemate_types::api::{Claims, MatchOverview, MatchRequestBody, MatchResponse, SmartMatchCandidate};
use tablemate_types::events::GatewayEvent;
use tablemate_types::models::{CandidateProfile, MatchStatus, RestaurantRef};

use crate::auth::AppState;
use crate::checkins::diner_profile;
use crate::error::ApiError;
use crate::notify::{PushNote, notify_user};

/// lat/lng are accepted but advisory; ranking is compatibility-driven.
#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

// -- Handlers --

pub async fn request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MatchRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let out = request_match(&state, claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(accept_match(&state, match_id, claims.sub, &claims.username).await?))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(reject_match(&state, match_id, claims.sub).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_match(&state, match_id, claims.sub).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(my_matches(&state, claims.sub).await?))
}

pub async fn pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(pending_matches(&state, claims.sub).await?))
}

pub async fn discover(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(_query): Query<DiscoverQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(smart_matches(&state, claims.sub).await?))
}

// -- Service --

/// Create a pending match request. One match per unordered pair per
/// restaurant, whatever its status.
pub async fn request_match(
    state: &AppState,
    requester_id: Uuid,
    req: MatchRequestBody,
) -> Result<MatchResponse, ApiError> {
    if requester_id == req.receiver_id {
        return Err(ApiError::Validation("cannot match with yourself".into()));
    }

    let db = state.db.clone();
    let outcome = crate::blocking(move || {
        if db.get_user_by_id(&req.receiver_id.to_string())?.is_none() {
            return Ok(RequestOutcome::NoReceiver);
        }
        if db.get_restaurant(&req.restaurant_id.to_string())?.is_none() {
            return Ok(RequestOutcome::NoRestaurant);
        }
        let row = db.create_match(
            &Uuid::new_v4().to_string(),
            &requester_id.to_string(),
            &req.receiver_id.to_string(),
            &req.restaurant_id.to_string(),
        )?;
        Ok(match row {
            Some(row) => RequestOutcome::Created(row),
            None => RequestOutcome::Duplicate,
        })
    })
    .await?;

    match outcome {
        RequestOutcome::NoReceiver => Err(ApiError::NotFound("receiver not found".into())),
        RequestOutcome::NoRestaurant => Err(ApiError::NotFound("restaurant not found".into())),
        RequestOutcome::Duplicate => Err(ApiError::Conflict(
            "a match already exists for this pair at this restaurant".into(),
        )),
        RequestOutcome::Created(row) => Ok(match_response(row)),
    }
}

enum RequestOutcome {
    Created(MatchRow),
    Duplicate,
    NoReceiver,
    NoRestaurant,
}

/// Receiver-only transition pending -> accepted. Fans out `match_accepted`
/// to the requester, with push fallback if they are offline.
pub async fn accept_match(
    state: &AppState,
    match_id: Uuid,
    acting_user: Uuid,
    acting_name: &str,
) -> Result<MatchResponse, ApiError> {
    let db = state.db.clone();
    let (row, restaurant_name) = crate::blocking(move || {
        let row = db.get_match(&match_id.to_string())?;
        let name = match &row {
            Some(row) => db.get_restaurant_name(&row.restaurant_id)?,
            None => None,
        };
        Ok((row, name))
    })
    .await?;

    let row = row.ok_or_else(|| ApiError::NotFound("match not found".into()))?;
    if row.receiver_id != acting_user.to_string() {
        return Err(ApiError::Forbidden(
            "only the receiver can accept a match".into(),
        ));
    }
    match status_of(&row) {
        MatchStatus::Pending => {}
        MatchStatus::Accepted | MatchStatus::Completed => {
            return Err(ApiError::Validation("match already accepted".into()));
        }
        MatchStatus::Rejected => {
            return Err(ApiError::Validation("match already rejected".into()));
        }
    }

    let db = state.db.clone();
    let updated = crate::blocking(move || {
        db.update_match_status(&match_id.to_string(), MatchStatus::Accepted.as_str())?;
        db.get_match(&match_id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    let requester = parse_uuid(&updated.requester_id);
    let restaurant_name = restaurant_name.unwrap_or_default();
    notify_user(
        state,
        requester,
        GatewayEvent::MatchAccepted {
            match_id,
            accepted_by: acting_user,
            restaurant_name: restaurant_name.clone(),
        },
        PushNote {
            title: "Match accepted".into(),
            body: format!("{} accepted your match request", acting_name),
            data: serde_json::json!({ "match_id": match_id, "restaurant_name": restaurant_name }),
        },
    );

    Ok(match_response(updated))
}

/// Receiver-only transition pending -> rejected.
pub async fn reject_match(
    state: &AppState,
    match_id: Uuid,
    acting_user: Uuid,
) -> Result<MatchResponse, ApiError> {
    let db = state.db.clone();
    let row = crate::blocking(move || db.get_match(&match_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    if row.receiver_id != acting_user.to_string() {
        return Err(ApiError::Forbidden(
            "only the receiver can reject a match".into(),
        ));
    }
    if status_of(&row) != MatchStatus::Pending {
        return Err(ApiError::Validation(
            "only a pending match can be rejected".into(),
        ));
    }

    let db = state.db.clone();
    let updated = crate::blocking(move || {
        db.update_match_status(&match_id.to_string(), MatchStatus::Rejected.as_str())?;
        db.get_match(&match_id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    Ok(match_response(updated))
}

/// Either participant, any status. Hard delete: messages, conversation and
/// ratings cascade away with no tombstone.
pub async fn delete_match(
    state: &AppState,
    match_id: Uuid,
    acting_user: Uuid,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let row = crate::blocking(move || db.get_match(&match_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".into()))?;

    if !row.is_participant(&acting_user.to_string()) {
        return Err(ApiError::NotFound("match not found".into()));
    }

    let db = state.db.clone();
    let deleted = crate::blocking(move || db.delete_match(&match_id.to_string())).await?;
    if deleted {
        Ok(())
    } else {
        Err(ApiError::NotFound("match not found".into()))
    }
}

/// All of the caller's matches, ranked by pairwise compatibility with the
/// other participant (ties keep recency order).
pub async fn my_matches(state: &AppState, user_id: Uuid) -> Result<Vec<MatchOverview>, ApiError> {
    let db = state.db.clone();
    let (me, rows) = crate::blocking(move || {
        let me = db.get_profile(&user_id.to_string())?;
        let matches = db.matches_for_user(&user_id.to_string())?;
        let mut rows = Vec::with_capacity(matches.len());
        for row in matches {
            let other = db.get_profile(row.other_participant(&user_id.to_string()))?;
            let restaurant = db.get_restaurant_name(&row.restaurant_id)?;
            rows.push((row, other, restaurant));
        }
        Ok((me, rows))
    })
    .await?;

    let me = me.ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    let my_slice = me.slice();

    let mut overviews: Vec<MatchOverview> = rows
        .into_iter()
        .filter_map(|(row, other, restaurant)| {
            let other = other?;
            let score = pairwise_score(&my_slice, &other.slice());
            Some(match_overview(row, &other, restaurant, score))
        })
        .collect();

    overviews.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
    Ok(overviews)
}

/// Incoming pending requests, newest first (no compatibility re-ranking).
pub async fn pending_matches(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<MatchOverview>, ApiError> {
    let db = state.db.clone();
    let (me, rows) = crate::blocking(move || {
        let me = db.get_profile(&user_id.to_string())?;
        let matches = db.pending_received(&user_id.to_string())?;
        let mut rows = Vec::with_capacity(matches.len());
        for row in matches {
            let requester = db.get_profile(&row.requester_id)?;
            let restaurant = db.get_restaurant_name(&row.restaurant_id)?;
            rows.push((row, requester, restaurant));
        }
        Ok((me, rows))
    })
    .await?;

    let me = me.ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    let my_slice = me.slice();

    Ok(rows
        .into_iter()
        .filter_map(|(row, requester, restaurant)| {
            let requester = requester?;
            let score = pairwise_score(&my_slice, &requester.slice());
            Some(match_overview(row, &requester, restaurant, score))
        })
        .collect())
}

/// Smart discovery: recent diners, minus anyone the caller already has a
/// pending/accepted/rejected match with, scored by the discovery strategy
/// and capped after ranking.
pub async fn smart_matches(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<SmartMatchCandidate>, ApiError> {
    let db = state.db.clone();
    let window_days = state.windows.discovery_window_days;

    let (me, my_history, pool) = crate::blocking(move || {
        let me = db.get_profile(&user_id.to_string())?;
        let my_history = db.recent_restaurants_for(&user_id.to_string(), window_days)?;

        let excluded: HashSet<String> =
            db.matched_counterparts(&user_id.to_string())?.into_iter().collect();

        let mut pool = Vec::new();
        for profile in db.recent_diners(&user_id.to_string(), window_days)? {
            if excluded.contains(&profile.user_id) {
                continue;
            }
            let history = db.recent_restaurants_for(&profile.user_id, window_days)?;
            pool.push((profile, history));
        }
        Ok((me, my_history, pool))
    })
    .await?;

    let me = me.ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    let my_candidate = candidate_profile(&me, my_history);

    let mut scored: Vec<SmartMatchCandidate> = pool
        .into_iter()
        .map(|(profile, history)| {
            let candidate = candidate_profile(&profile, history);
            let breakdown = DiscoveryScorer.score(&my_candidate, &candidate);
            SmartMatchCandidate {
                user: diner_profile(&profile),
                compatibility_score: breakdown.score,
                reasons: breakdown.reasons,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
    scored.truncate(state.windows.discovery_limit);
    Ok(scored)
}

// -- Conversions --

fn status_of(row: &MatchRow) -> MatchStatus {
    MatchStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt match status '{}' on {}", row.status, row.id);
        MatchStatus::Pending
    })
}

pub(crate) fn match_response(row: MatchRow) -> MatchResponse {
    let status = status_of(&row);
    MatchResponse {
        id: parse_uuid(&row.id),
        requester_id: parse_uuid(&row.requester_id),
        receiver_id: parse_uuid(&row.receiver_id),
        restaurant_id: parse_uuid(&row.restaurant_id),
        status,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn match_overview(
    row: MatchRow,
    other: &ProfileRow,
    restaurant_name: Option<String>,
    score: u8,
) -> MatchOverview {
    let status = status_of(&row);
    MatchOverview {
        id: parse_uuid(&row.id),
        status,
        restaurant_id: parse_uuid(&row.restaurant_id),
        restaurant_name: restaurant_name.unwrap_or_default(),
        other_user: diner_profile(other),
        compatibility_score: score,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn candidate_profile(row: &ProfileRow, history: Vec<(String, String)>) -> CandidateProfile {
    CandidateProfile {
        profile: row.slice(),
        username: row.username.clone(),
        occupation: row.occupation.clone(),
        photo_verified: row.photo_verified,
        social_verified: row.social_verified,
        recent_restaurants: history
            .into_iter()
            .map(|(id, name)| RestaurantRef {
                id: parse_uuid(&id),
                name,
            })
            .collect(),
    }
}
