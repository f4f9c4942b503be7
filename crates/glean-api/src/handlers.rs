use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use glean_commands::{compliance, demand, events, listing, matches, ops, profile, tasks};
use glean_commands::Actor;
use glean_store::Repository as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::RequestId;
use crate::error::ApiError;
use crate::state::AppState;

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state
        .services
        .store
        .listings
        .list(1)
        .await
        .map(|_| StatusCode::OK)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

// ── Shared body shapes ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct JustificationBody {
    pub justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequiredJustificationBody {
    pub justification: String,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsBody {
    pub listing_id: String,
}

// ── Profile ───────────────────────────────────────────────────────────────────

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let found = profile::get_profile(&state.services, &actor, None)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn get_profile_by_id(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = profile::get_profile(&state.services, &actor, Some(&user_id))
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn put_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<profile::UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = profile::upsert_profile(&state.services, &actor, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

// ── Supply ────────────────────────────────────────────────────────────────────

pub async fn create_supply(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<listing::CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = listing::create_listing(&state.services, &actor, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn list_supply(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(filter): Query<listing::ListingFilter>,
) -> Result<Json<Value>, ApiError> {
    let found = listing::list_listings(&state.services, &actor, filter)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn get_supply(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = listing::get_listing(&state.services, &actor, &id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn update_supply(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<listing::UpdateListingRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = listing::update_listing(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

pub async fn cancel_supply(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<JustificationBody>,
) -> Result<Json<Value>, ApiError> {
    let canceled = listing::cancel_listing(
        &state.services,
        &actor,
        &id,
        body.justification.as_deref(),
        &request_id,
    )
    .await
    .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(canceled)))
}

// ── Demand ────────────────────────────────────────────────────────────────────

pub async fn create_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<demand::CreateDemandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = demand::create_demand(&state.services, &actor, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn list_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(filter): Query<demand::DemandFilter>,
) -> Result<Json<Value>, ApiError> {
    let found = demand::list_demands(&state.services, &actor, filter)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn get_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = demand::get_demand(&state.services, &actor, &id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn update_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<demand::UpdateDemandRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = demand::update_demand(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

pub async fn close_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let closed = demand::close_demand(&state.services, &actor, &id, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(closed)))
}

pub async fn cancel_demand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<JustificationBody>,
) -> Result<Json<Value>, ApiError> {
    let canceled = demand::cancel_demand(
        &state.services,
        &actor,
        &id,
        body.justification.as_deref(),
        &request_id,
    )
    .await
    .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(canceled)))
}

// ── Matches ───────────────────────────────────────────────────────────────────

pub async fn run_recommendations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<RecommendationsBody>,
) -> Result<Json<Value>, ApiError> {
    let report = matches::run_recommendations(&state.services, &actor, &body.listing_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(report)))
}

pub async fn list_matches(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(filter): Query<matches::MatchFilter>,
) -> Result<Json<Value>, ApiError> {
    let found = matches::list_matches(&state.services, &actor, filter)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn get_match(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = matches::get_match(&state.services, &actor, &id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn accept_match(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let accepted = matches::accept_match(&state.services, &actor, &id, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(accepted)))
}

pub async fn reject_match(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<JustificationBody>,
) -> Result<Json<Value>, ApiError> {
    let rejected = matches::reject_match(
        &state.services,
        &actor,
        &id,
        body.justification.as_deref(),
        &request_id,
    )
    .await
    .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(rejected)))
}

pub async fn schedule_match(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<matches::ScheduleMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = matches::schedule_match(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok((StatusCode::CREATED, Json(json!(task))))
}

// ── Driver ────────────────────────────────────────────────────────────────────

pub async fn list_driver_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let found = tasks::list_driver_tasks(&state.services, &actor)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = tasks::get_task(&state.services, &actor, &id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn post_task_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<tasks::TaskStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = tasks::update_task_status(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

pub async fn post_task_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<tasks::TaskLocationRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = tasks::update_task_location(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

// ── Compliance ────────────────────────────────────────────────────────────────

pub async fn compliance_queue(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let queue = compliance::compliance_queue(&state.services, &actor)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(queue)))
}

pub async fn approve_compliance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(match_id): Path<String>,
    Json(body): Json<RequiredJustificationBody>,
) -> Result<Json<Value>, ApiError> {
    let approved = compliance::approve_match(
        &state.services,
        &actor,
        &match_id,
        &body.justification,
        &request_id,
    )
    .await
    .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(approved)))
}

pub async fn block_compliance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(match_id): Path<String>,
    Json(body): Json<RequiredJustificationBody>,
) -> Result<Json<Value>, ApiError> {
    let blocked = compliance::block_match(
        &state.services,
        &actor,
        &match_id,
        &body.justification,
        &request_id,
    )
    .await
    .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(blocked)))
}

// ── Ops ───────────────────────────────────────────────────────────────────────

pub async fn ops_dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let board = ops::dashboard(&state.services, &actor)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(board)))
}

pub async fn ops_stuck(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let stuck = ops::stuck_entities(&state.services, &actor)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(stuck)))
}

pub async fn ops_override_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<ops::TaskOverrideRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = ops::override_task(&state.services, &actor, &id, body, &request_id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}

pub async fn ops_audit_export(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<ops::AuditExportQuery>,
) -> Result<Json<Value>, ApiError> {
    let events = ops::export_audit(&state.services, &actor, query)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(events)))
}

// ── Events & notifications ────────────────────────────────────────────────────

pub async fn poll_events(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<events::EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let found = events::poll_events(&state.services, &actor, query)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let found = profile::list_notifications(&state.services, &actor, 100)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(found)))
}

pub async fn read_notification(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let updated = profile::mark_notification_read(&state.services, &actor, &id)
        .await
        .map_err(|e| ApiError::of(e, &request_id))?;
    Ok(Json(json!(updated)))
}
