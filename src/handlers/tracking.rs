// src/handlers/tracking.rs

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::policy::Policy,
    models::tracking::{
        StartTrackingPayload, TrackingSession, UpdateLocationPayload, UpdateLocationResponse,
    },
};

// POST /start-tracking
//
// Iniciar com outra sessão ativa substitui a anterior: uma sessão por
// motorista, sempre.
#[utoipa::path(
    post,
    path = "/start-tracking",
    tag = "Tracking",
    request_body = StartTrackingPayload,
    responses(
        (status = 200, description = "Sessão de rastreamento ativa", body = TrackingSession),
        (status = 403, description = "Não é motorista ou pedido de outro motorista"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn start_tracking(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<StartTrackingPayload>,
) -> Result<Json<TrackingSession>, AppError> {
    policy.require_driver()?;

    let session = app_state
        .location_service
        .start_tracking(&policy.user, payload.order_id)
        .await?;

    Ok(Json(session))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopTrackingResponse {
    pub stopped: bool,
}

// POST /stop-tracking
#[utoipa::path(
    post,
    path = "/stop-tracking",
    tag = "Tracking",
    responses(
        (status = 200, description = "Sessão encerrada (stopped=false se não havia)", body = StopTrackingResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn stop_tracking(
    State(app_state): State<AppState>,
    policy: Policy,
) -> Result<Json<StopTrackingResponse>, AppError> {
    policy.require_driver()?;

    let stopped = app_state.location_service.stop_tracking(&policy.user).await?;

    Ok(Json(StopTrackingResponse { stopped }))
}

// POST /update-location
//
// Amostra aceita vira LocationUpdate + última posição do motorista.
// Amostra dentro dos limiares de throttle volta accepted=false.
#[utoipa::path(
    post,
    path = "/update-location",
    tag = "Tracking",
    request_body = UpdateLocationPayload,
    responses(
        (status = 200, description = "Amostra processada", body = UpdateLocationResponse),
        (status = 400, description = "Coordenadas fora da faixa"),
        (status = 403, description = "Não é motorista ou pedido de outro motorista"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_location(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<UpdateLocationPayload>,
) -> Result<Json<UpdateLocationResponse>, AppError> {
    policy.require_driver()?;
    payload.validate().map_err(AppError::ValidationError)?;

    let response = app_state
        .location_service
        .record_update(&policy.user, payload)
        .await?;

    Ok(Json(response))
}
