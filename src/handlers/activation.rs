// src/handlers/activation.rs

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::policy::Policy,
    models::orders::{LoadActivation, Order},
};

// Corpo em snake_case: paridade com o app do motorista.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivateLoadPayload {
    pub order_id: Uuid,
    // WKT, {latitude, longitude} ou GeoJSON Point
    #[schema(value_type = Option<Object>)]
    pub location: Option<serde_json::Value>,
    pub location_address: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub device_info: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivateLoadResponse {
    pub activation: LoadActivation,
    pub order: Order,
}

// POST /activate-load
#[utoipa::path(
    post,
    path = "/activate-load",
    tag = "Activation",
    request_body = ActivateLoadPayload,
    responses(
        (status = 200, description = "Carga ativada", body = ActivateLoadResponse),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Não é motorista ou pedido de outro motorista"),
        (status = 404, description = "Pedido não encontrado"),
        (status = 409, description = "Status errado ou carga já ativada")
    ),
    security(("api_jwt" = []))
)]
pub async fn activate_load(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<ActivateLoadPayload>,
) -> Result<Json<ActivateLoadResponse>, AppError> {
    policy.require_driver()?;

    let (activation, order) = app_state
        .activation_service
        .activate_load(
            &policy.user,
            payload.order_id,
            payload.location,
            payload.location_address,
            payload.device_info,
            payload.notes,
        )
        .await?;

    Ok(Json(ActivateLoadResponse { activation, order }))
}
