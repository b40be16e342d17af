// src/handlers/orders.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::policy::Policy,
    models::{orders::CreateOrderData, tracking::events},
    services::order_creation::OrderCreationResult,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationPayload {
    // Option de propósito: ausência responde 400 "missing data".
    pub order_data: Option<CreateOrderData>,
}

// POST /order_creation
//
// O pipeline completo: pedido + registro de QR + imagem renderizada + upload
// + vínculo. Qualquer falha desfaz as etapas anteriores antes do 500.
#[utoipa::path(
    post,
    path = "/order_creation",
    tag = "Orders",
    request_body = OrderCreationPayload,
    responses(
        (status = 200, description = "Pedido criado com QR Code vinculado", body = OrderCreationResult),
        (status = 400, description = "orderData ausente ou inválido"),
        (status = 403, description = "Somente admin/despachante"),
        (status = 500, description = "Falha em alguma etapa (rollback executado)")
    ),
    security(("api_jwt" = []))
)]
pub async fn order_creation(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<OrderCreationPayload>,
) -> Result<Json<OrderCreationResult>, AppError> {
    policy.require_admin_or_dispatcher()?;

    let Some(order_data) = payload.order_data else {
        return Err(AppError::BadRequest(
            "O campo orderData é obrigatório.".to_string(),
        ));
    };
    order_data.validate().map_err(AppError::ValidationError)?;

    let result = app_state
        .order_creation_service
        .create_order(policy.tenant_id(), policy.user_id(), order_data)
        .await?;

    // Auditoria de criação fora da saga: falha aqui não desfaz nada.
    app_state
        .audit_repo
        .record_best_effort(
            policy.tenant_id(),
            Some(result.order.id),
            Some(policy.user_id()),
            events::ORDER_CREATED,
            Some(json!({
                "orderNumber": result.order.order_number,
                "qrCodeUrl": result.qr_code_url,
            })),
        )
        .await;

    Ok(Json(result))
}
