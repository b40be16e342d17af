// src/handlers/qr.rs

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, middleware::policy::Policy,
    models::orders::OrderProjection,
};

// =============================================================================
//  1. ASSINATURA DE PAYLOAD (POST /create-qr-signature)
// =============================================================================

// Campos opcionais de propósito: ausência responde 400, não 422.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrSignaturePayload {
    pub order_id: Option<Uuid>,
    #[schema(example = 1770000000000i64)]
    pub timestamp: Option<i64>,
    // Aceito por compatibilidade com os apps; não entra na string canônica.
    #[allow(dead_code)]
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignatureResponse {
    pub signature: String,
}

#[utoipa::path(
    post,
    path = "/create-qr-signature",
    tag = "QR Code",
    request_body = CreateQrSignaturePayload,
    responses(
        (status = 200, description = "Assinatura calculada", body = SignatureResponse),
        (status = 400, description = "Campos obrigatórios ausentes")
    )
)]
pub async fn create_qr_signature(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateQrSignaturePayload>,
) -> Result<Json<SignatureResponse>, AppError> {
    let (Some(order_id), Some(timestamp)) = (payload.order_id, payload.timestamp) else {
        return Err(AppError::BadRequest(
            "Os campos orderId e timestamp são obrigatórios.".to_string(),
        ));
    };

    let signature = app_state.signature_service.sign(order_id, timestamp)?;

    Ok(Json(SignatureResponse { signature }))
}

// =============================================================================
//  2. SCAN DE QR CODE (POST /validate-qr-code)
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrCodePayload {
    pub qr_code_data: Option<String>,
}

#[utoipa::path(
    post,
    path = "/validate-qr-code",
    tag = "QR Code",
    request_body = ValidateQrCodePayload,
    responses(
        (status = 200, description = "Projeção do pedido após o scan", body = OrderProjection),
        (status = 400, description = "qrCodeData ausente"),
        (status = 401, description = "Código expirado ou assinatura inválida"),
        (status = 403, description = "Acesso negado ou pedido de outro motorista"),
        (status = 404, description = "Pedido não encontrado"),
        (status = 409, description = "Ativação de carga pendente")
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_qr_code(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<ValidateQrCodePayload>,
) -> Result<Json<OrderProjection>, AppError> {
    let Some(qr_code_data) = payload.qr_code_data.filter(|d| !d.trim().is_empty()) else {
        return Err(AppError::BadRequest(
            "O campo qrCodeData é obrigatório.".to_string(),
        ));
    };

    let projection = app_state
        .qr_lifecycle_service
        .validate_and_advance(&qr_code_data, &policy.user)
        .await?;

    Ok(Json(projection))
}

// =============================================================================
//  3. TRANSIÇÃO EXPLÍCITA DE STATUS (POST /update-order-status)
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusPayload {
    pub order_id: Uuid,
    #[schema(example = "in_transit")]
    pub status: crate::models::orders::OrderStatus,
    pub note: Option<String>,
}

#[utoipa::path(
    post,
    path = "/update-order-status",
    tag = "Orders",
    request_body = UpdateOrderStatusPayload,
    responses(
        (status = 200, description = "Pedido atualizado", body = crate::models::orders::Order),
        (status = 403, description = "Papel ou atribuição não permitem a mudança"),
        (status = 404, description = "Pedido não encontrado"),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_order_status(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<Json<crate::models::orders::Order>, AppError> {
    let order = app_state
        .qr_lifecycle_service
        .transition_order(
            &policy.user,
            payload.order_id,
            payload.status,
            payload.note.as_deref(),
        )
        .await?;

    Ok(Json(order))
}
