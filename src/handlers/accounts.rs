// src/handlers/accounts.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::policy::Policy,
    models::{
        auth::{CreateDriverPayload, ResetDriverPasswordPayload, User},
        tracking::events,
    },
};

// POST /create-driver-account
//
// Gestão de contas é papel do painel: admin ou despachante, nunca motorista.
#[utoipa::path(
    post,
    path = "/create-driver-account",
    tag = "Accounts",
    request_body = CreateDriverPayload,
    responses(
        (status = 201, description = "Conta de motorista criada", body = User),
        (status = 403, description = "Somente admin/despachante"),
        (status = 409, description = "E-mail já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_driver_account(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<CreateDriverPayload>,
) -> Result<impl IntoResponse, AppError> {
    policy.require_admin_or_dispatcher()?;
    payload.validate().map_err(AppError::ValidationError)?;

    let driver = app_state
        .auth_service
        .create_driver_account(
            policy.tenant_id(),
            &payload.email,
            &payload.password,
            &payload.full_name,
        )
        .await?;

    app_state
        .audit_repo
        .record_best_effort(
            policy.tenant_id(),
            None,
            Some(policy.user_id()),
            events::DRIVER_ACCOUNT_CREATED,
            Some(json!({ "driverId": driver.id })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(driver)))
}

// POST /reset-driver-password
#[utoipa::path(
    post,
    path = "/reset-driver-password",
    tag = "Accounts",
    request_body = ResetDriverPasswordPayload,
    responses(
        (status = 200, description = "Senha redefinida"),
        (status = 403, description = "Somente admin/despachante"),
        (status = 404, description = "Motorista não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reset_driver_password(
    State(app_state): State<AppState>,
    policy: Policy,
    Json(payload): Json<ResetDriverPasswordPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    policy.require_admin_or_dispatcher()?;
    payload.validate().map_err(AppError::ValidationError)?;

    app_state
        .auth_service
        .reset_driver_password(policy.tenant_id(), payload.driver_id, &payload.new_password)
        .await?;

    app_state
        .audit_repo
        .record_best_effort(
            policy.tenant_id(),
            None,
            Some(policy.user_id()),
            events::DRIVER_PASSWORD_RESET,
            Some(json!({ "driverId": payload.driver_id })),
        )
        .await;

    Ok(Json(json!({ "ok": true })))
}
