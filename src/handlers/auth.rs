// src/handlers/auth.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::auth::{AuthResponse, LoginUserPayload, User},
};

// Handler de login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Token emitido", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let token = app_state
        .auth_service
        .login_user(&payload.email, &payload.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Usuário autenticado", body = User)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

// A transportadora do usuário autenticado (nome exibido no app e no painel)
#[utoipa::path(
    get,
    path = "/api/tenants/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Tenant do usuário", body = crate::models::tenancy::Tenant)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_tenant(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<crate::models::tenancy::Tenant>, AppError> {
    let tenant = app_state
        .tenant_repo
        .find_by_id(user.tenant_id)
        .await?
        .ok_or_else(|| AppError::Configuration("Tenant do usuário não existe.".to_string()))?;

    Ok(Json(tenant))
}
