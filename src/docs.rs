// src/docs.rs

use axum::Json;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,
        handlers::auth::get_my_tenant,

        // --- QR Code ---
        handlers::qr::create_qr_signature,
        handlers::qr::validate_qr_code,
        handlers::qr::update_order_status,

        // --- Orders ---
        handlers::orders::order_creation,

        // --- Activation ---
        handlers::activation::activate_load,

        // --- Tracking ---
        handlers::tracking::start_tracking,
        handlers::tracking::stop_tracking,
        handlers::tracking::update_location,

        // --- Accounts ---
        handlers::accounts::create_driver_account,
        handlers::accounts::reset_driver_password,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::Role,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::CreateDriverPayload,
            models::auth::ResetDriverPasswordPayload,
            models::tenancy::Tenant,

            // --- Orders ---
            models::orders::Order,
            models::orders::OrderStatus,
            models::orders::OrderProjection,
            models::orders::QrCodeRecord,
            models::orders::LoadActivation,
            models::orders::CreateOrderData,
            models::orders::PointPayload,

            // --- Tracking ---
            models::tracking::LocationUpdate,
            models::tracking::TrackingSession,
            models::tracking::StatusUpdate,
            models::tracking::AuditLogEntry,
            models::tracking::StartTrackingPayload,
            models::tracking::UpdateLocationPayload,
            models::tracking::UpdateLocationResponse,

            // --- QR ---
            services::signature::QrPayload,
            services::order_creation::OrderCreationResult,
            handlers::qr::CreateQrSignaturePayload,
            handlers::qr::SignatureResponse,
            handlers::qr::ValidateQrCodePayload,
            handlers::qr::UpdateOrderStatusPayload,
            handlers::activation::ActivateLoadPayload,
            handlers::activation::ActivateLoadResponse,
            handlers::tracking::StopTrackingResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Autenticação e sessão"),
        (name = "QR Code", description = "Assinatura e scan de QR Codes"),
        (name = "Orders", description = "Criação e ciclo de vida de pedidos"),
        (name = "Activation", description = "Ativação de carga"),
        (name = "Tracking", description = "Rastreamento de localização"),
        (name = "Accounts", description = "Gestão de contas de motorista"),
    ),
    info(
        title = "Rastreio Logístico API",
        description = "Backend multi-tenant de rastreamento de pedidos com QR Code",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_jwt",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

// GET /api/docs/openapi.json
pub async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
