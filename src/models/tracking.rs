// src/models/tracking.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::orders::OrderStatus;

// Nomes dos eventos do audit_log. Strings livres no banco, constantes aqui.
pub mod events {
    pub const QR_CODE_SCANNED: &str = "QR_CODE_SCANNED";
    pub const ORDER_CREATED: &str = "ORDER_CREATED";
    pub const ORDER_STATUS_CHANGED: &str = "ORDER_STATUS_CHANGED";
    pub const LOAD_ACTIVATED: &str = "LOAD_ACTIVATED";
    pub const TRACKING_STARTED: &str = "TRACKING_STARTED";
    pub const TRACKING_STOPPED: &str = "TRACKING_STOPPED";
    pub const DRIVER_ACCOUNT_CREATED: &str = "DRIVER_ACCOUNT_CREATED";
    pub const DRIVER_PASSWORD_RESET: &str = "DRIVER_PASSWORD_RESET";
}

// Amostra de localização persistida. Append-only: nunca é alterada.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    // EWKT: SRID=4326;POINT(lon lat)
    pub location: String,
    pub recorded_at: DateTime<Utc>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub battery_level: Option<f64>,
}

// A sessão de rastreamento ativa de um motorista. Uma linha por motorista:
// iniciar uma nova sessão substitui a anterior (upsert).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub driver_id: Uuid,
    pub order_id: Uuid,
    pub started_at: DateTime<Utc>,
}

// Evento de mudança de status, um por transição observável.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub id: Uuid,
    pub order_id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub changed_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub order_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    #[schema(example = "QR_CODE_SCANNED")]
    pub event: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingPayload {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationPayload {
    pub order_id: Uuid,
    #[schema(example = -23.5505)]
    pub latitude: f64,
    #[schema(example = -46.6333)]
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Nível de bateria entre 0 e 100."))]
    pub battery_level: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationResponse {
    // false quando a amostra foi descartada pelo throttle
    pub accepted: bool,
    pub update: Option<LocationUpdate>,
}
