// src/models/orders.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Enums ---

// Ciclo de vida do pedido. A cadeia linear segue a operação física da carga;
// `cancelled` é alcançável de qualquer estado não terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    Activated,
    InProgress,
    InTransit,
    Arrived,
    Loading,
    Loaded,
    Unloading,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Activated => "activated",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Arrived => "arrived",
            OrderStatus::Loading => "loading",
            OrderStatus::Loaded => "loaded",
            OrderStatus::Unloading => "unloading",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    // O próximo estado da cadeia linear, se houver.
    pub fn next_in_chain(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Assigned),
            OrderStatus::Assigned => Some(OrderStatus::Activated),
            OrderStatus::Activated => Some(OrderStatus::InProgress),
            OrderStatus::InProgress => Some(OrderStatus::InTransit),
            OrderStatus::InTransit => Some(OrderStatus::Arrived),
            OrderStatus::Arrived => Some(OrderStatus::Loading),
            OrderStatus::Loading => Some(OrderStatus::Loaded),
            OrderStatus::Loaded => Some(OrderStatus::Unloading),
            OrderStatus::Unloading => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled => None,
        }
    }

    // Toda transição persistida passa por aqui.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Cancelled {
            return true;
        }
        self.next_in_chain() == Some(next)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Structs de domínio ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[schema(ignore)] // O tenant vem do token, ocultamos da doc pública
    pub tenant_id: Uuid,
    #[schema(example = "ORD-20260807-A1B2C3")]
    pub order_number: String,
    pub status: OrderStatus,
    pub assigned_driver_id: Option<Uuid>,

    // Vínculo com o QR Code gerado na criação
    pub qr_code_id: Option<Uuid>,
    pub qr_code_data: Option<String>,
    #[serde(skip_serializing)] // A assinatura nunca volta para o cliente
    pub qr_code_signature: Option<String>,
    pub qr_code_expires_at: Option<DateTime<Utc>>,

    // Ponto de carregamento
    #[schema(example = "CD Guarulhos")]
    pub loading_point_name: String,
    pub loading_point_address: Option<String>,
    // Geografia em EWKT: SRID=4326;POINT(lon lat)
    pub loading_point_location: Option<String>,
    pub loading_window_start: Option<DateTime<Utc>>,
    pub loading_window_end: Option<DateTime<Utc>>,

    // Ponto de descarregamento
    #[schema(example = "Filial Curitiba")]
    pub unloading_point_name: String,
    pub unloading_point_address: Option<String>,
    pub unloading_point_location: Option<String>,
    pub unloading_window_start: Option<DateTime<Utc>>,
    pub unloading_window_end: Option<DateTime<Utc>>,

    #[schema(example = json!([{"name": "Posto km 402", "latitude": -24.95, "longitude": -48.11}]))]
    pub waypoints: Option<serde_json::Value>,
    pub notes: Option<String>,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    // Projeção devolvida ao app do motorista após o scan: somente os campos
    // necessários, sem assinatura nem dados internos do tenant.
    pub fn to_projection(&self) -> OrderProjection {
        OrderProjection {
            id: self.id,
            order_number: self.order_number.clone(),
            status: self.status,
            assigned_driver_id: self.assigned_driver_id,
            loading_point_name: self.loading_point_name.clone(),
            loading_point_address: self.loading_point_address.clone(),
            unloading_point_name: self.unloading_point_name.clone(),
            unloading_point_address: self.unloading_point_address.clone(),
            qr_code_expires_at: self.qr_code_expires_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderProjection {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub assigned_driver_id: Option<Uuid>,
    pub loading_point_name: String,
    pub loading_point_address: Option<String>,
    pub unloading_point_name: String,
    pub unloading_point_address: Option<String>,
    pub qr_code_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// Registro do QR Code gerado para um pedido
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "7f9c24e8d3ab4c12")]
    pub tracking_code: String,
    // O conteúdo bruto do QR (JSON assinado em base64)
    pub payload: String,
    #[serde(skip_serializing)]
    pub signature: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Ativação de carga: no máximo uma por pedido (UNIQUE em order_id).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadActivation {
    pub id: Uuid,
    pub order_id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub driver_id: Uuid,
    pub activated_at: DateTime<Utc>,
    pub location: Option<String>,
    pub location_address: Option<String>,
    pub device_info: Option<serde_json::Value>,
    pub notes: Option<String>,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointPayload {
    #[validate(length(min = 1, message = "O nome do ponto é obrigatório."))]
    #[schema(example = "CD Guarulhos")]
    pub name: String,
    pub address: Option<String>,
    // Aceita WKT, {latitude, longitude} ou GeoJSON Point
    #[schema(value_type = Option<Object>)]
    pub location: Option<serde_json::Value>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

// O "orderData" do POST /order_creation
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderData {
    // Se omitido, o número é gerado (ORD-<data>-<sufixo>)
    pub order_number: Option<String>,
    #[validate(nested)]
    pub loading_point: PointPayload,
    #[validate(nested)]
    pub unloading_point: PointPayload,
    pub assigned_driver_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub waypoints: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    const CHAIN: [super::OrderStatus; 10] = [
        Pending, Assigned, Activated, InProgress, InTransit, Arrived, Loading, Loaded, Unloading,
        Completed,
    ];

    #[test]
    fn forward_chain_is_accepted_step_by_step() {
        for pair in CHAIN.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} deveria ser aceito",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!Pending.can_transition_to(Activated));
        assert!(!Assigned.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Arrived));
        assert!(!Loading.can_transition_to(Completed));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!Assigned.can_transition_to(Pending));
        assert!(!InTransit.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Unloading));
    }

    #[test]
    fn cancelled_is_reachable_from_every_non_terminal_state() {
        for status in CHAIN.iter().filter(|s| !s.is_terminal()) {
            assert!(
                status.can_transition_to(Cancelled),
                "{} -> cancelled deveria ser aceito",
                status
            );
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for target in CHAIN {
            assert!(!Completed.can_transition_to(target));
            assert!(!Cancelled.can_transition_to(target));
        }
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }
}
