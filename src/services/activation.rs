// src/services/activation.rs

use serde_json::json;

use crate::{
    common::{error::AppError, geo::parse_point_value},
    db::{ActivationRepository, AuditRepository, OrderRepository},
    models::{
        auth::{Role, User},
        orders::{LoadActivation, Order, OrderStatus},
        tracking::events,
    },
};

// Ativação de carga: a ação única do motorista confirmando que o carregamento
// físico começou. Destrava a progressão via QR depois de 'assigned'.
#[derive(Clone)]
pub struct ActivationService {
    orders: OrderRepository,
    activations: ActivationRepository,
    audit: AuditRepository,
}

impl ActivationService {
    pub fn new(
        orders: OrderRepository,
        activations: ActivationRepository,
        audit: AuditRepository,
    ) -> Self {
        Self {
            orders,
            activations,
            audit,
        }
    }

    pub async fn activate_load(
        &self,
        actor: &User,
        order_id: uuid::Uuid,
        location: Option<serde_json::Value>,
        location_address: Option<String>,
        device_info: Option<serde_json::Value>,
        notes: Option<String>,
    ) -> Result<(LoadActivation, Order), AppError> {
        // Só motorista ativa carga.
        if actor.role != Role::Driver {
            return Err(AppError::RoleNotAllowed(actor.role.as_str()));
        }

        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        if order.tenant_id != actor.tenant_id {
            return Err(AppError::AccessDenied);
        }
        if order.assigned_driver_id != Some(actor.id) {
            return Err(AppError::NotAssigned);
        }

        // Checagem amigável primeiro; a garantia real é a UNIQUE(order_id)
        // no insert logo abaixo.
        if self.activations.exists_for_order(order.id).await? {
            return Err(AppError::AlreadyActivated);
        }
        if order.status != OrderStatus::Assigned {
            return Err(AppError::InvalidTransition(
                order.status,
                OrderStatus::Activated,
            ));
        }

        let location_wkt = match &location {
            Some(value) => Some(parse_point_value(value)?.to_wkt()),
            None => None,
        };

        let activation = self
            .activations
            .insert(
                order.id,
                order.tenant_id,
                actor.id,
                location_wkt.as_deref(),
                location_address.as_deref(),
                device_info.as_ref(),
                notes.as_deref(),
            )
            .await?;

        let updated = self
            .orders
            .update_status(order.id, OrderStatus::Activated)
            .await?;
        self.audit
            .record_status_update(
                order.id,
                order.tenant_id,
                Some(OrderStatus::Assigned),
                OrderStatus::Activated,
                Some(actor.id),
                Some("Carga ativada pelo motorista"),
            )
            .await?;

        self.audit
            .record_best_effort(
                order.tenant_id,
                Some(order.id),
                Some(actor.id),
                events::LOAD_ACTIVATED,
                Some(json!({
                    "activationId": activation.id,
                    "locationAddress": activation.location_address,
                })),
            )
            .await;

        Ok((activation, updated))
    }
}
