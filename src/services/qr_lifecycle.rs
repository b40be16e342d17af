// src/services/qr_lifecycle.rs

use chrono::Utc;
use serde_json::json;

use crate::{
    common::error::AppError,
    db::{ActivationRepository, AuditRepository, OrderRepository},
    models::{
        auth::{Role, User},
        orders::{Order, OrderProjection, OrderStatus},
        tracking::events,
    },
    services::signature::SignatureService,
};

// O que um scan válido deve fazer com o pedido. Decisão pura, separada do
// I/O para poder ser testada estado a estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAdvance {
    // Pedido 'pending': auto-atribui o motorista e vai para 'assigned'
    AssignToScanner,
    // Pedido 'activated': primeiro scan pós-ativação, vai para 'in_progress'
    AdvanceToInProgress,
    // Re-scan idempotente ou ator não-motorista: devolve o estado atual
    Nothing,
}

// Regras do passo 5 do scan. Só motorista muda estado; os demais papéis
// recebem a projeção sem efeito colateral.
pub fn decide_scan_advance(
    order: &Order,
    scanner: &User,
    activation_exists: bool,
) -> Result<ScanAdvance, AppError> {
    if scanner.role != Role::Driver {
        return Ok(ScanAdvance::Nothing);
    }

    if order.status == OrderStatus::Pending {
        return Ok(ScanAdvance::AssignToScanner);
    }

    if order.assigned_driver_id != Some(scanner.id) {
        return Err(AppError::NotAssigned);
    }

    match order.status {
        OrderStatus::Assigned if !activation_exists => Err(AppError::ActivationRequired),
        OrderStatus::Activated => Ok(ScanAdvance::AdvanceToInProgress),
        // 'assigned' com ativação pendente de transição, 'in_progress' e
        // posteriores: scan repetido é no-op, nunca erro.
        _ => Ok(ScanAdvance::Nothing),
    }
}

#[derive(Clone)]
pub struct QrLifecycleService {
    orders: OrderRepository,
    activations: ActivationRepository,
    audit: AuditRepository,
    signature: SignatureService,
}

impl QrLifecycleService {
    pub fn new(
        orders: OrderRepository,
        activations: ActivationRepository,
        audit: AuditRepository,
        signature: SignatureService,
    ) -> Self {
        Self {
            orders,
            activations,
            audit,
            signature,
        }
    }

    // O coração do fluxo de scan: valida o payload, carrega o pedido e
    // avança o estado conforme o papel do ator.
    pub async fn validate_and_advance(
        &self,
        qr_data: &str,
        scanner: &User,
    ) -> Result<OrderProjection, AppError> {
        // 1. Decodifica e checa validade ANTES da assinatura: um código
        //    vencido falha como expirado mesmo que a assinatura estivesse ok.
        let payload = SignatureService::decode_payload(qr_data)?;
        let now_ms = Utc::now().timestamp_millis();
        if payload.is_expired(now_ms) {
            return Err(AppError::ExpiredCode);
        }

        // 2. Recalcula a assinatura
        if !self
            .signature
            .verify(payload.order_id, payload.timestamp, &payload.signature)
        {
            return Err(AppError::InvalidSignature);
        }

        // 3. Carrega o pedido e confere o tenant do ator
        let order = self
            .orders
            .find_by_id(payload.order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        if order.tenant_id != scanner.tenant_id {
            return Err(AppError::AccessDenied);
        }

        // 4. Auditoria incondicional do scan (best-effort: falha aqui não
        //    aborta o fluxo)
        self.audit
            .record_best_effort(
                order.tenant_id,
                Some(order.id),
                Some(scanner.id),
                events::QR_CODE_SCANNED,
                Some(json!({
                    "trackingCode": payload.tracking_code,
                    "status": order.status,
                })),
            )
            .await;

        // 5. Avanço de estado conforme o papel
        let activation_exists = self.activations.exists_for_order(order.id).await?;
        let order = match decide_scan_advance(&order, scanner, activation_exists)? {
            ScanAdvance::AssignToScanner => {
                let updated = self
                    .orders
                    .assign_driver(order.id, scanner.id, OrderStatus::Assigned)
                    .await?;
                self.audit
                    .record_status_update(
                        order.id,
                        order.tenant_id,
                        Some(OrderStatus::Pending),
                        OrderStatus::Assigned,
                        Some(scanner.id),
                        Some("Auto-atribuído via scan de QR Code"),
                    )
                    .await?;
                updated
            }
            ScanAdvance::AdvanceToInProgress => {
                let updated = self
                    .orders
                    .update_status(order.id, OrderStatus::InProgress)
                    .await?;
                self.audit
                    .record_status_update(
                        order.id,
                        order.tenant_id,
                        Some(OrderStatus::Activated),
                        OrderStatus::InProgress,
                        Some(scanner.id),
                        Some("Primeiro scan após ativação da carga"),
                    )
                    .await?;
                updated
            }
            ScanAdvance::Nothing => order,
        };

        // 6. Só a projeção volta para o app, nunca a assinatura
        Ok(order.to_projection())
    }

    // Transição explícita de status (app do motorista ou painel do
    // despachante). Toda mudança passa pela máquina de estados.
    pub async fn transition_order(
        &self,
        actor: &User,
        order_id: uuid::Uuid,
        new_status: OrderStatus,
        note: Option<&str>,
    ) -> Result<Order, AppError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        if order.tenant_id != actor.tenant_id {
            return Err(AppError::AccessDenied);
        }

        // Motorista só mexe no próprio pedido e não cancela; admin e
        // despachante podem tudo que a máquina de estados permitir.
        if actor.role == Role::Driver {
            if order.assigned_driver_id != Some(actor.id) {
                return Err(AppError::NotAssigned);
            }
            if new_status == OrderStatus::Cancelled {
                return Err(AppError::RoleNotAllowed(actor.role.as_str()));
            }
        }

        if !order.status.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition(order.status, new_status));
        }
        // Nenhum pedido sai de 'pending' sem motorista atribuído.
        if order.status == OrderStatus::Pending && order.assigned_driver_id.is_none() {
            return Err(AppError::InvalidTransition(order.status, new_status));
        }

        let previous = order.status;
        let updated = self.orders.update_status(order.id, new_status).await?;

        self.audit
            .record_status_update(
                order.id,
                order.tenant_id,
                Some(previous),
                new_status,
                Some(actor.id),
                note,
            )
            .await?;
        self.audit
            .record_best_effort(
                order.tenant_id,
                Some(order.id),
                Some(actor.id),
                events::ORDER_STATUS_CHANGED,
                Some(json!({
                    "from": previous,
                    "to": new_status,
                })),
            )
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn driver(tenant_id: Uuid) -> User {
        user_with_role(tenant_id, Role::Driver)
    }

    fn user_with_role(tenant_id: Uuid, role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id,
            email: format!("{}@exemplo.com.br", Uuid::new_v4().simple()),
            password_hash: "hash".to_string(),
            full_name: None,
            role,
            last_location: None,
            last_location_update: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(tenant_id: Uuid, status: OrderStatus, assigned: Option<Uuid>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            tenant_id,
            order_number: "ORD-TESTE-000001".to_string(),
            status,
            assigned_driver_id: assigned,
            qr_code_id: None,
            qr_code_data: None,
            qr_code_signature: None,
            qr_code_expires_at: None,
            loading_point_name: "CD Guarulhos".to_string(),
            loading_point_address: None,
            loading_point_location: None,
            loading_window_start: None,
            loading_window_end: None,
            unloading_point_name: "Filial Curitiba".to_string(),
            unloading_point_address: None,
            unloading_point_location: None,
            unloading_window_start: None,
            unloading_window_end: None,
            waypoints: None,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_order_is_auto_assigned_to_the_scanning_driver() {
        let tenant = Uuid::new_v4();
        let scanner = driver(tenant);
        let order = order(tenant, OrderStatus::Pending, None);

        let advance = decide_scan_advance(&order, &scanner, false).unwrap();
        assert_eq!(advance, ScanAdvance::AssignToScanner);
    }

    #[test]
    fn order_assigned_to_someone_else_is_rejected() {
        let tenant = Uuid::new_v4();
        let scanner = driver(tenant);
        let order = order(tenant, OrderStatus::Assigned, Some(Uuid::new_v4()));

        let error = decide_scan_advance(&order, &scanner, false).unwrap_err();
        assert!(matches!(error, AppError::NotAssigned));
    }

    #[test]
    fn assigned_order_without_activation_requires_activation_first() {
        let tenant = Uuid::new_v4();
        let scanner = driver(tenant);
        let order = order(tenant, OrderStatus::Assigned, Some(scanner.id));

        let error = decide_scan_advance(&order, &scanner, false).unwrap_err();
        assert!(matches!(error, AppError::ActivationRequired));
    }

    #[test]
    fn activated_order_advances_to_in_progress() {
        let tenant = Uuid::new_v4();
        let scanner = driver(tenant);
        let order = order(tenant, OrderStatus::Activated, Some(scanner.id));

        let advance = decide_scan_advance(&order, &scanner, true).unwrap();
        assert_eq!(advance, ScanAdvance::AdvanceToInProgress);
    }

    #[test]
    fn rescanning_in_progress_is_an_idempotent_no_op() {
        let tenant = Uuid::new_v4();
        let scanner = driver(tenant);
        for status in [
            OrderStatus::InProgress,
            OrderStatus::InTransit,
            OrderStatus::Arrived,
            OrderStatus::Completed,
        ] {
            let order = order(tenant, status, Some(scanner.id));
            let advance = decide_scan_advance(&order, &scanner, true).unwrap();
            assert_eq!(advance, ScanAdvance::Nothing, "status {}", status);
        }
    }

    #[test]
    fn non_driver_roles_never_mutate() {
        let tenant = Uuid::new_v4();
        for role in [Role::Admin, Role::Dispatcher] {
            let scanner = user_with_role(tenant, role);
            let order = order(tenant, OrderStatus::Pending, None);
            let advance = decide_scan_advance(&order, &scanner, false).unwrap();
            assert_eq!(advance, ScanAdvance::Nothing);
        }
    }
}
