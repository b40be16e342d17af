// src/db/audit_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{orders::OrderStatus, tracking::StatusUpdate},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        tenant_id: Uuid,
        order_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        event: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO audit_log (tenant_id, order_id, actor_id, event, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tenant_id)
        .bind(order_id)
        .bind(actor_id)
        .bind(event)
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Auditoria é fire-and-forget: a falha vira warning e NUNCA derruba a
    // operação principal.
    pub async fn record_best_effort(
        &self,
        tenant_id: Uuid,
        order_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        event: &str,
        details: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .record(tenant_id, order_id, actor_id, event, details)
            .await
        {
            tracing::warn!("Falha ao gravar audit_log ({}): {:?}", event, e);
        }
    }

    // Um StatusUpdate por transição observável de status.
    pub async fn record_status_update(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        changed_by: Option<Uuid>,
        note: Option<&str>,
    ) -> Result<StatusUpdate, AppError> {
        sqlx::query_as::<_, StatusUpdate>(
            "INSERT INTO status_updates \
             (order_id, tenant_id, previous_status, new_status, changed_by, note) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(previous_status)
        .bind(new_status)
        .bind(changed_by)
        .bind(note)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }
}
