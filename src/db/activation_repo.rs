// src/db/activation_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::orders::LoadActivation};

#[derive(Clone)]
pub struct ActivationRepository {
    pool: PgPool,
}

impl ActivationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Consulta mais barata possível, só para o caminho feliz da mensagem de erro.
    // A garantia real de unicidade é a constraint UNIQUE(order_id) no insert.
    pub async fn exists_for_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM load_activations WHERE order_id = $1)",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    pub async fn insert(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        driver_id: Uuid,
        location_wkt: Option<&str>,
        location_address: Option<&str>,
        device_info: Option<&serde_json::Value>,
        notes: Option<&str>,
    ) -> Result<LoadActivation, AppError> {
        sqlx::query_as::<_, LoadActivation>(
            "INSERT INTO load_activations \
             (order_id, tenant_id, driver_id, location, location_address, device_info, notes) \
             VALUES ($1, $2, $3, ST_GeogFromText($4), $5, $6, $7) \
             RETURNING id, order_id, tenant_id, driver_id, activated_at, \
             ST_AsEWKT(location) AS location, location_address, device_info, notes",
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(driver_id)
        .bind(location_wkt)
        .bind(location_address)
        .bind(device_info)
        .bind(notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Dois scans concorrentes: quem perder a corrida cai aqui.
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::AlreadyActivated;
                }
            }
            AppError::from(e)
        })
    }
}
