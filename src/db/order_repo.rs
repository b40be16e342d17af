// src/db/order_repo.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::orders::{Order, OrderStatus},
};

// Colunas explícitas: as duas colunas GEOGRAPHY voltam como EWKT.
const ORDER_COLUMNS: &str = "id, tenant_id, order_number, status, assigned_driver_id, \
     qr_code_id, qr_code_data, qr_code_signature, qr_code_expires_at, \
     loading_point_name, loading_point_address, \
     ST_AsEWKT(loading_point_location) AS loading_point_location, \
     loading_window_start, loading_window_end, \
     unloading_point_name, unloading_point_address, \
     ST_AsEWKT(unloading_point_location) AS unloading_point_location, \
     unloading_window_start, unloading_window_end, \
     waypoints, notes, created_by, created_at, updated_at";

// Dados necessários para inserir um pedido (montados pelo orquestrador).
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tenant_id: Uuid,
    pub order_number: String,
    pub assigned_driver_id: Option<Uuid>,
    pub qr_code_expires_at: DateTime<Utc>,
    pub loading_point_name: String,
    pub loading_point_address: Option<String>,
    pub loading_point_location: Option<String>, // WKT
    pub loading_window_start: Option<DateTime<Utc>>,
    pub loading_window_end: Option<DateTime<Utc>>,
    pub unloading_point_name: String,
    pub unloading_point_address: Option<String>,
    pub unloading_point_location: Option<String>, // WKT
    pub unloading_window_start: Option<DateTime<Utc>>,
    pub unloading_window_end: Option<DateTime<Utc>>,
    pub waypoints: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Etapa 1 do pipeline de criação. Status nasce 'pending'.
    pub async fn insert(&self, data: &NewOrder) -> Result<Order, AppError> {
        let query = format!(
            "INSERT INTO orders (tenant_id, order_number, status, assigned_driver_id, \
             qr_code_expires_at, \
             loading_point_name, loading_point_address, loading_point_location, \
             loading_window_start, loading_window_end, \
             unloading_point_name, unloading_point_address, unloading_point_location, \
             unloading_window_start, unloading_window_end, \
             waypoints, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, ST_GeogFromText($8), $9, $10, \
             $11, $12, ST_GeogFromText($13), $14, $15, $16, $17, $18) \
             RETURNING {}",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(data.tenant_id)
            .bind(&data.order_number)
            .bind(OrderStatus::Pending)
            .bind(data.assigned_driver_id)
            .bind(data.qr_code_expires_at)
            .bind(&data.loading_point_name)
            .bind(&data.loading_point_address)
            .bind(&data.loading_point_location)
            .bind(data.loading_window_start)
            .bind(data.loading_window_end)
            .bind(&data.unloading_point_name)
            .bind(&data.unloading_point_address)
            .bind(&data.unloading_point_location)
            .bind(data.unloading_window_start)
            .bind(data.unloading_window_end)
            .bind(&data.waypoints)
            .bind(&data.notes)
            .bind(data.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Compensação da etapa 1.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, AppError> {
        let query = format!(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Auto-atribuição no primeiro scan de um pedido 'pending'.
    pub async fn assign_driver(
        &self,
        id: Uuid,
        driver_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, AppError> {
        let query = format!(
            "UPDATE orders SET assigned_driver_id = $2, status = $3, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(driver_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Etapa final do pipeline: amarra o QR Code ao pedido.
    pub async fn bind_qr_code(
        &self,
        id: Uuid,
        qr_code_id: Uuid,
        qr_code_data: &str,
        qr_code_signature: &str,
    ) -> Result<Order, AppError> {
        let query = format!(
            "UPDATE orders SET qr_code_id = $2, qr_code_data = $3, qr_code_signature = $4, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(qr_code_id)
            .bind(qr_code_data)
            .bind(qr_code_signature)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)
    }
}
