// src/db/tracking_repo.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::tracking::{LocationUpdate, TrackingSession},
};

#[derive(Clone)]
pub struct TrackingRepository {
    pool: PgPool,
}

impl TrackingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Log append-only: nenhuma amostra é atualizada depois de inserida.
    pub async fn insert_location_update(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        tenant_id: Uuid,
        location_wkt: &str,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
        battery_level: Option<f64>,
    ) -> Result<LocationUpdate, AppError> {
        sqlx::query_as::<_, LocationUpdate>(
            "INSERT INTO location_updates \
             (order_id, driver_id, tenant_id, location, accuracy, speed, heading, battery_level) \
             VALUES ($1, $2, $3, ST_GeogFromText($4), $5, $6, $7, $8) \
             RETURNING id, order_id, driver_id, tenant_id, ST_AsEWKT(location) AS location, \
             recorded_at, accuracy, speed, heading, battery_level",
        )
        .bind(order_id)
        .bind(driver_id)
        .bind(tenant_id)
        .bind(location_wkt)
        .bind(accuracy)
        .bind(speed)
        .bind(heading)
        .bind(battery_level)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // A última amostra aceita de um par (pedido, motorista), para o throttle.
    pub async fn last_sample(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<(DateTime<Utc>, String)>, AppError> {
        sqlx::query_as::<_, (DateTime<Utc>, String)>(
            "SELECT recorded_at, ST_AsEWKT(location) FROM location_updates \
             WHERE order_id = $1 AND driver_id = $2 \
             ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(order_id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // Upsert: iniciar uma sessão nova substitui a anterior do mesmo motorista.
    // É o slot durável que liga o coletor de localização ao resto do app.
    pub async fn upsert_session(
        &self,
        driver_id: Uuid,
        order_id: Uuid,
    ) -> Result<TrackingSession, AppError> {
        sqlx::query_as::<_, TrackingSession>(
            "INSERT INTO tracking_sessions (driver_id, order_id, started_at) \
             VALUES ($1, $2, now()) \
             ON CONFLICT (driver_id) DO UPDATE SET order_id = $2, started_at = now() \
             RETURNING driver_id, order_id, started_at",
        )
        .bind(driver_id)
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn find_session(
        &self,
        driver_id: Uuid,
    ) -> Result<Option<TrackingSession>, AppError> {
        sqlx::query_as::<_, TrackingSession>(
            "SELECT driver_id, order_id, started_at FROM tracking_sessions WHERE driver_id = $1",
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn delete_session(&self, driver_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tracking_sessions WHERE driver_id = $1")
            .bind(driver_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
