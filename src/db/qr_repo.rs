// src/db/qr_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::orders::QrCodeRecord};

#[derive(Clone)]
pub struct QrCodeRepository {
    pool: PgPool,
}

impl QrCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Etapa 2 do pipeline de criação: registro nasce sem image_url.
    pub async fn insert(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        tracking_code: &str,
        payload: &str,
        signature: &str,
    ) -> Result<QrCodeRecord, AppError> {
        sqlx::query_as::<_, QrCodeRecord>(
            "INSERT INTO qr_codes (order_id, tenant_id, tracking_code, payload, signature) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(tracking_code)
        .bind(payload)
        .bind(signature)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // Compensação da etapa 2.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM qr_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Etapa 5: grava a URL pública da imagem no registro.
    pub async fn set_image_url(&self, id: Uuid, image_url: &str) -> Result<QrCodeRecord, AppError> {
        sqlx::query_as::<_, QrCodeRecord>(
            "UPDATE qr_codes SET image_url = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }
}
