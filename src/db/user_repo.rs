// src/db/user_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Role, User},
};

// Colunas explícitas porque last_location é GEOGRAPHY e precisa do ST_AsEWKT.
const USER_COLUMNS: &str = "id, tenant_id, email, password_hash, full_name, role, \
     ST_AsEWKT(last_location) AS last_location, last_location_update, created_at, updated_at";

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    // Cria um novo usuário no banco de dados
    pub async fn create_user(
        &self,
        tenant_id: Uuid,
        email: &str,
        hashed_password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO users (tenant_id, email, password_hash, full_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(tenant_id)
            .bind(email)
            .bind(hashed_password)
            .bind(full_name)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Converte erro de violação de chave única em um erro mais amigável
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return AppError::EmailAlreadyExists;
                    }
                }
                AppError::from(e)
            })
    }

    pub async fn update_password(
        &self,
        user_id: Uuid,
        hashed_password: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(hashed_password)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    // Atualiza a última posição conhecida do motorista (WKT)
    pub async fn update_last_location(
        &self,
        user_id: Uuid,
        location_wkt: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET last_location = ST_GeogFromText($2), \
             last_location_update = now(), updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(location_wkt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
