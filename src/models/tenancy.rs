// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// A transportadora (tenant). Todo ator e todo recurso pertencem a exatamente um.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    #[schema(example = "Transportes Horizonte Ltda")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}
