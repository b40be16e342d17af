// src/middleware/policy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Role, User},
};

// A policy da requisição: resolve (usuário, tenant, papel) UMA vez e expõe
// as checagens de capacidade que os handlers precisam. Substitui as
// verificações de papel espalhadas handler a handler.
#[derive(Debug, Clone)]
pub struct Policy {
    pub user: User,
}

impl Policy {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.user.tenant_id
    }

    pub fn is_driver(&self) -> bool {
        self.user.role == Role::Driver
    }

    pub fn is_admin_or_dispatcher(&self) -> bool {
        matches!(self.user.role, Role::Admin | Role::Dispatcher)
    }

    pub fn require_driver(&self) -> Result<(), AppError> {
        if self.is_driver() {
            Ok(())
        } else {
            Err(AppError::RoleNotAllowed(self.user.role.as_str()))
        }
    }

    pub fn require_admin_or_dispatcher(&self) -> Result<(), AppError> {
        if self.is_admin_or_dispatcher() {
            Ok(())
        } else {
            Err(AppError::RoleNotAllowed(self.user.role.as_str()))
        }
    }
}

impl<S> FromRequestParts<S> for Policy
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(|user| Policy { user })
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "teste@exemplo.com.br".to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            role,
            last_location: None,
            last_location_update: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn driver_capabilities() {
        let policy = Policy {
            user: user(Role::Driver),
        };
        assert!(policy.is_driver());
        assert!(policy.require_driver().is_ok());
        assert!(policy.require_admin_or_dispatcher().is_err());
    }

    #[test]
    fn staff_capabilities() {
        for role in [Role::Admin, Role::Dispatcher] {
            let policy = Policy { user: user(role) };
            assert!(!policy.is_driver());
            assert!(policy.require_driver().is_err());
            assert!(policy.require_admin_or_dispatcher().is_ok());
        }
    }
}
