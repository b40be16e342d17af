use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::orders::OrderStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Cada variante mapeia para um status HTTP na implementação de IntoResponse.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Campos obrigatórios ausentes, corpo malformado etc.
    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Token de autenticação inválido ou ausente")]
    InvalidToken,

    #[error("E-mail ou senha inválidos")]
    InvalidCredentials,

    #[error("QR Code expirado")]
    ExpiredCode,

    #[error("Assinatura do QR Code inválida")]
    InvalidSignature,

    #[error("Acesso negado")]
    AccessDenied,

    #[error("Pedido atribuído a outro motorista")]
    NotAssigned,

    #[error("Operação não permitida para o papel '{0}'")]
    RoleNotAllowed(&'static str),

    #[error("Pedido não encontrado")]
    OrderNotFound,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Transição de status inválida: {0} -> {1}")]
    InvalidTransition(OrderStatus, OrderStatus),

    #[error("Carga já ativada para este pedido")]
    AlreadyActivated,

    #[error("Ativação de carga pendente para este pedido")]
    ActivationRequired,

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    // Configuração ausente é erro de deploy, nunca deve virar retry.
    #[error("Erro de configuração: {0}")]
    Configuration(String),

    // Falha de storage/render dentro do pipeline de criação.
    // Guarda o nome da etapa para o corpo da resposta.
    #[error("Falha na etapa '{step}' do pipeline")]
    Upstream {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),

            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "E-mail ou senha inválidos.".to_string(),
            ),
            AppError::ExpiredCode => (
                StatusCode::UNAUTHORIZED,
                "QR Code expirado. Solicite um novo código ao despachante.".to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "Assinatura do QR Code inválida.".to_string(),
            ),

            AppError::AccessDenied => (StatusCode::FORBIDDEN, "Acesso negado.".to_string()),
            AppError::NotAssigned => (
                StatusCode::FORBIDDEN,
                "Este pedido está atribuído a outro motorista.".to_string(),
            ),
            AppError::RoleNotAllowed(role) => (
                StatusCode::FORBIDDEN,
                format!("Operação não permitida para o papel '{}'.", role),
            ),

            AppError::OrderNotFound => {
                (StatusCode::NOT_FOUND, "Pedido não encontrado.".to_string())
            }
            AppError::UserNotFound => {
                (StatusCode::NOT_FOUND, "Usuário não encontrado.".to_string())
            }

            AppError::InvalidTransition(from, to) => (
                StatusCode::CONFLICT,
                format!("Transição de status inválida: {} -> {}.", from, to),
            ),
            AppError::AlreadyActivated => (
                StatusCode::CONFLICT,
                "A carga deste pedido já foi ativada.".to_string(),
            ),
            AppError::ActivationRequired => (
                StatusCode::CONFLICT,
                "Ative a carga deste pedido antes de escanear o QR Code.".to_string(),
            ),
            AppError::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "Este e-mail já está em uso.".to_string(),
            ),

            // Orquestração: devolve também qual etapa falhou, para debug operacional.
            AppError::Upstream { step, source } => {
                tracing::error!("Falha na etapa '{}' do pipeline: {:?}", step, source);
                let body = Json(json!({
                    "error": format!("Falha na etapa '{}' do pipeline de criação.", step),
                    "step": step,
                }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }

            // Todos os outros erros (DatabaseError, Configuration, etc.) viram 500.
            // O `tracing` loga a mensagem detalhada; o cliente recebe só o genérico.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
