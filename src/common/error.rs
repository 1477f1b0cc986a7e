// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ---
// Erros do motor de sincronização
// ---
// Os syncers convertem estes erros em `SyncOutcome` com falha; só a descoberta
// de filiais e o truncamento sobem como `Err` até o chamador.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source query failed: {0}")]
    Source(#[source] sqlx::Error),

    #[error("target write failed: {0}")]
    Target(#[source] sqlx::Error),

    #[error("source row does not match the expected shape: {0}")]
    RowShape(#[from] serde_json::Error),

    #[error("cannot normalize {field} of {record} '{code}': {reason}")]
    Normalization {
        record: &'static str,
        code: String,
        field: &'static str,
        reason: String,
    },

    #[error("query parameter @{0} has no bound value")]
    UnboundParameter(String),

    #[error("no branches were found to sync")]
    NoBranches,

    #[error("failed to truncate {table}: {source}")]
    Truncate {
        table: &'static str,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    pub(crate) fn normalization(
        record: &'static str,
        code: &str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        SyncError::Normalization {
            record,
            code: code.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

// ---
// Erros da camada HTTP
// ---
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Código de filial ausente")]
    BranchCodeRequired,

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "success": false,
                        "message": "One or more fields are invalid.",
                        "details": details,
                    }),
                )
            }
            AppError::BranchCodeRequired => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Branch code is required" }),
            ),
            AppError::Sync(SyncError::NoBranches) => (
                StatusCode::NOT_FOUND,
                json!({
                    "success": false,
                    "message": "No branches were found to sync. Please provide branch codes or ensure ERP branch configuration is available.",
                }),
            ),
            AppError::Sync(ref e @ SyncError::Truncate { .. }) => {
                tracing::error!("Falha ao truncar o catálogo: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "message": "Failed to truncate catalog tables.",
                        "error": e.to_string(),
                    }),
                )
            }
            AppError::Sync(ref e) => {
                tracing::error!("Erro de sincronização: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "message": "Unexpected error while syncing branches.",
                        "error": e.to_string(),
                    }),
                )
            }
            // O `tracing` loga o detalhe; o cliente recebe só a mensagem genérica.
            AppError::DatabaseError(ref e) => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Ocorreu um erro inesperado." }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
