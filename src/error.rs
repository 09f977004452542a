use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-level failure classes. Everything here is recoverable; only the
/// `Internal` arm hides its cause from the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("dados inválidos")]
    Validation(Vec<String>),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("acesso restrito ao administrador")]
    Forbidden,

    #[error("falha ao manipular o arquivo de dados: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "errors": [msg] }))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "acesso restrito ao administrador" })),
            )
                .into_response(),
            ApiError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("falha ao manipular o arquivo de dados: {msg}") })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "erro interno" })),
                )
                    .into_response()
            }
        }
    }
}
