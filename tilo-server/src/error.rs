//! Error types for the Tilo dashboard server

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tilo_rbac::RbacError;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors surfaced by the dashboard server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Authorization layer error
    #[error("RBAC error: {0}")]
    Rbac(#[from] RbacError),

    /// Socket or file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Rbac(RbacError::NotAdmin { .. }) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ServerError::from(RbacError::NotAdmin {
            role: "hr".to_string(),
        });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = ServerError::from(RbacError::Storage("disk full".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
