use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use recon_engine::{ReconcileError, TransactionsApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),
    #[error("{0}")]
    Transactions(#[from] TransactionsApiError),
}

impl ServerError {
    /// The stable error code reported in the `error` field of the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Reconcile(e) => e.code(),
            Self::Transactions(e) => e.code(),
            Self::InitializeError(_) | Self::IOError(_) | Self::ConfigurationError(_) | Self::Unspecified(_) => {
                "internal_error"
            },
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Reconcile(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Reconcile(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transactions(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "ok": false, "error": self.code() }).to_string())
    }
}
