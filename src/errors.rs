//! Single error currency for the whole service.
//!
//! Every component — Store, Calendar, Capacity Engine, Selector, Allocator,
//! Admin API — returns `AppResult<T>`. The HTTP layer is the only place
//! that knows about status codes; everywhere else just propagates `AppError`
//! with `?`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Validation failure with a field -> reason map, per the admin API
    /// contract (returns 400 with field-keyed reasons).
    #[error("invalid argument")]
    InvalidArgument(BTreeMap<String, String>),

    #[error("deal not found")]
    DealNotFound,

    #[error("no eligible advisers")]
    NoEligibleAdvisers,

    #[error("no availability")]
    NoAvailability { diagnostics: Value },

    #[error("store unavailable")]
    StoreUnavailable,

    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("crm unavailable")]
    CrmUnavailable,

    #[error("crm update failed: {0}")]
    CrmUpdateFailed(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: Value,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) | AppError::InvalidArgument(_) => "InvalidInput",
            AppError::DealNotFound => "DealNotFound",
            AppError::NoEligibleAdvisers => "NoEligibleAdvisers",
            AppError::NoAvailability { .. } => "NoAvailability",
            AppError::StoreUnavailable => "StoreUnavailable",
            AppError::NotFound => "NotFound",
            AppError::Conflict => "Conflict",
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden => "Forbidden",
            AppError::CrmUnavailable => "CrmUnavailable",
            AppError::CrmUpdateFailed(_) => "CrmUpdateFailed",
            AppError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::DealNotFound | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NoEligibleAdvisers | AppError::NoAvailability { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::StoreUnavailable | AppError::CrmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::CrmUpdateFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Value {
        match self {
            AppError::InvalidArgument(fields) => serde_json::json!({ "fields": fields }),
            AppError::NoAvailability { diagnostics } => diagnostics.clone(),
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                Value::String("an internal error occurred".into())
            }
            other => Value::String(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                AppError::StoreUnavailable
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}
