//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config source could not be read (absent file, unreadable source, load timeout).
    #[error("config missing: {0}")]
    Missing(String),
    /// Config was read but required fields are absent.
    #[error("config {config_ref} missing required fields: {missing:?}")]
    Invalid {
        config_ref: String,
        missing: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    /// No identification strategy matched an active tenant. Carries the request host.
    #[error("no tenant registered for {0}")]
    TenantNotFound(String),
    /// A tenant matched but is not active. Carries the request host.
    #[error("tenant for {0} is not available")]
    TenantUnavailable(String),
    /// Handler requires a tenant context and none was attached.
    #[error("tenant context required")]
    TenantRequired,
    /// Handler requires an admin tenant; the attached tenant is not one.
    #[error("admin tenant required")]
    AdminTenantRequired,
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Backing-store dial failure. Retryable on a later request; the registry entry is not poisoned.
    #[error("connection: {0}")]
    Connection(String),
    #[error("processing: {0}")]
    Processing(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Connection(e.to_string())
    }
}

impl AppError {
    /// Stable machine-readable code. API clients branch on this, never on `message`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            AppError::TenantUnavailable(_) => "TENANT_UNAVAILABLE",
            AppError::TenantRequired => "TENANT_REQUIRED",
            AppError::AdminTenantRequired => "ADMIN_TENANT_REQUIRED",
            AppError::Config(ConfigError::Missing(_)) => "CONFIG_MISSING",
            AppError::Config(ConfigError::Invalid { .. }) => "CONFIG_INVALID",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Processing(_) => "PROCESSING_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TenantNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TenantUnavailable(_) | AppError::AdminTenantRequired => StatusCode::FORBIDDEN,
            AppError::TenantRequired => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Connection(_) | AppError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short error slug for the `error` field and browser redirect query.
    pub fn slug(&self) -> &'static str {
        match self {
            AppError::TenantNotFound(_) => "tenant_not_found",
            AppError::TenantUnavailable(_) => "tenant_unavailable",
            AppError::TenantRequired => "tenant_required",
            AppError::AdminTenantRequired => "admin_tenant_required",
            AppError::Config(ConfigError::Missing(_)) => "config_missing",
            AppError::Config(ConfigError::Invalid { .. }) => "config_invalid",
            AppError::Connection(_) => "connection_error",
            AppError::Processing(_) => "processing_error",
        }
    }

    /// Domain the failure is scoped to, when the variant carries one.
    pub fn domain(&self) -> Option<&str> {
        match self {
            AppError::TenantNotFound(d) | AppError::TenantUnavailable(d) => Some(d),
            _ => None,
        }
    }
}

/// Wire shape for API-class error responses. Non-sensitive fields only.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl From<&AppError> for ErrorBody {
    fn from(e: &AppError) -> Self {
        ErrorBody {
            error: e.slug(),
            message: e.to_string(),
            code: e.code(),
            domain: e.domain().map(String::from),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self);
        (self.status(), Json(body)).into_response()
    }
}
