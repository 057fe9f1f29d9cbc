//! Guards that hand the pipeline's tenant context to API handlers.

use crate::context::TenantContext;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extractor for handlers that need a resolved tenant.
/// Rejects with `TENANT_REQUIRED` (400) when the pipeline attached no context.
#[derive(Clone, Debug)]
pub struct RequireTenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequireTenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(RequireTenant)
            .ok_or(AppError::TenantRequired)
    }
}

/// Extractor for admin-surface handlers: additionally rejects non-admin
/// tenant types with `ADMIN_TENANT_REQUIRED` (403).
#[derive(Clone, Debug)]
pub struct RequireAdminTenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdminTenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireTenant(ctx) = RequireTenant::from_request_parts(parts, state).await?;
        if !ctx.is_admin() {
            return Err(AppError::AdminTenantRequired);
        }
        Ok(RequireAdminTenant(ctx))
    }
}
