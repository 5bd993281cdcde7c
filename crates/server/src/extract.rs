//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Identity of the acting tenant and user, set by the upstream auth
/// middleware as `X-Tenant-Id` and `X-User-Id` headers.
///
/// The tenant header is mandatory on every reconciliation route; the user
/// header is optional and only feeds the audit fields.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: i64,
    pub user_id: Option<i64>,
}

fn header_i64(parts: &Parts, name: &str) -> Result<Option<i64>, ApiError> {
    let Some(raw) = parts.headers.get(name) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {name} header")))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_i64(parts, "x-tenant-id")?
            .ok_or_else(|| ApiError::BadRequest("missing X-Tenant-Id header".to_string()))?;
        let user_id = header_i64(parts, "x-user-id")?;

        Ok(TenantContext { tenant_id, user_id })
    }
}
