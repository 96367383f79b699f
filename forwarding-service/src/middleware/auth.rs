//! Auth context extraction.
//!
//! The identity provider lives upstream; by the time a request reaches this
//! service the authenticated user id and role arrive as headers set by the
//! front end after login.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fastybox_core::error::AppError;

/// Authenticated caller context for every domain operation.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User id assigned by the identity provider.
    pub user_id: String,
    /// Whether the caller holds the administrator role.
    pub is_admin: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing X-User-Id header"))
            })?;

        let is_admin = parts
            .headers
            .get("X-Admin")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let span = tracing::Span::current();
        span.record("user_id", user_id);

        Ok(AuthContext {
            user_id: user_id.to_string(),
            is_admin,
        })
    }
}

impl AuthContext {
    /// Guard for admin-only operations.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Administrator role required"
            )))
        }
    }
}
