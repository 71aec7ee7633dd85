use crate::{errors::ServiceError, AppState};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

const CUSTOMER_HEADER: &str = "x-customer-id";
const ADMIN_HEADER: &str = "x-admin-token";

/// Identity of the calling customer, taken from the `x-customer-id` header.
/// Authentication itself happens upstream (API gateway); this service only
/// trusts the forwarded identity.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCustomer(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedCustomer {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("{} header is required", CUSTOMER_HEADER))
            })?;

        let customer_id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::Unauthorized(format!("{} is not a valid UUID", CUSTOMER_HEADER))
        })?;

        Ok(AuthenticatedCustomer(customer_id))
    }
}

/// Marker for admin-only endpoints. The `x-admin-token` header must match
/// the configured shared secret.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_token.as_deref().ok_or_else(|| {
            ServiceError::Forbidden("Admin access is not configured".to_string())
        })?;

        let provided = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("{} header is required", ADMIN_HEADER))
            })?;

        if provided != expected {
            return Err(ServiceError::Forbidden("Invalid admin token".to_string()));
        }

        Ok(AdminUser)
    }
}
