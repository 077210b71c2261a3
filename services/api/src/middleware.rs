//! Authentication middleware
//!
//! `require_session` and `require_auth` resolve the caller into an
//! [`auth::Principal`] and store it in the request extensions.
//! `require_permission` runs after them on each gated method, before the
//! handler extracts its path or body.

use auth::{ClientInfo, Credentials, PermissionEvaluator, Principal, models::Permission};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{error::ApiError, state::AppState};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session_token";

/// Session cookie only. Used by the account and API key routes.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());

    let principal = state.resolver.resolve_session(token.as_deref()).await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Session cookie, or `Authorization: Bearer <api key>` when the cookie is
/// absent or invalid
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let principal = state
        .resolver
        .resolve(&Credentials {
            session_token: token.as_deref(),
            authorization: authorization.as_deref(),
        })
        .await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Permissions one route method requires, any of which is enough
#[derive(Clone)]
pub struct Gate {
    pub evaluator: PermissionEvaluator,
    pub required: Vec<Permission>,
}

/// Reject with 403 unless the resolved principal holds one of the gate's
/// permissions. A request without a principal is unauthenticated.
pub async fn require_permission(
    State(gate): State<Gate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate.evaluator
        .authorize(req.extensions().get::<Principal>(), &gate.required)?;
    Ok(next.run(req).await)
}

/// Client details recorded with a new session
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let ip_address = header_value("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_value("x-real-ip"));

    ClientInfo {
        user_agent: header_value(header::USER_AGENT.as_str()),
        ip_address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_info_prefers_the_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));

        let client = client_info(&headers);
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(client.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_info_tolerates_missing_headers() {
        let client = client_info(&HeaderMap::new());
        assert!(client.user_agent.is_none());
        assert!(client.ip_address.is_none());
    }
}
