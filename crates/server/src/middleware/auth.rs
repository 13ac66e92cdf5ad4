use crate::api::ErrorResponse;
use crate::config::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use puzzlecats_mcp::tools::UNKNOWN_IDENTITY;
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// Outcome of checking one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    SecretNotConfigured,
    MissingHeader,
    WrongScheme,
    CredentialMismatch,
}

/// Stateless bearer check against the process-wide secret.
///
/// The comparison is a plain string equality and is not constant-time.
#[derive(Debug, Clone)]
pub struct AuthGate {
    secret: Option<String>,
}

impl AuthGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn check(&self, authorization: Option<&str>) -> AuthDecision {
        let Some(secret) = self.secret.as_deref() else {
            return AuthDecision::Deny(DenyReason::SecretNotConfigured);
        };
        let Some(header) = authorization else {
            return AuthDecision::Deny(DenyReason::MissingHeader);
        };
        let Some(credential) = header.strip_prefix(BEARER_PREFIX) else {
            return AuthDecision::Deny(DenyReason::WrongScheme);
        };

        if credential == secret {
            AuthDecision::Allow
        } else {
            AuthDecision::Deny(DenyReason::CredentialMismatch)
        }
    }
}

/// Advisory caller identity: `x-user-email`, then `x-user-id`, else `unknown`
pub fn identity_hint(headers: &HeaderMap) -> String {
    ["x-user-email", "x-user-id"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_IDENTITY)
        .to_string()
}

/// Reject the request with 401 before any upgrade unless the bearer matches
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.auth.check(authorization) {
        AuthDecision::Allow => next.run(req).await,
        AuthDecision::Deny(reason) => {
            tracing::warn!(?reason, path = %req.uri().path(), "Rejected MCP connection");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_check_allows_exact_bearer() {
        let gate = AuthGate::new(Some("T".to_string()));
        assert_eq!(gate.check(Some("Bearer T")), AuthDecision::Allow);
    }

    #[test]
    fn test_check_deny_reasons() {
        let gate = AuthGate::new(Some("T".to_string()));
        assert_eq!(gate.check(None), AuthDecision::Deny(DenyReason::MissingHeader));
        assert_eq!(gate.check(Some("Basic T")), AuthDecision::Deny(DenyReason::WrongScheme));
        assert_eq!(gate.check(Some("bearer T")), AuthDecision::Deny(DenyReason::WrongScheme));
        assert_eq!(gate.check(Some("Bearer t")), AuthDecision::Deny(DenyReason::CredentialMismatch));
        assert_eq!(gate.check(Some("Bearer T ")), AuthDecision::Deny(DenyReason::CredentialMismatch));
        assert_eq!(gate.check(Some("Bearer ")), AuthDecision::Deny(DenyReason::CredentialMismatch));
    }

    #[test]
    fn test_unconfigured_secret_denies_everything() {
        for secret in [None, Some(String::new()), Some("  ".to_string())] {
            let gate = AuthGate::new(secret);
            assert!(!gate.is_configured());
            assert_eq!(
                gate.check(Some("Bearer ")),
                AuthDecision::Deny(DenyReason::SecretNotConfigured)
            );
        }
    }

    #[test]
    fn test_identity_hint_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(identity_hint(&headers), "unknown");

        headers.insert("x-user-id", HeaderValue::from_static("u-42"));
        assert_eq!(identity_hint(&headers), "u-42");

        headers.insert("x-user-email", HeaderValue::from_static("a@b.com"));
        assert_eq!(identity_hint(&headers), "a@b.com");

        headers.insert("x-user-email", HeaderValue::from_static("  "));
        assert_eq!(identity_hint(&headers), "u-42");
    }
}
