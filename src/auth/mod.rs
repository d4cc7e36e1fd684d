pub mod jwks;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

pub use jwks::JwksVerifier;

/// Permissions defined by the identity provider for this API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    CreateTasks,
    UpdateTasks,
    DeleteTasks,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::CreateTasks => "create:tasks",
            Scope::UpdateTasks => "update:tasks",
            Scope::DeleteTasks => "delete:tasks",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingCredentials(&'static str),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing required scope: {0}")]
    InsufficientScope(Scope),

    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),
}

/// Access token claims read by this API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Space-separated OAuth2 scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// RBAC permissions, when the provider is configured to emit them
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
}

/// Authenticated caller attached to the request after token validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub scopes: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(subject: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(scope.as_str())
    }

    pub fn require(&self, scope: Scope) -> Result<(), AuthError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope(scope))
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        let mut scopes: BTreeSet<String> = claims
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        scopes.extend(claims.permissions);

        Self {
            subject: claims.sub,
            scopes,
        }
    }
}

/// Verifies bearer tokens issued by the identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials("Authorization header missing"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MissingCredentials("Invalid Authorization header"))?;

    let mut parts = auth_str.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MissingCredentials("Invalid Authorization header")),
    }
}
