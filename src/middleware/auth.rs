use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{extract_bearer_token, AuthError, Principal, Scope};
use crate::error::ApiError;
use crate::state::AppState;

/// Bearer token middleware: verifies the token and attaches the caller's
/// [`Principal`] to the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .map_err(|e| {
            tracing::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            e
        })?
        .to_owned();

    let principal = state.verifier.verify(&token).await.map_err(|e| {
        tracing::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
        e
    })?;

    tracing::debug!("Authenticated {} with scopes {:?}", principal.subject, principal.scopes);
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Scope gate for a single route. Must run inside [`authenticate`].
pub async fn require_scope(
    State(scope): State<Scope>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AuthError::MissingCredentials("Authorization header missing"))?;

    if let Err(e) = principal.require(scope) {
        tracing::warn!(
            "Rejected {} {} for {}: {}",
            request.method(),
            request.uri().path(),
            principal.subject,
            e
        );
        return Err(e.into());
    }

    Ok(next.run(request).await)
}
