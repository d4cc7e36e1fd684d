use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use super::{AuthError, Claims, Principal, TokenVerifier};
use crate::config::AuthConfig;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Unknown key ids trigger a refetch at most this often
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    #[error("Invalid identity provider domain {0}")]
    InvalidDomain(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

enum KeySource {
    Remote { url: Url, http: reqwest::Client },
    /// Fixed key set, never refetched
    Static,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// RS256 access-token verifier backed by the provider's published JWKS
pub struct JwksVerifier {
    issuer: String,
    audience: String,
    ttl: Duration,
    min_refresh: Duration,
    source: KeySource,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, JwksError> {
        let (_, url) = provider_urls(&config.domain)?;
        Self::with_jwks_url(config, url)
    }

    /// Verifier for the configured issuer that fetches keys from `url`
    pub fn with_jwks_url(config: &AuthConfig, url: Url) -> Result<Self, JwksError> {
        let (issuer, _) = provider_urls(&config.domain)?;
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        info!(
            "Verifying tokens issued by {} for audience {} (keys from {})",
            issuer, config.audience, url
        );

        Ok(Self {
            issuer,
            audience: config.audience.clone(),
            ttl: Duration::from_secs(config.jwks_cache_ttl_secs),
            min_refresh: MIN_REFRESH_INTERVAL,
            source: KeySource::Remote { url, http },
            cache: RwLock::new(None),
        })
    }

    /// Verifier over a fixed key set, with no network access
    pub fn with_key_set(config: &AuthConfig, keys: JwkSet) -> Result<Self, JwksError> {
        let (issuer, _) = provider_urls(&config.domain)?;

        Ok(Self {
            issuer,
            audience: config.audience.clone(),
            ttl: Duration::from_secs(config.jwks_cache_ttl_secs),
            min_refresh: MIN_REFRESH_INTERVAL,
            source: KeySource::Static,
            cache: RwLock::new(Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            })),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation
    }

    /// Answer from the cache when it can. `None` means a fetch is due.
    fn cached_key(&self, cached: Option<&CachedKeys>, kid: &str) -> Option<Result<Jwk, AuthError>> {
        let cached = cached?;
        let age = cached.fetched_at.elapsed();
        match cached.keys.find(kid) {
            Some(jwk) if age < self.ttl => Some(Ok(jwk.clone())),
            None if age < self.min_refresh => Some(Err(key_not_found())),
            _ => None,
        }
    }

    async fn find_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let (url, http) = match &self.source {
            KeySource::Static => {
                let cache = self.cache.read().await;
                return cache
                    .as_ref()
                    .and_then(|cached| cached.keys.find(kid).cloned())
                    .ok_or_else(key_not_found);
            }
            KeySource::Remote { url, http } => (url, http),
        };

        if let Some(result) = self.cached_key(self.cache.read().await.as_ref(), kid) {
            return result;
        }

        // Fetch under the write lock; whoever waited behind us sees the new keys
        let mut cache = self.cache.write().await;
        if let Some(result) = self.cached_key(cache.as_ref(), kid) {
            return result;
        }

        let keys = fetch_key_set(http, url).await?;
        let found = keys.find(kid).cloned();
        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        found.ok_or_else(key_not_found)
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("Invalid token header: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "Unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Token header has no key id".to_string()))?;

        let jwk = self.find_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::InvalidToken(format!("Unusable signing key: {}", e)))?;

        let token_data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(format!("Token validation error: {}", e)))?;

        Ok(Principal::from(token_data.claims))
    }
}

fn key_not_found() -> AuthError {
    AuthError::InvalidToken("Appropriate JWK not found".to_string())
}

fn provider_urls(domain: &str) -> Result<(String, Url), JwksError> {
    let base = Url::parse(&format!("https://{}/", domain))
        .map_err(|e| JwksError::InvalidDomain(format!("{:?}: {}", domain, e)))?;
    let jwks_url = base
        .join(".well-known/jwks.json")
        .map_err(|e| JwksError::InvalidDomain(format!("{:?}: {}", domain, e)))?;
    Ok((base.to_string(), jwks_url))
}

async fn fetch_key_set(http: &reqwest::Client, url: &Url) -> Result<JwkSet, AuthError> {
    debug!("Fetching JWKS from {}", url);

    let response = http
        .get(url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

    response
        .json::<JwkSet>()
        .await
        .map_err(|e| AuthError::KeySetUnavailable(format!("malformed JWKS: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_rsa_key.pem");
    const KEY_SET: &str = include_str!("../../tests/fixtures/test_jwks.json");
    const KID: &str = "test-key-1";

    fn config() -> AuthConfig {
        AuthConfig {
            domain: "tarefas.example.auth0.com".to_string(),
            audience: "https://tarefas.api".to_string(),
            jwks_cache_ttl_secs: 3600,
        }
    }

    fn verifier() -> JwksVerifier {
        let keys: JwkSet = serde_json::from_str(KEY_SET).unwrap();
        JwksVerifier::with_key_set(&config(), keys).unwrap()
    }

    fn claims(overrides: Value) -> Value {
        let now = chrono::Utc::now().timestamp();
        let mut claims = json!({
            "sub": "auth0|tester",
            "iss": "https://tarefas.example.auth0.com/",
            "aud": "https://tarefas.api",
            "iat": now,
            "exp": now + 600,
            "scope": "create:tasks update:tasks",
        });
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        claims
    }

    fn sign(claims: &Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    #[test]
    fn issuer_is_derived_from_domain() {
        assert_eq!(verifier().issuer, "https://tarefas.example.auth0.com/");
        let (_, url) = provider_urls("tarefas.example.auth0.com").unwrap();
        assert_eq!(url.as_str(), "https://tarefas.example.auth0.com/.well-known/jwks.json");
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        let token = sign(&claims(json!({})), Some(KID));
        let principal = verifier().verify(&token).await.unwrap();
        assert_eq!(principal.subject, "auth0|tester");
        assert!(principal.has_scope(crate::auth::Scope::CreateTasks));
        assert!(principal.has_scope(crate::auth::Scope::UpdateTasks));
        assert!(!principal.has_scope(crate::auth::Scope::DeleteTasks));
    }

    #[tokio::test]
    async fn audience_array_is_accepted() {
        let token = sign(
            &claims(json!({"aud": ["https://tarefas.api", "https://other/userinfo"]})),
            Some(KID),
        );
        assert!(verifier().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let token = sign(&claims(json!({"aud": "https://someone.else"})), Some(KID));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let token = sign(&claims(json!({"iss": "https://evil.example/"})), Some(KID));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let past = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&claims(json!({"exp": past})), Some(KID));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn unknown_key_id_is_rejected() {
        let token = sign(&claims(json!({})), Some("rotated-away"));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("JWK not found")));
    }

    #[tokio::test]
    async fn missing_key_id_is_rejected() {
        let token = sign(&claims(json!({})), None);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn symmetric_tokens_are_rejected() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.to_string());
        let token = encode(
            &header,
            &claims(json!({})),
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("algorithm")));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let err = verifier().verify("fake-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    // --- remote key set ---

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::header, routing::get, Router};

    /// Serve the fixture key set on a local port, counting fetches
    async fn serve_key_set() -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ([(header::CONTENT_TYPE, "application/json")], KEY_SET)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let url = Url::parse(&format!("http://{}/.well-known/jwks.json", addr)).unwrap();
        (url, hits)
    }

    fn remote_verifier(url: Url, ttl_secs: u64) -> JwksVerifier {
        let config = AuthConfig {
            jwks_cache_ttl_secs: ttl_secs,
            ..config()
        };
        JwksVerifier::with_jwks_url(&config, url).unwrap()
    }

    #[tokio::test]
    async fn key_set_is_fetched_once_within_ttl() {
        let (url, hits) = serve_key_set().await;
        let verifier = remote_verifier(url, 3600);
        let token = sign(&claims(json!({})), Some(KID));

        for _ in 0..3 {
            verifier.verify(&token).await.unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_is_refetched() {
        let (url, hits) = serve_key_set().await;
        let verifier = remote_verifier(url, 0);
        let token = sign(&claims(json!({})), Some(KID));

        verifier.verify(&token).await.unwrap();
        verifier.verify(&token).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_cold_requests_share_one_fetch() {
        let (url, hits) = serve_key_set().await;
        let verifier = Arc::new(remote_verifier(url, 3600));
        let token = sign(&claims(json!({})), Some(KID));

        let mut requests = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let verifier = verifier.clone();
            let token = token.clone();
            requests.spawn(async move { verifier.verify(&token).await });
        }
        while let Some(result) = requests.join_next().await {
            assert!(result.unwrap().is_ok());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_key_id_triggers_one_refetch() {
        let (url, hits) = serve_key_set().await;
        let mut verifier = remote_verifier(url, 3600);
        verifier.min_refresh = Duration::ZERO;

        verifier.verify(&sign(&claims(json!({})), Some(KID))).await.unwrap();
        let err = verifier
            .verify(&sign(&claims(json!({})), Some("rotated-in")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg.contains("JWK not found")));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // The known key is still served from the refreshed cache
        verifier.verify(&sign(&claims(json!({})), Some(KID))).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_key_id_refetch_is_rate_limited() {
        let (url, hits) = serve_key_set().await;
        let verifier = remote_verifier(url, 3600);

        verifier.verify(&sign(&claims(json!({})), Some(KID))).await.unwrap();
        for kid in ["rotated-in", "another-one"] {
            let err = verifier
                .verify(&sign(&claims(json!({})), Some(kid)))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken(_)));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_key_set_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{}/.well-known/jwks.json", addr)).unwrap();
        let verifier = remote_verifier(url, 3600);

        let err = verifier
            .verify(&sign(&claims(json!({})), Some(KID)))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::KeySetUnavailable(_)));
    }
}
