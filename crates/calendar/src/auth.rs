//! Access tokens for the calendar API.
//!
//! [`ServiceAccountTokenSource`] signs a short-lived RS256 assertion with the
//! service account's private key and exchanges it at the OAuth token
//! endpoint (the JWT bearer grant). Tokens are cached until shortly before
//! they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::CalendarError;

/// OAuth scope for reading and writing calendar events.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion.
const ASSERTION_TTL_SECS: i64 = 3600;

/// Refresh this long before the cached token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can produce a bearer token for the calendar API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, CalendarError>;
}

/// A fixed token, for tests and pre-authorized deployments.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, CalendarError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Service account
// ---------------------------------------------------------------------------

/// Claims of the assertion sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(client_email: &str, token_url: &str, issued_at: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            scope: CALENDAR_SCOPE.to_string(),
            aud: token_url.to_string(),
            iat: issued_at,
            exp: issued_at + ASSERTION_TTL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Exchanges signed service-account assertions for access tokens.
pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    token_url: String,
    client_email: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

// The signing key and cached token stay out of logs.
impl std::fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("token_url", &self.token_url)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Build from the service account email and PEM-encoded RSA private key.
    ///
    /// Fails with [`CalendarError::Credentials`] if the key cannot be parsed.
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_email: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, CalendarError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| CalendarError::Credentials(format!("unreadable private key: {e}")))?;
        Ok(Self {
            client,
            token_url: token_url.into(),
            client_email: client_email.into(),
            key,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self) -> Result<String, CalendarError> {
        let claims = AssertionClaims::new(
            &self.client_email,
            &self.token_url,
            chrono::Utc::now().timestamp(),
        );
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| CalendarError::Credentials(format!("cannot sign assertion: {e}")))
    }

    async fn exchange(&self) -> Result<TokenResponse, CalendarError> {
        let assertion = self.sign_assertion()?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let parsed = serde_json::from_str::<TokenErrorBody>(&body).ok();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                code: parsed.as_ref().map(|b| b.error.clone()),
                message: parsed
                    .and_then(|b| b.error_description)
                    .unwrap_or(body),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CalendarError::Decode(format!("token response: {e}")))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, CalendarError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let lifetime = Duration::from_secs(fresh.expires_in.unwrap_or(ASSERTION_TTL_SECS as u64));
        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });
        tracing::debug!(expires_in_secs = lifetime.as_secs(), "Obtained calendar access token");
        Ok(fresh.access_token)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn assertion_claims_cover_one_hour() {
        let claims = AssertionClaims::new(
            "desk@project.iam.gserviceaccount.com",
            "https://oauth2.googleapis.com/token",
            1_700_000_000,
        );
        assert_eq!(claims.iss, "desk@project.iam.gserviceaccount.com");
        assert_eq!(claims.aud, "https://oauth2.googleapis.com/token");
        assert_eq!(claims.scope, CALENDAR_SCOPE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn garbage_private_key_is_a_credentials_error() {
        let result = ServiceAccountTokenSource::new(
            reqwest::Client::new(),
            "https://oauth2.googleapis.com/token",
            "desk@project.iam.gserviceaccount.com",
            "not a pem",
        );
        assert_matches!(result, Err(CalendarError::Credentials(_)));
    }

    #[test]
    fn token_sources_can_sit_inside_debug_types() {
        fn debuggable<T: std::fmt::Debug>() {}
        debuggable::<ServiceAccountTokenSource>();
        debuggable::<StaticToken>();
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let source = StaticToken("abc".into());
        assert_eq!(source.access_token().await.unwrap(), "abc");
    }
}
