//! FCM access-token issuance and caching.
//!
//! A single `CredentialCache` is built at start-up and shared by every
//! dispatch. It hands out the cached bearer token while it is unexpired and
//! otherwise exchanges a signed service-account JWT for a new one.
//!
//! The refresh path runs under an async mutex, so callers that arrive while a
//! refresh is in flight wait for it and then reuse its result instead of
//! issuing their own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::CredentialError;

/// OAuth scope required by the FCM HTTP v1 API.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion (Google caps it at one hour).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A bearer token and the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCredential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedCredential {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Usable strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Source of fresh access tokens.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self) -> Result<CachedCredential, CredentialError>;
}

/// Process-wide cache around a `CredentialIssuer`.
pub struct CredentialCache {
    issuer: Arc<dyn CredentialIssuer>,
    slot: Mutex<Option<CachedCredential>>,
}

impl CredentialCache {
    pub fn new(issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            issuer,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached bearer token, issuing a new one if absent or expired.
    pub async fn get(&self) -> Result<String, CredentialError> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref()
            && cached.is_valid_at(Utc::now())
        {
            return Ok(cached.value.clone());
        }

        let fresh = self.issuer.issue().await?;
        tracing::info!(expires_at = %fresh.expires_at, "Issued new FCM access token");

        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token if it is still `value`.
    ///
    /// Returns `true` if something was evicted. A token refreshed by another
    /// caller in the meantime is left alone.
    pub async fn invalidate(&self, value: &str) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(cached) if cached.value == value => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the cached token, if any.
    ///
    /// Never waits: while a refresh holds the slot this reports `None`.
    pub fn current(&self) -> Option<CachedCredential> {
        self.slot.try_lock().ok().and_then(|slot| slot.clone())
    }
}

/// JWT claims for the Google OAuth2 JWT-bearer grant.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Google OAuth2 token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Issues FCM access tokens from a Google service account.
pub struct ServiceAccountIssuer {
    client_email: String,
    token_uri: String,
    key: EncodingKey,
    http: reqwest::Client,
}

impl ServiceAccountIssuer {
    /// `private_key_pem` is the service account's RSA key in PEM form.
    pub fn new(
        client_email: impl Into<String>,
        private_key_pem: &str,
        token_uri: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| CredentialError::KeyParse(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        Ok(Self {
            client_email: client_email.into(),
            token_uri: token_uri.into(),
            key,
            http,
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| CredentialError::JwtEncode(e.to_string()))
    }
}

#[async_trait]
impl CredentialIssuer for ServiceAccountIssuer {
    async fn issue(&self) -> Result<CachedCredential, CredentialError> {
        let assertion = self.sign_assertion(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Token request rejected");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Parse(e.to_string()))?;

        Ok(CachedCredential::new(
            token.access_token,
            Utc::now() + chrono::Duration::seconds(token.expires_in),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Issues `token-1`, `token-2`, ... each living for `ttl`.
    struct CountingIssuer {
        calls: AtomicUsize,
        ttl: chrono::Duration,
        delay: Duration,
    }

    impl CountingIssuer {
        fn new(ttl: chrono::Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ttl,
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialIssuer for CountingIssuer {
        async fn issue(&self) -> Result<CachedCredential, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(CachedCredential::new(
                format!("token-{n}"),
                Utc::now() + self.ttl,
            ))
        }
    }

    struct FailingIssuer;

    #[async_trait]
    impl CredentialIssuer for FailingIssuer {
        async fn issue(&self) -> Result<CachedCredential, CredentialError> {
            Err(CredentialError::Rejected {
                status: 400,
                body: "invalid_grant".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_second_call_before_expiry_is_cached() {
        let issuer = Arc::new(CountingIssuer::new(chrono::Duration::hours(1)));
        let cache = CredentialCache::new(issuer.clone());

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(first, second);
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_is_reissued_once() {
        // Already expired the moment it is issued
        let issuer = Arc::new(CountingIssuer::new(chrono::Duration::seconds(-1)));
        let cache = CredentialCache::new(issuer.clone());

        assert_eq!(cache.get().await.unwrap(), "token-1");
        assert_eq!(cache.get().await.unwrap(), "token-2");
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_issuance() {
        let issuer = Arc::new(CountingIssuer {
            calls: AtomicUsize::new(0),
            ttl: chrono::Duration::hours(1),
            delay: Duration::from_millis(50),
        });
        let cache = Arc::new(CredentialCache::new(issuer.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await.unwrap() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "token-1");
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_current_does_not_wait_for_refresh() {
        let issuer = Arc::new(CountingIssuer {
            calls: AtomicUsize::new(0),
            ttl: chrono::Duration::hours(1),
            delay: Duration::from_millis(200),
        });
        let cache = Arc::new(CredentialCache::new(issuer.clone()));

        let refresh = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await.unwrap() })
        };
        while issuer.calls() == 0 {
            tokio::task::yield_now().await;
        }

        // Issuance is in flight and holds the slot
        assert!(cache.current().is_none());

        assert_eq!(refresh.await.unwrap(), "token-1");
        assert_eq!(cache.current().unwrap().value, "token-1");
    }

    #[tokio::test]
    async fn test_issuer_failure_propagates_and_caches_nothing() {
        let cache = CredentialCache::new(Arc::new(FailingIssuer));
        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, CredentialError::Rejected { status: 400, .. }));
        assert!(cache.current().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_only_matching_value() {
        let issuer = Arc::new(CountingIssuer::new(chrono::Duration::hours(1)));
        let cache = CredentialCache::new(issuer.clone());

        let token = cache.get().await.unwrap();
        assert!(!cache.invalidate("some-other-token").await);
        assert!(cache.current().is_some());

        assert!(cache.invalidate(&token).await);
        assert!(cache.current().is_none());

        assert_eq!(cache.get().await.unwrap(), "token-2");
        assert_eq!(issuer.calls(), 2);
    }

    #[test]
    fn test_validity_is_strictly_before_expiry() {
        let expires_at = Utc::now();
        let cred = CachedCredential::new("t", expires_at);
        assert!(!cred.is_valid_at(expires_at));
        assert!(cred.is_valid_at(expires_at - chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let result = ServiceAccountIssuer::new(
            "svc@example.iam.gserviceaccount.com",
            "not a pem",
            "https://oauth2.googleapis.com/token",
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(CredentialError::KeyParse(_))));
    }
}
