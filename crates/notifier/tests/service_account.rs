//! `ServiceAccountIssuer` against a mocked Google OAuth2 token endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pushgate_notifier::credential::{AssertionClaims, FCM_SCOPE};
use pushgate_notifier::{CredentialCache, CredentialError, CredentialIssuer, ServiceAccountIssuer};

const PRIVATE_KEY: &str = include_str!("fixtures/service_account_key.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/service_account_pub.pem");
const CLIENT_EMAIL: &str = "pushgate@demo-project.iam.gserviceaccount.com";

fn issuer(server: &MockServer) -> ServiceAccountIssuer {
    ServiceAccountIssuer::new(
        CLIENT_EMAIL,
        PRIVATE_KEY,
        format!("{}/token", server.uri()),
        Duration::from_secs(2),
    )
    .unwrap()
}

/// Pull the `assertion` form field out of a urlencoded body.
fn assertion_from(body: &[u8]) -> String {
    let body = String::from_utf8_lossy(body);
    body.split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .map(str::to_string)
        .expect("assertion field")
}

#[tokio::test]
async fn test_exchanges_signed_assertion_for_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let credential = issuer(&server).issue().await.unwrap();

    assert_eq!(credential.value, "ya29.test-token");
    assert!(credential.expires_at > before + chrono::Duration::seconds(3500));
    assert!(credential.expires_at <= Utc::now() + chrono::Duration::seconds(3599));

    // The assertion is an RS256 JWT for our identity, scope and audience
    let requests = server.received_requests().await.unwrap();
    let assertion = assertion_from(&requests[0].body);
    let token_uri = format!("{}/token", server.uri());
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[token_uri.as_str()]);
    validation.set_issuer(&[CLIENT_EMAIL]);
    let claims = decode::<AssertionClaims>(
        &assertion,
        &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
        &validation,
    )
    .unwrap()
    .claims;

    assert_eq!(claims.scope, FCM_SCOPE);
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[tokio::test]
async fn test_rejected_issuance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let err = issuer(&server).issue().await.unwrap_err();
    match err {
        CredentialError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unparseable_token_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = issuer(&server).issue().await.unwrap_err();
    assert!(matches!(err, CredentialError::Parse(_)));
}

#[tokio::test]
async fn test_cache_issues_once_for_repeated_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.cached",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = CredentialCache::new(Arc::new(issuer(&server)));
    for _ in 0..5 {
        assert_eq!(cache.get().await.unwrap(), "ya29.cached");
    }
}
