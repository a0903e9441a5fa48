//! Credential acquisition and caching.
//!
//! The tool talks to two protected audiences: the partner administration API
//! and the directory graph. [`CredentialCache`] holds at most one bearer
//! credential per audience and re-acquires on expiry; acquisition is an
//! interactive device-code flow, so callers for the same audience are
//! serialized to avoid duplicate prompts.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http::ApiClient;

/// Safety margin: a credential is usable only if it expires later than this
/// far in the future.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Scopes for the partner administration API audience.
const PARTNER_SCOPES: &[&str] =
    &["https://api.partnercustomeradministration.microsoft.com/PartnerCustomerDelegatedAdministration.ReadWrite.All"];

/// Scopes for the directory graph audience.
const GRAPH_SCOPES: &[&str] = &["https://graph.microsoft.com/Group.Read.All"];

/// Logical resource audience a credential is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    PartnerApi,
    Graph,
}

impl Resource {
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Resource::PartnerApi => PARTNER_SCOPES,
            Resource::Graph => GRAPH_SCOPES,
        }
    }

    fn slot_index(&self) -> usize {
        match self {
            Resource::PartnerApi => 0,
            Resource::Graph => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::PartnerApi => "partner_api",
            Resource::Graph => "graph",
        }
    }
}

/// A resource-scoped bearer credential.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    /// Home tenant of the signed-in account, read from the token claims.
    pub tenant_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Usable only while the expiry is more than the safety margin away.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(EXPIRY_MARGIN_MINUTES) < self.expires_at
    }
}

/// Errors from credential acquisition. All are terminal for the current
/// operation; no remote data calls are attempted without a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("device code request failed: {0}")]
    DeviceCodeRequest(String),
    #[error("authentication was declined: {0}")]
    Declined(String),
    #[error("the device code expired before sign-in completed")]
    CodeExpired,
    #[error("transport error during authentication: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Seam for acquiring a credential for a resource. The production
/// implementation is interactive; tests substitute a counting stub.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    async fn acquire(&self, resource: Resource) -> Result<Credential, CredentialError>;
}

/// Per-resource credential cache. Holds at most one credential per audience;
/// the per-slot mutex is held across acquisition so concurrent callers cannot
/// trigger duplicate interactive prompts.
pub struct CredentialCache {
    acquirer: Arc<dyn TokenAcquirer>,
    slots: [Mutex<Option<Credential>>; 2],
}

impl CredentialCache {
    pub fn new(acquirer: Arc<dyn TokenAcquirer>) -> Self {
        Self {
            acquirer,
            slots: [Mutex::new(None), Mutex::new(None)],
        }
    }

    /// Return a fresh credential for `resource`, re-acquiring when the cached
    /// one is absent or within the expiry margin.
    pub async fn acquire(&self, resource: Resource) -> Result<Credential, CredentialError> {
        let mut slot = self.slots[resource.slot_index()].lock().await;
        let now = Utc::now();

        if let Some(credential) = slot.as_ref() {
            if credential.is_fresh_at(now) {
                counter!("credential_cache_hits_total", "resource" => resource.as_str())
                    .increment(1);
                return Ok(credential.clone());
            }
            debug!(resource = resource.as_str(), "cached credential near expiry, re-acquiring");
        }

        counter!("credential_acquisitions_total", "resource" => resource.as_str()).increment(1);
        let credential = self.acquirer.acquire(resource).await?;
        *slot = Some(credential.clone());
        info!(
            resource = resource.as_str(),
            expires_at = %credential.expires_at,
            "acquired credential"
        );
        Ok(credential)
    }

    /// Home tenant id of the partner account, if a partner credential has
    /// been acquired during this process.
    pub async fn partner_tenant_id(&self) -> Option<String> {
        let slot = self.slots[Resource::PartnerApi.slot_index()].lock().await;
        slot.as_ref().map(|credential| credential.tenant_id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    #[allow(dead_code)]
    user_code: String,
    #[allow(dead_code)]
    verification_uri: String,
    expires_in: u64,
    interval: u64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Interactive device-code authenticator against the identity provider.
///
/// Cache misses block the calling operation on the operator completing
/// browser sign-in; this is the single interactive suspension point of the
/// credential layer.
pub struct DeviceCodeAuthenticator {
    client: reqwest::Client,
    authority: String,
    client_id: String,
}

impl DeviceCodeAuthenticator {
    pub fn new(authority: String, client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            authority: authority.trim_end_matches('/').to_string(),
            client_id,
        }
    }
}

#[async_trait]
impl TokenAcquirer for DeviceCodeAuthenticator {
    async fn acquire(&self, resource: Resource) -> Result<Credential, CredentialError> {
        let scope = resource.scopes().join(" ");
        println!("Authenticating: sign in via web browser");

        let response = self
            .client
            .post(format!("{}/oauth2/v2.0/devicecode", self.authority))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::DeviceCodeRequest(body));
        }
        let device: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;

        println!("{}", device.message);

        let deadline = Utc::now() + Duration::seconds(device.expires_in as i64);
        let poll_interval = std::time::Duration::from_secs(device.interval.max(1));

        loop {
            if Utc::now() > deadline {
                return Err(CredentialError::CodeExpired);
            }
            tokio::time::sleep(poll_interval).await;

            let response = self
                .client
                .post(format!("{}/oauth2/v2.0/token", self.authority))
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| CredentialError::Malformed(e.to_string()))?;
                let tenant_id = tenant_id_from_token(&token.access_token).unwrap_or_default();
                return Ok(Credential {
                    expires_at: Utc::now() + Duration::seconds(token.expires_in),
                    access_token: token.access_token,
                    tenant_id,
                });
            }

            let error: TokenErrorResponse = response
                .json()
                .await
                .map_err(|e| CredentialError::Malformed(e.to_string()))?;
            match error.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    tokio::time::sleep(poll_interval).await;
                }
                "expired_token" => return Err(CredentialError::CodeExpired),
                _ => {
                    warn!(error = %error.error, "device code sign-in declined");
                    return Err(CredentialError::Declined(if error.error_description.is_empty() {
                        error.error
                    } else {
                        error.error_description
                    }));
                }
            }
        }
    }
}

/// Read the `tid` claim out of a bearer token without verifying it. The
/// token was just issued over TLS; the claim is informational only.
fn tenant_id_from_token(access_token: &str) -> Option<String> {
    let payload = access_token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("tid")?.as_str().map(str::to_string)
}

/// Idempotently register this client as a service principal in the partner
/// tenant. The remote answers 409 Conflict when the principal already
/// exists, which is treated identically to success.
pub async fn ensure_service_principal(
    client: &ApiClient,
    graph_base: &str,
    token: &str,
    app_id: &str,
) -> Result<(), crate::http::ApiError> {
    let url = format!("{}/v1.0/servicePrincipals", graph_base.trim_end_matches('/'));
    let body = serde_json::json!({ "appId": app_id });
    match client.post_no_content(&url, token, &body).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_conflict() => {
            debug!("service principal already registered");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAcquirer {
        calls: AtomicUsize,
        ttl_minutes: i64,
    }

    #[async_trait]
    impl TokenAcquirer for CountingAcquirer {
        async fn acquire(&self, resource: Resource) -> Result<Credential, CredentialError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential {
                access_token: format!("token-{}-{}", resource.as_str(), call),
                tenant_id: "tenant-1".to_string(),
                expires_at: Utc::now() + Duration::minutes(self.ttl_minutes),
            })
        }
    }

    #[tokio::test]
    async fn fresh_credential_is_reused() {
        let acquirer = Arc::new(CountingAcquirer {
            calls: AtomicUsize::new(0),
            ttl_minutes: 10,
        });
        let cache = CredentialCache::new(acquirer.clone());

        let first = cache.acquire(Resource::PartnerApi).await.unwrap();
        let second = cache.acquire(Resource::PartnerApi).await.unwrap();
        assert_eq!(first.access_token, second.access_token);
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn near_expiry_credential_is_reacquired() {
        let acquirer = Arc::new(CountingAcquirer {
            calls: AtomicUsize::new(0),
            ttl_minutes: 1,
        });
        let cache = CredentialCache::new(acquirer.clone());

        let first = cache.acquire(Resource::PartnerApi).await.unwrap();
        let second = cache.acquire(Resource::PartnerApi).await.unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resources_are_cached_independently() {
        let acquirer = Arc::new(CountingAcquirer {
            calls: AtomicUsize::new(0),
            ttl_minutes: 10,
        });
        let cache = CredentialCache::new(acquirer.clone());

        cache.acquire(Resource::PartnerApi).await.unwrap();
        cache.acquire(Resource::Graph).await.unwrap();
        cache.acquire(Resource::Graph).await.unwrap();
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partner_tenant_id_reflects_cached_credential() {
        let acquirer = Arc::new(CountingAcquirer {
            calls: AtomicUsize::new(0),
            ttl_minutes: 10,
        });
        let cache = CredentialCache::new(acquirer);
        assert_eq!(cache.partner_tenant_id().await, None);
        cache.acquire(Resource::PartnerApi).await.unwrap();
        assert_eq!(cache.partner_tenant_id().await.as_deref(), Some("tenant-1"));
    }

    #[test]
    fn tenant_id_claim_is_decoded() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"tid":"72f988bf-86f1-41af-91ab-2d7cd011db47"}"#);
        let token = format!("header.{payload}.signature");
        assert_eq!(
            tenant_id_from_token(&token).as_deref(),
            Some("72f988bf-86f1-41af-91ab-2d7cd011db47")
        );
        assert_eq!(tenant_id_from_token("not-a-jwt"), None);
    }
}
