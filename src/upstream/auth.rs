//! OAuth access tokens for the Zoho APIs.
//!
//! Zoho issues short-lived access tokens (one hour) from a long-lived refresh
//! token. [`RefreshTokenAuth`] exchanges the refresh token on demand and
//! caches the access token until shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Result, StockroomError};

/// Renew this long before the provider-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for upstream requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid access token.
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, e.g. one minted out of band.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// OAuth client credentials plus a refresh token.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

struct CachedToken {
    token: String,
    renew_at: Instant,
}

/// Refresh-token grant against the Zoho accounts server.
pub struct RefreshTokenAuth {
    http: Client,
    token_url: String,
    credentials: OAuthCredentials,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl RefreshTokenAuth {
    /// Create an authenticator for an accounts server base URL
    /// (e.g. `https://accounts.zoho.com`).
    pub fn new(accounts_url: impl Into<String>, credentials: OAuthCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| {
                StockroomError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            token_url: format!("{}/oauth/v2/token", accounts_url.into().trim_end_matches('/')),
            credentials,
            cached: Mutex::new(None),
        })
    }

    async fn exchange(&self) -> Result<(String, Duration)> {
        let response = self
            .http
            .post(&self.token_url)
            .query(&[
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| StockroomError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => StockroomError::AuthenticationFailed,
                code => StockroomError::Api {
                    status: code,
                    message: format!("token refresh failed: {status}"),
                },
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StockroomError::Http(e.to_string()))?;

        // Zoho answers bad refresh tokens with 200 + {"error": "invalid_code"}.
        if let Some(error) = body.error {
            debug!(error, "token refresh rejected");
            return Err(StockroomError::AuthenticationFailed);
        }
        let token = body.access_token.ok_or(StockroomError::AuthenticationFailed)?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        Ok((token, lifetime))
    }
}

#[async_trait]
impl TokenSource for RefreshTokenAuth {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.renew_at {
                return Ok(current.token.clone());
            }
        }

        let (token, lifetime) = self.exchange().await?;
        info!(expires_in_secs = lifetime.as_secs(), "refreshed upstream access token");
        *cached = Some(CachedToken {
            token: token.clone(),
            renew_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }
}
