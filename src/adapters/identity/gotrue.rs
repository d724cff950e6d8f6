use crate::adapters::identity::IdentityProvider;
use crate::config::{AuthConfig, BackendCredentials};
use crate::domain::session::{Session, SessionTokens};
use crate::domain::user::User;
use crate::error::ProviderError;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Client for a GoTrue-compatible auth REST API (`{api_url}/auth/v1`).
#[derive(Debug, Clone)]
pub struct GoTrueProvider {
    client: reqwest::Client,
    auth_url: String,
    api_key: String,
    retry_strategy: ExponentialBuilder,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
    role: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    role: Option<String>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            display_name: record.user_metadata.full_name.or(record.user_metadata.name),
            role: record.app_metadata.role.or(record.role),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserRecord,
}

/// The subset of access token claims needed to judge expiry locally.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub(crate) struct AccessClaims {
    pub(crate) exp: i64,
    pub(crate) iat: Option<i64>,
}

/// Reads the claims of a JWT without checking its signature. The provider
/// validates the token on every user lookup; this only decides whether a
/// refresh is needed first.
pub(crate) fn decode_claims(token: &str) -> Option<AccessClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn timestamp(secs: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs).ok()
}

impl GoTrueProvider {
    /// Builds a provider client.
    ///
    /// # Errors
    /// Returns `ProviderError::Transport` if the HTTP client cannot be constructed.
    pub fn new(credentials: &BackendCredentials, config: &AuthConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(Duration::from_millis(config.provider_timeout_ms)).build()?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(config.provider_max_retries);

        Ok(Self {
            client,
            auth_url: format!("{}/auth/v1", credentials.api_url),
            api_key: credentials.api_key.clone(),
            retry_strategy,
        })
    }

    /// Sends a request, retrying only when the provider could not be reached.
    async fn send(&self, build: impl Fn() -> RequestBuilder + Send + Sync) -> Result<Response, ProviderError> {
        let build = &build;
        let response = (|| async move { build().send().await })
            .retry(&self.retry_strategy)
            .when(|e: &reqwest::Error| e.is_connect() || e.is_timeout())
            .notify(|e, duration| {
                tracing::warn!(error = %e, retry_in_ms = %duration.as_millis(), "Identity provider unreachable, retrying");
            })
            .await?;
        Ok(response)
    }

    async fn status_error(response: Response) -> ProviderError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        ProviderError::Status { status, message }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, ProviderError> {
        let url = format!("{}/user", self.auth_url);
        let response =
            self.send(|| self.client.get(&url).header("apikey", &self.api_key).bearer_auth(access_token)).await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s if s.is_success() => {
                let record: UserRecord =
                    response.json().await.map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
                Ok(Some(record.into()))
            }
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Option<Session>, ProviderError> {
        let url = format!("{}/token?grant_type={grant_type}", self.auth_url);
        let response = self.send(|| self.client.post(&url).header("apikey", &self.api_key).json(&body)).await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(grant_type, status = %response.status(), "Token grant rejected");
                Ok(None)
            }
            s if s.is_success() => {
                let token: TokenResponse =
                    response.json().await.map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
                Ok(Some(Self::session_from_token(token)))
            }
            _ => Err(Self::status_error(response).await),
        }
    }

    fn session_from_token(token: TokenResponse) -> Session {
        let now = OffsetDateTime::now_utc();
        let claims = decode_claims(&token.access_token);

        let expires_at = token
            .expires_at
            .or_else(|| claims.as_ref().map(|c| c.exp))
            .and_then(timestamp)
            .or_else(|| token.expires_in.map(|secs| now + time::Duration::seconds(secs)))
            .unwrap_or(now);
        let issued_at = claims.and_then(|c| c.iat).and_then(timestamp).unwrap_or(now);

        Session {
            user: token.user.into(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            issued_at,
            expires_at,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn get_session(&self, tokens: &SessionTokens) -> Result<Option<Session>, ProviderError> {
        let now = OffsetDateTime::now_utc();
        let live = tokens
            .access_token
            .as_deref()
            .and_then(|token| decode_claims(token).map(|claims| (token, claims)))
            .filter(|(_, claims)| claims.exp > now.unix_timestamp());

        let Some((access_token, claims)) = live else {
            return match tokens.refresh_token.as_deref() {
                Some(refresh_token) => {
                    tracing::debug!("Access token missing or expired, refreshing");
                    self.refresh_session(refresh_token).await
                }
                None => Ok(None),
            };
        };

        let Some(user) = self.fetch_user(access_token).await? else {
            return Ok(None);
        };

        Ok(Some(Session {
            user,
            access_token: access_token.to_string(),
            refresh_token: tokens.refresh_token.clone(),
            issued_at: claims.iat.and_then(timestamp).unwrap_or(now),
            expires_at: timestamp(claims.exp).unwrap_or(now),
        }))
    }

    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, ProviderError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token })).await
    }

    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Option<Session>, ProviderError> {
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let url = format!("{}/logout", self.auth_url);
        let response =
            self.send(|| self.client.post(&url).header("apikey", &self.api_key).bearer_auth(access_token)).await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            // Already revoked or unknown to the provider
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/health", self.auth_url);
        let response = self.client.get(&url).header("apikey", &self.api_key).send().await?;
        if response.status().is_success() { Ok(()) } else { Err(Self::status_error(response).await) }
    }
}
