use crate::domain::session::{Session, SessionTokens};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::fmt::Debug;

pub mod gotrue;

pub use gotrue::GoTrueProvider;

/// The hosted identity provider that owns every session.
///
/// `Ok(None)` means the provider answered and there is no valid session;
/// `Err` means the provider could not be asked.
#[async_trait]
pub trait IdentityProvider: Send + Sync + Debug {
    /// Returns the session for the given credentials, refreshing an expired
    /// access token when a refresh token is available.
    async fn get_session(&self, tokens: &SessionTokens) -> Result<Option<Session>, ProviderError>;

    /// Exchanges a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, ProviderError>;

    /// Password sign-in.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Option<Session>, ProviderError>;

    /// Revokes the session behind the access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), ProviderError>;
}

/// Stand-in used when the backend is not configured in a hosted deployment.
#[derive(Debug, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl IdentityProvider for UnavailableProvider {
    async fn get_session(&self, _tokens: &SessionTokens) -> Result<Option<Session>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Option<Session>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Option<Session>, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}
