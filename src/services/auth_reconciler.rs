use crate::adapters::identity::IdentityProvider;
use crate::domain::session::{AuthState, Session, SessionTokens};
use crate::error::{AppError, ProviderError, Result};
use crate::services::session_store::SessionStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct Metrics {
    reconcile_total: Counter<u64>,
    provider_failures_total: Counter<u64>,
    sign_in_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("fleetdesk");
        Self {
            reconcile_total: meter
                .u64_counter("auth_reconcile_total")
                .with_description("Session reconciliations by operation and outcome")
                .build(),
            provider_failures_total: meter
                .u64_counter("auth_provider_failures_total")
                .with_description("Identity provider calls that failed and were treated as unauthenticated")
                .build(),
            sign_in_total: meter
                .u64_counter("auth_sign_in_total")
                .with_description("Sign-in attempts by outcome")
                .build(),
        }
    }
}

/// Keeps the local view of a caller's session in line with the identity provider.
///
/// Every provider fault reconciles to `Unauthenticated`. A session the provider
/// confirmed within the revalidation window is answered from the cache.
#[derive(Clone, Debug)]
pub struct AuthReconciler {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
    revalidate_after: time::Duration,
    metrics: Metrics,
}

impl AuthReconciler {
    /// A reconciler that asks the provider on every request.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: SessionStore) -> Self {
        Self { provider, store, revalidate_after: time::Duration::ZERO, metrics: Metrics::new() }
    }

    /// Trusts cached confirmations younger than `window`. Zero disables the cache.
    #[must_use]
    pub fn with_revalidation(mut self, window: time::Duration) -> Self {
        self.revalidate_after = window;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolves the session behind `tokens`, from the cache while its last
    /// confirmation is fresh and from the provider otherwise.
    #[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
    pub async fn reconcile(&self, tokens: &SessionTokens) -> AuthState {
        if tokens.is_empty() {
            return AuthState::Unauthenticated;
        }

        if self.revalidate_after.is_positive()
            && let Some(access_token) = tokens.access_token.as_deref()
            && let Some(session) =
                self.store.get_confirmed_within(access_token, self.revalidate_after, OffsetDateTime::now_utc())
        {
            tracing::Span::current().record("user_id", tracing::field::display(session.user.id));
            self.record("reconcile", "cached");
            return AuthState::Authenticated(Box::new(session));
        }

        let result = self.provider.get_session(tokens).await;
        self.settle(tokens, result, "reconcile")
    }

    /// Trades the refresh token for a fresh session.
    #[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
    pub async fn extend(&self, tokens: &SessionTokens) -> AuthState {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            tracing::debug!("No refresh token, cannot extend session");
            self.forget(tokens);
            self.record("extend", "unauthenticated");
            return AuthState::Unauthenticated;
        };

        let result = self.provider.refresh_session(refresh_token).await;
        self.settle(tokens, result, "extend")
    }

    /// Password sign-in.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` when the provider rejects the credentials
    /// and `AppError::Provider` when it cannot be reached.
    #[tracing::instrument(skip_all, err(level = "warn"), fields(user_id = tracing::field::Empty))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = match self.provider.sign_in_with_password(email, password).await {
            Ok(Some(session)) if !session.is_expired() => session,
            Ok(_) => {
                self.metrics.sign_in_total.add(1, &[KeyValue::new("outcome", "rejected")]);
                return Err(AppError::AuthError);
            }
            Err(e) => {
                self.metrics.sign_in_total.add(1, &[KeyValue::new("outcome", "error")]);
                return Err(e.into());
            }
        };

        tracing::Span::current().record("user_id", tracing::field::display(session.user.id));
        self.store.insert(&session);
        self.metrics.sign_in_total.add(1, &[KeyValue::new("outcome", "ok")]);
        tracing::info!("User signed in");
        Ok(session)
    }

    /// Revokes the session with the provider and drops it locally. Provider
    /// failures are logged; the local state is cleared regardless.
    #[tracing::instrument(skip_all)]
    pub async fn sign_out(&self, tokens: &SessionTokens) {
        self.forget(tokens);

        if let Some(access_token) = tokens.access_token.as_deref()
            && let Err(e) = self.provider.sign_out(access_token).await
        {
            tracing::warn!(error = %e, "Provider sign-out failed, local session cleared anyway");
        }
    }

    fn settle(
        &self,
        tokens: &SessionTokens,
        result: std::result::Result<Option<Session>, ProviderError>,
        operation: &'static str,
    ) -> AuthState {
        match result {
            Ok(Some(session)) if !session.is_expired() => {
                if let Some(previous) = tokens.access_token.as_deref()
                    && previous != session.access_token
                {
                    self.store.remove(previous);
                }
                self.store.insert(&session);
                tracing::Span::current().record("user_id", tracing::field::display(session.user.id));
                self.record(operation, "authenticated");
                AuthState::Authenticated(Box::new(session))
            }
            Ok(Some(_)) => {
                tracing::debug!(operation, "Provider returned an expired session");
                self.forget(tokens);
                self.record(operation, "expired");
                AuthState::Unauthenticated
            }
            Ok(None) => {
                self.forget(tokens);
                self.record(operation, "unauthenticated");
                AuthState::Unauthenticated
            }
            Err(e) => {
                tracing::warn!(error = %e, operation, "Identity provider call failed, treating caller as unauthenticated");
                self.metrics.provider_failures_total.add(1, &[KeyValue::new("operation", operation)]);
                self.forget(tokens);
                self.record(operation, "provider_error");
                AuthState::Unauthenticated
            }
        }
    }

    fn forget(&self, tokens: &SessionTokens) {
        if let Some(access_token) = tokens.access_token.as_deref() {
            self.store.remove(access_token);
        }
    }

    fn record(&self, operation: &'static str, outcome: &'static str) {
        self.metrics
            .reconcile_total
            .add(1, &[KeyValue::new("operation", operation), KeyValue::new("outcome", outcome)]);
    }
}
