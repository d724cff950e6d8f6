use crate::services::activity_tracker::SessionExtender;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cookie-backed HTTP session against a running fleetdesk server.
///
/// Plugs into an `ActivityTracker` as its `SessionExtender`, so a client that
/// forwards its interaction events keeps the server session alive.
#[derive(Debug)]
pub struct SessionClient {
    base_url: String,
    client: reqwest::Client,
    authenticated: AtomicBool,
}

impl SessionClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client, authenticated: AtomicBool::new(false) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Signs in and keeps the session cookies. Returns whether the server
    /// accepted the credentials.
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let ok = response.status().is_success();
        self.authenticated.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    /// Re-reads the session state from the server.
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached or answers with garbage.
    pub async fn refresh_status(&self) -> Result<bool, reqwest::Error> {
        let status: serde_json::Value = self.client.get(self.url("/auth/session")).send().await?.json().await?;
        let authenticated = status["authenticated"].as_bool().unwrap_or(false);
        self.authenticated.store(authenticated, Ordering::SeqCst);
        Ok(authenticated)
    }

    /// # Errors
    /// Returns an error if the server cannot be reached.
    pub async fn sign_out(&self) -> Result<(), reqwest::Error> {
        self.authenticated.store(false, Ordering::SeqCst);
        self.client.post(self.url("/auth/logout")).send().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionExtender for SessionClient {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn extend(&self) -> bool {
        let extended = match self.client.post(self.url("/auth/extend")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Session extension request failed");
                false
            }
        };
        self.authenticated.store(extended, Ordering::SeqCst);
        extended
    }
}
