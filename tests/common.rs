#![allow(dead_code)]

use async_trait::async_trait;
use clap::Parser;
use dashmap::DashMap;
use fleetdesk::AppBuilder;
use fleetdesk::adapters::identity::IdentityProvider;
use fleetdesk::api::MgmtState;
use fleetdesk::config::Config;
use fleetdesk::domain::session::{Session, SessionTokens};
use fleetdesk::domain::user::User;
use fleetdesk::error::ProviderError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

static INIT: Once = Once::new();

pub const EMAIL: &str = "dispatch@fleet.test";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("fleetdesk=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("rustls=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// In-memory identity provider with GoTrue-like token rotation.
#[derive(Debug)]
pub struct FakeProvider {
    users: DashMap<String, (User, String)>,
    sessions: DashMap<String, Session>,
    refresh_tokens: DashMap<String, User>,
    access_ttl: time::Duration,
    failing: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        let provider = Self {
            users: DashMap::new(),
            sessions: DashMap::new(),
            refresh_tokens: DashMap::new(),
            access_ttl: time::Duration::hours(1),
            failing: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        };
        provider.add_user(EMAIL, PASSWORD);
        Arc::new(provider)
    }

    pub fn add_user(&self, email: &str, password: &str) -> User {
        let user = User::new(Uuid::new_v4()).with_email(email);
        self.users.insert(email.to_string(), (user.clone(), password.to_string()));
        user
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Backdates an access token so only its refresh token can revive the session.
    pub fn expire_access_token(&self, access_token: &str) {
        if let Some(mut session) = self.sessions.get_mut(access_token) {
            session.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        }
    }

    pub fn is_live(&self, access_token: &str) -> bool {
        self.sessions.get(access_token).is_some_and(|s| !s.is_expired())
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status { status: 503, message: "provider down".into() });
        }
        Ok(())
    }

    fn issue(&self, user: User) -> Session {
        let now = OffsetDateTime::now_utc();
        let session = Session {
            user: user.clone(),
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: Some(format!("refresh-{}", Uuid::new_v4())),
            issued_at: now,
            expires_at: now + self.access_ttl,
        };
        self.sessions.insert(session.access_token.clone(), session.clone());
        if let Some(refresh) = &session.refresh_token {
            self.refresh_tokens.insert(refresh.clone(), user);
        }
        session
    }

    fn rotate(&self, refresh_token: &str) -> Option<Session> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let (_, user) = self.refresh_tokens.remove(refresh_token)?;
        Some(self.issue(user))
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self, tokens: &SessionTokens) -> Result<Option<Session>, ProviderError> {
        self.check()?;
        if let Some(access) = tokens.access_token.as_deref()
            && let Some(session) = self.sessions.get(access)
            && !session.is_expired()
        {
            return Ok(Some(session.clone()));
        }
        Ok(tokens.refresh_token.as_deref().and_then(|r| self.rotate(r)))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, ProviderError> {
        self.check()?;
        Ok(self.rotate(refresh_token))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Option<Session>, ProviderError> {
        self.check()?;
        let user = match self.users.get(email) {
            Some(entry) if entry.1 == password => entry.0.clone(),
            _ => return Ok(None),
        };
        Ok(Some(self.issue(user)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.check()?;
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions.remove(access_token);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        self.check()
    }
}

pub fn get_test_config() -> Config {
    let mut config = Config::try_parse_from(["fleetdesk"]).unwrap();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.server.static_dir = None;
    config.rate_limit.login_per_second = 1000;
    config.rate_limit.login_burst = 1000;
    config.warmup.interval_secs = 0;
    config.warmup.timeout_ms = 2000;
    config.auth.session_revalidate_secs = 0;
    config
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

/// Client without a cookie store, for requests that set cookies by hand.
pub fn bare_client() -> reqwest::Client {
    reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub config: Config,
    pub client: reqwest::Client,
    pub provider: Arc<FakeProvider>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(mut config: Config) -> Self {
        setup_tracing();
        let provider = FakeProvider::new();

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        config.server.port = api_addr.port();
        config.server.mgmt_port = mgmt_addr.port();
        config.warmup.base_url = Some(format!("http://{api_addr}"));

        let app = AppBuilder::new(config.clone())
            .with_identity_provider(Arc::clone(&provider) as Arc<dyn IdentityProvider>)
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _workers = app.workers.spawn_all(shutdown_rx.clone());

        let app_router = fleetdesk::api::app_router(&config, app.services);
        let mgmt_app = fleetdesk::api::mgmt_router(MgmtState { health_service: app.health_service });

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            server_url: format!("http://{api_addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            config,
            client: http_client(),
            provider,
            shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    /// Signs the shared client in as the default operator.
    pub async fn login(&self) -> serde_json::Value {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": EMAIL, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Signs in directly against the provider and returns the raw tokens.
    pub async fn issue_session(&self) -> Session {
        self.provider.sign_in_with_password(EMAIL, PASSWORD).await.unwrap().unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub fn cookie_header(session: &Session) -> String {
    let mut header = format!("fd-access-token={}", session.access_token);
    if let Some(refresh) = &session.refresh_token {
        header.push_str(&format!("; fd-refresh-token={refresh}"));
    }
    header
}

/// Returns the value a `Set-Cookie` header assigns to `name`, if any.
pub fn set_cookie_value(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers().get_all(reqwest::header::SET_COOKIE).iter().find_map(|h| {
        let raw = h.to_str().ok()?;
        let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

pub fn set_cookie_header(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{name}=")))
        .map(str::to_string)
}
