use crate::api::AppState;
use crate::domain::session::{AuthState, Session, SessionTokens};
use crate::error::AppError;
use crate::services::route_guard::{RouteDecision, canonical_path};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

pub const ACCESS_COOKIE: &str = "fd-access-token";
pub const REFRESH_COOKIE: &str = "fd-refresh-token";

/// How session cookies are written.
#[derive(Clone, Copy, Debug)]
pub struct CookiePolicy {
    pub secure: bool,
    pub refresh_ttl: time::Duration,
}

#[must_use]
pub fn session_tokens(jar: &CookieJar) -> SessionTokens {
    SessionTokens::new(
        jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()),
        jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()),
    )
}

fn session_cookie(name: &'static str, value: String, secure: bool, ttl: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value)).path("/").http_only(true).same_site(SameSite::Lax).secure(secure).max_age(ttl).build()
}

#[must_use]
pub fn store_session(jar: CookieJar, policy: CookiePolicy, session: &Session) -> CookieJar {
    let access_ttl = (session.expires_at - OffsetDateTime::now_utc()).max(time::Duration::ZERO);
    let jar = jar.add(session_cookie(ACCESS_COOKIE, session.access_token.clone(), policy.secure, access_ttl));

    match &session.refresh_token {
        Some(refresh_token) => {
            jar.add(session_cookie(REFRESH_COOKIE, refresh_token.clone(), policy.secure, policy.refresh_ttl))
        }
        None => jar,
    }
}

#[must_use]
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/")).remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// Brings the response cookies in line with the reconciled state: rotated
/// tokens are written back, dead ones are cleared.
#[must_use]
pub fn sync_cookies(jar: CookieJar, policy: CookiePolicy, tokens: &SessionTokens, auth: &AuthState) -> CookieJar {
    match auth.session() {
        Some(session) if auth.rotated_from(tokens) => store_session(jar, policy, session),
        Some(_) => jar,
        None if !tokens.is_empty() => clear_session(jar),
        None => jar,
    }
}

fn suppress_caching(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

/// Reconciles the caller's session on every non-excluded request and either
/// lets it through or redirects. Rules are matched against the canonical path
/// so encoded or doubled separators cannot slip past them.
pub async fn route_guard(State(state): State<AppState>, jar: CookieJar, mut request: Request, next: Next) -> Response {
    let Some(path) = canonical_path(request.uri().path()) else {
        return AppError::BadRequest("Invalid path".into()).into_response();
    };
    if state.route_guard.is_excluded(&path) {
        return next.run(request).await;
    }

    let tokens = session_tokens(&jar);
    let auth = state.reconciler.reconcile(&tokens).await;
    if let Some(user) = auth.user() {
        tracing::Span::current().record("user_id", tracing::field::display(user.id));
    }
    let jar = sync_cookies(jar, state.cookies, &tokens, &auth);

    match state.route_guard.evaluate(&path, auth.is_authenticated()) {
        RouteDecision::Redirected { to } => {
            tracing::debug!(path = %path, to = %to, "Route guard redirect");
            (jar, Redirect::temporary(&to)).into_response()
        }
        RouteDecision::Allowed => {
            let protected = state.route_guard.is_protected(&path);
            request.extensions_mut().insert(auth);

            let mut response = next.run(request).await;
            if protected {
                suppress_caching(response.headers_mut());
            }
            (jar, response).into_response()
        }
    }
}

/// The authenticated session attached by `route_guard`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthState>() {
            Some(AuthState::Authenticated(session)) => Ok(Self(session.as_ref().clone())),
            _ => Err(AppError::AuthError),
        }
    }
}
