use crate::api::AppState;
use crate::api::middleware::{CurrentUser, clear_session, session_tokens, store_session, sync_cookies};
use crate::api::schemas::auth::{Login, SessionStatus};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let session = state.reconciler.sign_in(email, &payload.password).await?;
    let jar = store_session(jar, state.cookies, &session);
    Ok((jar, Json(SessionStatus::from_session(Some(&session)))))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let tokens = session_tokens(&jar);
    state.reconciler.sign_out(&tokens).await;
    (clear_session(jar), StatusCode::NO_CONTENT)
}

pub async fn session(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let tokens = session_tokens(&jar);
    let auth = state.reconciler.reconcile(&tokens).await;
    let jar = sync_cookies(jar, state.cookies, &tokens, &auth);
    (jar, Json(SessionStatus::from_session(auth.session())))
}

/// Pushes the session's expiry out; called by clients while the operator is active.
pub async fn extend(State(state): State<AppState>, jar: CookieJar) -> Response {
    let tokens = session_tokens(&jar);
    let auth = state.reconciler.extend(&tokens).await;

    match auth.session() {
        Some(session) => {
            let jar = store_session(jar, state.cookies, session);
            (jar, Json(SessionStatus::from_session(Some(session)))).into_response()
        }
        None => (clear_session(jar), AppError::AuthError).into_response(),
    }
}

pub async fn me(CurrentUser(session): CurrentUser) -> impl IntoResponse {
    Json(SessionStatus::from_session(Some(&session)))
}
