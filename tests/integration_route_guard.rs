#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, COOKIE, EXPIRES, LOCATION, PRAGMA};
mod common;

#[tokio::test]
async fn test_protected_route_redirects_to_login() {
    let app = common::TestApp::spawn().await;

    for path in ["/dashboard", "/dashboard/vehicles/42"] {
        let resp = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "path {path}");
        assert_eq!(resp.headers()[LOCATION], "/login");
    }
}

#[tokio::test]
async fn test_prefix_match_respects_segments() {
    let app = common::TestApp::spawn().await;

    // Shares the characters of the protected prefix but not the segment.
    let resp = app.client.get(app.url("/dashboards")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().get(LOCATION).is_none());
}

#[tokio::test]
async fn test_login_page_is_open_to_anonymous_visitors() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(app.url("/login")).send().await.unwrap();
    assert_ne!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(resp.headers().get(LOCATION).is_none());
}

#[tokio::test]
async fn test_signed_in_user_is_sent_from_login_to_dashboard() {
    let app = common::TestApp::spawn().await;
    app.login().await;

    for path in ["/login", "/login/"] {
        let resp = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "path {path}");
        assert_eq!(resp.headers()[LOCATION], "/dashboard");
    }
}

#[tokio::test]
async fn test_protected_response_is_never_cached() {
    let app = common::TestApp::spawn().await;
    app.login().await;

    let resp = app.client.get(app.url("/dashboard")).send().await.unwrap();
    assert_ne!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers()[CACHE_CONTROL], "no-store, no-cache, must-revalidate, proxy-revalidate");
    assert_eq!(resp.headers()[PRAGMA], "no-cache");
    assert_eq!(resp.headers()[EXPIRES], "0");

    // Unprotected pages keep their own caching.
    let resp = app.client.get(app.url("/about")).send().await.unwrap();
    assert!(resp.headers().get(PRAGMA).is_none());
}

#[tokio::test]
async fn test_excluded_paths_skip_the_guard() {
    let app = common::TestApp::spawn().await;
    let session = app.issue_session().await;
    app.provider.set_failing(true);

    // Stale cookies would be cleared if the guard ran.
    let resp = common::bare_client()
        .get(app.url("/assets/app.js"))
        .header(COOKIE, common::cookie_header(&session))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(common::set_cookie_header(&resp, "fd-access-token").is_none());
}

#[tokio::test]
async fn test_invalid_cookies_are_cleared() {
    let app = common::TestApp::spawn().await;

    let resp = common::bare_client()
        .get(app.url("/dashboard"))
        .header(COOKIE, "fd-access-token=forged; fd-refresh-token=forged")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let cleared = common::set_cookie_header(&resp, "fd-access-token").unwrap();
    assert!(cleared.contains("Max-Age=0"), "unexpected cookie: {cleared}");
    assert!(common::set_cookie_header(&resp, "fd-refresh-token").is_some());
}

#[tokio::test]
async fn test_provider_outage_fails_closed() {
    let app = common::TestApp::spawn().await;
    app.login().await;
    app.provider.set_failing(true);

    let resp = app.client.get(app.url("/dashboard")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers()[LOCATION], "/login");
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_in_flight() {
    let app = common::TestApp::spawn().await;
    let session = app.issue_session().await;
    app.provider.expire_access_token(&session.access_token);

    let resp = common::bare_client()
        .get(app.url("/dashboard"))
        .header(COOKIE, common::cookie_header(&session))
        .send()
        .await
        .unwrap();

    assert_ne!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let rotated = common::set_cookie_value(&resp, "fd-access-token").unwrap();
    assert_ne!(rotated, session.access_token);
    assert!(app.provider.is_live(&rotated));
    assert_eq!(app.provider.refresh_calls(), 1);
}
