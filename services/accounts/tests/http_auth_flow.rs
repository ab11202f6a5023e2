mod common;

use axum::http::StatusCode;
use common::{LAPTOP, PASSWORD, PHONE, call, read_json, test_app, token};

#[tokio::test]
async fn login_access_refresh_and_replay() {
    let app = test_app().await;
    let first = app.login("alice@example.com").await;
    assert_eq!(first["token_type"], "Bearer");
    let access = token(&first, "access_token");
    let refresh = token(&first, "refresh_token");

    let response = app.send(call("GET", "/v1/users/alice").bearer(&access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("password_hash").is_none());

    let response = app
        .send(call("POST", "/v1/auth/refresh").bearer(&refresh))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = read_json(response).await;
    let next_refresh = token(&rotated, "refresh_token");
    assert_ne!(next_refresh, refresh);

    let replay = app
        .send(call("POST", "/v1/auth/refresh").bearer(&refresh))
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(replay).await["code"], "unauthorized");

    let response = app
        .send(call("POST", "/v1/auth/refresh").bearer(&next_refresh))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_token_is_bound_to_the_issuing_client() {
    let app = test_app().await;
    let laptop = app.login_from("alice@example.com", LAPTOP).await;
    let phone = app.login_from("alice@example.com", PHONE).await;

    let stolen = app
        .send(
            call("POST", "/v1/auth/refresh")
                .from_client(Some(PHONE))
                .bearer(&token(&laptop, "refresh_token")),
        )
        .await;
    assert_eq!(stolen.status(), StatusCode::UNAUTHORIZED);

    // Each client rotates independently.
    for (body, client) in [(&laptop, LAPTOP), (&phone, PHONE)] {
        let response = app
            .send(
                call("POST", "/v1/auth/refresh")
                    .from_client(Some(client))
                    .bearer(&token(body, "refresh_token")),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn refresh_token_authenticates_other_requests_from_its_client() {
    let app = test_app().await;
    let body = app.login("alice@example.com").await;
    let refresh = token(&body, "refresh_token");

    let response = app.send(call("GET", "/v1/users/alice").bearer(&refresh)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let elsewhere = app
        .send(
            call("GET", "/v1/users/alice")
                .from_client(Some(PHONE))
                .bearer(&refresh),
        )
        .await;
    assert_eq!(elsewhere.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let app = test_app().await;
    let access = app.access_token("alice@example.com").await;
    let response = app
        .send(call("POST", "/v1/auth/refresh").bearer(&access))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let missing = app.send(call("POST", "/v1/auth/refresh")).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let app = test_app().await;
    let mut messages = Vec::new();
    for (email, password) in [
        ("alice@example.com", "wrong password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let response = app
            .send(
                call("POST", "/v1/auth/login")
                    .json(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        messages.push(read_json(response).await["message"].clone());
    }
    assert_eq!(messages[0], messages[1]);
}

#[tokio::test]
async fn login_without_client_address_is_rejected() {
    let app = test_app().await;
    let response = app
        .send(
            call("POST", "/v1/auth/login")
                .from_client(None)
                .json(serde_json::json!({ "email": "alice@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_change_revokes_refresh_tokens() {
    let app = test_app().await;
    let body = app.login("alice@example.com").await;
    let access = token(&body, "access_token");
    let refresh = token(&body, "refresh_token");

    let response = app
        .send(
            call("PATCH", "/v1/users/alice")
                .bearer(&access)
                .json(serde_json::json!({ "password": "a new secret" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(call("POST", "/v1/auth/refresh").bearer(&refresh))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(
            call("POST", "/v1/auth/login").json(serde_json::json!({
                "email": "alice@example.com",
                "password": "a new secret"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn deleted_user_tokens_stop_working() {
    let app = test_app().await;
    let admin = app.access_token("admin@example.com").await;
    let bob = app.access_token("bob@example.com").await;

    let response = app.send(call("DELETE", "/v1/users/bob").bearer(&admin)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(call("GET", "/v1/users/bob").bearer(&bob)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_is_anonymous_not_an_error() {
    let app = test_app().await;
    let response = app
        .send(call("GET", "/v1/users/alice").bearer("not-a-token"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let health = app
        .send(call("GET", "/v1/system/health").bearer("not-a-token"))
        .await;
    assert_eq!(health.status(), StatusCode::OK);
}
