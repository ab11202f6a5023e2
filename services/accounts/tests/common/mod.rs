#![allow(dead_code)]

use accounts::app::{AppState, build_router};
use accounts::config::AuthConfig;
use accounts::model::{User, UserRecord};
use accounts::store::AccountsStore;
use accounts::store::memory::InMemoryStore;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use massok_authz::{
    GLOBAL_ADMIN, KeyRing, MemorySessionKeyStore, Roles, USER_SELF, generate_token_keys,
    hash_password,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const LAPTOP: [u8; 4] = [192, 0, 2, 10];
pub const PHONE: [u8; 4] = [198, 51, 100, 4];
pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn user(id: &str, roles: Roles) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        first_name: id.to_string(),
        last_name: "Tester".to_string(),
        roles,
        phone: None,
        can_sms: None,
        birthday: None,
        created_at: 0,
        updated_at: 0,
        created_by: "test".to_string(),
        updated_by: "test".to_string(),
    }
}

/// App with `admin`, `alice` and `bob`, all sharing [`PASSWORD`].
pub async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let password_hash = hash_password(PASSWORD).expect("hash");
    for (id, roles) in [
        ("admin", Roles::from([GLOBAL_ADMIN, USER_SELF])),
        ("alice", Roles::from([USER_SELF])),
        ("bob", Roles::from([USER_SELF])),
    ] {
        store
            .create_user(UserRecord {
                user: user(id, roles),
                password_hash: password_hash.clone(),
            })
            .await
            .expect("seed user");
    }
    let keys = Arc::new(KeyRing::new(generate_token_keys()).expect("keys"));
    let state = AppState::new(
        store,
        Arc::new(MemorySessionKeyStore::new()),
        keys,
        &AuthConfig::default(),
    );
    TestApp {
        router: build_router(state.clone()),
        state,
    }
}

pub struct Call<'a> {
    method: &'a str,
    uri: String,
    client: Option<[u8; 4]>,
    bearer: Option<String>,
    body: Option<serde_json::Value>,
}

pub fn call(method: &str, uri: impl Into<String>) -> Call<'_> {
    Call {
        method,
        uri: uri.into(),
        client: Some(LAPTOP),
        bearer: None,
        body: None,
    }
}

impl Call<'_> {
    pub fn from_client(mut self, client: Option<[u8; 4]>) -> Self {
        self.client = client;
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(token) = self.bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match self.body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).expect("request");
        if let Some(ip) = self.client {
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        }
        request
    }
}

impl TestApp {
    pub async fn send(&self, call: Call<'_>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(call.build())
            .await
            .expect("response")
    }

    /// Log in from `client` and return the token response body.
    pub async fn login_from(&self, email: &str, client: [u8; 4]) -> serde_json::Value {
        let response = self
            .send(
                call("POST", "/v1/auth/login")
                    .from_client(Some(client))
                    .json(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login {email}");
        read_json(response).await
    }

    pub async fn login(&self, email: &str) -> serde_json::Value {
        self.login_from(email, LAPTOP).await
    }

    pub async fn access_token(&self, email: &str) -> String {
        token(&self.login(email).await, "access_token")
    }
}

pub fn token(body: &serde_json::Value, field: &str) -> String {
    body[field].as_str().expect(field).to_string()
}
