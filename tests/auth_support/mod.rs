#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ytm_auth::auth::{AuthParams, AuthStrategy, Session, SessionKey, TokenStore};
use ytm_auth::config::AuthConfig;
use ytm_auth::AuthError;

pub const SESSION: &str = "1700000000000";
pub const TOKEN_PATH: &str = "/hub/api/rest/oauth2/token";
pub const USER_PATH: &str = "/hub/api/rest/users/me";

#[derive(Default)]
pub struct InMemoryTokenStore {
    params: Mutex<HashMap<SessionKey, AuthParams>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, params: AuthParams) {
        self.params
            .lock()
            .expect("store lock poisoned")
            .insert(SessionKey::new(key), params);
    }

    pub fn get(&self, key: &str) -> Option<AuthParams> {
        self.params
            .lock()
            .expect("store lock poisoned")
            .get(&SessionKey::new(key))
            .cloned()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, key: &SessionKey) -> Result<Option<AuthParams>, AuthError> {
        Ok(self
            .params
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn save(&self, key: &SessionKey, params: &AuthParams) -> Result<(), AuthError> {
        self.params
            .lock()
            .expect("store lock poisoned")
            .insert(key.clone(), params.clone());
        Ok(())
    }

    fn clear(&self, key: &SessionKey) -> Result<(), AuthError> {
        self.params
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }
}

/// Hub mounted under `/hub` on the mock server, like an embedded Hub.
pub fn config(server: &MockServer) -> AuthConfig {
    AuthConfig::builder()
        .server_uri(format!("{}/hub", server.uri()))
        .client_id("mobile-client")
        .youtrack_service_id("yt-service")
        .build()
}

pub fn confidential_config(server: &MockServer) -> AuthConfig {
    AuthConfig::builder()
        .server_uri(format!("{}/hub", server.uri()))
        .client_id("mobile-client")
        .client_secret("mobile-secret")
        .build()
}

pub fn session(server: &MockServer, store: Arc<InMemoryTokenStore>) -> Session {
    Session::new(config(server), store, SessionKey::new(SESSION))
}

pub fn credentials_session(server: &MockServer, store: Arc<InMemoryTokenStore>) -> Session {
    session(server, store).with_strategy(AuthStrategy::Credentials)
}

pub fn params(access_token: &str, refresh_token: Option<&str>) -> AuthParams {
    let params = AuthParams::new(access_token, "Bearer");
    match refresh_token {
        Some(refresh_token) => params.with_refresh_token(refresh_token),
        None => params,
    }
}

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "John Doe",
        "guest": false,
        "banned": false,
        "profile": {"avatar": {"url": "https://hub/avatar.png"}}
    })
}

pub async fn mount_user(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_token(server: &MockServer, body: Value, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}
