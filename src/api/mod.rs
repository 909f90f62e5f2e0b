//! Authorized requests against YouTrack with transparent token refresh.

use std::sync::Arc;

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::auth::{AuthParams, Session, ACCEPT_HEADER};
use crate::error::AuthError;
use crate::util::retry::RetryPolicy;

/// Queries longer than this are rejected by some servers.
pub const MAX_QUERY_LENGTH: usize = 2048;

/// A completed response with a status below 400.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client that authorizes requests with a [`Session`].
///
/// A 401 (or an outdated token) triggers the session's single-flight refresh
/// and one replay. When the refresh fails the sign-in signal is raised; it
/// stays raised until a request succeeds again.
pub struct AuthorizedClient {
    session: Arc<Session>,
    retry: RetryPolicy,
    sign_in_required: watch::Sender<bool>,
}

impl AuthorizedClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            retry: RetryPolicy::default(),
            sign_in_required: watch::Sender::new(false),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn sign_in_required(&self) -> bool {
        *self.sign_in_required.borrow()
    }

    /// Watch the sign-in signal. It changes once per raise, not once per failed request.
    pub fn subscribe_sign_in_required(&self) -> watch::Receiver<bool> {
        self.sign_in_required.subscribe()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        self.request(Method::GET, url, None).await?.json()
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, AuthError> {
        let url = patch_top_param(url);
        tracing::debug!(%method, %url, "Authorized request");
        warn_long_query(&url);

        if self.session.is_token_outdated() {
            tracing::info!("Access token is outdated, refreshing before request");
            self.refresh(self.session.refresh_generation()).await?;
        }

        let (generation, response) = self.send(&method, &url, body).await?;
        if response.status != 401 {
            return self.finish(response);
        }

        tracing::info!("Token is expired, refreshing token");
        self.refresh(generation).await?;
        let (_, response) = self.send(&method, &url, body).await?;
        self.finish(response)
    }

    /// Send once (with transport retries). Returns the refresh generation of the params used.
    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(u64, ApiResponse), AuthError> {
        self.retry
            .execute(move || async move {
                let (params, generation) = self.session.snapshot();
                let headers = self.session.authorization_headers(params.as_ref());
                if !headers.contains_key(AUTHORIZATION) {
                    tracing::warn!(%url, "Sending request without Authorization header");
                }
                let mut request = self
                    .session
                    .http()
                    .request(method.clone(), url)
                    .headers(headers)
                    .header(ACCEPT, ACCEPT_HEADER);
                if let Some(body) = body {
                    request = request.json(body);
                }
                let resp = request.send().await?;
                let status = resp.status().as_u16();
                let headers = resp.headers().clone();
                let body = resp.text().await?;
                if status >= 500 {
                    return Err(AuthError::api(status, body));
                }
                Ok::<_, AuthError>((
                    generation,
                    ApiResponse {
                        status,
                        headers,
                        body,
                    },
                ))
            })
            .await
    }

    fn finish(&self, response: ApiResponse) -> Result<ApiResponse, AuthError> {
        if response.status >= 400 {
            return Err(AuthError::api(response.status, response.body));
        }
        self.sign_in_required.send_if_modified(|raised| std::mem::replace(raised, false));
        Ok(response)
    }

    async fn refresh(&self, generation: u64) -> Result<AuthParams, AuthError> {
        match self.session.refresh_after(generation).await {
            Ok(params) => Ok(params),
            Err(err) => {
                let raised = self
                    .sign_in_required
                    .send_if_modified(|raised| !std::mem::replace(raised, true));
                if raised {
                    tracing::warn!(error = %err, "Token refresh failed, sign-in required");
                }
                Err(err)
            }
        }
    }
}

/// Ask for all results unless the URL already sets `$top`.
pub fn patch_top_param(url: &str) -> String {
    if url.contains("$top") || url.contains("%24top") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}$top=-1")
}

fn warn_long_query(url: &str) {
    let query_len = url.split_once('?').map_or(0, |(_, query)| query.len());
    if query_len > MAX_QUERY_LENGTH {
        tracing::warn!(
            query_len,
            max = MAX_QUERY_LENGTH,
            %url,
            "Query is longer than some servers accept"
        );
    }
}
