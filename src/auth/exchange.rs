//! Stateless helpers talking to the Hub token endpoint.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT as USER_AGENT_HEADER};

use super::grant::Grant;
use super::params::{AuthParams, IssuedTokens, TokenResponse};
use super::session::{ACCEPT_HEADER, USER_AGENT};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::util::timeout::with_timeout;

const PREFETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// `Basic base64(client_id:client_secret)`, for confidential clients only.
fn basic_authorization(config: &AuthConfig) -> Option<String> {
    let secret = config.client_secret.as_deref().filter(|s| !s.is_empty())?;
    let credentials = format!("{}:{secret}", config.client_id);
    Some(format!("Basic {}", STANDARD.encode(credentials)))
}

/// POST a grant to the token endpoint.
///
/// A JSON `error` field is a failure even on a 2xx status.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    config: &AuthConfig,
    grant: &Grant,
) -> Result<IssuedTokens, AuthError> {
    let grant_type = grant.grant_type();
    let form = grant.form(&config.client_id, &config.scopes);
    let mut request = http
        .post(config.token_url())
        .header(ACCEPT, ACCEPT_HEADER)
        .header(USER_AGENT_HEADER, USER_AGENT)
        .form(&form);
    if let Some(header) = basic_authorization(config) {
        request = request.header(AUTHORIZATION, header);
    }

    let resp = request.send().await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    tracing::debug!(%grant_type, status, "Token endpoint responded");

    match serde_json::from_str::<TokenResponse>(&body) {
        Ok(payload) if payload.error.is_none() && status >= 400 => {
            Err(AuthError::api(status, body))
        }
        Ok(payload) => payload.into_issued(status, Utc::now()),
        Err(_) if status >= 400 => Err(AuthError::api(status, body)),
        Err(err) => Err(AuthError::InvalidResponse(format!(
            "Token endpoint returned non-JSON body: {err}"
        ))),
    }
}

/// Exchange a grant for fresh params. Scope defaults to the configured scopes.
pub async fn obtain_token(
    http: &reqwest::Client,
    config: &AuthConfig,
    grant: &Grant,
) -> Result<AuthParams, AuthError> {
    let issued = request_token(http, config, grant).await?;
    tracing::info!(grant_type = %grant.grant_type(), "Access token received");
    Ok(issued.into_params(Some(&config.scopes)))
}

/// Legacy password grant.
pub async fn obtain_token_by_credentials(
    http: &reqwest::Client,
    config: &AuthConfig,
    login: &str,
    password: &str,
) -> Result<AuthParams, AuthError> {
    let grant = Grant::Password {
        username: login.to_string(),
        password: password.to_string(),
    };
    obtain_token(http, config, &grant).await
}

/// Authorization-code grant, with the PKCE verifier when one was used.
pub async fn obtain_token_with_code(
    http: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    code_verifier: Option<&str>,
) -> Result<AuthParams, AuthError> {
    let grant = Grant::AuthorizationCode {
        code: code.to_string(),
        redirect_uri: config.landing_url.clone(),
        code_verifier: code_verifier.map(str::to_string),
    };
    obtain_token(http, config, &grant).await
}

/// Refresh-token grant. Returns the raw issued tokens so the caller can merge.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    config: &AuthConfig,
    refresh_token: &str,
) -> Result<IssuedTokens, AuthError> {
    let grant = Grant::RefreshToken {
        refresh_token: refresh_token.to_string(),
    };
    match request_token(http, config, &grant).await {
        Ok(issued) => {
            tracing::info!("Access token refreshed");
            Ok(issued)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to refresh token");
            Err(err)
        }
    }
}

/// Revoke a token. Failures are logged, never returned.
pub async fn revoke_token(http: &reqwest::Client, config: &AuthConfig, token: &str) {
    let mut request = http
        .post(config.revocation_url())
        .header(ACCEPT, ACCEPT_HEADER)
        .header(USER_AGENT_HEADER, USER_AGENT)
        .form(&[("token", token), ("client_id", config.client_id.as_str())]);
    if let Some(header) = basic_authorization(config) {
        request = request.header(AUTHORIZATION, header);
    }
    match request.send().await {
        Ok(resp) if resp.status().is_success() => tracing::info!("Access token revoked"),
        Ok(resp) => tracing::warn!(
            status = resp.status().as_u16(),
            "Failed to revoke access token"
        ),
        Err(err) => tracing::warn!(error = %err, "Failed to revoke access token"),
    }
}

/// Warm the connection to the authorization endpoint before showing consent UI.
/// Failures are logged, never returned.
pub async fn prefetch_configuration(http: &reqwest::Client, config: &AuthConfig) {
    let url = config.authorization_url();
    let result = with_timeout(PREFETCH_TIMEOUT, async {
        let resp = http
            .get(&url)
            .header(USER_AGENT_HEADER, USER_AGENT)
            .send()
            .await?;
        Ok::<_, AuthError>(resp.status().as_u16())
    })
    .await;
    match result {
        Ok(status) => tracing::debug!(%url, status, "Prefetched authorization endpoint"),
        Err(err) => tracing::warn!(%url, error = %err, "Failed to prefetch authorization endpoint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_only_for_confidential_clients() {
        let public = AuthConfig::builder()
            .server_uri("https://hub")
            .client_id("client")
            .build();
        assert_eq!(basic_authorization(&public), None);

        let confidential = AuthConfig::builder()
            .server_uri("https://hub")
            .client_id("client")
            .client_secret("secret")
            .build();
        assert_eq!(
            basic_authorization(&confidential).as_deref(),
            Some("Basic Y2xpZW50OnNlY3JldA==")
        );
    }
}
