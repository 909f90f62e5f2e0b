use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Token bundle of one authenticated session.
///
/// # Example
/// ```
/// use ytm_auth::auth::AuthParams;
///
/// let params = AuthParams::new("a1", "Bearer").with_refresh_token("r1");
/// assert_eq!(params.authorization().as_deref(), Some("Bearer a1"));
/// assert_eq!(params.refresh_token(), Some("r1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthParams {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: token_type.into(),
            scope: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// `Authorization` header value, when both token type and access token are present.
    pub fn authorization(&self) -> Option<String> {
        if self.token_type.is_empty() || self.access_token.is_empty() {
            return None;
        }
        Some(format!("{} {}", self.token_type, self.access_token))
    }

    /// Usable refresh token. Empty strings count as absent.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Merge a refresh-grant result into these params.
    ///
    /// The access token and expiry are always replaced. The refresh token is
    /// kept unless the server issued a new non-empty one. Token type and scope
    /// are replaced only when the server sent them.
    pub fn merge_refreshed(&self, issued: IssuedTokens) -> AuthParams {
        AuthParams {
            access_token: issued.access_token,
            refresh_token: issued
                .refresh_token
                .filter(|token| !token.is_empty())
                .or_else(|| self.refresh_token.clone()),
            token_type: issued
                .token_type
                .filter(|token_type| !token_type.is_empty())
                .unwrap_or_else(|| self.token_type.clone()),
            scope: issued.scope.or_else(|| self.scope.clone()),
            expires_at: issued.expires_at,
        }
    }
}

/// Tokens issued by a single token-endpoint response, before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedTokens {
    /// Turn freshly issued tokens into params without a previous session to merge with.
    pub fn into_params(self, default_scope: Option<&str>) -> AuthParams {
        AuthParams {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            token_type: self
                .token_type
                .filter(|token_type| !token_type.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope.or_else(|| default_scope.map(str::to_string)),
            expires_at: self.expires_at,
        }
    }
}

/// Raw token endpoint payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Validate the payload and stamp its expiry relative to `received_at`.
    ///
    /// A non-empty `error` field is a failure whatever the HTTP status was.
    pub fn into_issued(
        self,
        status: u16,
        received_at: DateTime<Utc>,
    ) -> Result<IssuedTokens, AuthError> {
        if let Some(error) = self.error.filter(|error| !error.is_empty()) {
            return Err(AuthError::TokenExchange {
                status,
                error,
                description: self.error_description,
            });
        }
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing access_token".into()))?;
        let expires_at = match self.expires_in {
            Some(seconds) => Some(
                Duration::try_seconds(seconds)
                    .and_then(|lifetime| received_at.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::InvalidResponse(format!("expires_in out of range: {seconds}"))
                    })?,
            ),
            None => None,
        };
        Ok(IssuedTokens {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            expires_at,
        })
    }
}
