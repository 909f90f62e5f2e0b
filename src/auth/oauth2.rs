//! Authorization-code flow and refresh-token renewal.

use std::sync::Mutex;

use super::authorization::{AuthorizationRequest, Authorizer, Consent};
use super::exchange;
use super::params::AuthParams;
use super::session::Session;
use crate::error::{AuthError, RefreshFailure};

/// Authorization code delivered outside the interactive flow (e.g. a deep link).
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCode {
    code: String,
    code_verifier: Option<String>,
}

/// OAuth2 state kept per session.
#[derive(Debug, Default)]
pub struct OAuth2Flow {
    pending_code: Mutex<Option<PendingCode>>,
}

impl OAuth2Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash a code for the next refresh of a session that has no refresh token.
    pub fn accept_authorization_code(&self, code: impl Into<String>, code_verifier: Option<String>) {
        if let Ok(mut pending) = self.pending_code.lock() {
            *pending = Some(PendingCode {
                code: code.into(),
                code_verifier,
            });
        }
    }

    pub fn has_pending_code(&self) -> bool {
        self.pending_code
            .lock()
            .map(|pending| pending.is_some())
            .unwrap_or(false)
    }

    fn take_pending_code(&self) -> Option<PendingCode> {
        self.pending_code.lock().ok().and_then(|mut pending| pending.take())
    }

    /// Run the consent step and exchange its result for params.
    ///
    /// Does not cache or adopt the params; [`Session::authorize`] does that.
    pub async fn authorize(
        &self,
        session: &Session,
        authorizer: &dyn Authorizer,
    ) -> Result<AuthParams, AuthError> {
        let config = session.config();
        let request = AuthorizationRequest::new(config);
        tracing::debug!(pkce = request.code_verifier.is_some(), "Starting authorization");

        let consent = authorizer.authorize(&request).await.map_err(|err| {
            tracing::warn!(error = %err, "Authorization failed");
            err
        })?;
        let params = match consent {
            Consent::Code { code, state } => {
                // No state means a bare code pasted by the user; nothing to compare.
                if let Some(returned) = state.filter(|state| *state != request.state) {
                    return Err(AuthError::InvalidResponse(format!(
                        "OAuth state mismatch: expected {}, got {returned}",
                        request.state
                    )));
                }
                exchange::obtain_token_with_code(
                    session.http(),
                    config,
                    &code,
                    request.code_verifier.as_deref(),
                )
                .await?
            }
            Consent::Tokens(issued) => issued.into_params(Some(&config.scopes)),
        };
        Ok(params)
    }

    /// Renew the cached params.
    ///
    /// With a cached refresh token this runs the refresh grant and merges the
    /// result. Without one it falls back to a pending authorization code, and
    /// fails with [`AuthError::RefreshTokenMissing`] when there is none.
    /// The new params are cached, adopted and the user re-validated.
    pub async fn refresh_token_oauth(&self, session: &Session) -> Result<AuthParams, AuthError> {
        let previous = session.cached_auth_params()?;
        tracing::info!(session = %session.session_key(), "Token refresh: start");

        let refreshed = match previous.refresh_token() {
            Some(refresh_token) => {
                let issued =
                    exchange::refresh_access_token(session.http(), session.config(), refresh_token)
                        .await
                        .map_err(|err| {
                            let failure = RefreshFailure::classify(&err);
                            tracing::warn!(error = %err, %failure, "Token refresh: failed");
                            AuthError::RefreshRejected(failure)
                        })?;
                previous.merge_refreshed(issued)
            }
            None => {
                let pending = self.take_pending_code().ok_or_else(|| {
                    tracing::warn!("Token refresh: no refresh token and no authorization code");
                    AuthError::RefreshTokenMissing
                })?;
                exchange::obtain_token_with_code(
                    session.http(),
                    session.config(),
                    &pending.code,
                    pending.code_verifier.as_deref(),
                )
                .await?
            }
        };

        let refreshed = session.cache_auth_params(refreshed, session.session_key())?;
        session.set_auth_params(refreshed.clone());
        session.verify_user(&refreshed).await?;
        tracing::info!("Token refresh: success");
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_code_is_consumed_once() {
        let flow = OAuth2Flow::new();
        assert!(!flow.has_pending_code());
        flow.accept_authorization_code("c1", Some("v1".into()));
        assert!(flow.has_pending_code());
        assert_eq!(
            flow.take_pending_code(),
            Some(PendingCode {
                code: "c1".into(),
                code_verifier: Some("v1".into())
            })
        );
        assert_eq!(flow.take_pending_code(), None);
    }
}
