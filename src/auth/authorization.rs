//! Interactive authorization-code step and PKCE helpers.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::params::IssuedTokens;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::util::url::{build_url_with_params, query_param};

/// Consent request handed to an [`Authorizer`].
///
/// The authorizer opens `url` (browser, web view, terminal prompt) and
/// reports what came back to `redirect_uri`.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub redirect_uri: String,
    /// PKCE verifier, kept for the code exchange. `None` for confidential clients.
    pub code_verifier: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(config: &AuthConfig) -> Self {
        let state = random_hex(16);
        let code_verifier = config.uses_pkce().then(generate_code_verifier);
        let challenge = code_verifier.as_deref().map(compute_code_challenge);

        let mut params = vec![
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.landing_url.as_str()),
            ("scope", config.scopes.as_str()),
            ("state", state.as_str()),
            ("access_type", "offline"),
            ("prompt", "login"),
        ];
        if let Some(challenge) = challenge.as_deref() {
            params.push(("code_challenge", challenge));
            params.push(("code_challenge_method", "S256"));
        }
        let url = build_url_with_params(&config.authorization_url(), &params);

        Self {
            url,
            redirect_uri: config.landing_url.clone(),
            state,
            code_verifier,
        }
    }
}

/// What the user's consent produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consent {
    /// `state` is `None` only for a bare code typed in by the user (see
    /// [`Consent::from_pasted`]); the state check is skipped for those.
    Code { code: String, state: Option<String> },
    /// Some front-ends run the exchange themselves and hand back tokens.
    Tokens(IssuedTokens),
}

impl Consent {
    /// Parse a redirect URL such as `ytoauth://landing.url?code=...&state=...`.
    ///
    /// `error=access_denied` means the user dismissed the consent screen.
    /// A redirect without `state` is rejected.
    pub fn from_redirect(url: &str) -> Result<Self, AuthError> {
        if let Some(error) = query_param(url, "error") {
            if error == "access_denied" {
                return Err(AuthError::AuthorizationCancelled);
            }
            return Err(AuthError::TokenExchange {
                status: 0,
                error,
                description: query_param(url, "error_description"),
            });
        }
        let code = query_param(url, "code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("redirect has no code".into()))?;
        let state = query_param(url, "state")
            .filter(|state| !state.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("redirect has no state".into()))?;
        Ok(Self::Code {
            code,
            state: Some(state),
        })
    }

    /// Parse user input: a full redirect URL, `code#state`, or a bare code.
    ///
    /// A bare code carries no state, so it cannot be checked against the request.
    pub fn from_pasted(input: &str) -> Result<Self, AuthError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AuthError::AuthorizationCancelled);
        }
        if input.contains("://") {
            return Self::from_redirect(input);
        }
        let (code, state) = match input.split_once('#') {
            Some((code, state)) => (code, Some(state.to_string())),
            None => (input, None),
        };
        Ok(Self::Code {
            code: code.to_string(),
            state,
        })
    }
}

/// Performs the interactive consent step of the authorization-code flow.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `Err(AuthorizationCancelled)` when the user dismisses consent.
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<Consent, AuthError>;
}

pub(crate) fn random_hex(byte_count: usize) -> String {
    random_bytes(byte_count)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub(crate) fn generate_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(32))
}

pub(crate) fn compute_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_bytes(byte_count: usize) -> Vec<u8> {
    let mut buf = vec![0u8; byte_count];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len();
        chunk.copy_from_slice(&id.as_bytes()[..len]);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> AuthConfig {
        AuthConfig::builder()
            .server_uri("https://hub.example.com")
            .client_id("mobile")
            .maybe_client_secret(secret)
            .build()
    }

    #[test]
    fn public_client_request_carries_pkce() {
        let request = AuthorizationRequest::new(&config(None));
        let verifier = request.code_verifier.clone().unwrap();
        assert_eq!(verifier.len(), 43);
        assert!(request
            .url
            .starts_with("https://hub.example.com/api/rest/oauth2/auth?response_type=code"));
        assert_eq!(
            query_param(&request.url, "code_challenge"),
            Some(compute_code_challenge(&verifier))
        );
        assert_eq!(
            query_param(&request.url, "code_challenge_method").as_deref(),
            Some("S256")
        );
        assert_eq!(query_param(&request.url, "prompt").as_deref(), Some("login"));
        assert_eq!(
            query_param(&request.url, "access_type").as_deref(),
            Some("offline")
        );
        assert_eq!(query_param(&request.url, "state"), Some(request.state.clone()));
        assert_eq!(request.redirect_uri, "ytoauth://landing.url");
    }

    #[test]
    fn confidential_client_request_skips_pkce() {
        let request = AuthorizationRequest::new(&config(Some("secret")));
        assert!(request.code_verifier.is_none());
        assert_eq!(query_param(&request.url, "code_challenge"), None);
        assert_eq!(
            query_param(&request.url, "scope").as_deref(),
            Some("Hub YouTrack Konnector")
        );
    }

    #[test]
    fn challenge_matches_rfc7636_example() {
        assert_eq!(
            compute_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn redirect_parsing_handles_codes_and_dismissal() {
        assert_eq!(
            Consent::from_redirect("ytoauth://landing.url?code=c1&state=s1").unwrap(),
            Consent::Code {
                code: "c1".into(),
                state: Some("s1".into())
            }
        );
        assert!(matches!(
            Consent::from_redirect("ytoauth://landing.url?error=access_denied"),
            Err(AuthError::AuthorizationCancelled)
        ));
        assert!(matches!(
            Consent::from_redirect("ytoauth://landing.url?state=s1"),
            Err(AuthError::InvalidResponse(_))
        ));
    }

    #[test]
    fn redirect_without_state_is_rejected() {
        assert!(matches!(
            Consent::from_redirect("ytoauth://landing.url?code=c1"),
            Err(AuthError::InvalidResponse(_))
        ));
        assert!(matches!(
            Consent::from_pasted("ytoauth://landing.url?code=c1&state="),
            Err(AuthError::InvalidResponse(_))
        ));
        assert_eq!(
            Consent::from_pasted("c1").unwrap(),
            Consent::Code {
                code: "c1".into(),
                state: None
            }
        );
    }

    #[test]
    fn pasted_input_accepts_code_with_state() {
        assert_eq!(
            Consent::from_pasted(" c1#s1 \n").unwrap(),
            Consent::Code {
                code: "c1".into(),
                state: Some("s1".into())
            }
        );
        assert!(matches!(
            Consent::from_pasted("   "),
            Err(AuthError::AuthorizationCancelled)
        ));
    }
}
