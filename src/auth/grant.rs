use strum::{Display, EnumString};

/// OAuth2 grant type sent as `grant_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Password,
}

/// A token-endpoint exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
    },
    /// Legacy resource-owner password grant.
    Password { username: String, password: String },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
            Self::Password { .. } => GrantType::Password,
        }
    }

    /// Form fields for this grant. Encoding is left to the HTTP client.
    pub fn form(&self, client_id: &str, scope: &str) -> Vec<(&'static str, String)> {
        let mut form = vec![("grant_type", self.grant_type().to_string())];
        match self {
            Self::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("code", code.clone()));
                form.push(("redirect_uri", redirect_uri.clone()));
                if let Some(verifier) = code_verifier {
                    form.push(("code_verifier", verifier.clone()));
                }
            }
            Self::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token.clone()));
            }
            Self::Password { username, password } => {
                form.push(("access_type", "offline".to_string()));
                form.push(("username", username.clone()));
                form.push(("password", password.clone()));
            }
        }
        form.push(("scope", scope.to_string()));
        form.push(("client_id", client_id.to_string()));
        form
    }
}
