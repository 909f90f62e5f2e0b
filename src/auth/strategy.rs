use super::oauth2::OAuth2Flow;
use super::params::AuthParams;
use super::session::Session;
use crate::error::AuthError;

/// How a session obtained its tokens, and so how it refreshes them.
#[derive(Debug)]
pub enum AuthStrategy {
    /// Authorization-code grant with refresh-token renewal.
    OAuth2(OAuth2Flow),
    /// Legacy password grant. Tokens cannot be refreshed.
    Credentials,
}

impl Default for AuthStrategy {
    fn default() -> Self {
        Self::OAuth2(OAuth2Flow::default())
    }
}

impl AuthStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OAuth2(_) => "oauth2",
            Self::Credentials => "credentials",
        }
    }

    pub fn oauth2(&self) -> Option<&OAuth2Flow> {
        match self {
            Self::OAuth2(flow) => Some(flow),
            Self::Credentials => None,
        }
    }

    /// Run this strategy's refresh. `Ok(None)` means the strategy cannot refresh.
    pub(crate) async fn refresh(&self, session: &Session) -> Result<Option<AuthParams>, AuthError> {
        match self {
            Self::OAuth2(flow) => flow.refresh_token_oauth(session).await.map(Some),
            Self::Credentials => Ok(None),
        }
    }
}
