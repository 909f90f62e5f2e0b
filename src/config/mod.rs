//! Configuration for the Hub OAuth endpoints (code builder, env, or remote discovery).

pub mod remote;

pub use remote::{
    base_url, format_youtrack_url, handle_relative_url, load_config, AppConfig,
    VERSION_DETECT_FALLBACK_URL,
};

use bon::Builder;

use crate::auth::user::USER_FIELDS;
use crate::error::AuthError;
use crate::util::url::urlencoded;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &str = "Hub YouTrack Konnector";
/// Redirect URL registered for the mobile client.
pub const DEFAULT_LANDING_URL: &str = "ytoauth://landing.url";
/// Service id every Hub installation registers for itself.
const HUB_SERVICE_ID: &str = "0-0-0-0-0";

/// OAuth client configuration for one Hub server.
///
/// # Example
/// ```
/// use ytm_auth::config::AuthConfig;
///
/// let config = AuthConfig::builder()
///     .server_uri("https://example.myjetbrains.com/hub")
///     .client_id("mobile-client")
///     .build();
/// assert_eq!(
///     config.token_url(),
///     "https://example.myjetbrains.com/hub/api/rest/oauth2/token"
/// );
/// assert_eq!(config.scopes, "Hub YouTrack Konnector");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct AuthConfig {
    /// Hub URL, without a trailing slash.
    #[builder(into)]
    pub server_uri: String,
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: Option<String>,
    /// Space-separated scope list.
    #[builder(into, default = DEFAULT_SCOPES.to_string())]
    pub scopes: String,
    #[builder(into, default = DEFAULT_LANDING_URL.to_string())]
    pub landing_url: String,
    #[builder(into)]
    pub youtrack_service_id: Option<String>,
}

impl AuthConfig {
    /// Load from `YTM_*` environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AuthError::Configuration(format!("{name} is not set")))
        };
        let optional = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());

        Ok(Self::builder()
            .server_uri(required("YTM_SERVER_URI")?.trim_end_matches('/'))
            .client_id(required("YTM_CLIENT_ID")?)
            .maybe_client_secret(optional("YTM_CLIENT_SECRET"))
            .scopes(optional("YTM_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()))
            .landing_url(
                optional("YTM_LANDING_URL").unwrap_or_else(|| DEFAULT_LANDING_URL.to_string()),
            )
            .maybe_youtrack_service_id(optional("YTM_SERVICE_ID"))
            .build())
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/rest/oauth2/token", self.server_uri)
    }

    pub fn authorization_url(&self) -> String {
        format!("{}/api/rest/oauth2/auth", self.server_uri)
    }

    pub fn revocation_url(&self) -> String {
        format!("{}/api/rest/oauth2/revoke", self.server_uri)
    }

    pub fn user_info_url(&self) -> String {
        format!("{}/api/rest/users/me?fields={USER_FIELDS}", self.server_uri)
    }

    /// Permissions cache for Hub itself plus the YouTrack service, when known.
    pub fn permissions_cache_url(&self) -> String {
        let query = match &self.youtrack_service_id {
            Some(service_id) => format!("service:{{{HUB_SERVICE_ID}}} or service:{{{service_id}}}"),
            None => format!("service:{{{HUB_SERVICE_ID}}}"),
        };
        format!(
            "{}/api/rest/permissions/cache?query={}&fields=permission/key,global,projects(id)",
            self.server_uri,
            urlencoded(&query)
        )
    }

    pub fn scope_list(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }

    /// Public clients (no secret) must use PKCE.
    pub fn uses_pkce(&self) -> bool {
        self.client_secret
            .as_deref()
            .map_or(true, |secret| secret.is_empty())
    }
}
