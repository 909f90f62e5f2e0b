//! Per-account authentication session.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT as USER_AGENT_HEADER};
use strum::{Display, EnumString};

use super::authorization::Authorizer;
use super::exchange;
use super::params::AuthParams;
use super::store::{SessionKey, TokenStore};
use super::strategy::AuthStrategy;
use super::user::CurrentUser;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("YouTrackMobile/", env!("CARGO_PKG_VERSION"), " (ytm-auth)");
/// `Accept` sent to Hub endpoints.
pub const ACCEPT_HEADER: &str = "application/json, text/plain, */*";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authorizing,
    Authenticated,
    Refreshing,
}

/// Outcome of validating params against the user-info endpoint.
#[derive(Debug)]
pub enum UserValidation {
    /// The params are valid as given.
    Valid(AuthParams),
    /// The params were stale and have been refreshed.
    Refreshed(AuthParams),
    /// Refresh failed; the user has to authorize again.
    SignInRequired(AuthError),
}

impl UserValidation {
    pub fn params(&self) -> Option<&AuthParams> {
        match self {
            Self::Valid(params) | Self::Refreshed(params) => Some(params),
            Self::SignInRequired(_) => None,
        }
    }

    pub fn into_result(self) -> Result<AuthParams, AuthError> {
        match self {
            Self::Valid(params) | Self::Refreshed(params) => Ok(params),
            Self::SignInRequired(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    params: Option<AuthParams>,
    user: Option<CurrentUser>,
    state: AuthState,
    /// Completed refreshes. Survives `log_out`.
    generation: u64,
}

/// Authentication session of one account.
///
/// Owns the in-memory [`AuthParams`] and [`CurrentUser`]. Share it as
/// `Arc<Session>`; refreshes are serialized internally so concurrent callers
/// that hit a 401 with the same token share one token-endpoint round trip.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ytm_auth::auth::{FileTokenStore, Session, SessionKey};
/// use ytm_auth::config::AuthConfig;
///
/// # async fn example() -> Result<(), ytm_auth::AuthError> {
/// let config = AuthConfig::from_env()?;
/// let session = Session::new(config, Arc::new(FileTokenStore::new_default()), SessionKey::new("1"));
/// let outcome = session.restore().await?;
/// println!("{:?}", outcome.params());
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: AuthConfig,
    http: reqwest::Client,
    store: Arc<dyn TokenStore>,
    key: SessionKey,
    strategy: AuthStrategy,
    inner: RwLock<SessionState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server_uri", &self.config.server_uri)
            .field("key", &self.key)
            .field("strategy", &self.strategy.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>, key: SessionKey) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            store,
            key,
            strategy: AuthStrategy::default(),
            inner: RwLock::new(SessionState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    pub fn state(&self) -> AuthState {
        self.read(|inner| inner.state)
    }

    pub fn auth_params(&self) -> Option<AuthParams> {
        self.read(|inner| inner.params.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(|inner| inner.params.as_ref().map(|p| p.access_token.clone()))
    }

    /// Number of refreshes completed so far. Pass it to
    /// [`refresh_after`](Self::refresh_after) to coalesce with concurrent refreshes.
    pub fn refresh_generation(&self) -> u64 {
        self.read(|inner| inner.generation)
    }

    /// In-memory params together with the refresh generation they belong to.
    pub(crate) fn snapshot(&self) -> (Option<AuthParams>, u64) {
        self.read(|inner| (inner.params.clone(), inner.generation))
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.read(|inner| inner.user.clone())
    }

    /// Adopt params in memory. Does not persist them.
    pub fn set_auth_params(&self, params: AuthParams) {
        self.write(|inner| inner.params = Some(params));
    }

    pub fn permissions_cache_url(&self) -> String {
        self.config.permissions_cache_url()
    }

    /// Whether the in-memory access token has passed its expiry.
    pub fn is_token_outdated(&self) -> bool {
        self.read(|inner| {
            inner
                .params
                .as_ref()
                .is_some_and(|params| params.is_expired(Utc::now()))
        })
    }

    /// Headers for an authorized request.
    ///
    /// `Authorization` comes from `params`, or the in-memory params when
    /// `None`, and is omitted when neither yields a complete value.
    pub fn authorization_headers(&self, params: Option<&AuthParams>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        let authorization = match params {
            Some(params) => params.authorization(),
            None => self.read(|inner| inner.params.as_ref().and_then(AuthParams::authorization)),
        };
        if let Some(value) = authorization.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Load the current user with `params`, without any refresh.
    ///
    /// Banned users fail with [`AuthError::UserBanned`] and are not stored.
    pub async fn verify_user(&self, params: &AuthParams) -> Result<CurrentUser, AuthError> {
        tracing::info!("Verifying token, loading current user");
        let resp = self
            .http
            .get(self.config.user_info_url())
            .headers(self.authorization_headers(Some(params)))
            .header(ACCEPT, ACCEPT_HEADER)
            .header("Hub-API-Version", "2")
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status >= 400 {
            tracing::debug!(status, "Loading current user failed");
            return Err(AuthError::api(status, body));
        }

        let user: CurrentUser = serde_json::from_str(&body)?;
        if user.banned {
            tracing::warn!(user_id = %user.id, "Current user is banned");
            return Err(AuthError::UserBanned);
        }
        self.write(|inner| inner.user = Some(user.clone()));
        tracing::info!(user_id = %user.id, "Current user updated");
        Ok(user)
    }

    /// Validate `params` by loading the current user, refreshing once on 401.
    ///
    /// A refresh failure is reported as [`UserValidation::SignInRequired`];
    /// it never escapes as `Err`. A 401 without a refresh token does.
    pub async fn load_current_user(&self, params: AuthParams) -> Result<UserValidation, AuthError> {
        let generation = self.refresh_generation();
        let err = match self.verify_user(&params).await {
            Ok(_) => {
                self.set_state(AuthState::Authenticated);
                return Ok(UserValidation::Valid(params));
            }
            Err(err) => err,
        };

        if matches!(err, AuthError::UserBanned) {
            self.set_state(AuthState::Unauthenticated);
            return Err(err);
        }
        if !err.is_unauthorized() {
            return Err(err);
        }
        if params.refresh_token().is_none() {
            tracing::warn!("Access token rejected and no refresh token is available");
            return Err(err);
        }

        tracing::info!("Access token rejected, refreshing");
        match self.refresh_after(generation).await {
            Ok(refreshed) => Ok(UserValidation::Refreshed(refreshed)),
            Err(refresh_err) => {
                tracing::warn!(error = %refresh_err, "Token refresh failed, sign-in required");
                Ok(UserValidation::SignInRequired(refresh_err))
            }
        }
    }

    /// Persist `params` under `key` and hand them back.
    pub fn cache_auth_params(
        &self,
        params: AuthParams,
        key: &SessionKey,
    ) -> Result<AuthParams, AuthError> {
        self.store.save(key, &params)?;
        Ok(params)
    }

    /// Params persisted under this session's key.
    pub fn cached_auth_params(&self) -> Result<AuthParams, AuthError> {
        self.store.load(&self.key)?.ok_or_else(|| {
            tracing::debug!(session = %self.key, "No stored auth params found");
            AuthError::NoCachedSession
        })
    }

    /// Forget the in-memory params and user. The persisted copy is kept.
    pub fn log_out(&self) {
        self.write(|inner| {
            *inner = SessionState {
                generation: inner.generation,
                ..SessionState::default()
            }
        });
    }

    /// Refresh the current params. Concurrent calls share one refresh.
    pub async fn refresh(&self) -> Result<AuthParams, AuthError> {
        self.refresh_after(self.refresh_generation()).await
    }

    /// Refresh unless a refresh completed since `generation` was observed.
    ///
    /// Callers read the generation when they pick up the params that got
    /// rejected. If another refresh finished in between, its params are
    /// returned without another network round trip.
    pub async fn refresh_after(&self, generation: u64) -> Result<AuthParams, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        if let (Some(current), current_generation) = self.snapshot() {
            if current_generation != generation {
                tracing::debug!("Token already refreshed by a concurrent caller");
                return Ok(current);
            }
        }

        let previous_state = self.state();
        self.set_state(AuthState::Refreshing);
        match self.strategy.refresh(self).await {
            Ok(Some(params)) => {
                self.write(|inner| inner.generation += 1);
                self.set_state(AuthState::Authenticated);
                Ok(params)
            }
            Ok(None) => {
                self.set_state(previous_state);
                Err(AuthError::RefreshUnsupported(self.strategy.name().to_string()))
            }
            Err(err) => {
                self.set_state(AuthState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Adopt the cached params and validate them.
    pub async fn restore(&self) -> Result<UserValidation, AuthError> {
        let params = self.cached_auth_params()?;
        self.set_auth_params(params.clone());
        let outcome = self.load_current_user(params).await?;
        if matches!(outcome, UserValidation::SignInRequired(_)) {
            self.set_state(AuthState::Unauthenticated);
        }
        Ok(outcome)
    }

    /// Legacy password sign-in.
    pub async fn sign_in_with_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<AuthParams, AuthError> {
        tracing::info!("Obtaining token by credentials");
        self.set_state(AuthState::Authorizing);
        let params =
            match exchange::obtain_token_by_credentials(&self.http, &self.config, login, password)
                .await
            {
                Ok(params) => params,
                Err(err) => {
                    self.set_state(AuthState::Unauthenticated);
                    return Err(err);
                }
            };
        self.adopt(params).await
    }

    /// Interactive authorization-code sign-in through `authorizer`.
    pub async fn authorize(&self, authorizer: &dyn Authorizer) -> Result<AuthParams, AuthError> {
        let flow = self.strategy.oauth2().ok_or_else(|| {
            AuthError::Unsupported(format!(
                "interactive authorization with the {} strategy",
                self.strategy.name()
            ))
        })?;
        self.set_state(AuthState::Authorizing);
        let params = match flow.authorize(self, authorizer).await {
            Ok(params) => params,
            Err(err) => {
                self.set_state(AuthState::Unauthenticated);
                return Err(err);
            }
        };
        self.adopt(params).await
    }

    /// Stash an authorization code for the next refresh (OAuth2 strategy only).
    pub fn accept_authorization_code(
        &self,
        code: impl Into<String>,
        code_verifier: Option<String>,
    ) -> Result<(), AuthError> {
        let flow = self.strategy.oauth2().ok_or_else(|| {
            AuthError::Unsupported(format!(
                "authorization codes with the {} strategy",
                self.strategy.name()
            ))
        })?;
        flow.accept_authorization_code(code, code_verifier);
        Ok(())
    }

    /// Revoke the in-memory access token. Best-effort.
    pub async fn revoke(&self) {
        if let Some(token) = self.access_token() {
            exchange::revoke_token(&self.http, &self.config, &token).await;
        }
    }

    /// Warm up the authorization endpoint. Best-effort.
    pub async fn prefetch(&self) {
        exchange::prefetch_configuration(&self.http, &self.config).await;
    }

    /// Revoke, drop the persisted params, then [`log_out`](Self::log_out).
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.revoke().await;
        let cleared = self.store.clear(&self.key);
        self.log_out();
        tracing::info!(session = %self.key, "Signed out");
        cleared
    }

    async fn adopt(&self, params: AuthParams) -> Result<AuthParams, AuthError> {
        let params = self.cache_auth_params(params, &self.key)?;
        self.set_auth_params(params.clone());
        match self.verify_user(&params).await {
            Ok(_) => {
                self.set_state(AuthState::Authenticated);
                Ok(params)
            }
            Err(err) => {
                self.set_state(AuthState::Unauthenticated);
                Err(err)
            }
        }
    }

    fn set_state(&self, state: AuthState) {
        let previous = self.write(|inner| std::mem::replace(&mut inner.state, state));
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Auth state changed");
        }
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
