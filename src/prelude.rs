//! Convenience re-exports for common use.

pub use crate::api::{ApiResponse, AuthorizedClient};
pub use crate::auth::{
    AuthParams, AuthState, AuthStrategy, Authorizer, Consent, CurrentUser, FileTokenStore,
    Session, SessionKey, TokenStore, UserValidation,
};
pub use crate::config::{AppConfig, AuthConfig};
pub use crate::error::{AuthError, RefreshFailure, Result};
