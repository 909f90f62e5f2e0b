//! Hub OAuth2 session lifecycle: token exchange, caching, validation, refresh.

pub mod authorization;
pub mod exchange;
pub mod grant;
pub mod oauth2;
pub mod params;
pub mod session;
pub mod store;
pub mod strategy;
pub mod user;

pub use authorization::{AuthorizationRequest, Authorizer, Consent};
pub use grant::{Grant, GrantType};
pub use oauth2::OAuth2Flow;
pub use params::{AuthParams, IssuedTokens, TokenResponse};
pub use session::{AuthState, Session, UserValidation, ACCEPT_HEADER, USER_AGENT};
pub use store::{FileTokenStore, SessionKey, TokenStore, TokenStoreConfig};
pub use strategy::AuthStrategy;
pub use user::CurrentUser;
