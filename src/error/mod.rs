//! Error types for ytm-auth.

use strum::{Display, EnumString};
use thiserror::Error;

/// Shown when the server reports the signed-in user as banned.
pub const USER_BANNED_MESSAGE: &str = "User is banned";
/// Shown when the refresh token was rejected and a new login is needed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
/// Shown when the user dismissed the consent screen.
pub const AUTHORIZATION_CANCELLED_MESSAGE: &str = "Authorization was cancelled";
/// Generic fallback for every other authentication failure.
pub const SIGN_IN_REQUIRED_MESSAGE: &str = "Please sign in again.";

/// Why the token endpoint refused a refresh grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshFailure {
    /// The account behind the refresh token is banned.
    BannedUser,
    /// The refresh token is expired, revoked or otherwise invalid.
    InvalidGrant,
    /// The refresh request never got a usable answer.
    Network,
}

impl RefreshFailure {
    /// Classify an error raised while exchanging a refresh token.
    pub fn classify(error: &AuthError) -> Self {
        match error {
            AuthError::TokenExchange { error, .. } if error == "banned_user" => Self::BannedUser,
            AuthError::UserBanned => Self::BannedUser,
            AuthError::Network(_) | AuthError::Timeout(_) | AuthError::RequestTimedOut => {
                Self::Network
            }
            AuthError::Api { status, .. } if *status >= 500 => Self::Network,
            _ => Self::InvalidGrant,
        }
    }
}

/// Authentication errors surfaced by the session lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No cached session")]
    NoCachedSession,
    #[error("Refresh token missing")]
    RefreshTokenMissing,
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(RefreshFailure),
    #[error("{USER_BANNED_MESSAGE}")]
    UserBanned,
    #[error("Authorization cancelled")]
    AuthorizationCancelled,
    #[error("Token exchange failed (status {status}): {error}")]
    TokenExchange {
        status: u16,
        error: String,
        description: Option<String>,
    },
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Refresh not supported by the {0} strategy")]
    RefreshUnsupported(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout after {0}ms")]
    Timeout(u64),
    /// Deadline set on the HTTP client expired; reqwest does not report its length.
    #[error("Request timed out")]
    RequestTimedOut,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Create an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::TokenExchange { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server answered 401 Unauthorized.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoCachedSession
            | Self::RefreshTokenMissing
            | Self::RefreshRejected(RefreshFailure::BannedUser | RefreshFailure::InvalidGrant)
            | Self::UserBanned
            | Self::AuthorizationCancelled
            | Self::TokenExchange { .. } => ErrorCategory::Authentication,
            Self::RefreshRejected(RefreshFailure::Network) | Self::Network(_) => {
                ErrorCategory::Network
            }
            Self::Timeout(_) | Self::RequestTimedOut => ErrorCategory::Timeout,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Configuration(_) | Self::RefreshUnsupported(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) | Self::InvalidResponse(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::SignInAgain,
            ErrorCategory::Network | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            _ => RecoverySuggestion::ContactSupport,
        }
    }

    /// Human-readable message for a "please sign in" prompt.
    ///
    /// Banned users, rejected refresh tokens and cancelled authorization get
    /// their own wording; everything else collapses to a generic prompt.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UserBanned | Self::RefreshRejected(RefreshFailure::BannedUser) => {
                USER_BANNED_MESSAGE
            }
            Self::RefreshRejected(RefreshFailure::InvalidGrant) => SESSION_EXPIRED_MESSAGE,
            Self::AuthorizationCancelled => AUTHORIZATION_CANCELLED_MESSAGE,
            _ => SIGN_IN_REQUIRED_MESSAGE,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::RequestTimedOut;
        }
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    SignInAgain,
    CheckConfiguration,
    IncreaseTimeout,
    ContactSupport,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banned_refresh_rejection_uses_banned_message() {
        let err = AuthError::TokenExchange {
            status: 200,
            error: "banned_user".to_string(),
            description: None,
        };
        assert_eq!(RefreshFailure::classify(&err), RefreshFailure::BannedUser);
        assert_eq!(
            AuthError::RefreshRejected(RefreshFailure::BannedUser).user_message(),
            USER_BANNED_MESSAGE
        );
    }

    #[test]
    fn invalid_grant_gets_session_expired_message() {
        let err = AuthError::TokenExchange {
            status: 400,
            error: "invalid_grant".to_string(),
            description: Some("Refresh token expired".to_string()),
        };
        let failure = RefreshFailure::classify(&err);
        assert_eq!(failure, RefreshFailure::InvalidGrant);
        assert_eq!(
            AuthError::RefreshRejected(failure).user_message(),
            SESSION_EXPIRED_MESSAGE
        );
    }

    #[test]
    fn other_failures_collapse_to_generic_prompt() {
        assert_eq!(AuthError::NoCachedSession.user_message(), SIGN_IN_REQUIRED_MESSAGE);
        assert_eq!(
            AuthError::api(500, "boom").user_message(),
            SIGN_IN_REQUIRED_MESSAGE
        );
        assert_eq!(
            AuthError::AuthorizationCancelled.user_message(),
            AUTHORIZATION_CANCELLED_MESSAGE
        );
    }

    #[test]
    fn transport_errors_classify_as_network_refresh_failures() {
        assert_eq!(
            RefreshFailure::classify(&AuthError::Network("reset".into())),
            RefreshFailure::Network
        );
        assert_eq!(
            RefreshFailure::classify(&AuthError::api(503, "unavailable")),
            RefreshFailure::Network
        );
    }

    #[test]
    fn retryable_categories_cover_transport_and_server() {
        assert!(AuthError::Timeout(100).is_retryable());
        assert!(AuthError::RequestTimedOut.is_retryable());
        assert_eq!(
            RefreshFailure::classify(&AuthError::RequestTimedOut),
            RefreshFailure::Network
        );
        assert!(AuthError::api(502, "bad gateway").is_retryable());
        assert!(!AuthError::api(401, "unauthorized").is_retryable());
        assert!(!AuthError::UserBanned.is_retryable());
        assert_eq!(
            AuthError::api(403, "forbidden").recovery_suggestion(),
            RecoverySuggestion::SignInAgain
        );
    }

    #[test]
    fn refresh_failure_displays_snake_case() {
        assert_eq!(RefreshFailure::BannedUser.to_string(), "banned_user");
        assert_eq!(
            "invalid_grant".parse::<RefreshFailure>().unwrap(),
            RefreshFailure::InvalidGrant
        );
    }
}
