//! ytm-auth: OAuth2 session lifecycle for YouTrack Mobile clients.
//!
//! Acquires tokens from a Hub server (authorization code or legacy password
//! grant), caches them per session key, validates them by loading the
//! current user, and refreshes them with a single in-flight request per
//! session no matter how many callers hit a 401 at once.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ytm_auth::prelude::*;
//!
//! # async fn example() -> ytm_auth::error::Result<()> {
//! let config = AuthConfig::from_env()?;
//! let session = Arc::new(Session::new(
//!     config,
//!     Arc::new(FileTokenStore::new_default()),
//!     SessionKey::new("1700000000000"),
//! ));
//! match session.restore().await? {
//!     UserValidation::Valid(_) | UserValidation::Refreshed(_) => {}
//!     UserValidation::SignInRequired(err) => eprintln!("{}", err.user_message()),
//! }
//!
//! let client = AuthorizedClient::new(session);
//! let issues: serde_json::Value = client
//!     .get_json("https://example.myjetbrains.com/youtrack/api/issues?fields=id")
//!     .await?;
//! println!("{issues}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{AuthError, Result};
