use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::AuthParams;
use crate::error::AuthError;

/// Opaque key a session's params are cached under.
///
/// Usually the account's creation timestamp in milliseconds, so several
/// accounts on one device cache independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_timestamp(created_at: DateTime<Utc>) -> Self {
        Self(created_at.timestamp_millis().to_string())
    }

    pub fn now() -> Self {
        Self::from_timestamp(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage abstraction for persisted auth params.
pub trait TokenStore: Send + Sync {
    fn load(&self, key: &SessionKey) -> Result<Option<AuthParams>, AuthError>;
    fn save(&self, key: &SessionKey, params: &AuthParams) -> Result<(), AuthError>;
    fn clear(&self, key: &SessionKey) -> Result<(), AuthError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_store_dir()
    }
}

/// File-backed token store writing one TOML file per session key.
///
/// # Example
/// ```no_run
/// use ytm_auth::auth::{AuthParams, FileTokenStore, SessionKey, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let params = AuthParams::new("access", "Bearer").with_refresh_token("refresh");
/// store.save(&SessionKey::new("1700000000000"), &params)?;
/// # Ok::<(), ytm_auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_store_dir(),
        }
    }

    fn params_path(&self, key: &SessionKey) -> PathBuf {
        let label = file_label(key.as_str());
        self.base_dir.join(format!("auth-params.{label}.toml"))
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &SessionKey) -> Result<Option<AuthParams>, AuthError> {
        let path = self.params_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: ParamsFile = toml::from_str(&raw)?;
        Ok(Some(file.params))
    }

    fn save(&self, key: &SessionKey, params: &AuthParams) -> Result<(), AuthError> {
        let path = self.params_path(key);
        Self::ensure_parent(&path)?;
        let file = ParamsFile {
            version: 1,
            session_key: key.to_string(),
            saved_at: Utc::now(),
            params: params.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %path.display(), "Saved auth params");
        Ok(())
    }

    fn clear(&self, key: &SessionKey) -> Result<(), AuthError> {
        let path = self.params_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParamsFile {
    version: u32,
    session_key: String,
    saved_at: DateTime<Utc>,
    params: AuthParams,
}

fn default_store_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".ytm-auth"))
        .unwrap_or_else(|| PathBuf::from(".ytm-auth"))
}

/// File-name label for a session key.
///
/// Keys made only of `[0-9a-z_-]` are used verbatim. Anything else is
/// hex-encoded behind an `x.` marker, which a verbatim label can never
/// contain, so distinct keys never share a file even on case-insensitive
/// filesystems.
fn file_label(key: &str) -> String {
    let verbatim = !key.is_empty()
        && key.bytes().all(|byte| {
            byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_'
        });
    if verbatim {
        return key.to_string();
    }
    let hex: String = key.bytes().map(|byte| format!("{byte:02x}")).collect();
    format!("x.{hex}")
}
