//! Discovery of the OAuth configuration from a YouTrack server.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT as USER_AGENT_HEADER};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use super::{AuthConfig, DEFAULT_LANDING_URL, DEFAULT_SCOPES};
use crate::auth::session::{ACCEPT_HEADER, USER_AGENT};
use crate::error::AuthError;

/// Legacy discovery path; when given, it is fetched as-is instead of `/api/config`.
pub const VERSION_DETECT_FALLBACK_URL: &str = "/rest/workflow/version";

const MIN_YOUTRACK_VERSION: f64 = 7.0;
const CONFIG_FIELDS: &str =
    "ring(url,serviceId),mobile(serviceSecret,serviceId),version,build,statisticsEnabled";
const SUPPORTED_VERSION_MESSAGE: &str = "YouTrack Mobile requires YouTrack version 7.0 or later.";

/// Server configuration needed to sign in to a YouTrack instance.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend_url: String,
    pub version: String,
    pub build: Option<String>,
    pub statistics_enabled: bool,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteConfig {
    ring: RingConfig,
    mobile: MobileConfig,
    #[serde(default)]
    build: Option<Value>,
    #[serde(default)]
    statistics_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RingConfig {
    url: String,
    #[serde(default)]
    service_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileConfig {
    service_id: String,
    #[serde(default)]
    service_secret: Option<String>,
}

/// Fetch `/api/config` from a YouTrack server and derive its Hub OAuth settings.
pub async fn load_config(http: &reqwest::Client, youtrack_url: &str) -> Result<AppConfig, AuthError> {
    let youtrack_url = youtrack_url.trim_end_matches('/');
    let url = if youtrack_url.ends_with(VERSION_DETECT_FALLBACK_URL) {
        youtrack_url.to_string()
    } else {
        format!("{youtrack_url}/api/config?fields={CONFIG_FIELDS}")
    };
    let display_url = youtrack_url.replace(VERSION_DETECT_FALLBACK_URL, "");

    let resp = http
        .get(&url)
        .header(USER_AGENT_HEADER, USER_AGENT)
        .header(ACCEPT, ACCEPT_HEADER)
        .send()
        .await?;
    tracing::info!(url = %display_url, status = resp.status().as_u16(), "Got config response");
    let body = resp.text().await?;

    let payload: Value = serde_json::from_str(&body).map_err(|err| {
        tracing::warn!(url = %display_url, error = %err, "Failed to load config");
        AuthError::InvalidResponse(format!(
            "Invalid server response. The URL is either an unsupported YouTrack version or is not a YouTrack instance. {SUPPORTED_VERSION_MESSAGE}"
        ))
    })?;
    let version = check_config(&payload, &display_url)?;
    let remote: RemoteConfig = serde_json::from_value(payload)?;

    let server_uri = handle_relative_url(&remote.ring.url, &display_url);
    let auth = AuthConfig::builder()
        .server_uri(server_uri.trim_end_matches('/'))
        .client_id(remote.mobile.service_id)
        .maybe_client_secret(remote.mobile.service_secret)
        .scopes(DEFAULT_SCOPES)
        .landing_url(DEFAULT_LANDING_URL)
        .maybe_youtrack_service_id(remote.ring.service_id)
        .build();

    Ok(AppConfig {
        backend_url: display_url,
        version,
        build: remote.build.map(|build| match build {
            Value::String(value) => value,
            other => other.to_string(),
        }),
        statistics_enabled: remote.statistics_enabled,
        auth,
    })
}

/// Reject payloads from unsupported or misconfigured servers. Returns the version string.
fn check_config(payload: &Value, youtrack_url: &str) -> Result<String, AuthError> {
    if payload.get("error").and_then(Value::as_str) == Some("Not Found") {
        return Err(AuthError::Unsupported(format!(
            "Cannot connect to {youtrack_url} - this version of YouTrack is not supported. {SUPPORTED_VERSION_MESSAGE}"
        )));
    }
    if let Some(message) = payload
        .get("error_developer_message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
    {
        return Err(AuthError::Configuration(format!(
            "Unable to connect to this YouTrack instance. {SUPPORTED_VERSION_MESSAGE} {message}"
        )));
    }

    let version = match payload.get("version") {
        Some(Value::String(version)) => version.clone(),
        Some(Value::Number(version)) => version.to_string(),
        _ => String::new(),
    };
    if parse_version(&version).map_or(true, |number| number < MIN_YOUTRACK_VERSION) {
        return Err(AuthError::Unsupported(SUPPORTED_VERSION_MESSAGE.to_string()));
    }

    let has_mobile_service = payload
        .pointer("/mobile/serviceId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_mobile_service {
        return Err(AuthError::Configuration(format!(
            "The mobile application feature is not enabled for {youtrack_url}. Please contact support."
        )));
    }
    Ok(version)
}

/// Leading `major.minor` of a version string, e.g. `2024.3.1234` -> `2024.3`.
fn parse_version(version: &str) -> Option<f64> {
    let mut seen_dot = false;
    let prefix: String = version
        .trim()
        .chars()
        .take_while(|ch| {
            if *ch == '.' && !seen_dot {
                seen_dot = true;
                return true;
            }
            ch.is_ascii_digit()
        })
        .collect();
    prefix.trim_end_matches('.').parse().ok()
}

/// Scheme, host and port of `url`. Unparseable input is returned unchanged.
pub fn base_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => url.to_string(),
    }
}

/// Resolve a Hub URL that may be relative to the YouTrack origin.
pub fn handle_relative_url(hub_url: &str, youtrack_url: &str) -> String {
    if hub_url.starts_with('/') {
        format!("{}{hub_url}", base_url(youtrack_url))
    } else {
        hub_url.to_string()
    }
}

/// Strip the protocol and a trailing `/youtrack` context for display.
pub fn format_youtrack_url(url: &str) -> String {
    static PROTOCOL: OnceLock<Option<Regex>> = OnceLock::new();
    static CONTEXT: OnceLock<Option<Regex>> = OnceLock::new();
    let protocol = PROTOCOL.get_or_init(|| Regex::new(r"(?i)^https?://").ok());
    let context = CONTEXT.get_or_init(|| Regex::new(r"(?i)/youtrack$").ok());

    let mut out = url.to_string();
    if let Some(re) = protocol {
        out = re.replace(&out, "").into_owned();
    }
    if let Some(re) = context {
        out = re.replace(&out, "").into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_drops_protocol_and_context() {
        assert_eq!(format_youtrack_url("http://foo.com"), "foo.com");
        assert_eq!(format_youtrack_url("http://foo"), "foo");
        assert_eq!(format_youtrack_url("http://foo.com:8080/bar"), "foo.com:8080/bar");
        assert_eq!(format_youtrack_url("HTTPS://foo.com"), "foo.com");
        assert_eq!(format_youtrack_url("foo.com/youtrack"), "foo.com");
        assert_eq!(format_youtrack_url("http://foo.com/youtrack"), "foo.com");
    }

    #[test]
    fn relative_hub_url_resolves_against_youtrack_origin() {
        assert_eq!(
            handle_relative_url("/hub", "https://foo.myjetbrains.com/youtrack"),
            "https://foo.myjetbrains.com/hub"
        );
        assert_eq!(
            handle_relative_url("/hub", "http://fake.backend:8080"),
            "http://fake.backend:8080/hub"
        );
        assert_eq!(
            handle_relative_url("http://hub.com", "http://fake.backend"),
            "http://hub.com"
        );
    }

    #[test]
    fn version_prefix_is_parsed_like_a_float() {
        assert_eq!(parse_version("7.0"), Some(7.0));
        assert_eq!(parse_version("2024.3.1234"), Some(2024.3));
        assert_eq!(parse_version("6"), Some(6.0));
        assert_eq!(parse_version("beta"), None);
    }

    #[test]
    fn config_checks_reject_broken_servers() {
        assert!(matches!(
            check_config(&json!({"error": "Not Found"}), "http://yt"),
            Err(AuthError::Unsupported(_))
        ));
        assert!(matches!(
            check_config(&json!({"version": "6.5", "mobile": {"serviceId": "m"}}), "http://yt"),
            Err(AuthError::Unsupported(_))
        ));
        match check_config(&json!({"foo": "bar", "version": "2024.1"}), "http://yt") {
            Err(AuthError::Configuration(message)) => {
                assert!(message.contains("mobile application feature is not enabled"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            check_config(&json!({"version": 7.1, "mobile": {"serviceId": "m"}}), "http://yt")
                .unwrap(),
            "7.1"
        );
    }
}
