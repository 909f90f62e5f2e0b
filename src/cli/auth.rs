//! CLI auth command handlers.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{
    AuthStrategy, AuthorizationRequest, Authorizer, Consent, FileTokenStore, Session,
    SessionKey, TokenStore, UserValidation,
};
use crate::config::{format_youtrack_url, load_config, AuthConfig};
use crate::error::AuthError;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Prints the consent URL and reads the redirect URL (or code) from stdin.
pub struct StdinAuthorizer;

#[async_trait]
impl Authorizer for StdinAuthorizer {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<Consent, AuthError> {
        println!("🔗 Visit: {}", request.url);
        println!(
            "📋 After authorizing, paste the {} redirect URL (or the code) below:",
            request.redirect_uri
        );
        print!("> ");
        std::io::stdout().flush()?;

        let input = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|err| AuthError::Io(err.to_string()))??;
        Consent::from_pasted(&input)
    }
}

async fn resolve_config(youtrack_url: Option<&str>) -> Result<AuthConfig, AuthError> {
    match youtrack_url {
        Some(url) => Ok(load_config(&reqwest::Client::new(), url).await?.auth),
        None => AuthConfig::from_env(),
    }
}

async fn open_session(
    session: &str,
    youtrack_url: Option<&str>,
    strategy: AuthStrategy,
) -> Result<Session, AuthError> {
    let config = resolve_config(youtrack_url).await?;
    Ok(Session::new(
        config,
        Arc::new(FileTokenStore::new_default()),
        SessionKey::new(session),
    )
    .with_strategy(strategy))
}

/// Handle `ytm-auth auth login`.
pub async fn handle_login(session: &str, youtrack_url: Option<&str>) -> CliResult {
    let session = open_session(session, youtrack_url, AuthStrategy::default()).await?;
    session.prefetch().await;
    match session.authorize(&StdinAuthorizer).await {
        Ok(_) => {
            print_user(&session);
            println!("✅ Login successful!");
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ {}", err.user_message());
            Err(err.into())
        }
    }
}

/// Handle `ytm-auth auth login-password`.
pub async fn handle_login_password(
    session: &str,
    youtrack_url: Option<&str>,
    login: &str,
    password: Option<String>,
) -> CliResult {
    let password = match password {
        Some(password) => password,
        None => {
            print!("🔑 Password: ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let session = open_session(session, youtrack_url, AuthStrategy::Credentials).await?;
    session.sign_in_with_credentials(login, &password).await?;
    print_user(&session);
    println!("✅ Login successful!");
    Ok(())
}

/// Handle `ytm-auth auth status`. Reads the cache only; no network.
pub async fn handle_status(session: &str) -> CliResult {
    let store = FileTokenStore::new_default();
    let key = SessionKey::new(session);

    println!("🔐 Session {key}\n");
    match store.load(&key) {
        Ok(Some(params)) => {
            let expiry = match params.expires_at {
                Some(expires) if expires > chrono::Utc::now() => {
                    format!("✅ Access token valid until {}", expires.format("%Y-%m-%d %H:%M"))
                }
                Some(_) => "⚠️  Access token expired".to_string(),
                None => "✅ Access token cached (no expiry)".to_string(),
            };
            println!("  {expiry}");
            let refresh = if params.refresh_token().is_some() {
                "✅ Refresh token cached"
            } else {
                "❌ No refresh token (sign in again on expiry)"
            };
            println!("  {refresh}");
            if let Some(scope) = params.scope {
                println!("  Scope: {scope}");
            }
        }
        Ok(None) => println!("  ❌ Not logged in"),
        Err(e) => println!("  ⚠️  Error: {e}"),
    }
    Ok(())
}

/// Handle `ytm-auth auth whoami`.
pub async fn handle_whoami(session: &str, youtrack_url: Option<&str>) -> CliResult {
    let session = open_session(session, youtrack_url, AuthStrategy::default()).await?;
    match session.restore().await? {
        UserValidation::Valid(_) => {}
        UserValidation::Refreshed(_) => println!("🔄 Access token refreshed"),
        UserValidation::SignInRequired(err) => {
            eprintln!("❌ {}", err.user_message());
            return Err(err.into());
        }
    }
    print_user(&session);
    Ok(())
}

/// Handle `ytm-auth auth refresh`.
pub async fn handle_refresh(session: &str, youtrack_url: Option<&str>) -> CliResult {
    let session = open_session(session, youtrack_url, AuthStrategy::default()).await?;
    session.set_auth_params(session.cached_auth_params()?);
    let params = session.refresh().await?;
    match params.expires_at {
        Some(expires) => println!("✅ Token refreshed (expires {})", expires.format("%Y-%m-%d %H:%M")),
        None => println!("✅ Token refreshed"),
    }
    Ok(())
}

/// Handle `ytm-auth auth logout`.
pub async fn handle_logout(session: &str, youtrack_url: Option<&str>) -> CliResult {
    let session = open_session(session, youtrack_url, AuthStrategy::default()).await?;
    if let Ok(params) = session.cached_auth_params() {
        session.set_auth_params(params);
    }
    session.sign_out().await?;
    println!("✅ Logged out");
    Ok(())
}

/// Handle `ytm-auth config <url>`.
pub async fn handle_config(url: &str) -> CliResult {
    let config = load_config(&reqwest::Client::new(), url).await?;
    println!("🛰  {} (YouTrack {})", format_youtrack_url(&config.backend_url), config.version);
    println!("  Hub:        {}", config.auth.server_uri);
    println!("  Client id:  {}", config.auth.client_id);
    println!(
        "  Secret:     {}",
        if config.auth.uses_pkce() { "none (PKCE)" } else { "configured" }
    );
    if let Some(service_id) = &config.auth.youtrack_service_id {
        println!("  Service id: {service_id}");
    }
    Ok(())
}

fn print_user(session: &Session) {
    if let Some(user) = session.current_user() {
        let guest = if user.guest { " (guest)" } else { "" };
        println!("👤 {}{guest} [{}]", user.name, user.id);
    }
}
