//! CLI entry point for ytm-auth.

pub mod auth;

use clap::{Parser, Subcommand};

/// YouTrack Mobile auth CLI
#[derive(Parser, Debug)]
#[command(name = "ytm-auth", version, about = "Sign in to YouTrack and manage cached tokens")]
pub struct Cli {
    /// Key the session's tokens are cached under
    #[arg(long, global = true, env = "YTM_SESSION", default_value = "default")]
    pub session: String,

    /// YouTrack URL to discover the OAuth configuration from (otherwise YTM_* env vars)
    #[arg(long, global = true, env = "YTM_YOUTRACK_URL")]
    pub youtrack_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// Show the OAuth configuration a YouTrack server publishes
    Config(ConfigArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in through the browser (authorization code)
    Login,
    /// Sign in with login and password (legacy password grant)
    LoginPassword(LoginPasswordArgs),
    /// Show cached session status
    Status,
    /// Validate the cached session and print the current user
    Whoami,
    /// Force a token refresh
    Refresh,
    /// Revoke and forget the cached session
    Logout,
}

/// Arguments for `ytm-auth auth login-password`.
#[derive(Parser, Debug)]
pub struct LoginPasswordArgs {
    pub login: String,

    /// Password (prompted when omitted)
    #[arg(long, env = "YTM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Arguments for `ytm-auth config`.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// YouTrack URL, e.g. https://example.myjetbrains.com/youtrack
    pub url: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_auth_login_with_defaults() {
        let cli = Cli::try_parse_from(["ytm-auth", "auth", "login"]).unwrap();
        assert_eq!(cli.session, "default");
        match cli.command {
            Commands::Auth(auth) => assert!(matches!(auth.command, AuthCommands::Login)),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_password_with_global_session() {
        let cli = Cli::try_parse_from([
            "ytm-auth",
            "auth",
            "login-password",
            "john",
            "--password",
            "secret",
            "--session",
            "1700000000000",
        ])
        .unwrap();
        assert_eq!(cli.session, "1700000000000");
        match cli.command {
            Commands::Auth(auth) => match auth.command {
                AuthCommands::LoginPassword(args) => {
                    assert_eq!(args.login, "john");
                    assert_eq!(args.password.as_deref(), Some("secret"));
                }
                other => panic!("expected LoginPassword, got {other:?}"),
            },
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn parse_config_url() {
        let cli = Cli::try_parse_from(["ytm-auth", "config", "https://yt.example.com"]).unwrap();
        match cli.command {
            Commands::Config(args) => assert_eq!(args.url, "https://yt.example.com"),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["ytm-auth"]).is_err());
        assert!(Cli::try_parse_from(["ytm-auth", "auth", "login-password"]).is_err());
    }
}
