//! ytm-auth CLI binary entry point.

use tracing_subscriber::EnvFilter;
use ytm_auth::cli::{AuthCommands, Cli, Commands};

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_args();
    let session = cli.session.as_str();
    let youtrack_url = cli.youtrack_url.as_deref();

    let result = match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login => ytm_auth::cli::auth::handle_login(session, youtrack_url).await,
            AuthCommands::LoginPassword(args) => {
                ytm_auth::cli::auth::handle_login_password(
                    session,
                    youtrack_url,
                    &args.login,
                    args.password,
                )
                .await
            }
            AuthCommands::Status => ytm_auth::cli::auth::handle_status(session).await,
            AuthCommands::Whoami => ytm_auth::cli::auth::handle_whoami(session, youtrack_url).await,
            AuthCommands::Refresh => {
                ytm_auth::cli::auth::handle_refresh(session, youtrack_url).await
            }
            AuthCommands::Logout => ytm_auth::cli::auth::handle_logout(session, youtrack_url).await,
        },
        Commands::Config(args) => ytm_auth::cli::auth::handle_config(&args.url).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytm_auth=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
