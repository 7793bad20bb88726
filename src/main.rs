//! EVE Auth Callback - Main entry point
//!
//! Serves the EVE Online SSO callback: verifies the character, provisions the
//! Firebase account and hands the browser a custom token.

use eve_auth_callback::config::Config;
use eve_auth_callback::error::Result;
use eve_auth_callback::server::{self, AppState};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BANNER: &str = r#"
╔══════════════════════════════════════════════════════════════╗
║                     EVE Auth Callback                        ║
║           EVE Online SSO -> Firebase custom tokens           ║
╚══════════════════════════════════════════════════════════════╝
"#;

fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    // A missing .env is fine, the environment may already be populated
    let dotenv_path = dotenv::dotenv().ok();

    let config = Config::parse_args();

    // Set up logging
    setup_logging(&config);

    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if !config.no_banner && !config.silent {
        eprintln!("{}", BANNER);
        info!("Client ID: {}", config.client_id);
        info!("Redirect URL: {}", config.redirect_url);
        info!("Scopes: {}", config.scopes().join(" "));
        info!("Login redirect: {}", config.login_redirect_url);
        info!("Firebase uid source: {:?}", config.uid_source);
        eprintln!();
    }

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Initializing Firebase and EVE SSO clients...");
    let state = AppState::from_config(config)?;

    server::run_server(state).await
}
