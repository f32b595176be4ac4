use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use tubecast_auth::auth::authorize::{Authenticator, PromptAuthenticator};
use tubecast_auth::auth::TokenManager;
use tubecast_auth::callback::LoopbackAuthenticator;
use tubecast_auth::config::{CliArgs, Command, Config};
use tubecast_auth::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = Config::load(&args)?;

    // Initialize logging with the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    tracing::debug!(db = %config.db_file.display(), "Opening credential store");
    let store = Arc::new(SqliteStore::open(&config.db_file)?);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout))
        .build()?;

    let authenticator: Arc<dyn Authenticator> = if config.manual_redirect {
        Arc::new(PromptAuthenticator)
    } else {
        Arc::new(LoopbackAuthenticator::new(Duration::from_secs(
            config.auth_wait_timeout,
        )))
    };

    let manager = TokenManager::new(
        config.endpoints.clone(),
        config.client_id.clone(),
        config.redirect_uri.clone(),
        client,
        store.clone(),
        store,
        authenticator,
    );

    match args.command {
        Command::Login => login(&manager).await,
        Command::Status => status(&manager).await,
        Command::Logout => logout(&manager).await,
        Command::Token => token(&manager).await,
    }
}

async fn login(manager: &TokenManager) -> Result<()> {
    manager.ensure_signed_in().await?;
    match manager.email() {
        Some(email) => println!("Signed in as {email}"),
        None => println!("Signed in"),
    }
    Ok(())
}

async fn status(manager: &TokenManager) -> Result<()> {
    let stored = manager.stored_status().await?;

    if !stored.has_access_token && !stored.has_refresh_token {
        println!("Signed out.");
        return Ok(());
    }

    let expiry = match stored.expires_at {
        Some(ts) => {
            let now = chrono::Utc::now().timestamp();
            if ts > now {
                let remaining = ts - now;
                format!(
                    "valid ({}h {}m remaining)",
                    remaining / 3600,
                    (remaining % 3600) / 60
                )
            } else {
                "expired".to_string()
            }
        }
        None => "unknown".to_string(),
    };

    println!(
        "Google account [access token {expiry}]{}",
        if stored.has_refresh_token {
            ", silent refresh available"
        } else {
            ""
        }
    );
    Ok(())
}

async fn logout(manager: &TokenManager) -> Result<()> {
    manager.sign_out().await?;
    println!("Signed out and cleared stored credentials");
    Ok(())
}

async fn token(manager: &TokenManager) -> Result<()> {
    manager.ensure_signed_in().await?;
    match manager.bearer_token() {
        Some(token) => {
            println!("{token}");
            Ok(())
        }
        None => anyhow::bail!("no access token available after sign-in"),
    }
}
