use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Tubecast Auth - Google sign-in agent for the broadcast tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Google OAuth client id registered for this installation
    #[arg(short = 'c', long, env = "GOOGLE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Path to the credential database
    #[arg(short = 'd', long, env = "AUTH_DB_FILE")]
    pub db_file: Option<String>,

    /// Redirect URI registered for the client
    #[arg(long, env = "OAUTH_REDIRECT_URI", default_value = "http://127.0.0.1:12345/")]
    pub redirect_uri: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Seconds to wait for the browser redirect before giving up
    #[arg(long, env = "AUTH_WAIT_TIMEOUT", default_value = "300")]
    pub auth_wait_timeout: u64,

    /// Paste the redirect into the terminal instead of running a loopback listener
    #[arg(long, env = "MANUAL_REDIRECT", default_value = "false")]
    pub manual_redirect: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in, refreshing silently when a refresh token is stored
    Login,
    /// Show sign-in status without touching the network
    Status,
    /// Revoke the current access token and clear stored credentials
    Logout,
    /// Print a valid access token for downstream tools
    Token,
}

#[derive(Clone, Debug)]
pub struct Config {
    // OAuth client
    pub client_id: String,
    pub redirect_uri: String,

    // Credential storage
    pub db_file: PathBuf,

    // Timeouts
    pub http_timeout: u64,
    pub auth_wait_timeout: u64,

    // Interactive flow
    pub manual_redirect: bool,

    // Logging
    pub log_level: String,

    pub endpoints: Endpoints,
}

impl Config {
    /// Build configuration from parsed arguments with priority: CLI > ENV > defaults
    pub fn load(args: &CliArgs) -> Result<Self> {
        let client_id = args
            .client_id
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLIENT_ID").ok())
            .context("GOOGLE_CLIENT_ID is required (use -c or set GOOGLE_CLIENT_ID env var)")?;

        let db_file = args
            .db_file
            .as_deref()
            .map(expand_tilde)
            .or_else(default_db_path)
            .context("could not determine a credential database path (set AUTH_DB_FILE)")?;

        Ok(Config {
            client_id,
            redirect_uri: args.redirect_uri.clone(),
            db_file,
            http_timeout: args.http_timeout,
            auth_wait_timeout: args.auth_wait_timeout,
            manual_redirect: args.manual_redirect,
            log_level: args.log_level.clone(),
            endpoints: Endpoints::from_env()?,
        })
    }
}

/// Google endpoint set, overridable per endpoint for tests and proxies
#[derive(Clone, Debug)]
pub struct Endpoints {
    /// Consent screen the browser is sent to
    pub auth: Url,
    /// Code exchange and refresh
    pub token: Url,
    pub revoke: Url,
    /// Post-sign-in health check targets
    pub userinfo: Url,
    pub channels: Url,
}

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";

impl Endpoints {
    /// Google production endpoints
    pub fn google() -> Self {
        Endpoints {
            auth: Url::parse(AUTH_ENDPOINT).expect("static endpoint URL"),
            token: Url::parse(TOKEN_ENDPOINT).expect("static endpoint URL"),
            revoke: Url::parse(REVOKE_ENDPOINT).expect("static endpoint URL"),
            userinfo: Url::parse(USERINFO_ENDPOINT).expect("static endpoint URL"),
            channels: Url::parse(CHANNELS_ENDPOINT).expect("static endpoint URL"),
        }
    }

    /// Production endpoints with per-endpoint overrides from the environment
    pub fn from_env() -> Result<Self> {
        let mut endpoints = Self::google();
        if let Ok(v) = std::env::var("GOOGLE_AUTH_ENDPOINT") {
            endpoints.auth = parse_endpoint(&v)?;
        }
        if let Ok(v) = std::env::var("GOOGLE_TOKEN_ENDPOINT") {
            endpoints.token = parse_endpoint(&v)?;
        }
        if let Ok(v) = std::env::var("GOOGLE_REVOKE_ENDPOINT") {
            endpoints.revoke = parse_endpoint(&v)?;
        }
        if let Ok(v) = std::env::var("GOOGLE_USERINFO_ENDPOINT") {
            endpoints.userinfo = parse_endpoint(&v)?;
        }
        if let Ok(v) = std::env::var("YOUTUBE_CHANNELS_ENDPOINT") {
            endpoints.channels = parse_endpoint(&v)?;
        }
        Ok(endpoints)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::google()
    }
}

fn parse_endpoint(value: &str) -> Result<Url> {
    Url::parse(value).with_context(|| format!("invalid endpoint URL: {value}"))
}

/// Default credential database location under the platform data directory
fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tubecast").join("auth.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
