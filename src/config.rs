use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

/// Secret used when none is configured. Fine for local development only.
const DEV_JWT_SECRET: &str = "housing-rental-dev-secret";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Root directory for uploaded images and verification documents.
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Housing rental marketplace API")]
pub struct Args {
    /// Host to bind to (overrides HOUSING_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides HOUSING_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides HOUSING_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for uploaded files (overrides HOUSING_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// HMAC secret for access tokens (overrides HOUSING_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in hours (overrides HOUSING_TOKEN_TTL_HOURS)
    #[arg(long)]
    pub token_ttl_hours: Option<i64>,

    /// Allowed CORS origin (overrides HOUSING_CORS_ORIGIN)
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Maximum request body size for uploads in MiB (overrides HOUSING_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let env_host = env::var("HOUSING_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("HOUSING_PORT", 3000u16)?;
        let env_db = env::var("HOUSING_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/housing.db".into());
        let env_upload =
            env::var("HOUSING_UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_ttl = parse_env("HOUSING_TOKEN_TTL_HOURS", 24i64)?;
        let env_cors =
            env::var("HOUSING_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3001".into());
        let env_max_upload = parse_env("HOUSING_MAX_UPLOAD_MB", 20usize)?;

        let jwt_secret = match args.jwt_secret.or_else(|| env::var("HOUSING_JWT_SECRET").ok()) {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("HOUSING_JWT_SECRET not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let token_ttl_hours = args.token_ttl_hours.unwrap_or(env_ttl);
        if token_ttl_hours <= 0 {
            anyhow::bail!("token ttl must be positive, got {}", token_ttl_hours);
        }

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            upload_dir: args.upload_dir.unwrap_or_else(|| PathBuf::from(env_upload)),
            jwt_secret,
            token_ttl_hours,
            cors_origin: args.cors_origin.unwrap_or(env_cors),
            max_upload_bytes: args.max_upload_mb.unwrap_or(env_max_upload) * 1024 * 1024,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
