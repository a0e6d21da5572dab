use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub image_dir: PathBuf,
    pub max_image_bytes: usize,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("KICKS_JWT_SECRET").unwrap_or_default();
        let allow_dev = var("KICKS_ALLOW_DEV_SECRET").is_some_and(|v| v == "1");
        if jwt_secret.is_empty() {
            bail!("KICKS_JWT_SECRET is unset. Set it in your .env file and restart.");
        }
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            if !allow_dev {
                bail!(
                    "KICKS_JWT_SECRET is still a placeholder. \
                     Set a random secret, or KICKS_ALLOW_DEV_SECRET=1 for local development."
                );
            }
            warn!("Running with a placeholder JWT secret, tokens are forgeable");
        }

        let port = match var("KICKS_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("KICKS_PORT '{}' is not a valid port", raw))?,
            None => 3000,
        };
        let max_image_bytes = match var("KICKS_MAX_IMAGE_BYTES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("KICKS_MAX_IMAGE_BYTES '{}' is not a number", raw))?,
            None => DEFAULT_MAX_IMAGE_BYTES,
        };
        if max_image_bytes == 0 {
            bail!("KICKS_MAX_IMAGE_BYTES must be greater than zero");
        }

        Ok(Self {
            host: var("KICKS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("KICKS_DB_PATH").unwrap_or_else(|| "kicks.db".into()).into(),
            image_dir: var("KICKS_IMAGE_DIR").unwrap_or_else(|| "./images".into()).into(),
            max_image_bytes,
            jwt_secret,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
