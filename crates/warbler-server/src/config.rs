use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let session_secret = lookup("WARBLER_SESSION_SECRET")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if session_secret.is_empty() {
            bail!("WARBLER_SESSION_SECRET must be set");
        }
        if PLACEHOLDER_SECRETS.contains(&session_secret.to_lowercase().as_str()) {
            bail!("WARBLER_SESSION_SECRET is a placeholder value, set a real secret");
        }

        Ok(Self {
            host: try_load(&lookup, "WARBLER_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "WARBLER_PORT", "3000")?,
            db_path: try_load(&lookup, "WARBLER_DB_PATH", "warbler.db")?,
            session_secret,
        })
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw}"))
}
