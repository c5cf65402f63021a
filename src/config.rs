use anyhow::{Context, anyhow};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_punch_per_min: u32,
    pub rate_protected_per_min: u32,

    /// How long a company's policy stays cached before it is re-read.
    pub policy_cache_ttl: Duration,
    /// Idle time after which an employee-month lock is dropped.
    pub month_lock_idle: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_punch_per_min: parse_or(
                "RATE_PUNCH_PER_MIN",
                env::var("RATE_PUNCH_PER_MIN").ok(),
                30,
            )?,
            rate_protected_per_min: parse_or(
                "RATE_PROTECTED_PER_MIN",
                env::var("RATE_PROTECTED_PER_MIN").ok(),
                1000,
            )?,

            policy_cache_ttl: Duration::from_secs(parse_or(
                "POLICY_CACHE_TTL_SECS",
                env::var("POLICY_CACHE_TTL_SECS").ok(),
                300,
            )?),
            month_lock_idle: Duration::from_secs(parse_or(
                "MONTH_LOCK_IDLE_SECS",
                env::var("MONTH_LOCK_IDLE_SECS").ok(),
                600,
            )?),
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

/// Parse an optional setting; unset means `default`, garbage is an error.
fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{name} has invalid value {raw:?}: {e}")),
    }
}
