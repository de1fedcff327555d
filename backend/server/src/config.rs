use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Invalid {key} value: {reason}")]
pub struct ConfigError {
    key: &'static str,
    reason: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub catalog_path: PathBuf,
    pub catalog_url: Option<String>,
    pub seed_posts_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub default_language: String,
    pub session_ttl_secs: u64,
    pub secure_cookies: bool,
    pub ai_delay_ms: u64,
    pub free_meal_limit: u32,
    pub free_health_limit: u32,
    pub ai_endpoint: Option<String>,
    pub ai_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("RUST_PORT", "8000")?,
            redis_url: optional("REDIS_URL"),
            catalog_path: try_load("CATALOG_PATH", catalog::DEFAULT_CATALOG_PATH)?,
            catalog_url: optional("CATALOG_URL"),
            seed_posts_path: optional("SEED_POSTS_PATH").map(PathBuf::from),
            static_dir: try_load("STATIC_DIR", "static")?,
            default_language: try_load("DEFAULT_LANGUAGE", "en")?,
            session_ttl_secs: try_load("SESSION_TTL_SECS", "1209600")?,
            secure_cookies: try_load("SECURE_COOKIES", "false")?,
            ai_delay_ms: try_load("AI_DELAY_MS", "800")?,
            free_meal_limit: try_load("FREE_MEAL_LIMIT", "1")?,
            free_health_limit: try_load("FREE_HEALTH_LIMIT", "1")?,
            ai_endpoint: optional("AI_ENDPOINT"),
            ai_api_key: read_secret("AI_API_KEY"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            redis_url: None,
            catalog_path: PathBuf::from(catalog::DEFAULT_CATALOG_PATH),
            catalog_url: None,
            seed_posts_path: None,
            static_dir: PathBuf::from("static"),
            default_language: "en".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 14,
            secure_cookies: false,
            ai_delay_ms: 800,
            free_meal_limit: 1,
            free_health_limit: 1,
            ai_endpoint: None,
            ai_api_key: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set");
    }

    value
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError {
                key,
                reason: e.to_string(),
            }
        })
}

/// Docker secret first, then the environment.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            info!("Failed to read {secret_name} from file: {e}, trying environment");
            var(secret_name)
        }
    }
}
