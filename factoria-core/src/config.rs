use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_MODEL_ID: &str = "models/gemini-2.5-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:8080",
    "https://factoria-5ee80.web.app",
    "https://factoria-5ee80.firebaseapp.com",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the generative-AI backend. Absent when no API key is set.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub blob_root: PathBuf,
    pub gemini: Option<GeminiConfig>,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// Call `dotenv().ok()` first if a `.env` file should be honoured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when `DATABASE_URL` or `JWT_SECRET` is missing,
    /// or when a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        // Cloud Run style PORT takes precedence over SERVER_PORT.
        let port_raw = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .unwrap_or_else(|_| "8080".to_string());
        let port = parse_number("PORT", &port_raw)?;

        let database_url = required("DATABASE_URL")?;
        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => parse_number("DATABASE_MAX_CONNECTIONS", &raw)?,
            Err(_) => 10,
        };

        let jwt_secret = required("JWT_SECRET")?;

        let blob_root = env::var("BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/blobs"));

        let gemini = match env::var("GEMINI_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => {
                let timeout_secs = match env::var("GEMINI_TIMEOUT_SECONDS") {
                    Ok(raw) => parse_number("GEMINI_TIMEOUT_SECONDS", &raw)?,
                    Err(_) => 60,
                };
                Some(GeminiConfig {
                    api_key,
                    model_id: env::var("GEMINI_MODEL_ID")
                        .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
                    api_base: env::var("GEMINI_API_BASE")
                        .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            _ => None,
        };

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => split_origins(&raw),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Config {
            host,
            port,
            database_url,
            database_max_connections,
            jwt_secret,
            blob_root,
            gemini,
            cors_origins,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
