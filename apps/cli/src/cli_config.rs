use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rolegate_core::{AppError, DeploymentId};
use tracing_subscriber::EnvFilter;

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub deployment_url: String,
    pub api_token: Option<String>,
    pub cache_dir: PathBuf,
    pub http_timeout: Duration,
}

impl CliConfig {
    pub fn load() -> Result<Self, AppError> {
        let deployment_url = required_non_empty_env("ROLEGATE_DEPLOYMENT_URL")?;
        let api_token = env::var("ROLEGATE_API_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let cache_dir = match env::var("ROLEGATE_CACHE_DIR") {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => default_cache_dir()?,
        };
        let http_timeout_seconds = parse_env_u64(
            "ROLEGATE_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;
        if http_timeout_seconds == 0 {
            return Err(AppError::Validation(
                "ROLEGATE_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            deployment_url,
            api_token,
            cache_dir,
            http_timeout: Duration::from_secs(http_timeout_seconds),
        })
    }

    /// One cache file per deployment host.
    pub fn cache_path(&self, deployment_id: &DeploymentId) -> PathBuf {
        self.cache_dir.join(format!("{}.db", deployment_id.as_str()))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn default_cache_dir() -> Result<PathBuf, AppError> {
    let home = required_non_empty_env("HOME").map_err(|_| {
        AppError::Validation("ROLEGATE_CACHE_DIR is required when HOME is not set".to_owned())
    })?;

    Ok(PathBuf::from(home).join(".rolegate").join("cache"))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("{name} must be a positive integer: {error}"))
        }),
        Err(_) => Ok(default),
    }
}
