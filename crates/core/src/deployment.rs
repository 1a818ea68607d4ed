use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{AppError, AppResult};

/// Deployment identifier derived from the host of a deployment base URL.
///
/// Used as the namespace for every cached record so that two deployments
/// never share a cache location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Creates a deployment identifier from a base URL such as
    /// `https://access.example.com/`.
    pub fn from_base_url(base_url: &str) -> AppResult<Self> {
        let parsed = Url::parse(base_url.trim()).map_err(|error| {
            AppError::Validation(format!("invalid deployment url '{base_url}': {error}"))
        })?;

        let host = parsed
            .host_str()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!("deployment url '{base_url}' has no host"))
            })?;

        Ok(Self(host.to_ascii_lowercase()))
    }

    /// Restores a deployment identifier from a stored host value.
    pub fn from_host(host: &str) -> AppResult<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(AppError::Validation(
                "deployment host must not be empty".to_owned(),
            ));
        }

        Ok(Self(host.to_ascii_lowercase()))
    }

    /// Returns the host-derived namespace value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DeploymentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
