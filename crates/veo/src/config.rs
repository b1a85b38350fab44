//! Client configuration loaded from environment variables.

use veoq_core::error::CoreError;

use crate::api::DEFAULT_API_URL;
use crate::poll::PollConfig;

/// Where the service lives and how patiently to wait for it.
///
/// | Env Var       | Default                                     |
/// |---------------|---------------------------------------------|
/// | `VEO_API_URL` | `https://generativelanguage.googleapis.com` |
///
/// Poll settings are documented on [`PollConfig::from_lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeoConfig {
    pub api_url: String,
    pub poll: PollConfig,
}

impl Default for VeoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll: PollConfig::default(),
        }
    }
}

impl VeoConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api_url = lookup("VEO_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(CoreError::Config(format!(
                "VEO_API_URL must be an http(s) URL, got {api_url:?}"
            )));
        }

        Ok(Self {
            api_url,
            poll: PollConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_public_endpoint() {
        let config = VeoConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, VeoConfig::default());
    }

    #[test]
    fn custom_url() {
        let config = VeoConfig::from_lookup(|key| {
            (key == "VEO_API_URL").then(|| "http://127.0.0.1:9000".to_string())
        })
        .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn non_http_url_rejected() {
        let result =
            VeoConfig::from_lookup(|key| (key == "VEO_API_URL").then(|| "ftp://x".to_string()));
        assert!(result.is_err());
    }
}
