// == Std
use std::time::Duration;

// == External crates
use thiserror::Error;

/// Environment variable holding the backend base url
pub const BASE_URL_VAR: &str = "FPV_BASE_URL";
/// Environment variable holding the per-request timeout in milliseconds
pub const TIMEOUT_MS_VAR: &str = "FPV_TIMEOUT_MS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings for reaching the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    base_url: String,
    /// `None` means requests may take as long as the backend needs
    request_timeout: Option<Duration>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl ViewerConfig {
    pub fn new(base_url: impl Into<String>, request_timeout: Option<Duration>) -> Self {
        ViewerConfig {
            base_url: base_url.into(),
            request_timeout,
        }
    }

    /// Reads the configuration from the process environment, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ViewerConfig::default();

        if let Some(base_url) = lookup(BASE_URL_VAR) {
            config = config.with_base_url(base_url, BASE_URL_VAR)?;
        }
        if let Some(timeout) = lookup(TIMEOUT_MS_VAR) {
            config.request_timeout = Some(parse_timeout_ms(&timeout, TIMEOUT_MS_VAR)?);
        }

        Ok(config)
    }

    /// Returns a copy with the base url replaced. `source` names where the value came from, for error messages.
    pub fn with_base_url(mut self, base_url: impl Into<String>, source: &'static str) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ConfigError::Empty(source));
        }
        self.base_url = base_url.trim().to_string();
        Ok(self)
    }

    /// Returns a copy with the request timeout replaced
    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

fn parse_timeout_ms(value: &str, var: &'static str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidTimeout {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.base_url(), "http://localhost:5000");
        assert_eq!(config.request_timeout(), None, "No timeout should be enforced by default");
    }

    #[test]
    fn test_overrides() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            (BASE_URL_VAR, " https://permissions.example.com "),
            (TIMEOUT_MS_VAR, "2500"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "https://permissions.example.com");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_invalid_values() {
        let result = ViewerConfig::from_lookup(lookup_from(&[(TIMEOUT_MS_VAR, "soon")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidTimeout {
                var: TIMEOUT_MS_VAR,
                value: "soon".to_string()
            })
        );

        let result = ViewerConfig::from_lookup(lookup_from(&[(BASE_URL_VAR, "  ")]));
        assert_eq!(result, Err(ConfigError::Empty(BASE_URL_VAR)));
    }
}
