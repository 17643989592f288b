//! Backend settings resolution.
//!
//! # Responsibilities
//! - Resolve the named settings required to build a connection
//! - Fail fast, naming the missing or malformed setting
//!
//! # Design Decisions
//! - No retries: a missing setting cannot become present by waiting
//! - Settings come through a source trait so tests inject maps and
//!   production reads the process environment
//! - Placeholder values (template leftovers) are rejected like missing ones

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::connection::error::ConnectionError;

/// Setting key for the backend service URL.
pub const BACKEND_URL_KEY: &str = "BACKEND_URL";

/// Setting key for the backend service key.
pub const BACKEND_SERVICE_KEY_KEY: &str = "BACKEND_SERVICE_KEY";

/// Values that indicate a template was copied without being filled in.
const PLACEHOLDER_MARKERS: &[&str] = &["your-", "changeme", "change_me", "<", "example.com"];

/// Failure while reading from a settings source. Distinct from a missing
/// setting: the source itself misbehaved.
#[derive(Debug, thiserror::Error)]
#[error("settings source failed for '{key}': {reason}")]
pub struct SettingsError {
    pub key: String,
    pub reason: String,
}

/// Where named settings come from.
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;
}

/// Process-environment settings source.
#[derive(Debug, Default)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(SettingsError {
                key: key.to_string(),
                reason: "environment value is not valid unicode".to_string(),
            }),
        }
    }
}

/// Map-backed settings source for tests. Mutable so a test can repair a
/// setting between connection attempts.
#[derive(Debug, Default, Clone)]
pub struct MapSettings {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .expect("settings map poisoned")
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().expect("settings map poisoned").remove(key);
    }
}

impl SettingsSource for MapSettings {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self
            .values
            .lock()
            .expect("settings map poisoned")
            .get(key)
            .cloned())
    }
}

/// Typed settings a connection is built from.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: Url,
    pub service_key: String,
}

/// Resolves and validates the named settings required to build a connection.
#[derive(Clone)]
pub struct ConfigurationResolver {
    source: Arc<dyn SettingsSource>,
}

impl ConfigurationResolver {
    pub fn new(source: Arc<dyn SettingsSource>) -> Self {
        Self { source }
    }

    /// Resolver over the process environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvSettings))
    }

    /// Return the setting's value or fail naming the key.
    ///
    /// A missing or placeholder value is a Configuration error; a broken
    /// source is an Environment error. Neither is retryable.
    pub fn get_required(&self, key: &str) -> Result<String, ConnectionError> {
        let value = self
            .source
            .get(key)
            .map_err(|e| ConnectionError::environment(e.to_string()))?;

        match value {
            Some(v) if v.trim().is_empty() => Err(ConnectionError::configuration(format!(
                "setting '{key}' is present but empty"
            ))),
            Some(v) if is_placeholder(&v) => Err(ConnectionError::configuration(format!(
                "setting '{key}' still holds a placeholder value"
            ))),
            Some(v) => Ok(v),
            None => Err(ConnectionError::configuration(format!(
                "required setting '{key}' is not set"
            ))),
        }
    }

    /// Resolve the full typed settings for building a connection.
    pub fn resolve(&self) -> Result<BackendSettings, ConnectionError> {
        let raw_url = self.get_required(BACKEND_URL_KEY)?;
        let service_key = self.get_required(BACKEND_SERVICE_KEY_KEY)?;

        let url = Url::parse(&raw_url).map_err(|e| {
            ConnectionError::configuration(format!(
                "setting '{BACKEND_URL_KEY}' is malformed: {e}"
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConnectionError::configuration(format!(
                "setting '{BACKEND_URL_KEY}' must be an http(s) URL, got scheme '{}'",
                url.scheme()
            )));
        }

        Ok(BackendSettings { url, service_key })
    }
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::error::ErrorCategory;

    fn resolver_with(url: Option<&str>, key: Option<&str>) -> ConfigurationResolver {
        let map = MapSettings::new();
        if let Some(u) = url {
            map.set(BACKEND_URL_KEY, u);
        }
        if let Some(k) = key {
            map.set(BACKEND_SERVICE_KEY_KEY, k);
        }
        ConfigurationResolver::new(Arc::new(map))
    }

    #[test]
    fn test_resolves_valid_settings() {
        let resolver = resolver_with(Some("https://db.internal:8443"), Some("svc-key"));
        let settings = resolver.resolve().unwrap();
        assert_eq!(settings.url.as_str(), "https://db.internal:8443/");
        assert_eq!(settings.service_key, "svc-key");
    }

    #[test]
    fn test_missing_url_names_the_key() {
        let resolver = resolver_with(None, Some("svc-key"));
        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
        assert!(!err.retryable);
        assert!(err.message.contains(BACKEND_URL_KEY));
    }

    #[test]
    fn test_malformed_url_is_configuration() {
        let resolver = resolver_with(Some("not a url"), Some("svc-key"));
        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let resolver = resolver_with(Some("ftp://db.internal"), Some("svc-key"));
        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
        assert!(err.message.contains("scheme"));
    }

    #[test]
    fn test_placeholder_value_is_rejected() {
        let resolver = resolver_with(Some("https://your-project.example.com"), Some("svc-key"));
        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
        assert!(err.message.contains("placeholder"));
    }

    #[test]
    fn test_empty_value_is_rejected() {
        let resolver = resolver_with(Some("https://db.internal"), Some("  "));
        let err = resolver.resolve().unwrap_err();
        assert!(err.message.contains(BACKEND_SERVICE_KEY_KEY));
    }
}
