//! read client configuration from a file, the environment, or explicit values

use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;

pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh-token";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "storefront-client-rust/0.1.0";

pub enum ConfigLocation {
    File(String),
    Env,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    pub fn load(loc: ConfigLocation) -> Result<Self, Error> {
        let config = match loc {
            ConfigLocation::File(path) => Self::from_file(path)?,
            ConfigLocation::Env => Self::from_env()?,
        };
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.normalized()
    }

    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("STOREFRONT_API_URL")
            .map_err(|_| Error::Config("Missing STOREFRONT_API_URL env var".to_string()))?;
        let refresh_path =
            std::env::var("STOREFRONT_REFRESH_PATH").unwrap_or_else(|_| default_refresh_path());
        let timeout_secs = match std::env::var("STOREFRONT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("STOREFRONT_TIMEOUT_SECS is not a number: '{raw}'"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        let user_agent =
            std::env::var("STOREFRONT_USER_AGENT").unwrap_or_else(|_| default_user_agent());
        Config {
            base_url,
            refresh_path,
            timeout_secs,
            user_agent,
        }
        .normalized()
    }

    pub fn from_values(
        base_url: impl Into<String>,
        refresh_path: Option<String>,
        timeout_secs: Option<u64>,
        user_agent: Option<String>,
    ) -> Result<Self, Error> {
        Config {
            base_url: base_url.into(),
            refresh_path: refresh_path.unwrap_or_else(default_refresh_path),
            timeout_secs: timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: user_agent.unwrap_or_else(default_user_agent),
        }
        .normalized()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Joins a relative path onto the base URL; absolute URLs are returned as-is.
    pub fn resolve(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn normalized(mut self) -> Result<Self, Error> {
        if !self.base_url.starts_with("http") {
            self.base_url = format!("https://{}", self.base_url);
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        if !self.refresh_path.starts_with('/') {
            self.refresh_path = format!("/{}", self.refresh_path);
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_applies_defaults_and_scheme() {
        let config = Config::from_values("shop.example/", None, None, None).unwrap();
        assert_eq!(config.base_url, "https://shop.example");
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = Config::from_values("http://exa mple.com", None, None, None).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Invalid base URL")));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(Config::from_values("http://localhost", None, Some(0), None).is_err());
    }

    #[test]
    fn resolve_joins_paths() {
        let config =
            Config::from_values("http://localhost:5000", Some("auth/refresh".into()), None, None)
                .unwrap();
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(
            config.resolve("/api/products"),
            "http://localhost:5000/api/products"
        );
        assert_eq!(
            config.resolve("api/products"),
            "http://localhost:5000/api/products"
        );
        assert_eq!(
            config.resolve("https://cdn.example/img.png"),
            "https://cdn.example/img.png"
        );
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{ "base_url": "http://localhost:5000", "timeout_secs": 3 }"#,
        )
        .unwrap();
        let config = Config::load(ConfigLocation::File(path.to_string_lossy().into_owned()))
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
    }
}
