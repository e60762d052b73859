use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base URL used when neither the config file nor `DIFY_BASE_URL` provide one.
pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";

/// Process-wide configuration. Built once at startup, validated eagerly,
/// and passed into handlers read-only from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_port() -> u16 {
    8080
}

fn default_api_key_env() -> String {
    "DIFY_API_KEY".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir.
    ///
    /// The config file is optional (the proxy runs on environment variables
    /// alone), so an empty search falls back to defaults instead of failing.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let candidates = config_search_paths();
        for candidate in &candidates {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Resolve the effective base URL: config override, then the
    /// `DIFY_BASE_URL` environment variable, then the cloud default.
    pub fn effective_base_url(&self) -> String {
        if let Some(ref url) = self.upstream.base_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("DIFY_BASE_URL") {
            if !url.is_empty() {
                return url;
            }
        }
        DEFAULT_BASE_URL.to_string()
    }

    /// Resolve the API key from the configured environment variable.
    /// A missing key is a startup error, not a per-request one.
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var(&self.upstream.api_key_env).map_err(|_| {
            ProxyError::config(format!(
                "Environment variable '{}' not set. Set it to your Dify app API key.",
                self.upstream.api_key_env
            ))
        })
    }
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("dify-proxy.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("dify-proxy")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(
                PathBuf::from(xdg)
                    .join("dify-proxy")
                    .join("config.toml"),
            );
        }
        if let Some(home) = dirs_path() {
            paths.push(
                home.join(".config")
                    .join("dify-proxy")
                    .join("config.toml"),
            );
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".dify-proxy.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[upstream]
base_url = "https://dify.internal/v1"
api_key_env = "MY_DIFY_KEY"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(
            config.upstream.base_url.as_deref(),
            Some("https://dify.internal/v1")
        );
        assert_eq!(config.upstream.api_key_env, "MY_DIFY_KEY");
    }

    #[test]
    fn test_defaults_when_fields_omitted() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.api_key_env, "DIFY_API_KEY");
        assert!(config.upstream.base_url.is_none());
    }

    #[test]
    fn test_effective_base_url_override() {
        // DIFY_BASE_URL may be set in the ambient environment, so only the
        // config-file override is asserted here.
        let config = ProxyConfig {
            port: 8080,
            upstream: UpstreamConfig {
                base_url: Some("https://my-dify.example.com/v1".to_string()),
                api_key_env: "DIFY_API_KEY".to_string(),
            },
        };
        assert_eq!(
            config.effective_base_url(),
            "https://my-dify.example.com/v1"
        );
    }

    #[test]
    fn test_resolve_api_key_missing_env() {
        let config = ProxyConfig {
            upstream: UpstreamConfig {
                base_url: None,
                api_key_env: "DIFY_PROXY_TEST_UNSET_KEY".to_string(),
            },
            ..ProxyConfig::default()
        };
        assert!(config.resolve_api_key().is_err());
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        std::env::set_var("DIFY_PROXY_TEST_SET_KEY", "app-secret");
        let config = ProxyConfig {
            upstream: UpstreamConfig {
                base_url: None,
                api_key_env: "DIFY_PROXY_TEST_SET_KEY".to_string(),
            },
            ..ProxyConfig::default()
        };
        assert_eq!(config.resolve_api_key().unwrap(), "app-secret");
    }
}
