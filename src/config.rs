use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Global configuration for the gateway
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream API backend settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Static asset settings
    #[serde(default)]
    pub assets: AssetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen port (default: 3000, overridable via PORT)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Maximum accepted request body size in bytes (default: 50 MB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            bind: default_bind_address(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Port of the local API backend (default: 5000)
    #[serde(default = "default_upstream_port")]
    pub local_port: u16,

    /// Timeout for upstream requests in seconds (default: none)
    pub request_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            local_port: default_upstream_port(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Directory holding the built single-page app (default: public)
    #[serde(default = "default_asset_dir")]
    pub dir: String,

    /// Document served for paths with no matching file (default: index.html)
    #[serde(default = "default_index_file")]
    pub index: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            dir: default_asset_dir(),
            index: default_index_file(),
        }
    }
}

/// Where the process is running, resolved once at startup.
///
/// The target of every relayed API call follows from this value; nothing on
/// the request path reads the environment again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentContext {
    /// Local development; API calls go to a backend on localhost
    Local,
    /// Hosted platform; API calls go back through the public hostname
    Hosted { host: String },
}

impl DeploymentContext {
    /// Resolve the context from the process environment.
    ///
    /// The platform sets VERCEL on hosted deployments and VERCEL_URL to the
    /// public hostname. A hosted context without a usable hostname is a
    /// startup error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(
            std::env::var("VERCEL").ok(),
            std::env::var("VERCEL_URL").ok(),
        )
    }

    fn from_vars(flag: Option<String>, host: Option<String>) -> anyhow::Result<Self> {
        match flag {
            Some(f) if !f.is_empty() => match host {
                Some(h) if !h.is_empty() => Ok(DeploymentContext::Hosted { host: h }),
                _ => anyhow::bail!(
                    "VERCEL is set but VERCEL_URL is missing; cannot resolve the API base URL"
                ),
            },
            _ => Ok(DeploymentContext::Local),
        }
    }

    /// Base URL for upstream API calls under this context
    pub fn base_url(&self, local_port: u16) -> String {
        match self {
            DeploymentContext::Local => format!("http://localhost:{}", local_port),
            DeploymentContext::Hosted { host } => format!("https://{}", host),
        }
    }
}

impl std::fmt::Display for DeploymentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentContext::Local => write!(f, "local"),
            DeploymentContext::Hosted { host } => write!(f, "hosted ({})", host),
        }
    }
}

// Default value functions
fn default_listen_port() -> u16 {
    3000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024 // 50 MB
}

fn default_upstream_port() -> u16 {
    5000
}

fn default_asset_dir() -> String {
    "public".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a path, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Overlay settings from the process environment (currently just PORT)
    pub fn apply_env(&mut self) {
        self.apply_port_var(std::env::var("PORT").ok());
    }

    fn apply_port_var(&mut self, value: Option<String>) {
        if let Some(raw) = value {
            match raw.parse::<u16>() {
                Ok(port) if port > 0 => self.server.port = port,
                _ => warn!(value = %raw, "Ignoring invalid PORT environment variable"),
            }
        }
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.upstream.local_port == 0 {
            errors.push("upstream.local_port must be greater than 0".to_string());
        }
        if self.server.max_body_bytes == 0 {
            errors.push("server.max_body_bytes must be greater than 0".to_string());
        }
        if self.assets.dir.is_empty() {
            errors.push("assets.dir must not be empty".to_string());
        }
        if self.assets.index.is_empty() {
            errors.push("assets.index must not be empty".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 8080
bind = "127.0.0.1"
max_body_bytes = 1048576

[upstream]
local_port = 9000
request_timeout_secs = 10

[assets]
dir = "dist"
index = "app.html"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.upstream.local_port, 9000);
        assert_eq!(config.upstream.request_timeout_secs, Some(10));
        assert_eq!(config.assets.dir, "dist");
        assert_eq!(config.assets.index, "app.html");
    }

    #[test]
    fn test_empty_config() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();

        // Should use all defaults
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.max_body_bytes, 50 * 1024 * 1024);
        assert_eq!(config.upstream.local_port, 5000);
        assert_eq!(config.upstream.request_timeout_secs, None);
        assert_eq!(config.assets.dir, "public");
        assert_eq!(config.assets.index, "index.html");
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let toml = r#"
[server]
port = 4000
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.upstream.local_port, 5000);
    }

    #[test]
    fn test_default_matches_empty_toml() {
        let from_toml: Config = toml::from_str("").unwrap();
        let built = Config::default();

        assert_eq!(built.server.port, from_toml.server.port);
        assert_eq!(built.server.max_body_bytes, from_toml.server.max_body_bytes);
        assert_eq!(built.upstream.local_port, from_toml.upstream.local_port);
        assert_eq!(built.assets.dir, from_toml.assets.dir);
        assert_eq!(built.assets.index, from_toml.assets.index);
    }

    #[test]
    fn test_validate_rejects_zero_upstream_port() {
        let config: Config = toml::from_str("[upstream]\nlocal_port = 0\n").unwrap();
        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("upstream.local_port must be greater than 0"));
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let toml = r#"
[upstream]
local_port = 0

[assets]
dir = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("upstream.local_port must be greater than 0"));
        assert!(err.contains("assets.dir must not be empty"));
    }

    #[test]
    fn test_port_env_override() {
        let mut config = Config::default();
        config.apply_port_var(Some("8123".to_string()));
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_invalid_port_env_is_ignored() {
        let mut config = Config::default();
        config.apply_port_var(Some("not-a-port".to_string()));
        assert_eq!(config.server.port, 3000);

        config.apply_port_var(Some("0".to_string()));
        assert_eq!(config.server.port, 3000);

        config.apply_port_var(None);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_context_defaults_to_local() {
        let context = DeploymentContext::from_vars(None, None).unwrap();
        assert_eq!(context, DeploymentContext::Local);

        // An empty flag counts as unset
        let context = DeploymentContext::from_vars(Some(String::new()), None).unwrap();
        assert_eq!(context, DeploymentContext::Local);
    }

    #[test]
    fn test_context_hosted_with_hostname() {
        let context = DeploymentContext::from_vars(
            Some("1".to_string()),
            Some("myapp.vercel.app".to_string()),
        )
        .unwrap();
        assert_eq!(
            context,
            DeploymentContext::Hosted {
                host: "myapp.vercel.app".to_string()
            }
        );
    }

    #[test]
    fn test_context_hosted_without_hostname_fails() {
        let result = DeploymentContext::from_vars(Some("1".to_string()), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("VERCEL_URL"));

        let result = DeploymentContext::from_vars(Some("1".to_string()), Some(String::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_local() {
        assert_eq!(
            DeploymentContext::Local.base_url(5000),
            "http://localhost:5000"
        );
        assert_eq!(
            DeploymentContext::Local.base_url(9001),
            "http://localhost:9001"
        );
    }

    #[test]
    fn test_base_url_hosted_ignores_local_port() {
        let context = DeploymentContext::Hosted {
            host: "myapp.vercel.app".to_string(),
        };
        assert_eq!(context.base_url(5000), "https://myapp.vercel.app");
    }
}
