//! Configuration module for the Sonic gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use sonic_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::session::SessionConfig;
use crate::core::tools::{BuiltinToolSettings, ToolEngineConfig};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Transport used to reach the speech-to-speech model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteBackend {
    /// AWS Bedrock bidirectional streaming
    #[default]
    Bedrock,
    /// Model events carried as WebSocket text frames
    WebSocket,
}

impl FromStr for RemoteBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bedrock" | "aws" => Ok(RemoteBackend::Bedrock),
            "websocket" | "ws" => Ok(RemoteBackend::WebSocket),
            other => Err(format!(
                "Unsupported remote backend: {other}. Expected 'bedrock' or 'websocket'"
            )),
        }
    }
}

impl fmt::Display for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteBackend::Bedrock => f.write_str("bedrock"),
            RemoteBackend::WebSocket => f.write_str("websocket"),
        }
    }
}

pub const DEFAULT_MODEL_ID: &str = "amazon.nova-sonic-v1:0";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Model stream settings (backend, model, AWS credentials)
/// - Session protocol and buffering parameters
/// - Tool engine deadlines and tool API keys
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Model stream
    pub remote_backend: RemoteBackend,
    /// `ws://` or `wss://` endpoint for the websocket backend
    pub remote_ws_url: Option<String>,
    pub model_id: String,
    /// AWS access key ID; falls back to the default credential chain when absent
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub aws_region: String,
    pub remote_connect_timeout: Duration,

    // Sessions
    pub session: SessionConfig,
    /// Client WebSocket is closed after this long without an inbound frame
    pub idle_timeout: Duration,

    // Tools
    pub tools: ToolEngineConfig,
    /// Exa API key for the search tool
    pub exa_api_key: Option<String>,
    /// WeatherAPI key for live weather lookups
    pub weather_api_key: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            remote_backend: RemoteBackend::default(),
            remote_ws_url: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            aws_region: DEFAULT_AWS_REGION.to_string(),
            remote_connect_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
            idle_timeout: Duration::from_secs(300),
            tools: ToolEngineConfig::default(),
            exa_api_key: None,
            weather_api_key: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.aws_access_key_id {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.aws_secret_access_key {
            secret.zeroize();
        }
        if let Some(ref mut token) = self.aws_session_token {
            token.zeroize();
        }
        if let Some(ref mut key) = self.exa_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.weather_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The `.env` file is loaded by the binary before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether explicit AWS credentials are configured
    pub fn has_aws_credentials(&self) -> bool {
        self.aws_access_key_id.is_some() && self.aws_secret_access_key.is_some()
    }

    /// Settings handed to the built-in tools
    pub fn builtin_tool_settings(&self) -> BuiltinToolSettings {
        BuiltinToolSettings {
            weather_api_key: self.weather_api_key.clone(),
            exa_api_key: self.exa_api_key.clone(),
            fan_out_timeout: self.tools.fan_out_timeout,
            ..BuiltinToolSettings::default()
        }
    }
}
