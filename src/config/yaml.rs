use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     cert_path: "/etc/certs/server.pem"
///     key_path: "/etc/certs/server.key"
///
/// remote:
///   backend: "bedrock"            # or "websocket"
///   ws_url: "wss://relay.example.com/model"
///   model_id: "amazon.nova-sonic-v1:0"
///   region: "us-east-1"
///   aws_access_key_id: "AKIA..."
///   aws_secret_access_key: "..."
///   connect_timeout_seconds: 10
///
/// session:
///   voice: "tiffany"
///   available_voices: ["matthew", "tiffany"]
///   silence_threshold_ms: 500
///   dedup_cooldown_ms: 2000
///   audio_flush_threshold: 1024
///   audio_flush_timeout_ms: 20
///   idle_timeout_seconds: 300
///
/// tools:
///   timeout_seconds: 30
///   progress_interval_ms: 200
///   fan_out_timeout_seconds: 15
///   exa_api_key: "..."
///   weather_api_key: "..."
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub remote: Option<RemoteYaml>,
    pub session: Option<SessionYaml>,
    pub tools: Option<ToolsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Model stream configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RemoteYaml {
    /// "bedrock" or "websocket"
    pub backend: Option<String>,
    pub ws_url: Option<String>,
    pub model_id: Option<String>,
    pub region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Session protocol configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub voice: Option<String>,
    pub available_voices: Option<Vec<String>>,
    pub system_prompt: Option<String>,
    pub silence_threshold_ms: Option<u64>,
    /// RMS level (0.0 - 1.0) below which a PCM chunk counts as silence
    pub silence_rms_threshold: Option<f64>,
    pub dedup_cooldown_ms: Option<u64>,
    pub audio_flush_threshold: Option<usize>,
    pub audio_flush_timeout_ms: Option<u64>,
    pub bootstrap_pacing_ms: Option<u64>,
    pub teardown_pacing_ms: Option<u64>,
    pub idle_timeout_seconds: Option<u64>,
}

/// Tool engine configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub timeout_seconds: Option<u64>,
    pub progress_interval_ms: Option<u64>,
    pub fan_out_timeout_seconds: Option<u64>,
    pub exa_api_key: Option<String>,
    pub weather_api_key: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
