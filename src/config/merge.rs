use std::path::PathBuf;
use std::time::Duration;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{RemoteBackend, ServerConfig, TlsConfig};

/// Merge environment configuration (base) with YAML overrides
///
/// Any value present in the YAML file replaces the environment value.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) => {}
                    _ => return Err("server.tls requires both cert_path and key_path".into()),
                }
            }
        }
    }

    if let Some(remote) = yaml.remote {
        if let Some(backend) = remote.backend {
            config.remote_backend = backend.parse::<RemoteBackend>()?;
        }
        if remote.ws_url.is_some() {
            config.remote_ws_url = remote.ws_url;
        }
        if let Some(model_id) = remote.model_id {
            config.model_id = model_id;
        }
        if let Some(region) = remote.region {
            config.aws_region = region;
        }
        if remote.aws_access_key_id.is_some() {
            config.aws_access_key_id = remote.aws_access_key_id;
        }
        if remote.aws_secret_access_key.is_some() {
            config.aws_secret_access_key = remote.aws_secret_access_key;
        }
        if remote.aws_session_token.is_some() {
            config.aws_session_token = remote.aws_session_token;
        }
        if let Some(secs) = remote.connect_timeout_seconds {
            config.remote_connect_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(session) = yaml.session {
        let target = &mut config.session;
        if let Some(voice) = session.voice {
            target.voice = voice;
        }
        if let Some(voices) = session.available_voices {
            target.available_voices = voices;
        }
        if let Some(prompt) = session.system_prompt {
            target.system_prompt = prompt;
        }
        if let Some(ms) = session.silence_threshold_ms {
            target.silence_threshold = Duration::from_millis(ms);
        }
        if let Some(rms) = session.silence_rms_threshold {
            target.silence_rms_threshold = rms;
        }
        if let Some(ms) = session.dedup_cooldown_ms {
            target.dedup_cooldown = Duration::from_millis(ms);
        }
        if let Some(threshold) = session.audio_flush_threshold {
            target.audio_flush_threshold = threshold;
        }
        if let Some(ms) = session.audio_flush_timeout_ms {
            target.audio_flush_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = session.bootstrap_pacing_ms {
            target.bootstrap_pacing = Duration::from_millis(ms);
        }
        if let Some(ms) = session.teardown_pacing_ms {
            target.teardown_pacing = Duration::from_millis(ms);
        }
        if let Some(secs) = session.idle_timeout_seconds {
            config.idle_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(tools) = yaml.tools {
        if let Some(secs) = tools.timeout_seconds {
            config.tools.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = tools.progress_interval_ms {
            config.tools.progress_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = tools.fan_out_timeout_seconds {
            config.tools.fan_out_timeout = Duration::from_secs(secs);
        }
        if tools.exa_api_key.is_some() {
            config.exa_api_key = tools.exa_api_key;
        }
        if tools.weather_api_key.is_some() {
            config.weather_api_key = tools.weather_api_key;
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if security.max_websocket_connections.is_some() {
            config.max_websocket_connections = security.max_websocket_connections;
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}
