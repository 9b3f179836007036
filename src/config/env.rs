use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{RemoteBackend, ServerConfig, TlsConfig};

/// Every environment variable read by [`load_from_env`].
pub(crate) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
    "REMOTE_BACKEND",
    "REMOTE_WS_URL",
    "MODEL_ID",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_DEFAULT_REGION",
    "REMOTE_CONNECT_TIMEOUT_SECONDS",
    "DEFAULT_VOICE",
    "AVAILABLE_VOICES",
    "SYSTEM_PROMPT",
    "SILENCE_THRESHOLD_MS",
    "SILENCE_RMS_THRESHOLD",
    "DEDUP_COOLDOWN_MS",
    "AUDIO_FLUSH_THRESHOLD",
    "AUDIO_FLUSH_TIMEOUT_MS",
    "BOOTSTRAP_PACING_MS",
    "TEARDOWN_PACING_MS",
    "SESSION_IDLE_TIMEOUT_SECONDS",
    "TOOL_TIMEOUT_SECONDS",
    "TOOL_PROGRESS_INTERVAL_MS",
    "FAN_OUT_TIMEOUT_SECONDS",
    "EXA_API_KEY",
    "WEATHER_API_KEY",
    "CORS_ALLOWED_ORIGINS",
    "RATE_LIMIT_REQUESTS_PER_SECOND",
    "RATE_LIMIT_BURST_SIZE",
    "MAX_WEBSOCKET_CONNECTIONS",
    "MAX_CONNECTIONS_PER_IP",
];

/// Non-empty value of an environment variable
fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {e}")),
        None => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, String> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}

fn env_seconds(key: &str) -> Result<Option<Duration>, String> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}

/// Comma-separated list, blank entries dropped
fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|raw| {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// Build a configuration from defaults overlaid with environment variables
pub(crate) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    // Server
    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse::<u16>("PORT")? {
        config.port = port;
    }
    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    // Model stream
    if let Some(backend) = env_parse::<RemoteBackend>("REMOTE_BACKEND")? {
        config.remote_backend = backend;
    }
    config.remote_ws_url = env_string("REMOTE_WS_URL");
    if let Some(model_id) = env_string("MODEL_ID") {
        config.model_id = model_id;
    }
    config.aws_access_key_id = env_string("AWS_ACCESS_KEY_ID");
    config.aws_secret_access_key = env_string("AWS_SECRET_ACCESS_KEY");
    config.aws_session_token = env_string("AWS_SESSION_TOKEN");
    if let Some(region) = env_string("AWS_DEFAULT_REGION") {
        config.aws_region = region;
    }
    if let Some(timeout) = env_seconds("REMOTE_CONNECT_TIMEOUT_SECONDS")? {
        config.remote_connect_timeout = timeout;
    }

    // Sessions
    let session = &mut config.session;
    if let Some(voice) = env_string("DEFAULT_VOICE") {
        session.voice = voice;
    }
    if let Some(voices) = env_list("AVAILABLE_VOICES") {
        session.available_voices = voices;
    }
    if let Some(prompt) = env_string("SYSTEM_PROMPT") {
        session.system_prompt = prompt;
    }
    if let Some(threshold) = env_millis("SILENCE_THRESHOLD_MS")? {
        session.silence_threshold = threshold;
    }
    if let Some(rms) = env_parse::<f64>("SILENCE_RMS_THRESHOLD")? {
        session.silence_rms_threshold = rms;
    }
    if let Some(cooldown) = env_millis("DEDUP_COOLDOWN_MS")? {
        session.dedup_cooldown = cooldown;
    }
    if let Some(threshold) = env_parse::<usize>("AUDIO_FLUSH_THRESHOLD")? {
        session.audio_flush_threshold = threshold;
    }
    if let Some(timeout) = env_millis("AUDIO_FLUSH_TIMEOUT_MS")? {
        session.audio_flush_timeout = timeout;
    }
    if let Some(pacing) = env_millis("BOOTSTRAP_PACING_MS")? {
        session.bootstrap_pacing = pacing;
    }
    if let Some(pacing) = env_millis("TEARDOWN_PACING_MS")? {
        session.teardown_pacing = pacing;
    }
    if let Some(idle) = env_seconds("SESSION_IDLE_TIMEOUT_SECONDS")? {
        config.idle_timeout = idle;
    }

    // Tools
    if let Some(timeout) = env_seconds("TOOL_TIMEOUT_SECONDS")? {
        config.tools.timeout = timeout;
    }
    if let Some(interval) = env_millis("TOOL_PROGRESS_INTERVAL_MS")? {
        config.tools.progress_interval = interval;
    }
    if let Some(timeout) = env_seconds("FAN_OUT_TIMEOUT_SECONDS")? {
        config.tools.fan_out_timeout = timeout;
    }
    config.exa_api_key = env_string("EXA_API_KEY");
    config.weather_api_key = env_string("WEATHER_API_KEY");

    // Security
    config.cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = env_parse::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse::<u32>("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = env_parse::<usize>("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(per_ip) = env_parse::<u32>("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = per_ip;
    }

    Ok(config)
}
