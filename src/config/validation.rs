use super::{RemoteBackend, ServerConfig};

/// Validate a merged configuration
pub(crate) fn validate(config: &ServerConfig) -> Result<(), String> {
    validate_voices(config)?;
    validate_remote(config)?;
    validate_timings(config)?;
    validate_tls(config)?;
    Ok(())
}

/// The default voice must be one of the available voices
fn validate_voices(config: &ServerConfig) -> Result<(), String> {
    let session = &config.session;
    if session.available_voices.is_empty() {
        return Err("At least one voice must be available".to_string());
    }
    if !session.is_available_voice(&session.voice) {
        return Err(format!(
            "Default voice '{}' is not in available voices [{}]",
            session.voice,
            session.available_voices.join(", ")
        ));
    }
    Ok(())
}

fn validate_remote(config: &ServerConfig) -> Result<(), String> {
    if config.model_id.trim().is_empty() {
        return Err("MODEL_ID must not be empty".to_string());
    }
    if config.remote_backend != RemoteBackend::WebSocket {
        return Ok(());
    }
    match config.remote_ws_url.as_deref() {
        None => Err("REMOTE_WS_URL is required when REMOTE_BACKEND is websocket".to_string()),
        Some(url) => {
            let parsed = url::Url::parse(url).map_err(|e| format!("Invalid REMOTE_WS_URL '{url}': {e}"))?;
            match parsed.scheme() {
                "ws" | "wss" => Ok(()),
                scheme => Err(format!(
                    "REMOTE_WS_URL must use ws:// or wss://, got {scheme}://"
                )),
            }
        }
    }
}

fn validate_timings(config: &ServerConfig) -> Result<(), String> {
    let session = &config.session;
    let checks = [
        ("remote connect timeout", config.remote_connect_timeout.is_zero()),
        ("silence threshold", session.silence_threshold.is_zero()),
        ("dedup cooldown", session.dedup_cooldown.is_zero()),
        ("audio flush timeout", session.audio_flush_timeout.is_zero()),
        ("audio flush threshold", session.audio_flush_threshold == 0),
        ("session idle timeout", config.idle_timeout.is_zero()),
        ("tool timeout", config.tools.timeout.is_zero()),
        ("fan-out timeout", config.tools.fan_out_timeout.is_zero()),
        ("rate limit", config.rate_limit_requests_per_second == 0),
        ("rate limit burst size", config.rate_limit_burst_size == 0),
    ];
    if let Some((name, _)) = checks.iter().find(|(_, is_zero)| *is_zero) {
        return Err(format!("The {name} must be greater than zero"));
    }
    if !(0.0..=1.0).contains(&session.silence_rms_threshold) {
        return Err(format!(
            "SILENCE_RMS_THRESHOLD must be between 0.0 and 1.0, got {}",
            session.silence_rms_threshold
        ));
    }
    Ok(())
}

fn validate_tls(config: &ServerConfig) -> Result<(), String> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
        return Err("TLS requires both a certificate path and a key path".to_string());
    }
    Ok(())
}
