use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::time::Instant;

/// Tracks end of user speech and the first assistant audio after it.
///
/// The turn-taking latency is the gap between the moment silence began
/// (once it persisted past the threshold) and the first assistant audio chunk.
#[derive(Debug, Default, Clone)]
pub struct SpeechTimer {
    silence_start: Option<Instant>,
    speech_end: Option<Instant>,
    first_response: Option<Instant>,
}

impl SpeechTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one user audio chunk through silence detection.
    pub fn observe(&mut self, silent: bool, threshold: Duration, now: Instant) {
        if !silent {
            self.silence_start = None;
            if self.speech_end.is_some() || self.first_response.is_some() {
                self.speech_end = None;
                self.first_response = None;
            }
            return;
        }

        match self.silence_start {
            None => self.silence_start = Some(now),
            Some(started) => {
                if self.speech_end.is_none() && now.saturating_duration_since(started) >= threshold {
                    self.speech_end = Some(started);
                }
            }
        }
    }

    /// Latency from end of speech to `now`, reported once per turn.
    pub fn mark_first_response(&mut self, now: Instant) -> Option<Duration> {
        let speech_end = self.speech_end?;
        if self.first_response.is_some() {
            return None;
        }
        self.first_response = Some(now);
        Some(now.saturating_duration_since(speech_end))
    }

    pub fn speech_end(&self) -> Option<Instant> {
        self.speech_end
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether a base64 PCM16 chunk counts as silence.
///
/// Empty chunks are always silent. With a positive `rms_threshold` (0.0-1.0 of
/// full scale) a decoded chunk below it is silent too. Undecodable chunks are
/// treated as speech.
pub fn is_silent_chunk(audio_base64: &str, rms_threshold: f64) -> bool {
    if audio_base64.trim().is_empty() {
        return true;
    }
    if rms_threshold <= 0.0 {
        return false;
    }

    let Ok(bytes) = BASE64.decode(audio_base64.trim()) else {
        return false;
    };
    match pcm16_rms(&bytes) {
        Some(rms) => rms < rms_threshold,
        None => true,
    }
}

/// Normalized RMS of little-endian 16-bit samples, `None` when there are no samples.
fn pcm16_rms(bytes: &[u8]) -> Option<f64> {
    let samples = bytes.len() / 2;
    if samples == 0 {
        return None;
    }
    let sum: f64 = bytes
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / i16::MAX as f64;
            sample * sample
        })
        .sum();
    Some((sum / samples as f64).sqrt())
}
