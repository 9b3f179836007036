//! Built-in tools available to every session.

mod datetime;
mod mood;
mod order;
mod search;
mod speaker;
mod travel;
mod weather;

use std::sync::Arc;
use std::time::Duration;

use xxhash_rust::xxh3::xxh3_64_with_seed;

use super::registry::ToolRegistry;

pub use datetime::DateTimeTool;
pub use mood::MoodSuggestionTool;
pub use order::OrderTrackingTool;
pub use search::SearchTool;
pub use speaker::SpeakerControlTool;
pub use travel::{
    Attraction, DayForecast, Recommendations, SimulatedTravelData, TravelDataSource,
    TravelPlanningTool,
};
pub use weather::WeatherTool;

pub const WEATHER_API_BASE_URL: &str = "http://api.weatherapi.com";
pub const EXA_API_BASE_URL: &str = "https://api.exa.ai";

/// Settings shared by the built-in tools.
#[derive(Clone)]
pub struct BuiltinToolSettings {
    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
    pub exa_api_key: Option<String>,
    pub exa_base_url: String,
    /// Per sub-lookup deadline of the travel planner
    pub fan_out_timeout: Duration,
    pub http_timeout: Duration,
}

impl Default for BuiltinToolSettings {
    fn default() -> Self {
        Self {
            weather_api_key: None,
            weather_base_url: WEATHER_API_BASE_URL.to_string(),
            exa_api_key: None,
            exa_base_url: EXA_API_BASE_URL.to_string(),
            fan_out_timeout: Duration::from_secs(15),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for BuiltinToolSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinToolSettings")
            .field("weather_api_key", &self.weather_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("weather_base_url", &self.weather_base_url)
            .field("exa_api_key", &self.exa_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("exa_base_url", &self.exa_base_url)
            .field("fan_out_timeout", &self.fan_out_timeout)
            .finish()
    }
}

pub(crate) fn register_all(registry: &mut ToolRegistry, settings: BuiltinToolSettings) {
    let http = reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .unwrap_or_default();

    registry.register(Arc::new(DateTimeTool));
    registry.register(Arc::new(OrderTrackingTool));
    registry.register(Arc::new(WeatherTool::new(
        http.clone(),
        settings.weather_base_url.clone(),
        settings.weather_api_key.clone(),
    )));
    registry.register(Arc::new(MoodSuggestionTool));
    registry.register(Arc::new(SearchTool::new(
        http,
        settings.exa_base_url.clone(),
        settings.exa_api_key.clone(),
    )));
    registry.register(Arc::new(SpeakerControlTool::new()));
    registry.register(Arc::new(TravelPlanningTool::new(
        SimulatedTravelData::default(),
        settings.fan_out_timeout,
    )));
}

/// Deterministic value in `[low, high]` derived from `key`.
///
/// `salt` separates independent draws from the same key.
pub(crate) fn seeded_range(key: &str, salt: u64, low: i64, high: i64) -> i64 {
    debug_assert!(low <= high);
    let span = (high - low + 1) as u64;
    low + (xxh3_64_with_seed(key.as_bytes(), salt) % span) as i64
}

/// Deterministic index into a weight table derived from `key`.
pub(crate) fn seeded_weighted(key: &str, salt: u64, weights: &[u32]) -> usize {
    let total: u64 = weights.iter().map(|&w| w as u64).sum();
    if total == 0 {
        return 0;
    }
    let mut point = xxh3_64_with_seed(key.as_bytes(), salt) % total;
    for (i, &w) in weights.iter().enumerate() {
        if point < w as u64 {
            return i;
        }
        point -= w as u64;
    }
    weights.len() - 1
}
