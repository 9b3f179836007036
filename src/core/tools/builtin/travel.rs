//! Travel planning over three independent lookups.
//!
//! Weather, attractions, and recommendations are fetched concurrently with a
//! per-lookup deadline. A failed lookup leaves its category empty and the
//! itinerary falls back to generic suggestions for it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::seeded_range;
use crate::core::tools::aggregator::FanOut;
use crate::core::tools::base::{Tool, input_str};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::{ToolError, ToolResult};

const DEFAULT_DAYS: i64 = 3;
const MAX_DAYS: i64 = 7;
const ATTRACTIONS_PER_DAY: usize = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayForecast {
    pub day: u32,
    pub condition: String,
    pub high_c: i64,
    pub low_c: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attraction {
    pub name: String,
    pub category: String,
    pub duration_hours: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Recommendations {
    pub restaurants: Vec<String>,
    pub tips: Vec<String>,
}

/// Where the planner gets its data from.
#[async_trait]
pub trait TravelDataSource: Send + Sync {
    async fn weather(&self, destination: &str, days: u32) -> ToolResult<Vec<DayForecast>>;

    async fn attractions(&self, destination: &str, interests: &[String])
    -> ToolResult<Vec<Attraction>>;

    async fn recommendations(&self, destination: &str) -> ToolResult<Recommendations>;
}

// =============================================================================
// Simulated Data
// =============================================================================

/// Deterministic simulated data with realistic lookup latencies.
#[derive(Debug, Clone)]
pub struct SimulatedTravelData {
    pub weather_latency: Duration,
    pub attractions_latency: Duration,
    pub recommendations_latency: Duration,
}

impl Default for SimulatedTravelData {
    fn default() -> Self {
        Self {
            weather_latency: Duration::from_millis(800),
            attractions_latency: Duration::from_millis(1500),
            recommendations_latency: Duration::from_millis(1200),
        }
    }
}

const FORECASTS: [&str; 5] = ["Sunny", "Partly Cloudy", "Cloudy", "Light Rain", "Windy"];
const ATTRACTION_KINDS: [(&str, &str); 8] = [
    ("Old Town", "history"),
    ("National Museum", "culture"),
    ("Botanical Garden", "nature"),
    ("Central Market", "food"),
    ("Riverside Promenade", "nature"),
    ("Art Gallery", "culture"),
    ("Cathedral", "history"),
    ("Food Street", "food"),
];

#[async_trait]
impl TravelDataSource for SimulatedTravelData {
    async fn weather(&self, destination: &str, days: u32) -> ToolResult<Vec<DayForecast>> {
        tokio::time::sleep(self.weather_latency).await;
        Ok((1..=days)
            .map(|day| {
                let key = format!("{destination}:{day}");
                let condition = FORECASTS[seeded_range(&key, 0, 0, FORECASTS.len() as i64 - 1) as usize];
                let high_c = seeded_range(&key, 1, 15, 32);
                DayForecast {
                    day,
                    condition: condition.to_string(),
                    high_c,
                    low_c: high_c - seeded_range(&key, 2, 5, 10),
                }
            })
            .collect())
    }

    async fn attractions(
        &self,
        destination: &str,
        interests: &[String],
    ) -> ToolResult<Vec<Attraction>> {
        tokio::time::sleep(self.attractions_latency).await;
        let mut attractions: Vec<Attraction> = ATTRACTION_KINDS
            .iter()
            .map(|(name, category)| Attraction {
                name: format!("{destination} {name}"),
                category: category.to_string(),
                duration_hours: seeded_range(&format!("{destination}:{name}"), 0, 1, 4) as u32,
            })
            .collect();
        if !interests.is_empty() {
            // Matching interests first, the rest keep their order
            attractions.sort_by_key(|a| !interests.iter().any(|i| i.eq_ignore_ascii_case(&a.category)));
        }
        Ok(attractions)
    }

    async fn recommendations(&self, destination: &str) -> ToolResult<Recommendations> {
        tokio::time::sleep(self.recommendations_latency).await;
        Ok(Recommendations {
            restaurants: vec![
                format!("{destination} Bistro"),
                format!("The {destination} Kitchen"),
                "Harbor Seafood House".to_string(),
            ],
            tips: vec![
                "Buy a day pass for public transport".to_string(),
                "Book popular attractions in advance".to_string(),
            ],
        })
    }
}

// =============================================================================
// Planner
// =============================================================================

enum TravelData {
    Weather(Vec<DayForecast>),
    Attractions(Vec<Attraction>),
    Recommendations(Recommendations),
}

pub struct TravelPlanningTool<S> {
    source: S,
    lookup_deadline: Duration,
}

impl<S: TravelDataSource> TravelPlanningTool<S> {
    pub fn new(source: S, lookup_deadline: Duration) -> Self {
        Self {
            source,
            lookup_deadline,
        }
    }
}

/// Day-by-day itinerary. Empty categories degrade to generic entries.
fn build_itinerary(
    days: u32,
    weather: &[DayForecast],
    attractions: &[Attraction],
    recommendations: &Recommendations,
) -> Vec<Value> {
    (1..=days)
        .map(|day| {
            let index = (day - 1) as usize;
            let forecast = weather
                .iter()
                .find(|f| f.day == day)
                .map(|f| format!("{}, {}°C / {}°C", f.condition, f.high_c, f.low_c))
                .unwrap_or_else(|| "Weather data unavailable".to_string());

            let activities: Vec<String> = if attractions.is_empty() {
                vec![
                    "Explore the city center on foot".to_string(),
                    "Visit a local market".to_string(),
                ]
            } else {
                (0..ATTRACTIONS_PER_DAY)
                    .map(|slot| {
                        let a = &attractions[(index * ATTRACTIONS_PER_DAY + slot) % attractions.len()];
                        a.name.clone()
                    })
                    .collect()
            };

            let dinner = if recommendations.restaurants.is_empty() {
                "Try a well-reviewed local restaurant".to_string()
            } else {
                recommendations.restaurants[index % recommendations.restaurants.len()].clone()
            };

            json!({
                "day": day,
                "weather": forecast,
                "morning": activities[0],
                "afternoon": activities[1 % activities.len()],
                "dinner": dinner,
            })
        })
        .collect()
}

#[async_trait]
impl<S: TravelDataSource + 'static> Tool for TravelPlanningTool<S> {
    fn name(&self) -> &str {
        "travelPlanningTool"
    }

    fn description(&self) -> &str {
        "Plan a multi-day trip: weather outlook, attractions, and local recommendations combined into a day-by-day itinerary"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "destination": {
                    "type": "string",
                    "description": "City or region to travel to"
                },
                "days": {
                    "type": "integer",
                    "description": "Length of the trip in days (1-7)",
                    "default": DEFAULT_DAYS
                },
                "interests": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Interests such as history, culture, nature, food"
                }
            },
            "required": ["destination"]
        })
    }

    async fn execute(&self, input: Value, progress: ProgressReporter) -> ToolResult<Value> {
        let destination = input_str(&input, "destination").unwrap_or_default().trim().to_string();
        if destination.is_empty() {
            return Ok(json!({ "error": "Destination is required", "status": "failed" }));
        }
        let days = input
            .get("days")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_DAYS)
            .clamp(1, MAX_DAYS) as u32;
        let interests: Vec<String> = input
            .get("interests")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        progress
            .report("planning_start", &format!("Planning {days} days in {destination}"), 5)
            .await;

        let mut results = FanOut::new(self.lookup_deadline)
            .lookup("weather", async {
                let forecast = self.source.weather(&destination, days).await?;
                progress.report("weather_complete", "Weather outlook ready", 35).await;
                Ok::<_, ToolError>(TravelData::Weather(forecast))
            })
            .lookup("attractions", async {
                let found = self.source.attractions(&destination, &interests).await?;
                progress.report("attractions_complete", "Attractions found", 60).await;
                Ok::<_, ToolError>(TravelData::Attractions(found))
            })
            .lookup("recommendations", async {
                let recs = self.source.recommendations(&destination).await?;
                progress
                    .report("recommendations_complete", "Local recommendations ready", 80)
                    .await;
                Ok::<_, ToolError>(TravelData::Recommendations(recs))
            })
            .join()
            .await;

        let weather = match results.take("weather") {
            Some(TravelData::Weather(w)) => w,
            _ => Vec::new(),
        };
        let attractions = match results.take("attractions") {
            Some(TravelData::Attractions(a)) => a,
            _ => Vec::new(),
        };
        let recommendations = match results.take("recommendations") {
            Some(TravelData::Recommendations(r)) => r,
            _ => Recommendations::default(),
        };
        let unavailable: Vec<&str> = results.failures().iter().map(|(name, _)| name.as_str()).collect();

        progress.report("assembling", "Building itinerary", 90).await;
        let itinerary = build_itinerary(days, &weather, &attractions, &recommendations);

        Ok(json!({
            "status": "success",
            "destination": destination,
            "days": days,
            "weather": weather,
            "attractions": attractions,
            "recommendations": recommendations,
            "itinerary": itinerary,
            "unavailable": unavailable,
        }))
    }
}
