use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::core::tools::base::{Tool, ToolKind, input_str};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::ToolResult;

const DEFAULT_DEVICE: &str = "living_room_speaker";
const ACTIONS: [&str; 5] = ["on", "off", "volume_up", "volume_down", "status"];
const MAX_VOLUME: u8 = 10;

#[derive(Debug, Clone)]
struct SpeakerState {
    name: &'static str,
    power: bool,
    volume: u8,
    last_updated: String,
}

impl SpeakerState {
    fn new(name: &'static str, volume: u8) -> Self {
        Self {
            name,
            power: false,
            volume,
            last_updated: now(),
        }
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Simulated smart speaker control. State lives for the lifetime of the process.
pub struct SpeakerControlTool {
    devices: Mutex<BTreeMap<&'static str, SpeakerState>>,
}

impl Default for SpeakerControlTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeakerControlTool {
    pub fn new() -> Self {
        let devices = BTreeMap::from([
            ("living_room_speaker", SpeakerState::new("Living Room Speaker", 5)),
            ("bedroom_speaker", SpeakerState::new("Bedroom Speaker", 3)),
            ("kitchen_speaker", SpeakerState::new("Kitchen Speaker", 4)),
        ]);
        Self {
            devices: Mutex::new(devices),
        }
    }

    fn apply(&self, device_id: &str, action: &str) -> Value {
        let mut devices = self.devices.lock();
        let available: Vec<&str> = devices.keys().copied().collect();
        let Some(speaker) = devices.get_mut(device_id) else {
            return json!({
                "error": format!("Device not found: {device_id}"),
                "status": "failed",
                "available_devices": available,
            });
        };

        let message = match action {
            "on" => {
                speaker.power = true;
                format!("Turned on {}", speaker.name)
            }
            "off" => {
                speaker.power = false;
                format!("Turned off {}", speaker.name)
            }
            "volume_up" if speaker.volume < MAX_VOLUME => {
                speaker.volume += 1;
                format!("Increased volume of {} to {}", speaker.name, speaker.volume)
            }
            "volume_up" => format!("{} is already at maximum volume", speaker.name),
            "volume_down" if speaker.volume > 0 => {
                speaker.volume -= 1;
                format!("Decreased volume of {} to {}", speaker.name, speaker.volume)
            }
            "volume_down" => format!("{} is already at minimum volume", speaker.name),
            "status" => format!(
                "{} is currently {} with volume level {}",
                speaker.name,
                power_label(speaker.power),
                speaker.volume
            ),
            other => {
                return json!({
                    "error": format!("Unknown action: {other}"),
                    "status": "failed",
                    "available_actions": ACTIONS,
                });
            }
        };
        speaker.last_updated = now();

        json!({
            "device_id": device_id,
            "name": speaker.name,
            "power": speaker.power,
            "power_status": power_label(speaker.power),
            "volume": speaker.volume,
            "brand": "NovaSound",
            "type": "Smart Speaker",
            "message": message,
            "last_updated": speaker.last_updated,
            "status": "success",
        })
    }
}

fn power_label(power: bool) -> &'static str {
    if power { "on" } else { "off" }
}

#[async_trait]
impl Tool for SpeakerControlTool {
    fn name(&self) -> &str {
        "speakerControlTool"
    }

    fn description(&self) -> &str {
        "Control a smart speaker at home with functions like on, off, volume up, and volume down"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "The action to perform on the speaker",
                    "enum": ACTIONS,
                    "default": "status"
                },
                "deviceId": {
                    "type": "string",
                    "description": "The ID of the speaker device to control",
                    "default": DEFAULT_DEVICE
                }
            },
            "required": ["action"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fast
    }

    async fn execute(&self, input: Value, _progress: ProgressReporter) -> ToolResult<Value> {
        let action = input_str(&input, "action").unwrap_or("status");
        let device_id = input_str(&input, "deviceId").unwrap_or(DEFAULT_DEVICE);
        Ok(self.apply(device_id, action))
    }
}
