use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use serde_json::{Map, Value, json};

use super::{seeded_range, seeded_weighted};
use crate::core::tools::base::{Tool, ToolKind};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::ToolResult;

const STATUSES: [&str; 8] = [
    "Order received",
    "Processing",
    "Preparing for shipment",
    "Shipped",
    "In transit",
    "Out for delivery",
    "Delivered",
    "Delayed",
];
const STATUS_WEIGHTS: [u32; 8] = [10, 15, 15, 20, 20, 10, 5, 3];

/// Simulated order tracking. The same order id always yields the same status.
pub struct OrderTrackingTool;

fn order_id(input: &Value) -> Option<String> {
    match input.get("orderId")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(super) fn track(order_id: &str, request_notifications: bool) -> Value {
    let status = STATUSES[seeded_weighted(order_id, 0, &STATUS_WEIGHTS)];
    let today = Local::now().date_naive();

    let mut info = Map::new();
    info.insert("orderStatus".into(), json!(status));
    info.insert("orderNumber".into(), json!(order_id));
    let notification = if request_notifications && status != "Delivered" {
        format!("You will receive notifications for order {order_id}")
    } else {
        String::new()
    };
    info.insert("notificationStatus".into(), json!(notification));

    match status {
        "Delivered" => {
            let days_ago = seeded_range(order_id, 1, 0, 3);
            let date = today - ChronoDuration::days(days_ago);
            info.insert("deliveredOn".into(), json!(date.format("%Y-%m-%d").to_string()));
            info.insert("deliveryLocation".into(), json!("Front Door"));
        }
        "Out for delivery" => {
            info.insert("expectedDelivery".into(), json!("Today"));
        }
        _ => {
            let days_ahead = seeded_range(order_id, 1, 1, 10);
            let date = today + ChronoDuration::days(days_ahead);
            info.insert(
                "estimatedDelivery".into(),
                json!(date.format("%Y-%m-%d").to_string()),
            );
        }
    }
    if status == "In transit" {
        info.insert("currentLocation".into(), json!("Distribution Center"));
    }
    if status == "Delayed" {
        info.insert("additionalInfo".into(), json!("Weather delays possible"));
    }
    Value::Object(info)
}

#[async_trait]
impl Tool for OrderTrackingTool {
    fn name(&self) -> &str {
        "trackOrderTool"
    }

    fn description(&self) -> &str {
        "Retrieves real-time order tracking information and detailed status updates for customer orders by order ID. Provides estimated delivery dates."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "orderId": {
                    "type": "string",
                    "description": "The order number or ID to track"
                },
                "requestNotifications": {
                    "type": "boolean",
                    "description": "Whether to set up notifications for this order",
                    "default": false
                }
            },
            "required": ["orderId"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fast
    }

    async fn execute(&self, input: Value, _progress: ProgressReporter) -> ToolResult<Value> {
        let Some(id) = order_id(&input) else {
            return Ok(json!({
                "error": "Invalid order ID format",
                "orderStatus": "",
                "estimatedDelivery": "",
                "lastUpdate": ""
            }));
        };
        let notify = input
            .get("requestNotifications")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(track(&id, notify))
    }
}
