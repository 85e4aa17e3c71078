//! Current conditions via OpenWeather One Call 3.0

use super::http::{get_json, require_key};
use super::{f64_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "OpenWeather";

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "fetchWeather"
    }

    fn description(&self) -> String {
        "Fetch real-time weather for a latitude/longitude pair. Use getCoordinates first if you only have a place name. Returns: { temperature, feels_like, humidity, description } in metric units.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["lat", "lon"],
            "properties": {
                "lat": { "type": "number", "description": "Latitude in decimal degrees" },
                "lon": { "type": "number", "description": "Longitude in decimal degrees" }
            }
        })
    }

    fn status_line(&self, _args: &Map<String, Value>) -> Option<String> {
        Some("🌦️ Getting real-time weather data from OpenWeather API…".to_string())
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let (Some(lat), Some(lon)) = (f64_arg(args, "lat"), f64_arg(args, "lon")) else {
            return ToolResult::error(self.name(), "lat and lon must be numbers");
        };

        let key = match require_key(ctx.config.openweather_api_key.as_ref(), SERVICE) {
            Ok(key) => key,
            Err(e) => return ToolResult::error(self.name(), e.to_string()),
        };

        let url = format!("{}/data/3.0/onecall", ctx.config.openweather_base_url);
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("exclude", "minutely,hourly,alerts".to_string()),
            ("units", "metric".to_string()),
            ("appid", key.to_string()),
        ];
        match get_json(ctx, SERVICE, &url, &query).await {
            Ok(body) => match parse_current(&body) {
                Some(payload) => ToolResult::success(self.name(), payload),
                None => ToolResult::error(self.name(), "No current weather in response"),
            },
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

fn parse_current(body: &Value) -> Option<Value> {
    let current = body.get("current")?;
    let temperature = current.get("temp")?.clone();
    let description = current
        .get("weather")
        .and_then(Value::as_array)
        .and_then(|w| w.first())
        .and_then(|w| w.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    Some(json!({
        "temperature": temperature,
        "feels_like": current.get("feels_like").cloned().unwrap_or(Value::Null),
        "humidity": current.get("humidity").cloned().unwrap_or(Value::Null),
        "description": description,
    }))
}
