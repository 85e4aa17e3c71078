//! City name to coordinates via OpenWeather geocoding

use super::http::{get_json, require_key};
use super::{display_arg, str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "OpenWeather";

pub struct GeocodeTool;

#[async_trait]
impl Tool for GeocodeTool {
    fn name(&self) -> &'static str {
        "getCoordinates"
    }

    fn description(&self) -> String {
        "Get geographic coordinates (latitude and longitude) for a city name. Call this before fetchWeather or fetchNearbyPlaces when the user names a place. Returns: { lat, lon, name }".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["city"],
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, optionally with country (e.g. Kanpur, Paris, Austin,US)"
                }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        Some(format!("📍 Fetching coordinates for {}…", display_arg(args, "city")))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let Some(city) = str_arg(args, "city") else {
            return ToolResult::error(self.name(), "Empty city name");
        };

        let key = match require_key(ctx.config.openweather_api_key.as_ref(), SERVICE) {
            Ok(key) => key,
            Err(e) => return ToolResult::error(self.name(), e.to_string()),
        };

        let url = format!("{}/geo/1.0/direct", ctx.config.openweather_base_url);
        let query = [
            ("q", city.to_string()),
            ("limit", "1".to_string()),
            ("appid", key.to_string()),
        ];
        match get_json(ctx, SERVICE, &url, &query).await {
            Ok(body) => match parse_coordinates(&body) {
                Some(payload) => ToolResult::success(self.name(), payload),
                None => ToolResult::error(self.name(), format!("No location found for {city}")),
            },
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

/// First geocoding match as `{lat, lon, name}`
fn parse_coordinates(body: &Value) -> Option<Value> {
    let first = body.as_array()?.first()?;
    let lat = first.get("lat")?.as_f64()?;
    let lon = first.get("lon")?.as_f64()?;
    let name = first.get("name").and_then(Value::as_str).unwrap_or_default();
    Some(json!({ "lat": lat, "lon": lon, "name": name }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolConfig;

    #[test]
    fn test_parse_first_match() {
        let body = json!([
            {"name": "Kanpur", "lat": 26.46, "lon": 80.32, "country": "IN"},
            {"name": "Kanpur Dehat", "lat": 26.4, "lon": 79.9}
        ]);
        assert_eq!(
            parse_coordinates(&body),
            Some(json!({"lat": 26.46, "lon": 80.32, "name": "Kanpur"}))
        );
    }

    #[test]
    fn test_parse_no_match() {
        assert_eq!(parse_coordinates(&json!([])), None);
        assert_eq!(parse_coordinates(&json!({"cod": 401})), None);
    }

    #[tokio::test]
    async fn test_missing_key_is_error_result() {
        let ctx = ToolContext::new(ToolConfig::default());
        let args = json!({"city": "Paris"}).as_object().cloned().unwrap();
        let result = GeocodeTool.run(&args, &ctx).await;
        assert!(result.is_error);
        assert_eq!(
            result.error_message(),
            Some("OpenWeather API key is not configured")
        );
    }
}
