//! Nearby points of interest via Google Places

use super::http::{get_json, require_key};
use super::{display_arg, f64_arg, str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "Google Places";
const RADIUS_METERS: u32 = 2000;
const MAX_PLACES: usize = 3;

pub struct NearbyPlacesTool;

#[async_trait]
impl Tool for NearbyPlacesTool {
    fn name(&self) -> &'static str {
        "fetchNearbyPlaces"
    }

    fn description(&self) -> String {
        "Find places of a given type (restaurant, cafe, hospital, tourist_attraction, ...) within 2 km of a latitude/longitude. Returns: { places: [{ name, rating, address }] }, at most three.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["lat", "lon", "type"],
            "properties": {
                "lat": { "type": "number", "description": "Latitude in decimal degrees" },
                "lon": { "type": "number", "description": "Longitude in decimal degrees" },
                "type": { "type": "string", "description": "Google place type, e.g. restaurant" }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        Some(format!("🗺️ Looking for nearby {}…", display_arg(args, "type")))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let (Some(lat), Some(lon)) = (f64_arg(args, "lat"), f64_arg(args, "lon")) else {
            return ToolResult::error(self.name(), "lat and lon must be numbers");
        };
        let Some(kind) = str_arg(args, "type").map(str::to_lowercase) else {
            return ToolResult::error(self.name(), "Empty place type");
        };

        let key = match require_key(ctx.config.google_places_api_key.as_ref(), SERVICE) {
            Ok(key) => key,
            Err(e) => return ToolResult::error(self.name(), e.to_string()),
        };

        let url = format!("{}/nearbysearch/json", ctx.config.places_base_url);
        let query = [
            ("location", format!("{lat},{lon}")),
            ("type", kind.clone()),
            ("radius", RADIUS_METERS.to_string()),
            ("key", key.to_string()),
        ];
        match get_json(ctx, SERVICE, &url, &query).await {
            Ok(body) => match parse_places(&body) {
                Some(payload) => ToolResult::success(self.name(), payload),
                None => ToolResult::error(self.name(), format!("No nearby {kind} found")),
            },
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

fn parse_places(body: &Value) -> Option<Value> {
    let places: Vec<Value> = body
        .get("results")?
        .as_array()?
        .iter()
        .filter_map(|place| {
            let name = place.get("name")?.as_str()?;
            Some(json!({
                "name": name,
                "rating": place.get("rating").and_then(Value::as_f64),
                "address": place.get("vicinity").and_then(Value::as_str).unwrap_or_default(),
            }))
        })
        .take(MAX_PLACES)
        .collect();
    Some(json!({ "places": places }))
}
