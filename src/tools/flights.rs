//! Flight lookup, answered from web search snippets

use super::web_search::{organic_results, search};
use super::{display_arg, str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const MAX_FLIGHTS: usize = 5;

pub struct FlightsTool;

#[async_trait]
impl Tool for FlightsTool {
    fn name(&self) -> &'static str {
        "fetchFlights"
    }

    fn description(&self) -> String {
        "Look up flight options between two cities or airports, optionally on a date. Returns: { source, destination, date, flights: [{ title, snippet, link }] }".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["source", "destination"],
            "properties": {
                "source": { "type": "string", "description": "Departure city or IATA code" },
                "destination": { "type": "string", "description": "Arrival city or IATA code" },
                "date": { "type": "string", "description": "Travel date, e.g. 2025-12-24 (optional)" }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        Some(format!(
            "🛫 Searching flights from {} to {}...",
            display_arg(args, "source"),
            display_arg(args, "destination")
        ))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let (Some(source), Some(destination)) =
            (str_arg(args, "source"), str_arg(args, "destination"))
        else {
            return ToolResult::error(self.name(), "source and destination must be non-empty");
        };
        let date = str_arg(args, "date");

        match search(ctx, &flight_query(source, destination, date)).await {
            Ok(body) => ToolResult::success(
                self.name(),
                json!({
                    "source": source,
                    "destination": destination,
                    "date": date.unwrap_or("unspecified"),
                    "flights": organic_results(&body, MAX_FLIGHTS, false),
                }),
            ),
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

fn flight_query(source: &str, destination: &str, date: Option<&str>) -> String {
    match date {
        Some(date) => format!("Flights from {source} to {destination} on {date}"),
        None => format!("Flights from {source} to {destination}"),
    }
}
