//! Network tools the model can call
//!
//! Every tool advertises a JSON schema and runs against live HTTP APIs.
//! Handlers never fail past this module: transport errors, bad statuses and
//! unusable payloads all come back as an error-shaped [`ToolResult`] that is
//! handed to the model like any other result.

mod flights;
mod forex;
mod geocode;
mod http;
mod places;
mod stock;
mod weather;
mod web_search;

pub use flights::FlightsTool;
pub use forex::ExchangeRateTool;
pub use geocode::GeocodeTool;
pub use places::NearbyPlacesTool;
pub use stock::StockTool;
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;

use crate::llm::ToolDefinition;
use crate::state_machine::ToolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Structured payload returned to the model for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that produced it
    pub name: String,
    pub payload: Value,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            is_error: false,
        }
    }

    /// Error-shaped result: `{"error": message}`
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: json!({ "error": message.into() }),
            is_error: true,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        if self.is_error {
            self.payload.get("error").and_then(Value::as_str)
        } else {
            None
        }
    }
}

/// What happened when a call was dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The handler ran (possibly producing an error-shaped result)
    Completed(ToolResult),
    /// No tool registered under that name; nothing ran
    UnknownTool,
    /// A required argument was absent; nothing ran
    MissingArgument { argument: String },
}

/// Endpoints, keys and limits for the network tools
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub openweather_api_key: Option<String>,
    pub fmp_api_key: Option<String>,
    pub google_places_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub openweather_base_url: String,
    pub fmp_base_url: String,
    pub places_base_url: String,
    pub serper_url: String,
    /// Upper bound for every tool HTTP call
    pub timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            fmp_api_key: None,
            google_places_api_key: None,
            serper_api_key: None,
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            fmp_base_url: "https://financialmodelingprep.com/stable".to_string(),
            places_base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            serper_url: "https://google.serper.dev/search".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ToolConfig {
    pub fn from_env() -> Self {
        let timeout = std::env::var("TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        Self {
            openweather_api_key: std::env::var("OPENWEATHER_API_KEY").ok(),
            fmp_api_key: std::env::var("FMP_API_KEY").ok(),
            google_places_api_key: std::env::var("GOOGLE_PLACES_API_KEY").ok(),
            serper_api_key: std::env::var("SERPER_API_KEY").ok(),
            timeout,
            ..Self::default()
        }
    }
}

/// Shared context handed to every handler
#[derive(Clone)]
pub struct ToolContext {
    pub client: Client,
    pub config: Arc<ToolConfig>,
}

impl ToolContext {
    pub fn new(config: ToolConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool
    fn name(&self) -> &'static str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for the arguments; `required` drives argument validation
    fn input_schema(&self) -> Value;

    /// Human-readable status shown just before the call runs
    fn status_line(&self, _args: &Map<String, Value>) -> Option<String> {
        None
    }

    /// Execute the tool. Must not panic; failures become `ToolResult::error`.
    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult;
}

/// Collection of tools advertised to the model
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistry {
    /// All network tools
    pub fn standard(config: ToolConfig) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(GeocodeTool),
            Arc::new(WeatherTool),
            Arc::new(StockTool),
            Arc::new(ExchangeRateTool),
            Arc::new(NearbyPlacesTool),
            Arc::new(FlightsTool),
            Arc::new(WebSearchTool),
        ];
        Self {
            tools,
            ctx: ToolContext::new(config),
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Status line for a call that will actually run.
    ///
    /// Calls that fail validation get no line; the missing-argument notice
    /// takes its place.
    pub fn status_line(&self, call: &ToolCall) -> Option<String> {
        let tool = self.find(&call.name)?;
        if missing_required(&tool.input_schema(), &call.args).is_some() {
            return None;
        }
        tool.status_line(&call.args)
    }

    /// Validate and run one call
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.find(&call.name) else {
            tracing::warn!(tool = %call.name, "Model called an unknown tool");
            return ToolOutcome::UnknownTool;
        };

        if let Some(argument) = missing_required(&tool.input_schema(), &call.args) {
            tracing::warn!(tool = %call.name, %argument, "Tool call missing required argument");
            return ToolOutcome::MissingArgument { argument };
        }

        let start = std::time::Instant::now();
        let result = tool.run(&call.args, &self.ctx).await;
        tracing::info!(
            tool = %call.name,
            duration_ms = %start.elapsed().as_millis(),
            is_error = result.is_error,
            "Tool call finished"
        );
        result_for(tool.name(), result)
    }
}

/// Make sure the result is keyed to the tool that ran
fn result_for(name: &str, mut result: ToolResult) -> ToolOutcome {
    if result.name != name {
        result.name = name.to_string();
    }
    ToolOutcome::Completed(result)
}

/// First name in the schema's `required` list that is absent or null in `args`
pub fn missing_required(schema: &Value, args: &Map<String, Value>) -> Option<String> {
    schema
        .get("required")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|name| args.get(*name).map_or(true, Value::is_null))
        .map(str::to_string)
}

/// String argument, trimmed; empty strings count as absent
pub(crate) fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numeric argument; models sometimes send numbers as strings
pub(crate) fn f64_arg(args: &Map<String, Value>, name: &str) -> Option<f64> {
    match args.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render an argument for a status line
pub(crate) fn display_arg(args: &Map<String, Value>, name: &str) -> String {
    match args.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::from_parts(name, args)
    }

    /// Registry pointed at a closed local port so every request fails fast
    fn offline_registry() -> ToolRegistry {
        let dead = "http://127.0.0.1:9".to_string();
        ToolRegistry::standard(ToolConfig {
            openweather_api_key: Some("k".to_string()),
            fmp_api_key: Some("k".to_string()),
            google_places_api_key: Some("k".to_string()),
            serper_api_key: Some("k".to_string()),
            openweather_base_url: dead.clone(),
            fmp_base_url: dead.clone(),
            places_base_url: dead.clone(),
            serper_url: dead,
            timeout: Duration::from_secs(2),
        })
    }

    #[test]
    fn test_all_tools_registered() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "getCoordinates",
                "fetchWeather",
                "fetchStockData",
                "fetchExchangeRate",
                "fetchNearbyPlaces",
                "fetchFlights",
                "fetchWebSearchResults",
            ]
        );
    }

    #[test]
    fn test_schemas_are_objects_with_properties() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        for def in registry.definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
            assert!(def.input_schema["properties"].is_object(), "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[test]
    fn test_missing_required() {
        let schema = json!({"type": "object", "required": ["lat", "lon"]});
        let args = call("x", json!({"lat": 1.0, "lon": null})).args;
        assert_eq!(missing_required(&schema, &args), Some("lon".to_string()));

        let args = call("x", json!({"lat": 1.0, "lon": 2.0})).args;
        assert_eq!(missing_required(&schema, &args), None);

        assert_eq!(missing_required(&json!({"type": "object"}), &Map::new()), None);
    }

    #[tokio::test]
    async fn test_unknown_tool_runs_nothing() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        let outcome = registry.dispatch(&call("launchRocket", json!({}))).await;
        assert_eq!(outcome, ToolOutcome::UnknownTool);
    }

    #[tokio::test]
    async fn test_missing_argument_is_reported() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        let outcome = registry.dispatch(&call("fetchStockData", json!({}))).await;
        assert_eq!(
            outcome,
            ToolOutcome::MissingArgument {
                argument: "query".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_network_failure_is_normalized() {
        let registry = offline_registry();
        for (name, args) in [
            ("getCoordinates", json!({"city": "Paris"})),
            ("fetchWeather", json!({"lat": 48.8, "lon": 2.3})),
            ("fetchStockData", json!({"query": "apple"})),
            ("fetchExchangeRate", json!({"base": "usd", "target": "eur"})),
            ("fetchNearbyPlaces", json!({"lat": 48.8, "lon": 2.3, "type": "cafe"})),
            ("fetchFlights", json!({"source": "DEL", "destination": "NRT"})),
            ("fetchWebSearchResults", json!({"query": "rust"})),
        ] {
            let ToolOutcome::Completed(result) = registry.dispatch(&call(name, args)).await else {
                panic!("{name} should have run");
            };
            assert!(result.is_error, "{name} should fail offline");
            assert_eq!(result.name, name);
            assert!(result.error_message().is_some());
        }
    }

    #[test]
    fn test_status_line_for_known_tool() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        let line = registry.status_line(&call("getCoordinates", json!({"city": "Kanpur"})));
        assert_eq!(line.as_deref(), Some("📍 Fetching coordinates for Kanpur…"));
        assert!(registry.status_line(&call("nope", json!({}))).is_none());
    }

    #[test]
    fn test_no_status_line_when_argument_missing() {
        let registry = ToolRegistry::standard(ToolConfig::default());
        assert!(registry.status_line(&call("fetchStockData", json!({}))).is_none());
        assert!(registry
            .status_line(&call("fetchStockData", json!({"query": null})))
            .is_none());
        assert!(registry
            .status_line(&call("fetchStockData", json!({"query": "apple"})))
            .is_some());
    }

    #[test]
    fn test_numeric_arguments_accept_strings() {
        let args = call("x", json!({"lat": "26.46", "lon": 80.32, "bad": true})).args;
        assert_eq!(f64_arg(&args, "lat"), Some(26.46));
        assert_eq!(f64_arg(&args, "lon"), Some(80.32));
        assert_eq!(f64_arg(&args, "bad"), None);
    }
}
