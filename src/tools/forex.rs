//! Currency pair rates via the FMP short quote endpoint

use super::http::{get_json, require_key};
use super::{str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "FMP";
const DEFAULT_BASE: &str = "USD";
const DEFAULT_TARGET: &str = "INR";

pub struct ExchangeRateTool;

#[async_trait]
impl Tool for ExchangeRateTool {
    fn name(&self) -> &'static str {
        "fetchExchangeRate"
    }

    fn description(&self) -> String {
        "Fetch the live exchange rate between two currencies (ISO codes). Defaults to USD to INR. Returns: { symbol, rate, change, volume }".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "base": { "type": "string", "description": "Base currency code, e.g. USD" },
                "target": { "type": "string", "description": "Target currency code, e.g. INR" }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        let (base, target) = currencies(args);
        Some(format!("💱 Fetching live forex rate for {base} → {target} ..."))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let (base, target) = currencies(args);
        let pair = format!("{base}{target}");

        let key = match require_key(ctx.config.fmp_api_key.as_ref(), SERVICE) {
            Ok(key) => key,
            Err(e) => return ToolResult::error(self.name(), e.to_string()),
        };

        let url = format!("{}/quote-short", ctx.config.fmp_base_url);
        let params = [("symbol", pair.clone()), ("apikey", key.to_string())];
        match get_json(ctx, SERVICE, &url, &params).await {
            Ok(body) => match parse_rate(&pair, &body) {
                Ok(payload) => ToolResult::success(self.name(), payload),
                Err(message) => ToolResult::error(self.name(), message),
            },
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

fn currencies(args: &Map<String, Value>) -> (String, String) {
    let base = str_arg(args, "base").unwrap_or(DEFAULT_BASE).to_uppercase();
    let target = str_arg(args, "target").unwrap_or(DEFAULT_TARGET).to_uppercase();
    (base, target)
}

fn parse_rate(pair: &str, body: &Value) -> Result<Value, String> {
    let first = body
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| format!("No data found for {pair}"))?;
    let rate = first
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("No rate in response for {pair}"))?;

    Ok(json!({
        "symbol": pair,
        "rate": rate,
        "change": first.get("change").and_then(Value::as_f64).unwrap_or(0.0),
        "volume": first.get("volume").and_then(Value::as_i64).unwrap_or(0),
    }))
}
