//! Live equity quotes via Financial Modeling Prep

use super::http::{get_json, require_key};
use super::{display_arg, str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "FMP";

/// Company names the model tends to send instead of tickers
const ALIASES: &[(&str, &str)] = &[
    ("apple", "AAPL"),
    ("google", "GOOGL"),
    ("microsoft", "MSFT"),
    ("amazon", "AMZN"),
    ("netflix", "NFLX"),
    ("tesla", "TSLA"),
];

const QUOTE_FIELDS: &[&str] = &[
    "change",
    "changePercentage",
    "marketCap",
    "exchange",
    "volume",
    "open",
    "previousClose",
    "dayHigh",
    "dayLow",
    "yearHigh",
    "yearLow",
];

pub struct StockTool;

#[async_trait]
impl Tool for StockTool {
    fn name(&self) -> &'static str {
        "fetchStockData"
    }

    fn description(&self) -> String {
        "Fetch the live stock quote for a ticker symbol or well-known company name. Returns: { symbol, name, price, change, changePercentage, marketCap, exchange, volume, open, previousClose, dayHigh, dayLow, yearHigh, yearLow }".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Ticker symbol or company name (e.g. AAPL, TSLA, Netflix)"
                }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        Some(format!(
            "💰 Fetching live price for {} via Financial Modeling Prep API...",
            display_arg(args, "query")
        ))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let Some(query) = str_arg(args, "query") else {
            return ToolResult::error(self.name(), "Empty stock query");
        };
        let symbol = resolve_symbol(query);

        let key = match require_key(ctx.config.fmp_api_key.as_ref(), SERVICE) {
            Ok(key) => key,
            Err(e) => return ToolResult::error(self.name(), e.to_string()),
        };

        let url = format!("{}/quote", ctx.config.fmp_base_url);
        let params = [("symbol", symbol.clone()), ("apikey", key.to_string())];
        match get_json(ctx, SERVICE, &url, &params).await {
            Ok(body) => match parse_quote(&symbol, &body) {
                Ok(payload) => ToolResult::success(self.name(), payload),
                Err(message) => ToolResult::error(self.name(), message),
            },
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

/// Map a company name to its ticker; anything else is taken as a ticker
fn resolve_symbol(query: &str) -> String {
    ALIASES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(query))
        .map_or_else(|| query.to_uppercase(), |(_, ticker)| (*ticker).to_string())
}

fn parse_quote(symbol: &str, body: &Value) -> Result<Value, String> {
    let first = body
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| format!("No data found for symbol: {symbol}"))?;

    let price = first
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("Stock data unavailable or null price for {symbol}"))?;

    let mut quote = Map::new();
    quote.insert("symbol".into(), json!(symbol));
    quote.insert(
        "name".into(),
        json!(first.get("name").and_then(Value::as_str).unwrap_or(symbol)),
    );
    quote.insert("price".into(), json!(price));
    for field in QUOTE_FIELDS {
        let value = first.get(*field).cloned().unwrap_or(Value::Null);
        quote.insert((*field).to_string(), value);
    }
    Ok(Value::Object(quote))
}
