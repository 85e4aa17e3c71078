//! Web search via Serper, shared by the flight lookup

use super::http::{post_json, require_key, FetchError};
use super::{display_arg, str_arg, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const SERVICE: &str = "Serper";
const MAX_RESULTS: usize = 3;

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "fetchWebSearchResults"
    }

    fn description(&self) -> String {
        "Search the web for recent or factual information the model may not know. Returns: { results: [{ title, snippet, link }] }, the top three organic results.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            }
        })
    }

    fn status_line(&self, args: &Map<String, Value>) -> Option<String> {
        Some(format!("🌐 Searching web for: {} …", display_arg(args, "query")))
    }

    async fn run(&self, args: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let Some(query) = str_arg(args, "query") else {
            return ToolResult::error(self.name(), "Empty search query");
        };
        match search(ctx, query).await {
            Ok(body) => ToolResult::success(
                self.name(),
                json!({ "results": organic_results(&body, MAX_RESULTS, true) }),
            ),
            Err(e) => ToolResult::error(self.name(), e.to_string()),
        }
    }
}

/// Raw Serper search response for `query`
pub(crate) async fn search(ctx: &ToolContext, query: &str) -> Result<Value, FetchError> {
    let key = require_key(ctx.config.serper_api_key.as_ref(), SERVICE)?;
    post_json(
        ctx,
        SERVICE,
        &ctx.config.serper_url,
        &[("X-API-KEY", key)],
        &json!({ "q": query }),
    )
    .await
}

/// Up to `limit` organic hits as `{title, snippet, link}`.
///
/// With `require_link` a hit without a link is dropped; otherwise its link is
/// reported as an empty string.
pub(crate) fn organic_results(body: &Value, limit: usize, require_link: bool) -> Vec<Value> {
    let Some(items) = body.get("organic").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .take(limit)
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?;
            let snippet = item.get("snippet")?.as_str()?;
            let link = match item.get("link").and_then(Value::as_str) {
                Some(link) => link,
                None if require_link => return None,
                None => "",
            };
            Some(json!({ "title": title, "snippet": snippet, "link": link }))
        })
        .collect()
}
