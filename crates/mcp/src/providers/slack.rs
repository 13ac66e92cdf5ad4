// Slack message search (read-only), filtered to an optional channel allowlist

use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::providers::{endpoint, http_client, present, ProviderHandle, MAX_RESULTS, NO_RESULTS};
use crate::tools::{
    json_schema_number, json_schema_object, json_schema_string, parse_arguments, ProviderAdapter,
    PulseSource, Tool, ToolContext,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SLACK_SEARCH: &str = "slack_search";

/// Slack adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// User token (`xoxp-...`); search.messages does not accept bot tokens
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Channels results may come from, as `#name`. Empty allows all.
    #[serde(default)]
    pub channel_allowlist: Vec<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_allowlist: Vec::new(),
            api_url: default_api_url(),
        }
    }
}

struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
}

impl SlackClient {
    fn from_config(config: &SlackConfig) -> Option<Self> {
        let token = present(&config.token)?;
        Some(Self {
            http: http_client(),
            token: token.to_string(),
            api_url: config.api_url.clone(),
        })
    }

    async fn search_messages(&self, query: &str) -> ToolResult<Vec<SlackMatch>> {
        let response = self
            .http
            .get(endpoint("Slack", &self.api_url, "search.messages")?)
            .bearer_auth(&self.token)
            .query(&[
                ("query", query),
                ("sort", "timestamp"),
                ("sort_dir", "desc"),
                ("count", "100"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::upstream("Slack", format!("HTTP {}", status)));
        }

        let body: SearchResponse = response.json().await?;
        if !body.ok {
            return Err(ToolError::upstream(
                "Slack",
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(body.messages.map(|m| m.matches).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Option<SearchMessages>,
}

#[derive(Debug, Deserialize)]
struct SearchMessages {
    #[serde(default)]
    matches: Vec<SlackMatch>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackMatch {
    ts: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    channel: Option<SlackChannel>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChannel {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

struct SlackShared {
    allowlist: Vec<String>,
    config: SlackConfig,
    client: ProviderHandle<SlackClient>,
}

impl SlackShared {
    fn is_channel_allowed(&self, m: &SlackMatch) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }
        m.channel
            .as_ref()
            .map(|c| self.allowlist.contains(&format!("#{}", c.name)))
            .unwrap_or(false)
    }

    /// Keep matches inside `[now - days, now]` that pass the allowlist, newest first as returned
    fn render(&self, matches: &[SlackMatch], now: i64, days: f64) -> String {
        let latest = now as f64;
        let oldest = latest - days * 86_400.0;

        let lines: Vec<String> = matches
            .iter()
            .filter(|m| {
                m.ts.parse::<f64>()
                    .map(|ts| ts >= oldest && ts <= latest)
                    .unwrap_or(false)
            })
            .filter(|m| self.is_channel_allowed(m))
            .take(MAX_RESULTS)
            .map(|m| {
                let (id, name) = m
                    .channel
                    .as_ref()
                    .map(|c| (c.id.as_str(), c.name.as_str()))
                    .unwrap_or(("", ""));
                format!(
                    "• [#{}] {}: {} (https://slack.com/app_redirect?channel={}&message={})",
                    name,
                    m.username.as_deref().unwrap_or("unknown"),
                    m.text,
                    id,
                    m.ts
                )
            })
            .collect();

        if lines.is_empty() {
            NO_RESULTS.to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Slack integration contributing `slack_search`
pub struct SlackAdapter {
    shared: Arc<SlackShared>,
}

impl SlackAdapter {
    pub fn new(config: SlackConfig) -> Self {
        let allowlist = config
            .channel_allowlist
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| if c.starts_with('#') { c.to_string() } else { format!("#{}", c) })
            .collect();

        Self {
            shared: Arc::new(SlackShared {
                allowlist,
                config,
                client: ProviderHandle::new("Slack", "SLACK_XOXP_TOKEN"),
            }),
        }
    }

    fn search_tool(&self) -> Arc<dyn Tool> {
        Arc::new(SlackSearchTool {
            shared: self.shared.clone(),
        })
    }
}

impl ProviderAdapter for SlackAdapter {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn tools(&self, _ctx: &ToolContext) -> Vec<Arc<dyn Tool>> {
        vec![self.search_tool()]
    }

    fn pulse_source(&self, _ctx: &ToolContext) -> Option<PulseSource> {
        Some(PulseSource {
            label: "Slack".to_string(),
            tool: self.search_tool(),
        })
    }
}

struct SlackSearchTool {
    shared: Arc<SlackShared>,
}

#[derive(Debug, Deserialize)]
struct SlackSearchArgs {
    query: String,
    #[serde(default)]
    days: Option<f64>,
}

#[async_trait::async_trait]
impl Tool for SlackSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SLACK_SEARCH.to_string(),
            description: "Search Slack messages (read-only). Filters to an optional channel allowlist."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("Slack search query"),
                    "days": json_schema_number("How many days back to look", 14.0)
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolResult<CallToolResult> {
        let args: SlackSearchArgs = parse_arguments(SLACK_SEARCH, arguments)?;
        let days = args.days.unwrap_or(14.0);
        if days < 0.0 {
            return Err(ToolError::InvalidArguments("days must not be negative".to_string()));
        }

        let client = self
            .shared
            .client
            .get_or_init(|| SlackClient::from_config(&self.shared.config))?;

        tracing::debug!(identity = %ctx.identity, query = %args.query, days, "Searching Slack");
        let matches = client.search_messages(&args.query).await?;

        let now = chrono::Utc::now().timestamp();
        Ok(CallToolResult::text(self.shared.render(&matches, now, days)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn slack_match(ts: i64, channel: &str, text: &str) -> SlackMatch {
        SlackMatch {
            ts: format!("{}.000100", ts),
            text: text.to_string(),
            username: Some("ada".to_string()),
            channel: Some(SlackChannel {
                id: format!("C-{}", channel),
                name: channel.to_string(),
            }),
        }
    }

    fn shared(allowlist: Vec<&str>) -> Arc<SlackShared> {
        let config = SlackConfig {
            channel_allowlist: allowlist.into_iter().map(String::from).collect(),
            ..SlackConfig::default()
        };
        SlackAdapter::new(config).shared
    }

    #[test]
    fn test_channel_allowlist() {
        let filtered = shared(vec!["#launch", "general"]);
        assert!(filtered.is_channel_allowed(&slack_match(0, "launch", "")));
        assert!(filtered.is_channel_allowed(&slack_match(0, "general", "")));
        assert!(!filtered.is_channel_allowed(&slack_match(0, "random", "")));

        let open = shared(vec![]);
        assert!(open.is_channel_allowed(&slack_match(0, "random", "")));
    }

    #[test]
    fn test_render_filters_window_and_formats_lines() {
        let shared = shared(vec![]);
        let now = 1_700_000_000;
        let matches = vec![
            slack_match(now - 3_600, "launch", "ship it"),
            slack_match(now - 30 * 86_400, "launch", "too old"),
            slack_match(now + 60, "launch", "from the future"),
        ];

        let text = shared.render(&matches, now, 7.0);
        assert_eq!(
            text,
            format!(
                "• [#launch] ada: ship it (https://slack.com/app_redirect?channel=C-launch&message={}.000100)",
                now - 3_600
            )
        );
    }

    #[test]
    fn test_render_caps_results_and_reports_empty() {
        let shared = shared(vec![]);
        let now = 1_700_000_000;
        let matches: Vec<_> = (0..15).map(|i| slack_match(now - i, "launch", "hit")).collect();

        assert_eq!(shared.render(&matches, now, 1.0).lines().count(), MAX_RESULTS);
        assert_eq!(shared.render(&[], now, 1.0), NO_RESULTS);
    }

    #[tokio::test]
    async fn test_unconfigured_token_fails_fast() {
        let adapter = SlackAdapter::new(SlackConfig::default());
        let tool = adapter.search_tool();

        let err = tool
            .execute(json!({"query": "launch"}), &ToolContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Slack is not configured: set SLACK_XOXP_TOKEN");
    }

    #[tokio::test]
    async fn test_search_against_api() {
        let server = MockServer::start().await;
        let now = chrono::Utc::now().timestamp();

        Mock::given(method("GET"))
            .and(path("/search.messages"))
            .and(query_param("query", "launch"))
            .and(query_param("sort", "timestamp"))
            .and(header("authorization", "Bearer xoxp-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": {"matches": [
                    {"ts": format!("{}.000200", now - 600), "text": "launch is go", "username": "ada",
                     "channel": {"id": "C1", "name": "launch"}},
                    {"ts": format!("{}.000300", now - 700), "text": "off-topic", "username": "bo",
                     "channel": {"id": "C2", "name": "random"}},
                    {"ts": format!("{}.000400", now - 20 * 86_400), "text": "old news", "username": "cy",
                     "channel": {"id": "C1", "name": "launch"}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = SlackAdapter::new(SlackConfig {
            token: Some("xoxp-test".to_string()),
            channel_allowlist: vec!["#launch".to_string()],
            api_url: server.uri(),
        });

        let result = adapter
            .search_tool()
            .execute(json!({"query": "launch", "days": 7}), &ToolContext::new("a@b.com"))
            .await
            .unwrap();

        assert!(!result.is_error());
        let text = result.joined_text();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("• [#launch] ada: launch is go"));
    }

    #[tokio::test]
    async fn test_slack_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "ratelimited"})))
            .mount(&server)
            .await;

        let adapter = SlackAdapter::new(SlackConfig {
            token: Some("xoxp-test".to_string()),
            channel_allowlist: vec![],
            api_url: server.uri(),
        });

        let err = adapter
            .search_tool()
            .execute(json!({"query": "launch"}), &ToolContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Slack API error: ratelimited");
    }

    #[test]
    fn test_adapter_contributes_pulse_source() {
        let adapter = SlackAdapter::new(SlackConfig::default());
        let ctx = ToolContext::anonymous();

        let names: Vec<_> = adapter.tools(&ctx).iter().map(|t| t.schema().name).collect();
        assert_eq!(names, vec![SLACK_SEARCH]);
        assert_eq!(adapter.pulse_source(&ctx).unwrap().label, "Slack");
    }
}
