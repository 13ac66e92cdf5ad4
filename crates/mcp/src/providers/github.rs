// GitHub issue and pull request search, optionally scoped to a repo list

use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::providers::{endpoint, http_client, present, ProviderHandle, MAX_RESULTS, NO_RESULTS};
use crate::tools::{
    json_schema_number, json_schema_object, json_schema_string, parse_arguments, ProviderAdapter,
    PulseSource, Tool, ToolContext,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const GITHUB_SEARCH_ISSUES: &str = "github_search_issues";

/// GitHub adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// `owner/repo` entries every search is limited to. Empty searches everything the token sees.
    #[serde(default)]
    pub repos: Vec<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repos: Vec::new(),
            api_url: default_api_url(),
        }
    }
}

struct GithubClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
}

impl GithubClient {
    fn from_config(config: &GithubConfig) -> Option<Self> {
        let token = present(&config.token)?;
        Some(Self {
            http: http_client(),
            token: token.to_string(),
            api_url: config.api_url.clone(),
        })
    }

    async fn search_issues(&self, q: &str) -> ToolResult<Vec<Issue>> {
        let per_page = MAX_RESULTS.to_string();
        let response = self
            .http
            .get(endpoint("GitHub", &self.api_url, "search/issues")?)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(&[
                ("q", q),
                ("sort", "updated"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ToolError::upstream("GitHub", message));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
struct Issue {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    #[serde(default)]
    repository_url: String,
}

impl Issue {
    /// `owner/repo`, taken from the API repository URL
    fn repo_name(&self) -> &str {
        self.repository_url
            .split_once("/repos/")
            .map(|(_, name)| name)
            .unwrap_or("")
    }
}

/// Build the search qualifier string for one call
fn build_query(query: &str, since: NaiveDate, state: &str, repos: &[String]) -> String {
    let mut q = format!("{} updated:>={}", query.trim(), since.format("%Y-%m-%d"));
    if state != "all" {
        q.push_str(&format!(" is:{}", state));
    }
    for repo in repos {
        q.push_str(&format!(" repo:{}", repo));
    }
    q
}

fn render(issues: &[Issue]) -> String {
    let lines: Vec<String> = issues
        .iter()
        .take(MAX_RESULTS)
        .map(|i| {
            format!(
                "• [{}#{}] {} ({}) {}",
                i.repo_name(),
                i.number,
                i.title,
                i.state,
                i.html_url
            )
        })
        .collect();

    if lines.is_empty() {
        NO_RESULTS.to_string()
    } else {
        lines.join("\n")
    }
}

struct GithubShared {
    config: GithubConfig,
    client: ProviderHandle<GithubClient>,
}

/// GitHub integration contributing `github_search_issues`
pub struct GithubAdapter {
    shared: Arc<GithubShared>,
}

impl GithubAdapter {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            shared: Arc::new(GithubShared {
                config,
                client: ProviderHandle::new("GitHub", "GITHUB_TOKEN"),
            }),
        }
    }

    fn search_tool(&self) -> Arc<dyn Tool> {
        Arc::new(GithubSearchTool {
            shared: self.shared.clone(),
        })
    }
}

impl ProviderAdapter for GithubAdapter {
    fn name(&self) -> &'static str {
        "github"
    }

    fn tools(&self, _ctx: &ToolContext) -> Vec<Arc<dyn Tool>> {
        vec![self.search_tool()]
    }

    fn pulse_source(&self, _ctx: &ToolContext) -> Option<PulseSource> {
        Some(PulseSource {
            label: "GitHub".to_string(),
            tool: self.search_tool(),
        })
    }
}

struct GithubSearchTool {
    shared: Arc<GithubShared>,
}

#[derive(Debug, Deserialize)]
struct GithubSearchArgs {
    query: String,
    #[serde(default)]
    days: Option<f64>,
    #[serde(default)]
    state: Option<String>,
}

#[async_trait::async_trait]
impl Tool for GithubSearchTool {
    fn schema(&self) -> ToolSchema {
        let scope = if self.shared.config.repos.is_empty() {
            String::new()
        } else {
            format!(" Limited to: {}.", self.shared.config.repos.join(", "))
        };

        ToolSchema {
            name: GITHUB_SEARCH_ISSUES.to_string(),
            description: format!("Search GitHub issues and pull requests updated recently (read-only).{}", scope),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("GitHub search text"),
                    "days": json_schema_number("How many days back to look", 14.0),
                    "state": {
                        "type": "string",
                        "description": "Filter by state (default: all)",
                        "enum": ["open", "closed", "all"]
                    }
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
        let args: GithubSearchArgs = parse_arguments(GITHUB_SEARCH_ISSUES, arguments)?;
        let days = args.days.unwrap_or(14.0);
        if days < 0.0 {
            return Err(ToolError::InvalidArguments("days must not be negative".to_string()));
        }
        let state = args.state.unwrap_or_else(|| "all".to_string());

        let client = self
            .shared
            .client
            .get_or_init(|| GithubClient::from_config(&self.shared.config))?;

        let since = chrono::TimeDelta::try_seconds((days * 86_400.0) as i64)
            .and_then(|window| chrono::Utc::now().checked_sub_signed(window))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .date_naive();
        let q = build_query(&args.query, since, &state, &self.shared.config.repos);

        tracing::debug!(identity = %ctx.identity, %q, "Searching GitHub");
        let issues = client.search_issues(&q).await?;

        Ok(CallToolResult::text(render(&issues)))
    }
}
