// Cross-provider project pulse: fans out to every pulse source and merges the results

use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::context::ToolContext;
use crate::tools::registry::{
    json_schema_number, json_schema_object, parse_arguments, PulseSource, Tool,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PULSE_TOOL_NAME: &str = "pulse_merge_clash";

/// Settings for the aggregation tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Upper bound on each source's execution
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    #[serde(default = "default_query")]
    pub default_query: String,

    #[serde(default = "default_window_days")]
    pub default_window_days: f64,
}

fn default_source_timeout_secs() -> u64 {
    20
}

fn default_query() -> String {
    "Merge Clash".to_string()
}

fn default_window_days() -> f64 {
    14.0
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout_secs(),
            default_query: default_query(),
            default_window_days: default_window_days(),
        }
    }
}

/// Meta-tool that queries every registered source concurrently.
///
/// A source that fails, reports an error result or times out is rendered as
/// a skipped marker; it never fails the whole pulse.
pub struct PulseTool {
    sources: Vec<PulseSource>,
    config: PulseConfig,
}

impl PulseTool {
    pub fn new(sources: Vec<PulseSource>, config: PulseConfig) -> Self {
        Self { sources, config }
    }

    pub fn source_labels(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.label.as_str()).collect()
    }

    async fn run_source(
        &self,
        source: &PulseSource,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> SourceOutcome {
        let outcome = match source.tool.validate(&arguments) {
            Err(e) => SourceOutcome::Skipped(e.to_string()),
            Ok(()) => {
                let limit = self.config.source_timeout_secs;
                match tokio::time::timeout(
                    Duration::from_secs(limit),
                    source.tool.execute(arguments, ctx),
                )
                .await
                {
                    Err(_) => SourceOutcome::Skipped(ToolError::Timeout(limit).to_string()),
                    Ok(Err(e)) => SourceOutcome::Skipped(e.to_string()),
                    Ok(Ok(result)) if result.is_error() => SourceOutcome::Skipped(result.joined_text()),
                    Ok(Ok(result)) => SourceOutcome::Included(result.joined_text()),
                }
            }
        };

        if let SourceOutcome::Skipped(reason) = &outcome {
            tracing::warn!(source = %source.label, %reason, "Pulse source skipped");
        }

        outcome
    }
}

enum SourceOutcome {
    Included(String),
    Skipped(String),
}

#[derive(Debug, Deserialize)]
struct PulseArgs {
    #[serde(rename = "windowDays", default)]
    window_days: Option<f64>,
    #[serde(default)]
    query: Option<String>,
}

#[async_trait::async_trait]
impl Tool for PulseTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: PULSE_TOOL_NAME.to_string(),
            description: "Cross-source project pulse for Merge Clash over a time window".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "windowDays": json_schema_number(
                        "How many days back to look",
                        self.config.default_window_days
                    ),
                    "query": {
                        "type": "string",
                        "description": "Search text passed to every source",
                        "default": self.config.default_query
                    }
                }),
                vec![],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolResult<CallToolResult> {
        let args: PulseArgs = parse_arguments(PULSE_TOOL_NAME, arguments)?;

        let window_days = args.window_days.unwrap_or(self.config.default_window_days);
        if window_days < 0.0 {
            return Err(ToolError::InvalidArguments(
                "windowDays must not be negative".to_string(),
            ));
        }
        let query = args
            .query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| self.config.default_query.clone());

        let mut parts = vec![format!("# {}: project pulse (last {} days)", query, window_days)];

        if self.sources.is_empty() {
            parts.push("_No sources configured._".to_string());
            return Ok(CallToolResult::text(parts.join("\n\n")));
        }

        let source_args = serde_json::json!({ "query": query, "days": window_days });
        let outcomes = join_all(
            self.sources
                .iter()
                .map(|source| self.run_source(source, source_args.clone(), ctx)),
        )
        .await;

        let mut skipped = 0;
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                SourceOutcome::Included(text) => {
                    parts.push(format!("## {}\n{}", source.label, text));
                }
                SourceOutcome::Skipped(reason) => {
                    skipped += 1;
                    parts.push(format!("## {}\n_Skipped: {}_", source.label, reason));
                }
            }
        }

        let text = parts.join("\n\n");
        if skipped == self.sources.len() {
            Ok(CallToolResult::error(text))
        } else {
            Ok(CallToolResult::text(text))
        }
    }
}
