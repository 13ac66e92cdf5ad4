//! Routes a `tools/call` invocation to its executor.
//!
//! Every outcome, including unknown tools, malformed arguments and executor
//! failures, comes back as a [`CallToolResult`]. Nothing here is a transport
//! fault, so the session stays usable after any single bad call.

use crate::protocol::{CallToolParams, CallToolResult};
use crate::tools::{ToolCatalog, ToolContext};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Resolve and run one invocation against a session catalog.
pub async fn dispatch(
    catalog: &ToolCatalog,
    params: CallToolParams,
    ctx: &ToolContext,
) -> CallToolResult {
    let Some(tool) = catalog.get(&params.name) else {
        tracing::debug!(tool = %params.name, "Unknown tool requested");
        return CallToolResult::error(format!("Unknown tool: {}", params.name));
    };

    let arguments = match params.arguments {
        None => serde_json::Value::Object(Default::default()),
        Some(value @ serde_json::Value::Object(_)) => value,
        Some(_) => return CallToolResult::error("Invalid arguments provided"),
    };

    if let Err(e) = tool.validate(&arguments) {
        return CallToolResult::error(e.to_string());
    }

    match AssertUnwindSafe(tool.execute(arguments, ctx)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::warn!(tool = %params.name, identity = %ctx.identity, error = %e, "Tool execution failed");
            CallToolResult::error(e.to_string())
        }
        Err(_) => {
            tracing::error!(tool = %params.name, identity = %ctx.identity, "Tool executor panicked");
            CallToolResult::error(format!("Tool {} panicked", params.name))
        }
    }
}
