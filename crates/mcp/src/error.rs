//! Error types raised by tools and provider adapters.
//!
//! Tools return these as values; the dispatcher turns them into an
//! `isError` [`CallToolResult`](crate::protocol::CallToolResult) exactly once.

/// Result type for tool execution.
pub type ToolResult<T> = Result<T, ToolError>;

/// Error types that can occur while validating or executing a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A provider's required credential is not configured.
    #[error("{provider} is not configured: set {variable}")]
    NotConfigured {
        provider: &'static str,
        variable: &'static str,
    },

    /// Arguments do not match the tool's input schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The vendor API rejected the call.
    #[error("{provider} API error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    /// HTTP request to the vendor failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The call did not complete in time.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}

impl ToolError {
    pub fn not_configured(provider: &'static str, variable: &'static str) -> Self {
        Self::NotConfigured { provider, variable }
    }

    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
        }
    }
}
