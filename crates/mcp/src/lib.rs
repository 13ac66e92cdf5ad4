// MCP (Model Context Protocol) gateway core
// Composes per-session tool catalogs from vendor adapters and dispatches tool calls

pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod providers;
pub mod server;
pub mod tools;

pub use dispatcher::dispatch;
pub use error::{ToolError, ToolResult};
pub use server::{McpServer, McpSession, Routed};
