// Tool trait, provider adapters and per-session catalog composition

use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::context::ToolContext;
use crate::tools::pulse::{PulseConfig, PulseTool, PULSE_TOOL_NAME};
use crate::tools::schema::validate_arguments;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Check arguments before execution
    fn validate(&self, arguments: &serde_json::Value) -> ToolResult<()> {
        validate_arguments(&self.schema().input_schema, arguments)
    }

    /// Execute the tool with given arguments
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolResult<CallToolResult>;
}

/// A tool the aggregation meta-tool can fan out to.
///
/// The tool must accept `{"query": string, "days": number}`.
#[derive(Clone)]
pub struct PulseSource {
    pub label: String,
    pub tool: Arc<dyn Tool>,
}

/// One vendor integration contributing tools to every session catalog
pub trait ProviderAdapter: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Tools this adapter exposes to the given caller. Must not block on I/O.
    fn tools(&self, ctx: &ToolContext) -> Vec<Arc<dyn Tool>>;

    /// Source for the cross-provider pulse, if this adapter has one
    fn pulse_source(&self, _ctx: &ToolContext) -> Option<PulseSource> {
        None
    }
}

struct CatalogEntry {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Ordered, name-unique set of tools visible to one session
#[derive(Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool. A tool with the same name is replaced in place and returned.
    pub fn insert(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let schema = tool.schema();
        match self.index.get(&schema.name) {
            Some(&position) => {
                let previous = std::mem::replace(&mut self.entries[position], CatalogEntry { schema, tool });
                Some(previous.tool)
            }
            None => {
                self.index.insert(schema.name.clone(), self.entries.len());
                self.entries.push(CatalogEntry { schema, tool });
                None
            }
        }
    }

    /// Remove a tool by name, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let position = self.index.remove(name)?;
        let entry = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(entry.tool)
    }

    /// Get a tool by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.entries[i].tool.clone())
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tool schemas in catalog order
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.entries.iter().map(|e| e.schema.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.schema.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide set of provider adapters
///
/// Adapters are registered once at startup and shared by every session; each
/// session gets its own catalog from [`ToolRegistry::compose`].
pub struct ToolRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    pulse: PulseConfig,
}

impl ToolRegistry {
    pub fn new(pulse: PulseConfig) -> Self {
        Self {
            adapters: Vec::new(),
            pulse,
        }
    }

    /// Register an adapter. Later adapters win tool-name collisions.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Build the catalog for one session: adapter tools in registration
    /// order, then the gateway's meta-tools.
    pub fn compose(&self, ctx: &ToolContext) -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        let mut sources = Vec::new();

        for adapter in &self.adapters {
            for tool in adapter.tools(ctx) {
                insert_logged(&mut catalog, tool, adapter.name());
            }
            if let Some(source) = adapter.pulse_source(ctx) {
                sources.push(source);
            }
        }

        // Meta-tools always come last, even when an adapter reused the name
        if catalog.remove(PULSE_TOOL_NAME).is_some() {
            tracing::warn!(tool = PULSE_TOOL_NAME, "Adapter tool shadowed by the gateway meta-tool");
        }
        let pulse = PulseTool::new(sources, self.pulse.clone());
        insert_logged(&mut catalog, Arc::new(pulse), "gateway");

        tracing::debug!(
            identity = %ctx.identity,
            tools = catalog.len(),
            "Composed tool catalog"
        );

        catalog
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(PulseConfig::default())
    }
}

fn insert_logged(catalog: &mut ToolCatalog, tool: Arc<dyn Tool>, origin: &str) {
    if let Some(previous) = catalog.insert(tool) {
        tracing::warn!(
            tool = %previous.schema().name,
            origin,
            "Tool name registered twice; the later registration wins"
        );
    }
}

/// Deserialize validated arguments into a typed struct
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> ToolResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{}: {}", tool, e)))
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_number(description: &str, default: f64) -> serde_json::Value {
    serde_json::json!({
        "type": "number",
        "description": description,
        "default": default
    })
}
