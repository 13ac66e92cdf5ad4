pub mod context;
pub mod pulse;
mod registry;
mod schema;

pub use context::{ToolContext, UNKNOWN_IDENTITY};
pub use pulse::{PulseConfig, PulseTool, PULSE_TOOL_NAME};
pub use registry::{
    json_schema_number, json_schema_object, json_schema_string, parse_arguments, ProviderAdapter,
    PulseSource, Tool, ToolCatalog, ToolRegistry,
};
pub use schema::validate_arguments;
