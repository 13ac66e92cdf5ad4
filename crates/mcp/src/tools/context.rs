// Per-session caller context handed to adapters and executors

/// Identity hint used when the caller sent no identity header
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Caller context for catalog composition and tool execution.
///
/// The identity is advisory: adapters may use it to parameterize results,
/// never to authorize access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub identity: String,
    pub session_id: Option<String>,
}

impl ToolContext {
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        let identity = if identity.trim().is_empty() {
            UNKNOWN_IDENTITY.to_string()
        } else {
            identity
        };

        Self {
            identity,
            session_id: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(UNKNOWN_IDENTITY)
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
