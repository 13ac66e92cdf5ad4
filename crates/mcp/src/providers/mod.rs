//! Vendor adapters and the lazily-built client handle they share.

pub mod github;
pub mod slack;

pub use github::{GithubAdapter, GithubConfig};
pub use slack::{SlackAdapter, SlackConfig};

use crate::error::{ToolError, ToolResult};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// Matches returned per search tool call
pub const MAX_RESULTS: usize = 10;

/// Text returned when a search finds nothing in the window
pub const NO_RESULTS: &str = "No results.";

/// Process-wide vendor client, built on first use and reused by every session.
///
/// Construction runs at most once even when several sessions race on first
/// use. A missing credential is remembered as `None`, and every later call
/// fails fast with [`ToolError::NotConfigured`] instead of reaching the vendor.
pub struct ProviderHandle<C> {
    provider: &'static str,
    variable: &'static str,
    cell: OnceLock<Option<C>>,
}

impl<C> ProviderHandle<C> {
    pub fn new(provider: &'static str, variable: &'static str) -> Self {
        Self {
            provider,
            variable,
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> Option<C>) -> ToolResult<&C> {
        self.cell
            .get_or_init(|| {
                let client = init();
                if client.is_none() {
                    tracing::warn!(provider = self.provider, "Provider credential not set; its tools will fail");
                }
                client
            })
            .as_ref()
            .ok_or_else(|| ToolError::not_configured(self.provider, self.variable))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Split a comma-separated setting into trimmed, non-empty entries
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared HTTP client settings for vendor APIs
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("puzzlecats-mcp-gateway/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::default()
        })
}

/// Resolve `path` against a vendor API base, which may carry its own path prefix
pub(crate) fn endpoint(provider: &'static str, base: &str, path: &str) -> ToolResult<Url> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|b| b.join(path))
        .map_err(|e| ToolError::upstream(provider, format!("invalid API URL {}: {}", base, e)))
}

/// Non-empty secret from config, if any
pub(crate) fn present(secret: &Option<String>) -> Option<&str> {
    secret.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_handle_initializes_once_under_contention() {
        let handle = Arc::new(ProviderHandle::<String>::new("Demo", "DEMO_TOKEN"));
        let builds = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let builds = builds.clone();
                std::thread::spawn(move || {
                    handle
                        .get_or_init(|| {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Some("client".to_string())
                        })
                        .map(|c| c.clone())
                })
            })
            .collect();

        for t in threads {
            assert_eq!(t.join().unwrap().unwrap(), "client");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_credential_is_remembered() {
        let handle = ProviderHandle::<String>::new("Demo", "DEMO_TOKEN");
        assert!(!handle.is_initialized());

        let err = handle.get_or_init(|| None).unwrap_err();
        assert_eq!(err.to_string(), "Demo is not configured: set DEMO_TOKEN");
        assert!(handle.is_initialized());

        // A later initializer never runs
        assert!(handle.get_or_init(|| Some("late".to_string())).is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" #general, #launch ,,"), vec!["#general", "#launch"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("Demo", "https://ghe.example.com/api/v3/", "search/issues").unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/search/issues");

        let url = endpoint("Demo", "https://slack.com/api", "search.messages").unwrap();
        assert_eq!(url.as_str(), "https://slack.com/api/search.messages");

        let err = endpoint("Demo", "not a url", "x").unwrap_err();
        assert!(err.to_string().starts_with("Demo API error: invalid API URL"));
    }

    #[test]
    fn test_present_ignores_blank_secrets() {
        assert_eq!(present(&Some("  ".to_string())), None);
        assert_eq!(present(&Some("t".to_string())), Some("t"));
        assert_eq!(present(&None), None);
    }
}
