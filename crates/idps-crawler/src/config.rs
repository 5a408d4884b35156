use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// Ctrl-C stops the run, only when it is polled inside a Tokio runtime.
    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            concurrent_downloads: default_concurrent_downloads(),
            timeout_secs: default_timeout_secs(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

fn default_user_agent() -> String {
    String::from("IDPSbot")
}

fn default_concurrent_downloads() -> usize {
    1
}

fn default_timeout_secs() -> Option<u64> {
    Some(30)
}

fn default_handle_sigint() -> bool {
    false
}

/// How a single run is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Caps the seed URLs and the total number of fetches.
    pub limit: Option<usize>,
    /// Hands every non empty batch of records to the store.
    pub persist: bool,
}

impl RunOptions {
    pub fn new(limit: Option<usize>, persist: bool) -> Self {
        Self { limit, persist }
    }

    /// A single fetch and nothing stored, to check a task definition.
    pub fn test() -> Self {
        Self::new(Some(1), false)
    }
}
