//! Application settings loaded from ~/.panelist/config.toml

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Compute service endpoint for experiment runs
    pub endpoint: String,
    /// Hard timeout for a full experiment stream
    pub stream_timeout: Duration,
    /// Retries for transient failures of store calls
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub initial_retry_delay: Duration,
    /// Offline queue capacity
    pub queue_capacity: usize,
    /// Offline queue message TTL in days
    pub queue_ttl_days: i64,
    /// Concurrent upload slots for context file staging
    pub upload_slots: usize,
    /// Commit results artifacts to git when the project is a repository
    pub auto_commit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/run-experiment".to_string(),
            stream_timeout: Duration::from_secs(600),
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(1000),
            queue_capacity: crate::queue::DEFAULT_CAPACITY,
            queue_ttl_days: crate::queue::DEFAULT_TTL_DAYS,
            upload_slots: 3,
            auto_commit: true,
        }
    }
}

/// TOML representation: every field optional, overlaid onto defaults
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlSettings {
    endpoint: Option<String>,
    stream_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    initial_retry_delay_ms: Option<u64>,
    queue_capacity: Option<usize>,
    queue_ttl_days: Option<i64>,
    upload_slots: Option<usize>,
    auto_commit: Option<bool>,
}

impl Settings {
    /// Load settings from file, merging with defaults. A missing file
    /// yields pure defaults; an unreadable one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let mut settings = Settings::default();

        if !path.exists() {
            return settings;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read settings: {e}");
                return settings;
            }
        };

        let toml_settings = match toml::from_str::<TomlSettings>(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Invalid settings file, using defaults: {e}");
                return settings;
            }
        };

        if let Some(endpoint) = toml_settings.endpoint {
            settings.endpoint = endpoint;
        }
        if let Some(secs) = toml_settings.stream_timeout_secs {
            settings.stream_timeout = Duration::from_secs(secs);
        }
        if let Some(max_retries) = toml_settings.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(ms) = toml_settings.initial_retry_delay_ms {
            settings.initial_retry_delay = Duration::from_millis(ms);
        }
        if let Some(capacity) = toml_settings.queue_capacity {
            settings.queue_capacity = capacity;
        }
        if let Some(ttl) = toml_settings.queue_ttl_days {
            settings.queue_ttl_days = ttl;
        }
        if let Some(slots) = toml_settings.upload_slots {
            settings.upload_slots = slots;
        }
        if let Some(auto_commit) = toml_settings.auto_commit {
            settings.auto_commit = auto_commit;
        }

        settings
    }
}
