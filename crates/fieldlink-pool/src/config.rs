use serde::{Deserialize, Serialize};

/// Default number of tasks allowed to run at once.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Task pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum tasks running at once. Zero is treated as one.
    pub pool_size: usize,
    /// Prefix for task thread names.
    pub thread_name: String,
    /// Keep finished results for `take_result`/`drain_results`. When off, a
    /// result is only reachable from its completion callback.
    pub retain_results: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            thread_name: "fieldlink-task".to_string(),
            retain_results: true,
        }
    }
}

impl PoolConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_retain_results(mut self, retain: bool) -> Self {
        self.retain_results = retain;
        self
    }

    pub(crate) fn limit(&self) -> usize {
        self.pool_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: PoolConfig =
            serde_json::from_str(r#"{"pool_size": 0}"#).expect("config should parse");
        assert_eq!(cfg.limit(), 1);
        assert_eq!(cfg.thread_name, "fieldlink-task");
        assert!(cfg.retain_results);
        assert!(!PoolConfig::default().with_retain_results(false).retain_results);
    }
}
