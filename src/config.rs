//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (DELTAGRAPH_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [matrix]
//! flush_threshold = 10000
//!
//! [pools]
//! readers = 0
//! writers = 1
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DELTAGRAPH_MATRIX__FLUSH_THRESHOLD=50000
//! DELTAGRAPH_LOGGING__LEVEL=debug
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub pools: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Delta-matrix tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Pending-change count at which a non-forced flush merges the
    /// overlays into the base
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u64,

    /// Initial node slot capacity for new graphs
    #[serde(default = "default_node_cap")]
    pub node_capacity: usize,

    /// Initial edge slot capacity for new graphs
    #[serde(default = "default_node_cap")]
    pub edge_capacity: usize,
}

/// Traversal bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Depth clip for BFS reachability procedures
    #[serde(default = "default_max_bfs_depth")]
    pub max_bfs_depth: u32,

    /// Entries processed between cancellation polls
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Worker pool sizing; 0 = one worker per CPU core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub readers: usize,

    #[serde(default = "default_writers")]
    pub writers: usize,

    #[serde(default = "default_writers")]
    pub bulk: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_flush_threshold() -> u64 {
    10_000
}
fn default_node_cap() -> usize {
    16_384
}
fn default_max_bfs_depth() -> u32 {
    1_000
}
fn default_batch_size() -> usize {
    1_000
}
fn default_writers() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig {
            flush_threshold: default_flush_threshold(),
            node_capacity: default_node_cap(),
            edge_capacity: default_node_cap(),
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        TraversalConfig {
            max_bfs_depth: default_max_bfs_depth(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            readers: 0,
            writers: default_writers(),
            bulk: default_writers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (DELTAGRAPH_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("DELTAGRAPH_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DELTAGRAPH_").split("__"))
            .extract()
    }
}

/// Install a global tracing subscriber honoring the configured level.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = fmt().with_env_filter(filter);
    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // a subscriber installed by the host wins
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.matrix.flush_threshold, 10_000);
        assert_eq!(config.pools.writers, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(toml_str.contains("[matrix]"));
        assert!(toml_str.contains("[pools]"));
        assert!(toml_str.contains("[logging]"));
    }
}
