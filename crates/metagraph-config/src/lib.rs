//! # Metagraph Config
//!
//! Single-file configuration for a metagraph resolver. One `metagraph.yaml`
//! sets the translation planner, the lazy scheduler, the enabled plugin
//! bundles and observability.

mod loader;

pub use loader::{load_config, validate_config, ConfigError};

use serde::Deserialize;

/// Plugin bundle registered before everything in `plugins.enabled`.
pub const BUILTIN_PLUGIN: &str = "core";

/// Accepted values of `observability.log_level`, compared case-insensitively.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct MetagraphConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for MetagraphConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            planner: PlannerConfig::default(),
            scheduler: SchedulerConfig::default(),
            plugins: PluginsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
        }
    }
}

fn default_app_name() -> String {
    "metagraph".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Translation path planning.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Longest translation path the planner will return.
    #[serde(default = "default_max_translation_hops")]
    pub max_translation_hops: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_translation_hops: default_max_translation_hops(),
        }
    }
}

fn default_max_translation_hops() -> usize {
    8
}

/// How placeholders are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Sequential,
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub kind: SchedulerKind,
    /// Upper bound on tasks run at once by the parallel scheduler.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

/// Plugin bundles registered at startup, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_enabled_plugins")]
    pub enabled: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_plugins(),
        }
    }
}

fn default_enabled_plugins() -> Vec<String> {
    [
        "core_python",
        "core_numpy",
        "core_graphblas",
        "core_networkx",
        "core_scipy",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log span open/close events for resolver and scheduler spans.
    #[serde(default)]
    pub traces_enabled: bool,
    /// Append logs here instead of stdout. `METAGRAPH_LOG_FILE` overrides it.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            traces_enabled: false,
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
