//! Bootstrap helpers for starting metagraph from a single YAML config.

use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use metagraph_config::{
    load_config, validate_config, ConfigError, MetagraphConfig, ObservabilityConfig,
    SchedulerKind, BUILTIN_PLUGIN,
};
use metagraph_core::lazy::{ParallelScheduler, Scheduler, SequentialScheduler};
use metagraph_core::{LazyResolver, MetagraphError, Resolver};

/// Runtime bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("registration error: {0}")]
    Registration(#[from] MetagraphError),
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
    #[error("cannot open log file '{path}': {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const LOG_FILE_ENV: &str = "METAGRAPH_LOG_FILE";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// A configured resolver pair sharing one registry.
#[derive(Clone, Debug)]
pub struct MetagraphRuntime {
    config: MetagraphConfig,
    resolver: Arc<Resolver>,
    lazy: LazyResolver,
}

impl MetagraphRuntime {
    /// Load `path`, then build as [`MetagraphRuntime::from_config`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let config = load_config(path.as_ref())?;
        Self::from_config(config)
    }

    pub fn from_config(config: MetagraphConfig) -> Result<Self, BootstrapError> {
        validate_config(&config)?;
        if TRACING_INIT.get().is_none() {
            let sink = open_log_sink(log_file_path(&config.observability))?;
            init_tracing_if_needed(&config.observability, sink);
        }

        let mut resolver =
            Resolver::new().with_max_translation_hops(config.planner.max_translation_hops);
        let enabled = config.plugins.enabled.iter().map(String::as_str);
        for name in std::iter::once(BUILTIN_PLUGIN).chain(enabled) {
            let plugin = metagraph_plugins::plugin_by_name(name)
                .ok_or_else(|| BootstrapError::UnknownPlugin(name.to_string()))?;
            resolver.register(plugin)?;
        }

        let scheduler: Arc<dyn Scheduler> = match config.scheduler.kind {
            SchedulerKind::Sequential => Arc::new(SequentialScheduler),
            SchedulerKind::Parallel => Arc::new(
                ParallelScheduler::new().with_max_parallel(config.scheduler.max_parallel),
            ),
        };

        let resolver = Arc::new(resolver);
        let lazy = LazyResolver::new(resolver.clone()).with_scheduler(scheduler);

        tracing::info!(
            app = %config.app.name,
            environment = %config.app.environment,
            plugins = resolver.plugins().len(),
            scheduler = ?config.scheduler.kind,
            "metagraph runtime ready"
        );

        Ok(Self {
            config,
            resolver,
            lazy,
        })
    }

    pub fn config(&self) -> &MetagraphConfig {
        &self.config
    }

    /// Eager resolver.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Deferred resolver over the same registry.
    pub fn lazy(&self) -> &LazyResolver {
        &self.lazy
    }
}

/// Destination of formatted log lines.
#[derive(Debug)]
enum LogSink {
    Stdout,
    File { path: PathBuf, file: Arc<File> },
}

impl LogSink {
    fn describe(&self) -> String {
        match self {
            Self::Stdout => "stdout".to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }
}

/// `METAGRAPH_LOG_FILE` when set, otherwise `observability.log_file`.
fn log_file_path(observability: &ObservabilityConfig) -> Option<PathBuf> {
    std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| observability.log_file.clone())
        .map(PathBuf::from)
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_sink(path: Option<PathBuf>) -> Result<LogSink, BootstrapError> {
    let Some(path) = path else {
        return Ok(LogSink::Stdout);
    };
    let log_file_error = |source: std::io::Error| BootstrapError::LogFile {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(log_file_error)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(log_file_error)?;
    Ok(LogSink::File {
        path,
        file: Arc::new(file),
    })
}

fn init_tracing_if_needed(observability: &ObservabilityConfig, sink: LogSink) {
    TRACING_INIT.get_or_init(|| {
        let level = observability.log_level.trim().to_ascii_lowercase();
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
        let span_events = if observability.traces_enabled {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let destination = sink.describe();
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_span_events(span_events);

        // Another subscriber may already be installed by the host process.
        let installed = match sink {
            LogSink::File { file, .. } => {
                builder.with_ansi(false).with_writer(file).try_init()
            }
            LogSink::Stdout => builder.try_init(),
        };

        tracing::info!(
            log_level = %level,
            traces_enabled = observability.traces_enabled,
            destination = %destination,
            installed = installed.is_ok(),
            "tracing initialized"
        );
    });
}
