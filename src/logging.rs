//! Subscriber setup for build drivers, behind the `logging` feature.
//!
//! The transform only emits `tracing` events under this crate's target
//! (`debug!` per rewrite pass, `info!` per batch module, `trace!` per planned
//! edit). Directives built here are scoped to that target so a driver can
//! raise transform verbosity without raising its own dependencies'.
//! Embedding tools that already install a subscriber should not call the
//! `init_*` functions.

use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    /// Non-converging modules
    Warn,
    /// One line per batch module
    #[default]
    Info,
    /// One line per rewrite pass
    Debug,
    /// One line per planned edit
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// `bdplugin_transform=<level>`.
    pub fn directive(&self) -> Directive {
        format!("{}={}", CRATE_TARGET, self.as_filter())
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" | "quiet" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "passes" => Ok(LogLevel::Debug),
            "trace" | "edits" => Ok(LogLevel::Trace),
            other => Err(format!("unknown transform log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Compact, timeless event lines written to `writer`, filtered by `filter`.
pub fn transform_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(writer),
    )
}

/// Installs a global stderr subscriber for transform events at `level`.
/// `RUST_LOG` directives are added on top. Returns false when a global
/// subscriber was already installed.
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .from_env_lossy()
        .add_directive(level.directive());
    transform_subscriber(filter, std::io::stderr)
        .try_init()
        .is_ok()
}

/// Like [`init_logging`], taking every directive from `RUST_LOG` and falling
/// back to transform events at `info`.
pub fn init_logging_from_env() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LogLevel::Info.directive()));
    transform_subscriber(filter, std::io::stderr)
        .try_init()
        .is_ok()
}
