//! Structured logging for figcache
//!
//! Every event written by the library carries the same structured fields so a
//! build log can be filtered per script or per figure.
//!
//! # Log Format Conventions
//!
//! - `service`: The component ("manifest", "sibling_cache", "owner_lock", ...)
//! - `operation`: The operation being performed ("lookup", "take", "put", ...)
//! - `status`: The result status ("success", "hit", "miss", "error", ...)
//! - `script`: Generator script file name
//! - `figure`: Requested figure file name
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! info!(
//!     service = "gate",
//!     operation = "request",
//!     status = "hit",
//!     script = "plot.py",
//!     figure = "b.pdf",
//!     "figure served from sibling cache"
//! );
//! ```

use std::io::IsTerminal;
use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Event formatter that tags lines with "figcache" instead of the module path
struct FigcacheFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for FigcacheFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        // Write timestamp
        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(figcache)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(figcache): ", meta.level())?;
        }

        // Write fields and message
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact format (for CI/production)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl LogFormat {
    /// Parse from environment variable (FIGCACHE_LOG_FORMAT)
    pub fn from_env() -> Self {
        let value = std::env::var("FIGCACHE_LOG_FORMAT").unwrap_or_default();
        Self::parse(&value).unwrap_or_else(|| {
            // Build logs from CI runners don't render colors
            if std::env::var("CI").is_ok() {
                Self::Compact
            } else {
                Self::Pretty
            }
        })
    }

    /// Parse a format name; `None` for anything unrecognised
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn")
/// - `FIGCACHE_LOG_FORMAT`: Set format ("pretty", "compact", "json")
/// - `CI`: If set, defaults to compact format
///
/// Logs go to stderr; the generator scripts own stdout.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=figcache=debug figcache figure plot.py a.pdf
/// FIGCACHE_LOG_FORMAT=json figcache figure plot.py a.pdf
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match LogFormat::from_env() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(FigcacheFormatter {
                            with_ansi: io::stderr().is_terminal(),
                        })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(FigcacheFormatter { with_ansi: false })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(false)
                        .with_writer(io::stderr)
                        .json(),
                )
                .init();
        }
    }
}

/// Service names for consistent logging
pub mod services {
    pub const MANIFEST: &str = "manifest";
    pub const SIBLING_CACHE: &str = "sibling_cache";
    pub const OWNER_LOCK: &str = "owner_lock";
    pub const RUNNER: &str = "runner";
    pub const GATE: &str = "gate";
}

/// Operation names for consistent logging
pub mod operations {
    pub const LOOKUP: &str = "lookup";
    pub const TAKE: &str = "take";
    pub const PUT: &str = "put";
    pub const ACQUIRE: &str = "acquire";
    pub const RELEASE: &str = "release";
    pub const RUN: &str = "run";
    pub const REQUEST: &str = "request";
}

/// Status values for consistent logging
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const HIT: &str = "hit";
    pub const MISS: &str = "miss";
    pub const SINGLE: &str = "single_output";
    pub const ERROR: &str = "error";
    pub const NOT_FOUND: &str = "not_found";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const CONTENDED: &str = "contended";
    pub const STALE: &str = "stale";
}
