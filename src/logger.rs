//! Logging setup for applications and tests that use pose-factors
//!
//! The library itself only emits `tracing` events: factor construction at DEBUG, large
//! quaternion renormalizations at WARN, and rejected inputs at ERROR. This module installs a
//! compact subscriber for them.

use tracing::Level;

/// Install the standard subscriber at INFO (overrideable via `RUST_LOG`).
///
/// Format: `[LEVEL YYYY-MM-DD HH:MM:SS target] message`, with `file:line` in place of the
/// target for DEBUG and TRACE events.
///
/// Returns `false` if a global subscriber was already installed.
///
/// # Example
/// ```no_run
/// use pose_factors::init_logger;
///
/// init_logger();
/// tracing::info!("Calibration started");
/// ```
///
/// # Environment Variables
/// ```bash
/// RUST_LOG=pose_factors=debug cargo test
/// ```
pub fn init_logger() -> bool {
    init_logger_with_level(Level::INFO)
}

/// Install the standard subscriber with a custom default level.
///
/// Returns `false` if a global subscriber was already installed, which makes it safe to
/// call from several tests.
pub fn init_logger_with_level(default_level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(BracketFormatter)
        .try_init()
        .is_ok()
}

/// `[LEVEL timestamp location] message` formatter
struct BracketFormatter;

impl BracketFormatter {
    fn level_label(level: &Level, ansi: bool) -> &'static str {
        match (*level, ansi) {
            (Level::ERROR, true) => "\x1b[31mERROR\x1b[0m",
            (Level::WARN, true) => "\x1b[33mWARN\x1b[0m",
            (Level::INFO, true) => "\x1b[32mINFO\x1b[0m",
            (Level::DEBUG, true) => "\x1b[34mDEBUG\x1b[0m",
            (Level::TRACE, true) => "\x1b[35mTRACE\x1b[0m",
            (Level::ERROR, false) => "ERROR",
            (Level::WARN, false) => "WARN",
            (Level::INFO, false) => "INFO",
            (Level::DEBUG, false) => "DEBUG",
            (Level::TRACE, false) => "TRACE",
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use chrono::Local;

        let metadata = event.metadata();
        let level = metadata.level();

        write!(
            writer,
            "[{} {} ",
            Self::level_label(level, writer.has_ansi_escapes()),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        match (*level, metadata.file(), metadata.line()) {
            (Level::DEBUG | Level::TRACE, Some(file), line) => {
                let filename = file.rsplit('/').next().unwrap_or(file);
                match line {
                    Some(line) => write!(writer, "{filename}:{line}")?,
                    None => write!(writer, "{filename}")?,
                }
            }
            _ => write!(writer, "{}", metadata.target())?,
        }

        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
