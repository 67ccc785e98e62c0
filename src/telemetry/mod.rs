//! Telemetry for reconchain
//!
//! Tracing subscriber setup and terminal rendering of bus events.

use crate::errors::{OrchestratorError, Result};
use crate::events::{Event, Level, Status};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `level`; `verbose` forces debug.
/// Calling this twice is harmless: the second call keeps the first
/// subscriber.
pub fn init_tracing(level: &str, verbose: bool) -> Result<()> {
    let level: tracing::Level = if verbose {
        tracing::Level::DEBUG
    } else {
        level
            .parse()
            .map_err(|_| OrchestratorError::ConfigError(format!("Invalid log level: {}", level)))?
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    Ok(())
}

/// One-line human-readable rendering of an event
pub fn format_event(event: &Event) -> String {
    let status = match event.status {
        Status::Running => "RUNNING".cyan(),
        Status::Success => "SUCCESS".green(),
        Status::Warning => "WARNING".yellow(),
        Status::Error if event.level == Level::Warning => "ERROR".yellow(),
        Status::Error => "ERROR".red(),
    };

    let mut line = format!(
        "#{:<5} {} {:<8} {}",
        event.id,
        event.timestamp.format("%H:%M:%S"),
        status,
        event.service.dimmed()
    );
    if let Some(tool) = &event.tool {
        line.push(' ');
        line.push_str(&tool.bold().to_string());
    }
    if let Some(duration) = event.duration {
        line.push_str(&format!(" ({:.2}s)", duration));
    }
    if let Some(error) = &event.error {
        line.push_str(&format!(" - {}", error));
    }
    line
}
