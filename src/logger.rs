//! Logging initialisation via tracing-subscriber.
//!
//! Output always goes to stderr: stdout is owned by the stdio adapter and
//! carries nothing but protocol responses.
//!
//! The subscriber is installed once at a bootstrap level; the filter is then
//! swapped through [`LogHandle`] once the configured level is known.

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::error::AppError;

/// Where the effective filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// The explicit level wins; `RUST_LOG` is consulted only if it is invalid.
    Explicit,
    /// `RUST_LOG` wins when set; the explicit level is the fallback.
    Environment,
}

/// Build the [`EnvFilter`] for `level` according to `source`.
pub fn build_filter(level: &str, source: FilterSource) -> Result<EnvFilter, AppError> {
    match source {
        FilterSource::Explicit => EnvFilter::try_new(level).or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })
        }),
        FilterSource::Environment => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}"))),
    }
}

/// Handle to the installed filter.
#[derive(Debug, Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replace the active filter. Accepts plain levels and directive lists.
    pub fn set_filter(&self, level: &str, source: FilterSource) -> Result<(), AppError> {
        let filter = build_filter(level, source)?;
        self.filter
            .reload(filter)
            .map_err(|e| AppError::Logger(format!("failed to reload filter: {e}")))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str, source: FilterSource) -> Result<LogHandle, AppError> {
    let (filter, handle) = reload::Layer::new(build_filter(level, source)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(LogHandle { filter: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_accepts_directives() {
        assert!(build_filter("kgraph_memory=debug,warn", FilterSource::Explicit).is_ok());
    }

    #[test]
    fn init_succeeds_or_already_installed() {
        // Another test in this process may have installed a subscriber already.
        match init("info", FilterSource::Environment) {
            Ok(_) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn handle_swaps_in_configured_directives() {
        let (_layer, filter) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let log = LogHandle { filter };

        log.set_filter("kgraph_memory=debug,warn", FilterSource::Explicit)
            .unwrap();
        let active = log.filter.with_current(|f| f.to_string()).unwrap();
        assert!(active.contains("kgraph_memory=debug"), "active filter: {active}");
    }
}
