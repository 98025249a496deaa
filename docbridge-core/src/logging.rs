//! Shared logging utilities for DocBridge binaries.
//!
//! Provides consistent logging configuration across the collector and the
//! forward-engineering tool, plus the progress-reporting seam used by the
//! sampling workflow and the script apply engine.

use crate::Result;

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::DocBridgeError::configuration(format!(
                "Failed to initialize logging: {}",
                e
            ))
        })?;

    Ok(())
}

/// Host-facing progress sink.
///
/// The host UI shows one progress line per container/entity pair; headless
/// runs route everything through tracing via [`LogProgress`].
pub trait ProgressReporter: Send + Sync {
    /// Reports a progress message scoped to a container (database) and
    /// entity (collection). Either scope may be empty.
    fn progress(&self, message: &str, container: &str, entity: &str);
}

/// Default reporter that forwards progress lines to tracing at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn progress(&self, message: &str, container: &str, entity: &str) {
        if container.is_empty() && entity.is_empty() {
            tracing::info!("{}", message);
        } else {
            tracing::info!(container, entity, "{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    // Logging can only be initialized once per test process, so only the
    // level selection logic is verified here.

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            let level = match (quiet, verbose) {
                (true, _) => tracing::Level::ERROR,
                (false, 0) => tracing::Level::INFO,
                (false, 1) => tracing::Level::DEBUG,
                (false, _) => tracing::Level::TRACE,
            };
            assert_eq!(level, expected);
        }
    }
}
