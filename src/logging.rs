use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging settings handed to every component that decides what to log
///
/// `verbose` turns on debug output and the captured output of commands that
/// are otherwise run quietly (pushes, loads, retags).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub verbose: bool,
    pub trace: bool,
}

impl LogConfig {
    pub const fn new(verbose: bool, trace: bool) -> Self {
        Self { verbose, trace }
    }

    pub const fn level(self) -> Level {
        if self.trace {
            Level::TRACE
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    /// Whether output of commands marked as noisy should be logged
    pub const fn show_command_output(self) -> bool {
        self.verbose || self.trace
    }

    /// Install the global subscriber; `RUST_LOG` still overrides the default level
    pub fn init(self) {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::builder().with_default_directive(self.level().into()).from_env_lossy())
            .try_init();
    }
}
