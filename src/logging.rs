//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr; stdout is reserved for the
//! reports printed by [`crate::output`]. Filter precedence:
//!
//! 1. `GALLERY_FARM_LOG` (any `EnvFilter` directive, e.g.
//!    `gallery_farm::allocation=warn,info`)
//! 2. `-v` / `-q` on the command line
//! 3. `info`
//!
//! Warnings worth filtering on their own use dedicated targets:
//! `gallery_farm::allocation`, `gallery_farm::patch` and
//! `gallery_farm::graph`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "GALLERY_FARM_LOG";

/// Verbosity requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    fn level(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(verbosity: Verbosity) {
    let filter = build_filter(std::env::var(LOG_ENV).ok().as_deref(), verbosity);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// `env` when it parses as a filter, else the verbosity level.
fn build_filter(env: Option<&str>, verbosity: Verbosity) -> EnvFilter {
    env.filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.level()))
}
