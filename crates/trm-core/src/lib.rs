pub mod candidate;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod parsers;
pub mod preflight;
pub mod scoring;
pub mod session;
pub mod subprocess;

pub use error::{Result, TrmError};
pub use evaluation::{EvalResult, PerfResult};
pub use scoring::{HaltConfig, HaltReason, WeightsConfig};
pub use session::{Session, SessionConfig, SessionMode, SessionRegistry};

use tracing::info;

/// Initialise a default tracing subscriber for the library consumer.
///
/// Call this once at program start. Uses `RUST_LOG` env var for filtering,
/// defaulting to `info` level.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).init();

    info!("trm-core tracing initialised");
}
