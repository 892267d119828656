//! Structured logging setup.
//!
//! The core only emits `tracing` events; binaries and experiments call
//! [`init_tracing`] once to see them. Useful targets:
//!
//! | Target                  | Description                          |
//! |-------------------------|--------------------------------------|
//! | `simrec_core::engine`   | Episode lifecycle, per-step pipeline |
//! | `simrec_core::loader`   | Catalog and user loading             |
//! | `simrec_llm`            | Prompting, HTTP retries, parsing     |
//!
//! ```bash
//! RUST_LOG=warn,simrec_core::engine=debug cargo run --example …
//! ```

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::GeneralConfig;
use crate::error::{Result, SimError};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `general.log_level` when set.
///
/// # Errors
/// `Config` if the level is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init_tracing(general: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&general.log_level).map_err(|e| {
            SimError::Config(format!("invalid log level {:?}: {e}", general.log_level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if general.json_logs {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| SimError::Config(format!("tracing already initialized: {e}")))
}
