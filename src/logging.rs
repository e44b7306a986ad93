//! Process-wide log output.
//!
//! Library crates log through the `log` facade. [`init`] installs a
//! `tracing-subscriber` formatter that also receives those records.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit filter is given.
pub const DEFAULT_FILTER: &str = "info,winops_wmi=warn";

/// Install the global subscriber. `filter` overrides `RUST_LOG`.
///
/// Returns an error if a global subscriber or logger is already set.
pub fn init(filter: Option<&str>) -> Result<(), String> {
    let filter = match filter {
        Some(f) => EnvFilter::try_new(f).map_err(|e| format!("Invalid log filter '{}': {}", f, e))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    #[cfg(feature = "logs-json")]
    let result = builder.json().try_init();
    #[cfg(not(feature = "logs-json"))]
    let result = builder.try_init();

    result.map_err(|e| format!("Failed to initialise logging: {}", e))?;
    tracing::debug!("logging initialised");
    Ok(())
}
