//! Tracing and error-report setup shared by every binary.

use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::Environment;

/// Install color-eyre's panic and error hooks.
///
/// Call before the first fallible operation in `main()`. Location sections
/// stay on, the environment-variable section stays off. Repeat calls are
/// no-ops.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize the global tracing subscriber.
///
/// Production gets flattened JSON for log aggregation; development gets
/// pretty human-readable output. Both stack `tracing-error`'s ErrorLayer
/// so spans are captured into error reports.
///
/// `RUST_LOG` overrides the default filter (`info,sea_orm=warn` in
/// production, `debug,sea_orm=info` otherwise).
///
/// Calling again after a subscriber is installed is harmless; tests rely
/// on that.
pub fn init_tracing(environment: &Environment) {
    let production = environment.is_production();

    let default_directives = if production {
        "info,sea_orm=warn"
    } else {
        "debug,sea_orm=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_error::ErrorLayer::default());

    let fmt = tracing_subscriber::fmt::layer().with_target(false);
    let result = if production {
        registry.with(fmt.json().flatten_event(true)).try_init()
    } else {
        registry
            .with(fmt.with_file(false).with_line_number(false).pretty())
            .try_init()
    };

    if result.is_ok() {
        info!(environment = ?environment, "Tracing initialized");
    } else {
        debug!("Tracing already initialized, keeping the existing subscriber");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing(&Environment::Development);
        init_tracing(&Environment::Development);
        init_tracing(&Environment::Production);
    }

    #[test]
    fn rust_log_override_is_accepted() {
        temp_env::with_var("RUST_LOG", Some("trace"), || {
            init_tracing(&Environment::Development);
        });
    }

    #[test]
    fn color_eyre_hooks_tolerate_reinstall() {
        install_color_eyre();
        install_color_eyre();
    }
}
