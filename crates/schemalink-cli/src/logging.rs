use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::CliError;
use crate::settings::Settings;

/// Install the process-wide subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(settings: &Settings) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .map_err(|err| CliError::Logging(err.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if settings.log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
    };

    installed.map_err(|err| CliError::Logging(err.to_string()))
}
