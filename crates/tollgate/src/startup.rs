//! Process startup: validate configuration, install telemetry, assemble the
//! gateway.
//!
//! These are the only failures that halt the process. Once a [`Gateway`]
//! exists, per-request code never returns an error.

use thiserror::Error;
use tollgate_config::{ConfigError, GatewayConfig};
use tollgate_middleware::{Collaborators, Gateway, PipelineError};
use tollgate_telemetry::TelemetryError;

/// Errors that stop the gateway from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The pipeline could not be assembled.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Validates `config` and assembles a gateway. Does not touch global
/// telemetry state.
///
/// # Errors
///
/// Returns [`StartupError::Config`] for an invalid configuration and
/// [`StartupError::Pipeline`] if the stages cannot be built.
pub fn assemble(config: &GatewayConfig, collaborators: Collaborators) -> Result<Gateway, StartupError> {
    config.validate()?;
    Ok(Gateway::from_config(config, collaborators)?)
}

/// Installs logging and metrics from `config`, then assembles the gateway.
///
/// Call once per process.
///
/// # Errors
///
/// Any [`StartupError`].
pub fn start(config: &GatewayConfig, collaborators: Collaborators) -> Result<Gateway, StartupError> {
    config.validate()?;
    tollgate_telemetry::init_telemetry(&config.telemetry.to_telemetry_config())?;
    let gateway = Gateway::from_config(config, collaborators)?;
    tracing::info!(
        environment = %config.gateway.environment,
        csrf_enabled = config.csrf.enabled,
        "tollgate started"
    );
    Ok(gateway)
}
