use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging.
///
/// `RUST_LOG` overrides the configured level. JSON output is meant for CI
/// runners whose logs are shipped elsewhere; the human format is the default.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("ring-rollout telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the operations of one invocation
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping work on a single rollout instance
pub fn create_rollout_span(
    operation: &str,
    rollout: &str,
    instance: Option<&str>,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "rollout",
        operation = operation,
        rollout.name = rollout,
        rollout.instance = instance,
        correlation.id = correlation_id,
    )
}
