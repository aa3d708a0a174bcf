use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::coordinator::{
    METRIC_FETCH_FAILED, METRIC_FETCH_JOINED, METRIC_FETCH_STARTED, METRIC_OFFLINE_FALLBACK,
};
use crate::application::pagination::METRIC_PAGE_DISCARDED;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every counter this crate emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_FETCH_STARTED,
            Unit::Count,
            "Total number of fetches led by a coordinator."
        );
        describe_counter!(
            METRIC_FETCH_JOINED,
            Unit::Count,
            "Total number of loads that joined an in-flight fetch."
        );
        describe_counter!(
            METRIC_FETCH_FAILED,
            Unit::Count,
            "Total number of led fetches that failed."
        );
        describe_counter!(
            METRIC_OFFLINE_FALLBACK,
            Unit::Count,
            "Total number of failed loads served from cache while offline."
        );
        describe_counter!(
            METRIC_PAGE_DISCARDED,
            Unit::Count,
            "Total number of page results dropped because their search was superseded."
        );
    });
}
