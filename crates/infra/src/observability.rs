//! Tracing subscriber setup
//!
//! The filter is read from `SPILLWAY_LOG` using `EnvFilter` directive syntax
//! (for example `spillway_core=debug,info`) and defaults to `info`.

use serde::{Deserialize, Serialize};
use spillway_common::error::{CommonError, CommonResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_ENV_VAR: &str = "SPILLWAY_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber.
///
/// # Errors
/// Fails when a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> CommonResult<()> {
    let filter = build_filter(std::env::var(LOG_ENV_VAR).ok().as_deref());

    tracing_subscriber::registry()
        .with(filter)
        .with(build_layer(format))
        .try_init()
        .map_err(|e| CommonError::internal_with_context(e.to_string(), "init_tracing"))?;

    tracing::debug!(?format, "Tracing initialised");
    Ok(())
}

fn build_filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(raw) if !raw.trim().is_empty() => {
            EnvFilter::try_new(raw).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
        _ => EnvFilter::new(DEFAULT_DIRECTIVE),
    }
}

fn build_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    }
}
