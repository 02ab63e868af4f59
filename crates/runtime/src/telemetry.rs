use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sb_domain::config::{LogFormat, ObservabilityConfig};
use sb_domain::error::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `log_filter`. Fails if a subscriber is already set.
pub fn init_tracing(obs: &ObservabilityConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match obs.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    installed.map_err(|e| Error::Config(format!("installing tracing subscriber: {e}")))
}
