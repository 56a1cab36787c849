//! Logging setup
//!
//! JSON logs to stdout, filtered by `RUST_LOG`, plus an optional layer that
//! mirrors events to the remote logging service.

mod remote;

pub use remote::{RemoteLogLayer, ACCESS_TARGET};
#[cfg(test)]
pub use remote::LogRecord;

use crate::config::RemoteLogConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "ect_relay=info,tower_http=info,access=info";

/// Install the global subscriber. Must be called from inside the runtime
/// when a remote sink is configured, since its forwarder is a spawned task.
pub fn init(remote: Option<&RemoteLogConfig>) {
    let remote_layer = remote.map(|config| {
        let (layer, rx) = RemoteLogLayer::new(config.min_level);
        tokio::spawn(remote::forward(rx, config.clone()));
        layer
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(remote_layer)
        .init();
}
