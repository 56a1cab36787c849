//! Remote log sink
//!
//! A tracing layer that copies events into an unbounded channel, and a
//! background task that posts them to the logging service. Delivery is
//! fire-and-forget: a failed post is dropped and never reaches the code
//! that logged.

use crate::config::RemoteLogConfig;
use reqwest::Client;
use serde_json::json;
use std::fmt::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target used by the HTTP access log middleware
pub const ACCESS_TARGET: &str = "access";

const CATEGORY: &str = "AI";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

// HTTP client internals would otherwise log about our own posts
const INTERNAL_TARGETS: &[&str] = &["reqwest", "hyper", "h2", "rustls"];

/// One record bound for the logging service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// General log line
    Append { level: String, message: String },
    /// Resource access by a client
    Access { resource: String, ip_address: String },
}

/// Tracing layer feeding the remote sink
pub struct RemoteLogLayer {
    sender: mpsc::UnboundedSender<LogRecord>,
    min_level: Level,
}

impl RemoteLogLayer {
    pub fn new(min_level: Level) -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (sender, rx) = mpsc::unbounded_channel();
        (Self { sender, min_level }, rx)
    }

    fn accepts(&self, level: Level, target: &str) -> bool {
        level <= self.min_level
            && target != module_path!()
            && !INTERNAL_TARGETS
                .iter()
                .any(|internal| target.starts_with(internal))
    }
}

impl<S: Subscriber> Layer<S> for RemoteLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.accepts(*metadata.level(), metadata.target()) {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let record = if metadata.target() == ACCESS_TARGET {
            LogRecord::Access {
                resource: fields.take("path"),
                ip_address: fields.take("ip"),
            }
        } else {
            LogRecord::Append {
                level: metadata.level().to_string(),
                message: fields.render(),
            }
        };

        // Receiver gone means the forwarder stopped; nothing to do
        let _ = self.sender.send(record);
    }
}

/// Flattens an event into its message and `key=value` pairs
#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn take(&mut self, name: &str) -> String {
        self.fields
            .iter()
            .position(|(key, _)| *key == name)
            .map(|i| self.fields.remove(i).1)
            .unwrap_or_default()
    }

    fn render(self) -> String {
        let mut out = self.message;
        for (key, value) in self.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{key}={value}");
        }
        out
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

/// Drain the channel into the logging service until every sender is gone
pub async fn forward(mut rx: mpsc::UnboundedReceiver<LogRecord>, config: RemoteLogConfig) {
    let RemoteLogConfig {
        base_url,
        token,
        table,
        ..
    } = config;
    let client = match Client::builder().timeout(SEND_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Remote logging disabled: cannot build HTTP client");
            return;
        }
    };

    while let Some(record) = rx.recv().await {
        let (path, body) = match record {
            LogRecord::Append { level, message } => (
                "/append-to-log",
                json!({
                    "table": table,
                    "category": CATEGORY,
                    "level": level,
                    "message": message,
                }),
            ),
            LogRecord::Access {
                resource,
                ip_address,
            } => (
                "/log-resource-access",
                json!({"resource": resource, "ip_address": ip_address}),
            ),
        };

        let result = client
            .post(format!("{base_url}{path}"))
            .header("token", &token)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        if let Err(e) = result {
            tracing::debug!(error = %e, "Dropped remote log record");
        }
    }
}
