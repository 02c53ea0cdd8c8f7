//! Collaborator contract for the metrics transport client.

use crate::BoxError;
use std::sync::Arc;

/// Completion callback handed to [MetricsClient::flush].
pub type FlushCallback = Box<dyn FnOnce(Result<(), BoxError>) + Send>;

/// Merged configuration handed to [MetricsClient::init] exactly once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    /// API key for the metrics backend. `None` leaves the client to its
    /// own fallback, typically an environment variable.
    pub api_key: Option<String>,
    /// Namespace prefix the client applies to every metric key.
    pub prefix: String,
    /// Tags the client attaches to every sample.
    pub default_tags: Vec<String>,
}

/// The metrics transport/aggregation backend.
///
/// The record methods are treated as fast synchronous sinks: they must not
/// block and must not call back into the [Emitter](crate::Emitter), which
/// may hold its internal lock across a replay. `flush` is the one
/// asynchronous operation, expressed callback-style; the emitter adapts it
/// into a future.
pub trait MetricsClient: Send + Sync {
    /// One-time client initialization with the merged configuration.
    fn init(&self, config: ClientConfig);

    /// Record the current value of a gauge.
    fn gauge(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>);

    /// Add `value` to a counter.
    fn increment(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>);

    /// Sample a histogram value.
    fn histogram(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>);

    /// Send everything buffered client-side, then invoke `done` exactly
    /// once with the outcome.
    fn flush(&self, done: FlushCallback);
}

impl<T: MetricsClient + ?Sized> MetricsClient for Arc<T> {
    fn init(&self, config: ClientConfig) {
        self.as_ref().init(config)
    }

    fn gauge(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.as_ref().gauge(key, value, tags, timestamp)
    }

    fn increment(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.as_ref().increment(key, value, tags, timestamp)
    }

    fn histogram(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.as_ref().histogram(key, value, tags, timestamp)
    }

    fn flush(&self, done: FlushCallback) {
        self.as_ref().flush(done)
    }
}
