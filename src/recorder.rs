//! # Metrics Facade Adapter
//!
//! Bridges the [`metrics`] facade to an [`Emitter`]: handles returned by
//! `counter!`, `gauge!` and `histogram!` forward each operation as a
//! recording call, with labels rendered as `key:value` tags. Calls made
//! before the emitter is initialized buffer like any other.

use crate::buffer::tag_refs;
use crate::emitter::Emitter;
use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Installs a recorder for `emitter` as the process wide default
/// * May only be called once; a second call returns
///   [`Error::Configuration`]
///
/// # Example
/// ```no_run
/// # use metrics_datadog_lambda::{ClientConfig, Emitter, FlushCallback, MetricsClient};
/// # struct NullClient;
/// # impl MetricsClient for NullClient {
/// #     fn init(&self, _config: ClientConfig) {}
/// #     fn gauge(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn increment(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn histogram(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn flush(&self, done: FlushCallback) { done(Ok(())) }
/// # }
/// let emitter = Emitter::new(NullClient).into_static();
/// metrics_datadog_lambda::recorder::install(emitter).unwrap();
///
/// metrics::counter!("requests", "stage" => "prod").increment(1);
/// ```
pub fn install(emitter: &'static Emitter) -> Result<(), Error> {
    metrics::set_global_recorder(EmitterRecorder::from(emitter))
        .map_err(|e| Error::Configuration(format!("failed to install global recorder: {e}")))
}

/// [`metrics::Recorder`] that forwards into an [`Emitter`]
pub struct EmitterRecorder {
    emitter: &'static Emitter,
}

impl From<&'static Emitter> for EmitterRecorder {
    fn from(emitter: &'static Emitter) -> Self {
        Self { emitter }
    }
}

fn name_and_tags(key: &metrics::Key) -> (String, Vec<String>) {
    let name = key.name().to_owned();
    let tags = key
        .labels()
        .map(|label| format!("{}:{}", label.key(), label.value()))
        .collect();
    (name, tags)
}

struct CounterHandle {
    emitter: &'static Emitter,
    key: String,
    tags: Vec<String>,
}

impl metrics::CounterFn for CounterHandle {
    fn increment(&self, value: u64) {
        let _ = self
            .emitter
            .increment(&self.key, value as f64, &tag_refs(&self.tags), None);
    }

    fn absolute(&self, _value: u64) {
        error!(
            "absolute counter values have no Datadog equivalent, dropping sample for {}",
            self.key
        );
    }
}

/// Gauge handle keeping the current value as f64 bits so increment and
/// decrement emit running absolute values
struct GaugeHandle {
    emitter: &'static Emitter,
    key: String,
    tags: Vec<String>,
    value: AtomicU64,
}

impl GaugeHandle {
    fn add(&self, delta: f64) {
        let mut next = 0.0;
        let _ = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                next = f64::from_bits(bits) + delta;
                Some(next.to_bits())
            });
        let _ = self
            .emitter
            .gauge(&self.key, next, &tag_refs(&self.tags), None);
    }
}

impl metrics::GaugeFn for GaugeHandle {
    fn increment(&self, value: f64) {
        self.add(value)
    }

    fn decrement(&self, value: f64) {
        self.add(-value)
    }

    fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Release);
        let _ = self
            .emitter
            .gauge(&self.key, value, &tag_refs(&self.tags), None);
    }
}

struct HistogramHandle {
    emitter: &'static Emitter,
    key: String,
    tags: Vec<String>,
}

impl metrics::HistogramFn for HistogramHandle {
    fn record(&self, value: f64) {
        let _ = self
            .emitter
            .histogram(&self.key, value, &tag_refs(&self.tags), None);
    }
}

impl metrics::Recorder for EmitterRecorder {
    // Units and descriptions have no channel in the recording calls
    fn describe_counter(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
    }

    fn describe_gauge(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
    }

    fn describe_histogram(
        &self,
        _key: metrics::KeyName,
        _unit: Option<metrics::Unit>,
        _description: metrics::SharedString,
    ) {
    }

    fn register_counter(&self, key: &metrics::Key, _metadata: &metrics::Metadata) -> metrics::Counter {
        let (key, tags) = name_and_tags(key);
        metrics::Counter::from_arc(Arc::new(CounterHandle {
            emitter: self.emitter,
            key,
            tags,
        }))
    }

    fn register_gauge(&self, key: &metrics::Key, _metadata: &metrics::Metadata) -> metrics::Gauge {
        let (key, tags) = name_and_tags(key);
        metrics::Gauge::from_arc(Arc::new(GaugeHandle {
            emitter: self.emitter,
            key,
            tags,
            value: AtomicU64::new(0),
        }))
    }

    fn register_histogram(&self, key: &metrics::Key, _metadata: &metrics::Metadata) -> metrics::Histogram {
        let (key, tags) = name_and_tags(key);
        metrics::Histogram::from_arc(Arc::new(HistogramHandle {
            emitter: self.emitter,
            key,
            tags,
        }))
    }
}
