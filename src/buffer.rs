//! Replay queue for recording calls made before the gate opens.

use crate::client::MetricsClient;
use std::sync::Mutex;

/// A recording call captured with its arguments for later replay.
pub(crate) enum PendingCall {
    Gauge {
        key: String,
        value: f64,
        tags: Vec<String>,
        timestamp: Option<u64>,
    },
    Increment {
        key: String,
        value: f64,
        tags: Vec<String>,
        timestamp: Option<u64>,
    },
    Histogram {
        key: String,
        value: f64,
        tags: Vec<String>,
        timestamp: Option<u64>,
    },
}

impl PendingCall {
    /// Feed the captured call into the client.
    pub(crate) fn apply(&self, client: &dyn MetricsClient) {
        match self {
            PendingCall::Gauge {
                key,
                value,
                tags,
                timestamp,
            } => client.gauge(key, *value, &tag_refs(tags), *timestamp),
            PendingCall::Increment {
                key,
                value,
                tags,
                timestamp,
            } => client.increment(key, *value, &tag_refs(tags), *timestamp),
            PendingCall::Histogram {
                key,
                value,
                tags,
                timestamp,
            } => client.histogram(key, *value, &tag_refs(tags), *timestamp),
        }
    }
}

pub(crate) fn tag_refs(tags: &[String]) -> Vec<&str> {
    tags.iter().map(String::as_str).collect()
}

pub(crate) fn owned_tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|tag| (*tag).to_owned()).collect()
}

/// FIFO queue of deferred calls plus the gate's ready flag.
///
/// Both live under one mutex so the false-to-true flip is atomic relative
/// to new-call admission: nothing recorded after readiness can overtake the
/// replay, and nothing queued can run twice or be dropped.
pub(crate) struct ReplayBuffer {
    state: Mutex<BufferState>,
}

struct BufferState {
    ready: bool,
    queue: Vec<PendingCall>,
}

impl ReplayBuffer {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                ready: false,
                queue: Vec::new(),
            }),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    /// Queue `call` while the gate is closed; hand it back once ready so
    /// the caller forwards it directly.
    pub(crate) fn defer(&self, call: PendingCall) -> Option<PendingCall> {
        let mut state = self.state.lock().unwrap();
        if state.ready {
            return Some(call);
        }
        state.queue.push(call);
        None
    }

    /// Flip the gate open and replay everything queued, in enqueue order.
    ///
    /// The lock is held across the replay; a racing record call blocks on
    /// admission until the drain finishes and then forwards directly.
    /// Meaningful exactly once; later calls find an empty queue.
    pub(crate) fn open_and_drain(&self, client: &dyn MetricsClient) -> usize {
        let mut state = self.state.lock().unwrap();
        state.ready = true;
        let drained = state.queue.len();
        for call in state.queue.drain(..) {
            call.apply(client);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, FlushCallback};

    /// Renders every call into a line so ordering is easy to assert.
    #[derive(Default)]
    struct LineSink {
        lines: Mutex<Vec<String>>,
    }

    impl MetricsClient for LineSink {
        fn init(&self, _config: ClientConfig) {}

        fn gauge(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("gauge {key} {value} {tags:?} {timestamp:?}"));
        }

        fn increment(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("increment {key} {value} {tags:?} {timestamp:?}"));
        }

        fn histogram(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("histogram {key} {value} {tags:?} {timestamp:?}"));
        }

        fn flush(&self, done: FlushCallback) {
            done(Ok(()))
        }
    }

    fn gauge_call(key: &str) -> PendingCall {
        PendingCall::Gauge {
            key: key.to_owned(),
            value: 1.0,
            tags: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn drains_in_enqueue_order_exactly_once() {
        let buffer = ReplayBuffer::new();
        let sink = LineSink::default();

        assert!(buffer.defer(gauge_call("first")).is_none());
        assert!(buffer.defer(gauge_call("second")).is_none());
        assert!(buffer.defer(gauge_call("third")).is_none());
        assert!(!buffer.is_ready());

        assert_eq!(buffer.open_and_drain(&sink), 3);
        assert!(buffer.is_ready());
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec![
                "gauge first 1 [] None",
                "gauge second 1 [] None",
                "gauge third 1 [] None",
            ]
        );

        // A second drain is a no-op.
        assert_eq!(buffer.open_and_drain(&sink), 0);
        assert_eq!(sink.lines.lock().unwrap().len(), 3);
    }

    #[test]
    fn defer_hands_the_call_back_once_open() {
        let buffer = ReplayBuffer::new();
        let sink = LineSink::default();
        buffer.open_and_drain(&sink);

        let handed_back = buffer.defer(gauge_call("late"));
        assert!(handed_back.is_some());
        // Nothing was queued behind the open gate.
        assert_eq!(buffer.open_and_drain(&sink), 0);
    }
}
