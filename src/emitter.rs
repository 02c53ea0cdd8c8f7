//! # Deferred Metrics Emitter
//!
//! [`Emitter`] fronts a [`MetricsClient`] with a replay buffer: recording
//! calls made before initialization completes are queued and forwarded in
//! their original order once the client is configured.

use crate::buffer::{owned_tags, PendingCall, ReplayBuffer};
use crate::client::{ClientConfig, MetricsClient};
use crate::error::Error;
use crate::options::InitOptions;
use crate::secrets::{ApiKeyConfig, ApiKeySource, SecretFetcher};
use crate::tags::{self, FunctionContext};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{oneshot, watch, OnceCell};
use tracing::debug;

/// Prefix applied to every metric name unless overridden via
/// [`InitOptions::prefix`]
pub const DEFAULT_PREFIX: &str = "lambda.";

/// A point in time attached to a recording call
///
/// Absent timestamps mean "now at the backend's discretion"; both variants
/// are normalized to unix epoch milliseconds when the call is recorded, so
/// a buffered call replays with the time it was made, not the time the
/// buffer drained.
#[derive(Clone, Copy, Debug)]
pub enum Timestamp {
    /// Milliseconds since the unix epoch, passed through unchanged
    Millis(u64),
    /// A wall clock instant, converted to epoch milliseconds
    Time(SystemTime),
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Timestamp::Millis(millis)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Timestamp::Time(time)
    }
}

fn normalize_timestamp(timestamp: Option<Timestamp>) -> Result<Option<u64>, Error> {
    match timestamp {
        None => Ok(None),
        Some(Timestamp::Millis(millis)) => Ok(Some(millis)),
        Some(Timestamp::Time(time)) => match time.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Ok(Some(elapsed.as_millis() as u64)),
            Err(_) => Err(Error::InvalidArgument(
                "timestamp predates the unix epoch".into(),
            )),
        },
    }
}

/// Buffering front end over a [`MetricsClient`]
///
/// Recording calls made before [`init`](Self::init) or
/// [`init_advanced`](Self::init_advanced) completes are queued; the first
/// successful initialization configures the client, replays the queue in
/// order and lets every later call pass straight through.
///
/// # Example
/// ```
/// # use metrics_datadog_lambda::{ClientConfig, Emitter, FlushCallback, InitOptions, MetricsClient};
/// # struct NullClient;
/// # impl MetricsClient for NullClient {
/// #     fn init(&self, _config: ClientConfig) {}
/// #     fn gauge(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn increment(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn histogram(&self, _key: &str, _value: f64, _tags: &[&str], _timestamp: Option<u64>) {}
/// #     fn flush(&self, done: FlushCallback) { done(Ok(())) }
/// # }
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let emitter = Emitter::new(NullClient);
///
/// // Buffered, the client has no API key yet
/// emitter.increment("requests", 1.0, &["stage:prod"], None)?;
///
/// // Configures the client and replays the buffer
/// emitter
///     .init_advanced(InitOptions::new().api_key("0123456789abcdef"))
///     .await?;
///
/// emitter.gauge("queue_depth", 17.0, &[], None)?;
/// emitter.flush().await?;
/// # Ok::<(), metrics_datadog_lambda::Error>(())
/// # }).unwrap();
/// ```
pub struct Emitter {
    client: Box<dyn MetricsClient>,
    buffer: ReplayBuffer,
    init_gate: OnceCell<()>,
    ready_tx: watch::Sender<bool>,
}

impl Emitter {
    /// Creates an emitter wrapping `client`, with the gate closed
    pub fn new(client: impl MetricsClient + 'static) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            client: Box::new(client),
            buffer: ReplayBuffer::new(),
            init_gate: OnceCell::new(),
            ready_tx,
        }
    }

    /// Leaks this emitter into a `&'static` reference
    /// * For consumers that want a static handle, such as
    ///   [`recorder::install`](crate::recorder::install) or the Lambda run
    ///   helpers
    pub fn into_static(self) -> &'static Self {
        Box::leak(Box::new(self))
    }

    /// Whether initialization has completed
    pub fn is_ready(&self) -> bool {
        self.buffer.is_ready()
    }

    /// Initializes with an API key fetched from a secret store and tags
    /// derived from the function context. This is the recommended method.
    ///
    /// Safe to call on every invocation; initialization happens once per
    /// process and later calls return immediately.
    pub async fn init(
        &self,
        fetcher: impl SecretFetcher + 'static,
        bucket: impl Into<String>,
        key: impl Into<String>,
        context: FunctionContext,
    ) -> Result<(), Error> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.is_empty() {
            return Err(Error::Configuration("secret bucket not set".into()));
        }
        if key.is_empty() {
            return Err(Error::Configuration("secret key not set".into()));
        }

        self.init_advanced(
            InitOptions::new()
                .api_key_from_store(fetcher, bucket, key)
                .context(context),
        )
        .await
    }

    /// Initializes with full control over the options
    ///
    /// Resolves the configured API key source, configures the client and
    /// replays any buffered recording calls in order. Concurrent callers
    /// share one attempt: a single caller's options are consumed and the
    /// rest await the outcome. A failed attempt leaves the emitter
    /// uninitialized and the buffer intact, so a later call may retry with
    /// corrected options.
    pub async fn init_advanced(&self, options: InitOptions) -> Result<(), Error> {
        self.init_gate
            .get_or_try_init(|| async move {
                let config = resolve_config(options).await?;
                self.client.init(config);
                let replayed = self.buffer.open_and_drain(self.client.as_ref());
                self.ready_tx.send_replace(true);
                debug!(replayed, "metrics client initialized");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Records the current value of a gauge
    /// * Buffered until initialization completes
    pub fn gauge(
        &self,
        key: &str,
        value: f64,
        tags: &[&str],
        timestamp: Option<Timestamp>,
    ) -> Result<(), Error> {
        let timestamp = normalize_timestamp(timestamp)?;
        if self.buffer.is_ready() {
            self.client.gauge(key, value, tags, timestamp);
            return Ok(());
        }
        let deferred = PendingCall::Gauge {
            key: key.to_owned(),
            value,
            tags: owned_tags(tags),
            timestamp,
        };
        if let Some(call) = self.buffer.defer(deferred) {
            call.apply(self.client.as_ref());
        }
        Ok(())
    }

    /// Increments a counter by `value`
    /// * Buffered until initialization completes
    pub fn increment(
        &self,
        key: &str,
        value: f64,
        tags: &[&str],
        timestamp: Option<Timestamp>,
    ) -> Result<(), Error> {
        let timestamp = normalize_timestamp(timestamp)?;
        if self.buffer.is_ready() {
            self.client.increment(key, value, tags, timestamp);
            return Ok(());
        }
        let deferred = PendingCall::Increment {
            key: key.to_owned(),
            value,
            tags: owned_tags(tags),
            timestamp,
        };
        if let Some(call) = self.buffer.defer(deferred) {
            call.apply(self.client.as_ref());
        }
        Ok(())
    }

    /// Samples a histogram value
    /// * Buffered until initialization completes
    pub fn histogram(
        &self,
        key: &str,
        value: f64,
        tags: &[&str],
        timestamp: Option<Timestamp>,
    ) -> Result<(), Error> {
        let timestamp = normalize_timestamp(timestamp)?;
        if self.buffer.is_ready() {
            self.client.histogram(key, value, tags, timestamp);
            return Ok(());
        }
        let deferred = PendingCall::Histogram {
            key: key.to_owned(),
            value,
            tags: owned_tags(tags),
            timestamp,
        };
        if let Some(call) = self.buffer.defer(deferred) {
            call.apply(self.client.as_ref());
        }
        Ok(())
    }

    /// Flushes the client, sending anything it has buffered to the backend
    ///
    /// Waits for initialization to complete first, then resolves with the
    /// outcome the client reports.
    pub async fn flush(&self) -> Result<(), Error> {
        let mut ready = self.ready_tx.subscribe();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| Error::Configuration("emitter dropped before initialization".into()))?;

        let (done_tx, done_rx) = oneshot::channel();
        self.client.flush(Box::new(move |result| {
            let _ = done_tx.send(result);
        }));
        match done_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Flush(e)),
            Err(_) => Err(Error::Flush(
                "client dropped the flush callback without invoking it".into(),
            )),
        }
    }
}

async fn resolve_config(options: InitOptions) -> Result<ClientConfig, Error> {
    let api_key = match options.api_key {
        None => None,
        Some(ApiKeySource::Literal(key)) => Some(key),
        Some(ApiKeySource::Resolved(config)) => Some(require_api_key(config)?),
        Some(ApiKeySource::Pending(future)) => {
            let config = future
                .await
                .map_err(|e| Error::Configuration(format!("api key resolution failed: {e}")))?;
            Some(require_api_key(config)?)
        }
        Some(ApiKeySource::Store {
            fetcher,
            bucket,
            key,
        }) => {
            let payload = fetcher.fetch(&bucket, &key).await.map_err(|e| {
                Error::Configuration(format!("secret fetch from {bucket}/{key} failed: {e}"))
            })?;
            let config = ApiKeyConfig::from_json(&payload)?;
            Some(require_api_key(config)?)
        }
    };

    let mut default_tags = options.tags;
    if let Some(context) = &options.context {
        default_tags.extend(tags::default_tags(context));
    }

    Ok(ClientConfig {
        api_key,
        prefix: options.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
        default_tags,
    })
}

fn require_api_key(config: ApiKeyConfig) -> Result<String, Error> {
    config.api_key.ok_or_else(|| {
        Error::Configuration("stored API key object is missing the `apiKey` member".into())
    })
}
