pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    client::{ClientConfig, FlushCallback, MetricsClient},
    emitter::{Emitter, Timestamp, DEFAULT_PREFIX},
    error::Error,
    options::InitOptions,
    secrets::{ApiKeyConfig, ApiKeySource, SecretFetcher},
    tags::{default_tags, FunctionContext},
};

mod buffer;
mod client;
mod emitter;
mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
mod options;
pub mod recorder;
mod secrets;
mod tags;
