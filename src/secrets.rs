//! API key resolution for the one-shot initialization step.

use crate::error::Error;
use crate::BoxError;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;

/// Asynchronous blob-store access, typically S3.
///
/// The fetched payload is expected to be a JSON document of the shape
/// `{"apiKey": "..."}`.
pub trait SecretFetcher: Send + Sync {
    /// Retrieve the stored secret at `bucket`/`key`.
    fn fetch(&self, bucket: &str, key: &str) -> BoxFuture<'static, Result<Bytes, BoxError>>;
}

impl<T: SecretFetcher + ?Sized> SecretFetcher for Arc<T> {
    fn fetch(&self, bucket: &str, key: &str) -> BoxFuture<'static, Result<Bytes, BoxError>> {
        self.as_ref().fetch(bucket, key)
    }
}

/// Credential bundle a secret source resolves to.
///
/// Only the API key is consumed; unknown fields in the stored document are
/// tolerated.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiKeyConfig {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

impl ApiKeyConfig {
    pub(crate) fn from_json(payload: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(payload).map_err(|e| {
            Error::Configuration(format!("stored API key object is not valid JSON: {e}"))
        })
    }
}

/// Where the API key comes from during initialization.
pub enum ApiKeySource {
    /// Key known up front.
    Literal(String),
    /// Already-resolved credential bundle.
    Resolved(ApiKeyConfig),
    /// Caller-supplied resolution still in flight.
    Pending(BoxFuture<'static, Result<ApiKeyConfig, BoxError>>),
    /// Fetch the stored JSON document from a blob store at init time.
    Store {
        fetcher: Box<dyn SecretFetcher>,
        bucket: String,
        key: String,
    },
}
