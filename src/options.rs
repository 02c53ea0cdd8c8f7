//! Options for advanced initialization of the [`Emitter`](crate::Emitter).

use crate::secrets::{ApiKeyConfig, ApiKeySource, SecretFetcher};
use crate::tags::FunctionContext;
use crate::BoxError;
use futures::future::FutureExt;
use std::future::Future;

/// Options for [`Emitter::init_advanced`](crate::Emitter::init_advanced)
///
/// # Example
/// ```
/// let context = metrics_datadog_lambda::FunctionContext::new(
///     "MyTestingFunction",
///     "arn:aws:lambda:us-west-2:784593521445:function:MyTestingFunction",
/// );
/// let options = metrics_datadog_lambda::InitOptions::new()
///     .api_key("0123456789abcdef")
///     .prefix("myapp.")
///     .tag("stage:prod")
///     .context(context);
/// ```
#[derive(Default)]
pub struct InitOptions {
    pub(crate) api_key: Option<ApiKeySource>,
    pub(crate) prefix: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) context: Option<FunctionContext>,
}

impl InitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Datadog API key directly
    /// * Replaces any previously configured key source
    pub fn api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(ApiKeySource::Literal(api_key.into())),
            ..self
        }
    }

    /// Sets an already resolved API key object
    /// * Replaces any previously configured key source
    /// * init_advanced() will fail with [`Error::Configuration`](crate::Error::Configuration)
    ///   if the object is missing its `apiKey` member
    pub fn api_key_config(self, config: ApiKeyConfig) -> Self {
        Self {
            api_key: Some(ApiKeySource::Resolved(config)),
            ..self
        }
    }

    /// Sets a future that resolves to the API key object, awaited during
    /// init_advanced()
    /// * Replaces any previously configured key source
    pub fn api_key_future(
        self,
        future: impl Future<Output = Result<ApiKeyConfig, BoxError>> + Send + 'static,
    ) -> Self {
        Self {
            api_key: Some(ApiKeySource::Pending(future.boxed())),
            ..self
        }
    }

    /// Sets a secret store location to fetch the API key object from during
    /// init_advanced()
    /// * The stored payload must be a JSON object with an `apiKey` member
    /// * Replaces any previously configured key source
    pub fn api_key_from_store(
        self,
        fetcher: impl SecretFetcher + 'static,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            api_key: Some(ApiKeySource::Store {
                fetcher: Box::new(fetcher),
                bucket: bucket.into(),
                key: key.into(),
            }),
            ..self
        }
    }

    /// Overrides the metric name prefix
    /// * Defaults to [`DEFAULT_PREFIX`](crate::DEFAULT_PREFIX) when unset
    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..self
        }
    }

    /// Adds a `key:value` tag sent with every metric
    /// * This method can be called multiple times
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds `key:value` tags sent with every metric
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Derives default tags from the Lambda function context
    /// * Context tags are appended after any tags set via [`tag`](Self::tag)
    ///   and [`tags`](Self::tags)
    pub fn context(self, context: FunctionContext) -> Self {
        Self {
            context: Some(context),
            ..self
        }
    }
}
