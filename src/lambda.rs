//! Integration with [lambda_runtime] and [lambda_http]
//!
//! *this module requires the `lambda` feature flag*
//!
//! # Simple Example
//! ```ignore
//! use lambda_runtime::{Error, LambdaEvent};
//! // This replaces lambda_runtime::run and lambda_runtime::service_fn
//! use metrics_datadog_lambda::lambda::handler::run;
//! use metrics_datadog_lambda::{Emitter, FunctionContext};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Request {}
//!
//! #[derive(Serialize)]
//! struct Response {}
//!
//! async fn function_handler(
//!     emitter: &'static Emitter,
//!     event: LambdaEvent<Request>,
//! ) -> Result<Response, Error> {
//!     // Idempotent, fetches the API key on the first invocation only
//!     emitter
//!         .init(
//!             MyS3Fetcher::new(),
//!             "my-secrets-bucket",
//!             "datadog_api_key.json",
//!             FunctionContext::from(&event.context),
//!         )
//!         .await?;
//!
//!     // Do something important
//!
//!     emitter.increment("requests", 1.0, &["method:default"], None)?;
//!
//!     Ok(Response {})
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
//!         .with_target(false)
//!         .without_time()
//!         .compact()
//!         .init();
//!
//!     let emitter = Emitter::new(MyDatadogClient::new()).into_static();
//!
//!     run(emitter, move |event| function_handler(emitter, event)).await
//! }
//! ```
//!
//! # Advanced Usage
//!
//! If you're building a more sophisticated [tower] stack, or want the cold
//! start and invocation counters, use [MetricsService] instead

use super::emitter::Emitter;
use super::error::Error;
use super::tags::FunctionContext;
use futures::future::BoxFuture;
use lambda_runtime::LambdaEvent;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::error;

impl From<&lambda_runtime::Context> for FunctionContext {
    fn from(context: &lambda_runtime::Context) -> Self {
        Self::new(
            context.env_config.function_name.clone(),
            context.invoked_function_arn.clone(),
        )
    }
}

/// [tower::Service] for automatically [flushing](Emitter::flush) after each
/// request
///
/// The flush only happens once the emitter has initialized; invocations
/// that complete before then leave their calls buffered and return without
/// waiting.
///
/// For composing your own [tower] stacks to input into the Rust Lambda Runtime
pub struct MetricsService<S> {
    emitter: &'static Emitter,
    inner: S,
    cold_start_metric: Option<&'static str>,
    invocation_metric: Option<&'static str>,
}

impl<S> MetricsService<S> {
    /// Constructs a new [MetricsService] with the given [Emitter] and inner
    /// [`tower::Service<LambdaEvent<Request>>`] to wrap
    pub fn new<Request>(emitter: &'static Emitter, inner: S) -> MetricsService<S>
    where
        S: tower::Service<LambdaEvent<Request>>,
    {
        Self {
            emitter,
            inner,
            cold_start_metric: None,
            invocation_metric: None,
        }
    }

    /// Increments a counter with the given key once to mark a cold start
    pub fn with_cold_start_metric(mut self, key: &'static str) -> Self {
        self.cold_start_metric = Some(key);
        self
    }

    /// Increments a counter with the given key on every invocation
    pub fn with_invocation_metric(mut self, key: &'static str) -> Self {
        self.invocation_metric = Some(key);
        self
    }
}

impl<S, Request> tower::Service<LambdaEvent<Request>> for MetricsService<S>
where
    S: tower::Service<LambdaEvent<Request>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsServiceFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: LambdaEvent<Request>) -> Self::Future {
        if let Some(key) = self.cold_start_metric {
            static COLD_START: std::sync::Once = std::sync::Once::new();
            COLD_START.call_once(|| {
                let _ = self.emitter.increment(key, 1.0, &[], None);
            });
        }
        if let Some(key) = self.invocation_metric {
            let _ = self.emitter.increment(key, 1.0, &[], None);
        }

        // Wrap the inner Future so we can flush after it's done
        MetricsServiceFuture {
            emitter: self.emitter,
            inner: self.inner.call(req),
            flush: None,
            output: None,
        }
    }
}

#[pin_project]
#[doc(hidden)]
pub struct MetricsServiceFuture<F: Future> {
    emitter: &'static Emitter,
    #[pin]
    inner: F,
    flush: Option<BoxFuture<'static, Result<(), Error>>>,
    output: Option<F::Output>,
}

impl<F: Future> Future for MetricsServiceFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.output.is_none() {
            match this.inner.poll(cx) {
                Poll::Ready(output) => {
                    *this.output = Some(output);
                    // Flush our metrics after the inner service is finished,
                    // unless initialization never happened
                    if this.emitter.is_ready() {
                        let emitter: &'static Emitter = *this.emitter;
                        *this.flush = Some(Box::pin(emitter.flush()));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        if let Some(flush) = this.flush.as_mut() {
            match flush.as_mut().poll(cx) {
                Poll::Ready(result) => {
                    if let Err(e) = result {
                        error!("failed to flush metrics after invocation: {e}");
                    }
                    *this.flush = None;
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        Poll::Ready(this.output.take().expect("polled after completion"))
    }
}

/// Helpers for starting the Lambda Rust runtime with a [tower::Service] wrapped by a [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod service {

    use super::*;

    /// Start the Lambda Rust runtime with a given [`tower::Service<LambdaEvent<Request>>`]
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run<S, Request, Response>(
        emitter: &'static Emitter,
        inner: S,
    ) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<LambdaEvent<Request>, Response = Response>,
        S::Future: std::future::Future<Output = Result<Response, S::Error>>,
        S::Error: Into<lambda_runtime::Diagnostic> + std::fmt::Debug,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new::<Request>(emitter, inner)).await
    }

    /// Start the Lambda Rust runtime with a given [tower::Service<lambda_http::Request>]
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run_http<'a, R, S, E>(
        emitter: &'static Emitter,
        inner: S,
    ) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<lambda_http::Request, Response = R, Error = E>,
        S::Future: Send + 'a,
        R: lambda_http::IntoResponse,
        E: Into<lambda_runtime::Diagnostic> + std::fmt::Debug,
    {
        run(emitter, lambda_http::Adapter::from(inner)).await
    }
}

/// Helpers for starting the Lambda Rust runtime with a handler function wrapped by the [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod handler {

    use super::*;

    /// Start the Lambda Rust runtime with a given [LambdaEvent] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run<T, F, Request, Response>(
        emitter: &'static Emitter,
        handler: T,
    ) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(LambdaEvent<Request>) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>>,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new::<Request>(
            emitter,
            lambda_runtime::service_fn(handler),
        ))
        .await
    }

    /// Start the Lambda Rust runtime with a given [lambda_http::Request] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run_http<'a, T, F, Response>(
        emitter: &'static Emitter,
        handler: T,
    ) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(lambda_http::Request) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>> + Send + 'a,
        Response: lambda_http::IntoResponse,
    {
        super::service::run(emitter, lambda_http::Adapter::from(lambda_http::service_fn(handler)))
            .await
    }
}
