use lambda_runtime::{Error, LambdaEvent};
use metrics_datadog_lambda::lambda::handler::run;
use metrics_datadog_lambda::{
    ClientConfig, Emitter, FlushCallback, FunctionContext, InitOptions, MetricsClient,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Deserialize)]
struct Request {}

#[derive(Serialize)]
struct Response {
    req_id: String,
}

/// Writes metrics to stdout in the Datadog log line format, for the
/// forwarder to pick out of CloudWatch Logs
struct StdoutClient {
    config: Mutex<Option<ClientConfig>>,
}

impl StdoutClient {
    fn new() -> Self {
        Self {
            config: Mutex::new(None),
        }
    }

    fn line(&self, kind: &str, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        let config = self.config.lock().unwrap();
        let Some(config) = config.as_ref() else { return };

        let seconds = timestamp.map(|millis| millis / 1000).unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
        });
        let tags = config
            .default_tags
            .iter()
            .map(String::as_str)
            .chain(tags.iter().copied())
            .collect::<Vec<_>>()
            .join(",");

        println!(
            "MONITORING|{seconds}|{value}|{kind}|{}{key}|#{tags}",
            config.prefix
        );
    }
}

impl MetricsClient for StdoutClient {
    fn init(&self, config: ClientConfig) {
        *self.config.lock().unwrap() = Some(config);
    }

    fn gauge(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.line("gauge", key, value, tags, timestamp);
    }

    fn increment(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.line("count", key, value, tags, timestamp);
    }

    fn histogram(&self, key: &str, value: f64, tags: &[&str], timestamp: Option<u64>) {
        self.line("histogram", key, value, tags, timestamp);
    }

    fn flush(&self, done: FlushCallback) {
        // stdout lines are already out the door
        done(Ok(()))
    }
}

async fn function_handler(
    emitter: &'static Emitter,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let started = Instant::now();

    // Buffered on the cold start invocation, forwarded directly afterwards
    metrics::counter!("requests", "method" => "default").increment(1);

    let mut options = InitOptions::new()
        .prefix("demo.")
        .context(FunctionContext::from(&event.context));
    if let Ok(api_key) = std::env::var("DD_API_KEY") {
        options = options.api_key(api_key);
    }
    emitter.init_advanced(options).await?;

    // Do something important

    emitter.histogram(
        "handler_time_ms",
        started.elapsed().as_secs_f64() * 1000.0,
        &[],
        None,
    )?;

    Ok(Response {
        req_id: event.context.request_id.clone(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let emitter = Emitter::new(StdoutClient::new()).into_static();
    metrics_datadog_lambda::recorder::install(emitter).unwrap();

    run(emitter, move |event| function_handler(emitter, event)).await
}
