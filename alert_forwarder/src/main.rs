use alert_forwarder::{AlertForwarder, ForwarderConfig, SnsNotifier};
use lambda_runtime::{run, service_fn, Error};
use std::env;
use std::sync::Arc;

const TRACING_DEBUG: &str = "TRACING_DEBUG";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let tracing_result = env::var(TRACING_DEBUG);
    tracing_subscriber::fmt()
        .with_max_level(if let Ok(_) = tracing_result {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let config = ForwarderConfig::from_env();
    let notifier = SnsNotifier::from_config(&config).await;
    let forwarder = Arc::new(AlertForwarder::new(config, notifier));

    run(service_fn(move |event| {
        let forwarder = Arc::clone(&forwarder);
        async move { forwarder.handle(event).await }
    }))
    .await
}
