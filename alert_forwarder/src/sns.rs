use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_sns as sns;
use aws_sdk_sns::error::DisplayErrorContext;
use std::future::Future;
use tracing::debug;

use crate::{ForwardError, ForwarderConfig};

/// Destination for composed alerts.
///
/// Implementations make exactly one delivery attempt per call. A missing
/// topic is reported as a publish failure rather than skipped.
pub trait Notifier {
    /// Returns the backend's message id when it reports one.
    fn publish(
        &self,
        topic_arn: Option<&str>,
        subject: &str,
        message: &str,
    ) -> impl Future<Output = Result<Option<String>, ForwardError>> + Send;
}

pub struct SnsNotifier {
    client: sns::Client,
}

impl SnsNotifier {
    pub fn new(client: sns::Client) -> SnsNotifier {
        Self { client }
    }

    pub async fn from_config(config: &ForwarderConfig) -> SnsNotifier {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        debug!("sns region {:?}", sdk_config.region());
        let sns_config = match &config.sns_endpoint {
            Some(endpoint) => sns::config::Builder::from(&sdk_config).endpoint_url(endpoint).build(),
            None => sns::config::Builder::from(&sdk_config).build()
        };
        Self::new(sns::Client::from_conf(sns_config))
    }
}

impl Notifier for SnsNotifier {
    async fn publish(
        &self,
        topic_arn: Option<&str>,
        subject: &str,
        message: &str,
    ) -> Result<Option<String>, ForwardError> {
        // Rejected locally, nothing is sent without a topic.
        let topic_arn = topic_arn
            .ok_or_else(|| ForwardError::Publish(String::from("no topic arn configured")))?;
        let output = self.client.publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| ForwardError::Publish(DisplayErrorContext(&e).to_string()))?;
        Ok(output.message_id().map(str::to_owned))
    }
}

#[test]
fn test_missing_topic_is_a_publish_error() {
    let config = sns::Config::builder()
        .behavior_version(sns::config::BehaviorVersion::latest())
        .region(sns::config::Region::new("us-east-1"))
        .build();
    let notifier = SnsNotifier::new(sns::Client::from_conf(config));
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(notifier.publish(None, "subject", "message"));
    match result {
        Err(ForwardError::Publish(reason)) => assert_eq!(reason, "no topic arn configured"),
        other => panic!("expected publish error, got {:?}", other)
    }
}
