mod sns;

pub use sns::{Notifier, SnsNotifier};

use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fmt::{Display, Formatter};
use tracing::{debug, error, info};

const SNS_TOPIC_ARN: &str = "SNS_TOPIC_ARN";
const SNS_ENDPOINT: &str = "SNS_ENDPOINT";

pub const ALERT_SUBJECT: &str = "[SECURITY ALERT] Root Login Detected";
pub const SUCCESS_BODY: &str = "Security alert sent successfully!";
pub const FAILURE_BODY: &str = "Error in Lambda function";

/// Settings read once per process and shared by every invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwarderConfig {
    pub topic_arn: Option<String>,
    pub sns_endpoint: Option<String>
}

impl ForwarderConfig {
    pub fn from_env() -> ForwarderConfig {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> ForwarderConfig {
        Self {
            topic_arn: lookup(SNS_TOPIC_ARN),
            sns_endpoint: lookup(SNS_ENDPOINT).filter(|e| !e.is_empty())
        }
    }
}

#[derive(Debug)]
pub enum ForwardError {
    Extraction(String),
    Publish(String),
    Unexpected(String)
}

impl std::error::Error for ForwardError {}

impl Display for ForwardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::Extraction(reason) => write!(f, "could not extract alert fields: {}", reason),
            ForwardError::Publish(reason) => write!(f, "could not publish alert: {}", reason),
            ForwardError::Unexpected(reason) => write!(f, "{}", reason)
        }
    }
}

#[derive(Deserialize)]
struct AuditEvent {
    detail: AuditDetail
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditDetail {
    user_identity: UserIdentity,
    event_name: String,
    #[serde(rename = "sourceIPAddress")]
    source_ip_address: String,
    event_time: String
}

#[derive(Deserialize)]
struct UserIdentity {
    #[serde(rename = "type")]
    r#type: String
}

/// The four audit fields an alert is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct RootActivity {
    pub identity_type: String,
    pub event_name: String,
    pub source_ip: String,
    pub event_time: String
}

impl RootActivity {
    /// Decodes all four fields or none of them.
    pub fn from_event(event: &Value) -> Result<RootActivity, ForwardError> {
        let audit = AuditEvent::deserialize(event)
            .map_err(|e| ForwardError::Extraction(e.to_string()))?;
        Ok(Self {
            identity_type: audit.detail.user_identity.r#type,
            event_name: audit.detail.event_name,
            source_ip: audit.detail.source_ip_address,
            event_time: audit.detail.event_time
        })
    }

    pub fn alert_message(&self) -> String {
        format!("
        AWS Security Alert

        Suspicious activity detected in your AWS account!

        • Event: {}
        • Identity Type: {}
        • Source IP: {}
        • Time: {}

        Review this activity immediately.
        ",
            self.event_name,
            self.identity_type,
            self.source_ip,
            self.event_time
        )
    }
}

/// What the function hands back to Lambda. `body` is itself JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: String
}

impl InvocationResult {
    fn success() -> Result<InvocationResult, ForwardError> {
        let body = serde_json::to_string(SUCCESS_BODY)
            .map_err(|e| ForwardError::Unexpected(e.to_string()))?;
        Ok(Self { status_code: 200, body })
    }

    fn failure() -> InvocationResult {
        Self {
            status_code: 500,
            body: Value::from(FAILURE_BODY).to_string()
        }
    }
}

pub struct AlertForwarder<N> {
    config: ForwarderConfig,
    notifier: N
}

impl<N: Notifier> AlertForwarder<N> {
    pub fn new(config: ForwarderConfig, notifier: N) -> AlertForwarder<N> {
        Self { config, notifier }
    }

    /// Never fails: every error is logged and turned into a 500 result.
    pub async fn handle(&self, event: LambdaEvent<Value>) -> Result<InvocationResult, Error> {
        let (payload, context) = event.into_parts();
        info!("Received event: {}", payload);
        debug!("request id {}", context.request_id);
        match self.forward(&payload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Error processing event: {}", e);
                Ok(InvocationResult::failure())
            }
        }
    }

    async fn forward(&self, payload: &Value) -> Result<InvocationResult, ForwardError> {
        let activity = RootActivity::from_event(payload)?;
        let message = activity.alert_message();
        info!("Alert message composed.");

        let message_id = self.notifier
            .publish(self.config.topic_arn.as_deref(), ALERT_SUBJECT, &message)
            .await?;
        info!("SNS alert sent successfully.");
        debug!("sns message id {:?}", message_id);

        InvocationResult::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_login() -> Value {
        json!({
            "detail": {
                "userIdentity": {"type": "Root"},
                "eventName": "ConsoleLogin",
                "sourceIPAddress": "203.0.113.5",
                "eventTime": "2024-01-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn test_extracts_fields() {
        let activity = RootActivity::from_event(&root_login()).unwrap();
        assert_eq!(activity, RootActivity {
            identity_type: String::from("Root"),
            event_name: String::from("ConsoleLogin"),
            source_ip: String::from("203.0.113.5"),
            event_time: String::from("2024-01-01T00:00:00Z")
        });
    }

    #[test]
    fn test_ignores_extra_fields() {
        let mut event = root_login();
        event["detail"]["awsRegion"] = json!("us-east-1");
        event["detail-type"] = json!("AWS Console Sign In via CloudTrail");
        assert!(RootActivity::from_event(&event).is_ok());
    }

    #[test]
    fn test_missing_any_field_fails() {
        for path in [
            vec!["userIdentity", "type"],
            vec!["userIdentity"],
            vec!["eventName"],
            vec!["sourceIPAddress"],
            vec!["eventTime"]
        ] {
            let mut event = root_login();
            let (last, parents) = path.split_last().unwrap();
            let mut node = &mut event["detail"];
            for p in parents {
                node = &mut node[*p];
            }
            node.as_object_mut().unwrap().remove(*last);
            match RootActivity::from_event(&event) {
                Err(ForwardError::Extraction(_)) => {},
                other => panic!("expected extraction error for {:?}, got {:?}", path, other)
            }
        }
    }

    #[test]
    fn test_wrong_shape_fails() {
        for event in [json!({}), json!({"detail": {}}), json!({"detail": "x"}), json!([1, 2])] {
            assert!(matches!(RootActivity::from_event(&event), Err(ForwardError::Extraction(_))));
        }
        let mut event = root_login();
        event["detail"]["eventName"] = json!(42);
        assert!(matches!(RootActivity::from_event(&event), Err(ForwardError::Extraction(_))));
    }

    #[test]
    fn test_alert_message_layout() {
        let message = RootActivity::from_event(&root_login()).unwrap().alert_message();
        let lines: Vec<&str> = message.lines().map(str::trim).collect();
        assert_eq!(lines, vec![
            "",
            "AWS Security Alert",
            "",
            "Suspicious activity detected in your AWS account!",
            "",
            "• Event: ConsoleLogin",
            "• Identity Type: Root",
            "• Source IP: 203.0.113.5",
            "• Time: 2024-01-01T00:00:00Z",
            "",
            "Review this activity immediately.",
            ""
        ]);
        assert!(message.starts_with("\n        AWS Security Alert\n"));
    }

    #[test]
    fn test_result_bodies_are_json_strings() {
        let ok = InvocationResult::success().unwrap();
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.body, "\"Security alert sent successfully!\"");
        let failed = InvocationResult::failure();
        assert_eq!(failed.status_code, 500);
        assert_eq!(failed.body, "\"Error in Lambda function\"");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"statusCode": 500, "body": "\"Error in Lambda function\""})
        );
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ForwarderConfig::from_lookup(|key| match key {
            SNS_TOPIC_ARN => Some(String::from("arn:aws:sns:us-east-1:123456789012:alerts")),
            SNS_ENDPOINT => Some(String::new()),
            _ => None
        });
        assert_eq!(config.topic_arn.as_deref(), Some("arn:aws:sns:us-east-1:123456789012:alerts"));
        assert_eq!(config.sns_endpoint, None);
        assert_eq!(ForwarderConfig::from_lookup(|_| None), ForwarderConfig::default());
    }
}
