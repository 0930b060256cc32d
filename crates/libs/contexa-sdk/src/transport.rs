//! Service transport seam and the client-side response envelope.
//!
//! Adapters own the wire format. They must hand back a JSON body shaped as
//! `{"data": ..., "errors": [...]}` on success and
//! `{"message": "...", "errors": [...]}` on failure.

use crate::error::SdkError;
use crate::error_bus::ErrorNotice;
use crate::types::{LoginHints, MissingData};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ApiRequest {
    Authenticate {
        grant: JsonValue,
        permissions: Vec<String>,
        hints: LoginHints,
        #[serde(default)]
        extra_info: BTreeMap<String, JsonValue>,
    },
    Permissions,
    Subscriptions,
    SupportedDevices,
    SupportedCapabilities,
    HasDevice {
        capability: String,
    },
    MissingData {
        event_name: String,
    },
    Subscribe {
        event_name: String,
        identifier: String,
        webhook_id: Option<String>,
    },
    Unsubscribe {
        identifier: String,
    },
    UserSituation {
        timestamp: i64,
        contextual: bool,
    },
    Feedback {
        event_id: String,
        approved: bool,
    },
    UploadLogs {
        records: Vec<JsonValue>,
    },
}

impl ApiRequest {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Permissions => "permissions",
            Self::Subscriptions => "subscriptions",
            Self::SupportedDevices => "supported_devices",
            Self::SupportedCapabilities => "supported_capabilities",
            Self::HasDevice { .. } => "has_device",
            Self::MissingData { .. } => "missing_data",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::UserSituation { .. } => "user_situation",
            Self::Feedback { .. } => "feedback",
            Self::UploadLogs { .. } => "upload_logs",
        }
    }

    fn resource(&self) -> String {
        match self {
            Self::Unsubscribe { identifier } | Self::Subscribe { identifier, .. } => {
                format!("subscription '{identifier}'")
            }
            Self::MissingData { event_name } => format!("event '{event_name}'"),
            Self::Feedback { event_id, .. } => format!("event instance '{event_id}'"),
            Self::HasDevice { capability } => format!("capability '{capability}'"),
            other => other.op().to_owned(),
        }
    }
}

/// One request with the credentials it travels with.
#[derive(Clone, PartialEq)]
pub struct ApiCall {
    pub app_id: String,
    pub app_secret: String,
    pub user_token: Option<String>,
    pub request: ApiRequest,
}

impl std::fmt::Debug for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCall")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("user_token", &self.user_token.as_ref().map(|_| "<redacted>"))
            .field("request", &self.request.op())
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    #[serde(default)]
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self { status_code: 200, body: serde_json::json!({ "data": data }) }
    }

    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code, body: serde_json::json!({ "message": message.into() }) }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Failures below the service protocol: the request never got an answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("tls failure: {message}")]
    Tls { message: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. } | Self::Connection { .. })
    }
}

impl From<TransportError> for SdkError {
    fn from(err: TransportError) -> Self {
        SdkError::Transport { retryable: err.is_retryable(), message: err.to_string() }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: ApiCall) -> Result<ApiResponse, TransportError>;
}

/// Decoded service answer plus any environment notices it carried.
#[derive(Debug)]
pub(crate) struct ServiceReply<T> {
    pub result: Result<T, SdkError>,
    pub notices: Vec<ErrorNotice>,
}

#[derive(Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn decode_response<T: DeserializeOwned>(
    request: &ApiRequest,
    response: ApiResponse,
) -> ServiceReply<T> {
    let notices = ErrorNotice::parse_list(response.body.get("errors"));
    let result = if response.is_success() {
        let data = response.body.get("data").cloned().unwrap_or(JsonValue::Null);
        serde_json::from_value(data).map_err(|err| {
            SdkError::decode(format!("{} response: {err}", request.op()))
        })
    } else {
        Err(map_failure(request, response, &notices))
    };
    ServiceReply { result, notices }
}

/// A failure carrying environment notices resolves as the first notice's
/// environment error unless the status has a dedicated mapping.
fn map_failure(request: &ApiRequest, response: ApiResponse, notices: &[ErrorNotice]) -> SdkError {
    let message = serde_json::from_value::<FailureBody>(response.body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("{} failed", request.op()));
    match (response.status_code, request) {
        (401, _) => SdkError::NotAuthenticated,
        (404, _) => SdkError::NotFound { resource: request.resource() },
        (409, ApiRequest::Subscribe { identifier, .. }) => {
            SdkError::DuplicateSubscription { identifier: identifier.clone() }
        }
        (status, _) => match notices.first() {
            Some(notice) => SdkError::from(notice),
            None => SdkError::Rejected { status, message },
        },
    }
}

/// `get_missing_data` answers may omit the event name; fill it from the request.
pub(crate) fn normalize_missing_data(event_name: &str, mut missing: MissingData) -> MissingData {
    if missing.event_name.is_empty() {
        missing.event_name = event_name.to_owned();
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkErrorCode;
    use serde_json::json;

    fn subscribe_request() -> ApiRequest {
        ApiRequest::Subscribe {
            event_name: "user.arrived".into(),
            identifier: "sub1".into(),
            webhook_id: None,
        }
    }

    #[test]
    fn request_is_tagged_by_op() {
        let value = serde_json::to_value(subscribe_request()).expect("serialize");
        assert_eq!(value["op"], "subscribe");
        assert_eq!(value["identifier"], "sub1");
        let unit = serde_json::to_value(ApiRequest::SupportedDevices).expect("serialize");
        assert_eq!(unit, json!({ "op": "supported_devices" }));
    }

    #[test]
    fn success_decodes_data_and_notices() {
        let response = ApiResponse {
            status_code: 200,
            body: json!({
                "data": ["a", "b"],
                "errors": [{ "code": 1004, "message": "location off" }],
            }),
        };
        let reply: ServiceReply<Vec<String>> =
            decode_response(&ApiRequest::SupportedCapabilities, response);
        assert_eq!(reply.result.expect("data"), vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(reply.notices.len(), 1);
        assert_eq!(reply.notices[0].code, SdkErrorCode::LocationDataDisabled);
    }

    #[test]
    fn status_codes_map_to_errors() {
        let reply: ServiceReply<JsonValue> =
            decode_response(&ApiRequest::Permissions, ApiResponse::failure(401, "expired"));
        assert_eq!(reply.result.expect_err("401"), SdkError::NotAuthenticated);

        let reply: ServiceReply<JsonValue> =
            decode_response(&subscribe_request(), ApiResponse::failure(409, "exists"));
        assert_eq!(
            reply.result.expect_err("409"),
            SdkError::DuplicateSubscription { identifier: "sub1".into() }
        );

        let unsubscribe = ApiRequest::Unsubscribe { identifier: "gone".into() };
        let reply: ServiceReply<JsonValue> =
            decode_response(&unsubscribe, ApiResponse::failure(404, "nope"));
        assert!(matches!(reply.result, Err(SdkError::NotFound { .. })));

        let reply: ServiceReply<JsonValue> =
            decode_response(&ApiRequest::Permissions, ApiResponse::failure(409, "conflict"));
        assert_eq!(
            reply.result.expect_err("409 outside subscribe"),
            SdkError::Rejected { status: 409, message: "conflict".into() }
        );
    }

    #[test]
    fn failure_with_notices_is_an_environment_error() {
        let response = ApiResponse {
            status_code: 403,
            body: json!({
                "message": "sensors unavailable",
                "errors": [
                    { "code": 1001, "message": "bluetooth is off" },
                    { "code": 1004, "message": "location is off" },
                ],
            }),
        };
        let reply: ServiceReply<JsonValue> = decode_response(&ApiRequest::Permissions, response);
        assert_eq!(reply.notices.len(), 2);
        let err = reply.result.expect_err("403");
        assert_eq!(
            err,
            SdkError::Environment {
                code: SdkErrorCode::BluetoothDisabled,
                message: "bluetooth is off".into(),
            }
        );
        assert_eq!(err.category(), crate::error::ErrorCategory::Environment);

        let response = ApiResponse {
            status_code: 401,
            body: json!({ "errors": [{ "code": 1001 }] }),
        };
        let reply: ServiceReply<JsonValue> = decode_response(&ApiRequest::Permissions, response);
        assert_eq!(reply.result.expect_err("401 keeps its mapping"), SdkError::NotAuthenticated);
    }

    #[test]
    fn failure_without_message_gets_generic_text() {
        let response = ApiResponse { status_code: 500, body: JsonValue::Null };
        let reply: ServiceReply<JsonValue> = decode_response(&ApiRequest::Permissions, response);
        let err = reply.result.expect_err("500");
        assert_eq!(err, SdkError::Rejected { status: 500, message: "permissions failed".into() });
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_data_is_a_decode_error() {
        let reply: ServiceReply<Vec<String>> =
            decode_response(&ApiRequest::SupportedCapabilities, ApiResponse::ok(json!(42)));
        assert!(matches!(reply.result, Err(SdkError::Decode { .. })));
    }

    #[test]
    fn transport_errors_keep_retryability() {
        let err: SdkError = TransportError::Timeout { operation: "subscribe".into() }.into();
        assert!(err.is_retryable());
        let err: SdkError = TransportError::Tls { message: "bad cert".into() }.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn call_debug_redacts_credentials() {
        let call = ApiCall {
            app_id: "X".into(),
            app_secret: "secret-value".into(),
            user_token: Some("token-value".into()),
            request: ApiRequest::Permissions,
        };
        let rendered = format!("{call:?}");
        assert!(rendered.contains("X"));
        assert!(!rendered.contains("secret-value"));
        assert!(!rendered.contains("token-value"));
    }
}
