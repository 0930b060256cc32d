//! Interactive flows the host renders on the SDK's behalf.

use crate::error::SdkError;
use crate::error_bus::ErrorBatch;
use crate::types::PermissionRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "flow", rename_all = "snake_case")]
#[non_exhaustive]
pub enum PresentationFlow {
    /// Collect user credentials; completes with the grant to exchange.
    Login { app_id: String, request: PermissionRequest },
    SettingsPanel { permissions: Vec<String> },
    /// Completes with a `LinkedDevice`.
    DevicePicker { capability: Option<String>, device_name: Option<String> },
    /// Default popup for environment errors. The outcome is ignored.
    ErrorNotice { batch: ErrorBatch },
}

impl PresentationFlow {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::SettingsPanel { .. } => "settings_panel",
            Self::DevicePicker { .. } => "device_picker",
            Self::ErrorNotice { .. } => "error_notice",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum PresentationOutcome {
    Completed(JsonValue),
    Dismissed,
}

impl PresentationOutcome {
    /// Decodes a completed flow, mapping a dismissal to `SdkError::Dismissed`.
    pub(crate) fn into_completed<T: serde::de::DeserializeOwned>(
        self,
        flow: &'static str,
    ) -> Result<T, SdkError> {
        match self {
            Self::Completed(value) => serde_json::from_value(value)
                .map_err(|err| SdkError::decode(format!("{flow} result: {err}"))),
            Self::Dismissed => Err(SdkError::Dismissed { flow: flow.to_owned() }),
        }
    }
}

#[async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, flow: PresentationFlow) -> Result<PresentationOutcome, SdkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkedDevice;
    use serde_json::json;

    #[test]
    fn completed_outcome_decodes() {
        let outcome = PresentationOutcome::Completed(json!({
            "name": "Band",
            "capabilities": ["heart_rate"],
        }));
        let device: LinkedDevice = outcome.into_completed("device_picker").expect("device");
        assert_eq!(device.name, "Band");
        assert!(device.capabilities.contains("heart_rate"));
    }

    #[test]
    fn dismissal_maps_to_error() {
        let err = PresentationOutcome::Dismissed
            .into_completed::<LinkedDevice>("device_picker")
            .expect_err("dismissed");
        assert_eq!(err, SdkError::Dismissed { flow: "device_picker".into() });
        assert_eq!(err.to_string(), "device_picker was dismissed by the user");
    }

    #[test]
    fn flows_serialize_with_tag() {
        let flow =
            PresentationFlow::DevicePicker { capability: Some("steps".into()), device_name: None };
        assert_eq!(flow.name(), "device_picker");
        let value = serde_json::to_value(&flow).expect("serialize");
        assert_eq!(value["flow"], "device_picker");
        assert_eq!(value["capability"], "steps");
    }
}
