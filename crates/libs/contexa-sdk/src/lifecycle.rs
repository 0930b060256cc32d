use crate::error::SdkError;
use serde::{Deserialize, Serialize};

/// Coarse session state derived from the credential store and the auth gate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionState {
    Unconfigured,
    LoggedOut,
    Authenticating,
    Authenticated,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::LoggedOut => "logged_out",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SdkMethod {
    Authenticate,
    OpenSettingsPanel,
    GetPermissions,
    GetSubscriptions,
    GetSupportedDevices,
    GetSupportedCapabilities,
    HasDeviceWithCapability,
    AddDevice,
    GetMissingData,
    Subscribe,
    Unsubscribe,
    GetUserSituation,
    SendFeedback,
    FlushTelemetry,
}

impl SdkMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::OpenSettingsPanel => "open_settings_panel",
            Self::GetPermissions => "get_permissions",
            Self::GetSubscriptions => "get_subscriptions",
            Self::GetSupportedDevices => "get_supported_devices",
            Self::GetSupportedCapabilities => "get_supported_capabilities",
            Self::HasDeviceWithCapability => "has_device_with_capability",
            Self::AddDevice => "add_device",
            Self::GetMissingData => "get_missing_data",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::GetUserSituation => "get_user_situation",
            Self::SendFeedback => "send_feedback",
            Self::FlushTelemetry => "flush_telemetry",
        }
    }

    pub fn requires_user(self) -> bool {
        !legal_states_for_method(self).contains(&SessionState::LoggedOut)
    }
}

pub fn ensure_method_legal(method: SdkMethod, state: SessionState) -> Result<(), SdkError> {
    if legal_states_for_method(method).contains(&state) {
        return Ok(());
    }
    match state {
        SessionState::Unconfigured => Err(SdkError::NotConfigured),
        SessionState::Authenticating if method == SdkMethod::Authenticate => {
            Err(SdkError::AuthenticationInProgress)
        }
        _ => Err(SdkError::NotAuthenticated),
    }
}

fn legal_states_for_method(method: SdkMethod) -> &'static [SessionState] {
    use SessionState as S;
    match method {
        SdkMethod::Authenticate => &[S::LoggedOut, S::Authenticated],
        SdkMethod::GetSupportedDevices
        | SdkMethod::GetSupportedCapabilities
        | SdkMethod::FlushTelemetry => &[S::LoggedOut, S::Authenticating, S::Authenticated],
        SdkMethod::OpenSettingsPanel
        | SdkMethod::GetPermissions
        | SdkMethod::GetSubscriptions
        | SdkMethod::HasDeviceWithCapability
        | SdkMethod::AddDevice
        | SdkMethod::GetMissingData
        | SdkMethod::Subscribe
        | SdkMethod::Unsubscribe
        | SdkMethod::GetUserSituation
        | SdkMethod::SendFeedback => &[S::Authenticated],
    }
}
