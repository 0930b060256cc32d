use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed domain carried by every environment error notice.
pub const ERROR_DOMAIN: &str = "com.contexa.sdk.error";

pub mod code {
    pub const NOT_CONFIGURED: &str = "SDK_SESSION_NOT_CONFIGURED";
    pub const NOT_AUTHENTICATED: &str = "SDK_SESSION_NOT_AUTHENTICATED";
    pub const AUTHENTICATION_IN_PROGRESS: &str = "SDK_SESSION_AUTHENTICATION_IN_PROGRESS";
    pub const DUPLICATE_SUBSCRIPTION: &str = "SDK_SUBSCRIPTION_DUPLICATE";
    pub const DATA_MISSING: &str = "SDK_SUBSCRIPTION_DATA_MISSING";
    pub const INVALID_CAPABILITY: &str = "SDK_CATALOG_INVALID_CAPABILITY";
    pub const MODE_CONFLICT: &str = "SDK_PUSH_MODE_CONFLICT";
    pub const INVALID_ARGUMENT: &str = "SDK_VALIDATION_INVALID_ARGUMENT";
    pub const DISMISSED: &str = "SDK_PRESENTATION_DISMISSED";
    pub const CANCELLED: &str = "SDK_OPERATION_CANCELLED";
    pub const NOT_FOUND: &str = "SDK_SERVICE_NOT_FOUND";
    pub const REJECTED: &str = "SDK_SERVICE_REJECTED";
    pub const TRANSPORT: &str = "SDK_TRANSPORT_ERROR";
    pub const DECODE: &str = "SDK_DECODE_ERROR";
    pub const ENVIRONMENT: &str = "SDK_ENVIRONMENT_ERROR";
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub enum ErrorCategory {
    Session,
    Validation,
    Subscription,
    Catalog,
    Push,
    Presentation,
    Service,
    Transport,
    Environment,
}

/// Environment and permission failures outside the SDK's control.
///
/// The numeric values are stable and shared with the push gateway.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u32", into = "u32")]
#[non_exhaustive]
pub enum SdkErrorCode {
    General,
    BluetoothDisabled,
    WiFiDisabled,
    CellularDataDisabled,
    LocationDataDisabled,
    MotionDataDisabled,
}

impl SdkErrorCode {
    pub const ALL: [SdkErrorCode; 6] = [
        Self::General,
        Self::BluetoothDisabled,
        Self::WiFiDisabled,
        Self::CellularDataDisabled,
        Self::LocationDataDisabled,
        Self::MotionDataDisabled,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            Self::General => 1000,
            Self::BluetoothDisabled => 1001,
            Self::WiFiDisabled => 1002,
            Self::CellularDataDisabled => 1003,
            Self::LocationDataDisabled => 1004,
            Self::MotionDataDisabled => 1005,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u32() == value)
    }

    /// Lenient mapping used for inbound notices: unknown values become `General`.
    pub fn from_u32_or_general(value: u32) -> Self {
        Self::from_u32(value).unwrap_or(Self::General)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::BluetoothDisabled => "bluetooth_disabled",
            Self::WiFiDisabled => "wifi_disabled",
            Self::CellularDataDisabled => "cellular_data_disabled",
            Self::LocationDataDisabled => "location_data_disabled",
            Self::MotionDataDisabled => "motion_data_disabled",
        }
    }
}

impl From<SdkErrorCode> for u32 {
    fn from(value: SdkErrorCode) -> Self {
        value.as_u32()
    }
}

impl TryFrom<u32> for SdkErrorCode {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or_else(|| format!("unknown sdk error code {value}"))
    }
}

impl std::fmt::Display for SdkErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_u32())
    }
}

/// Errors resolved by every SDK operation.
///
/// `Display` is the human-readable message handed back to the host app.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Error)]
#[non_exhaustive]
pub enum SdkError {
    #[error("sdk is not configured: call configure(app_id, app_secret) first")]
    NotConfigured,

    #[error("no authenticated user session")]
    NotAuthenticated,

    #[error("an authentication flow is already in progress")]
    AuthenticationInProgress,

    #[error("subscription identifier '{identifier}' is already registered")]
    DuplicateSubscription { identifier: String },

    #[error("event '{event_name}' is missing required data")]
    DataMissing { event_name: String },

    #[error("capability '{capability}' is not a supported capability")]
    InvalidCapability { capability: String },

    #[error("push integration mode conflict: {message}")]
    ModeConflict { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{flow} was dismissed by the user")]
    Dismissed { flow: String },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("could not decode service response: {message}")]
    Decode { message: String },

    #[error("environment error {code}: {message}")]
    Environment { code: SdkErrorCode, message: String },
}

impl SdkError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => code::NOT_CONFIGURED,
            Self::NotAuthenticated => code::NOT_AUTHENTICATED,
            Self::AuthenticationInProgress => code::AUTHENTICATION_IN_PROGRESS,
            Self::DuplicateSubscription { .. } => code::DUPLICATE_SUBSCRIPTION,
            Self::DataMissing { .. } => code::DATA_MISSING,
            Self::InvalidCapability { .. } => code::INVALID_CAPABILITY,
            Self::ModeConflict { .. } => code::MODE_CONFLICT,
            Self::InvalidArgument { .. } => code::INVALID_ARGUMENT,
            Self::Dismissed { .. } => code::DISMISSED,
            Self::Cancelled { .. } => code::CANCELLED,
            Self::NotFound { .. } => code::NOT_FOUND,
            Self::Rejected { .. } => code::REJECTED,
            Self::Transport { .. } => code::TRANSPORT,
            Self::Decode { .. } => code::DECODE,
            Self::Environment { .. } => code::ENVIRONMENT,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConfigured | Self::NotAuthenticated | Self::AuthenticationInProgress => {
                ErrorCategory::Session
            }
            Self::InvalidArgument { .. } => ErrorCategory::Validation,
            Self::DuplicateSubscription { .. } | Self::DataMissing { .. } => {
                ErrorCategory::Subscription
            }
            Self::InvalidCapability { .. } => ErrorCategory::Catalog,
            Self::ModeConflict { .. } => ErrorCategory::Push,
            Self::Dismissed { .. } | Self::Cancelled { .. } => ErrorCategory::Presentation,
            Self::NotFound { .. } | Self::Rejected { .. } | Self::Decode { .. } => {
                ErrorCategory::Service
            }
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Environment { .. } => ErrorCategory::Environment,
        }
    }

    /// Returns `true` for transient errors that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors the user (not the integrator) has to act on.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::DataMissing { .. }
                | Self::Dismissed { .. }
                | Self::Environment { .. }
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn mode_conflict(message: impl Into<String>) -> Self {
        Self::ModeConflict { message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled { operation: operation.into() }
    }
}
