use crate::error::SdkError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_TELEMETRY_CAPACITY: usize = 256;

/// Behavior toggles set through `enable_features`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Features {
    /// The host handles environment errors itself; no default notice is presented.
    pub custom_error_notification: bool,
    /// Stop collecting and uploading SDK diagnostics.
    pub disable_sdk_logging: bool,
}

impl Features {
    pub const CUSTOM_ERROR_NOTIFICATION: u32 = 1 << 0;
    pub const DISABLE_SDK_LOGGING: u32 = 1 << 1;

    /// Builds the record from the legacy bitset. Unknown bits are ignored.
    pub fn from_bits(bits: u32) -> Self {
        Self {
            custom_error_notification: bits & Self::CUSTOM_ERROR_NOTIFICATION != 0,
            disable_sdk_logging: bits & Self::DISABLE_SDK_LOGGING != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.custom_error_notification {
            bits |= Self::CUSTOM_ERROR_NOTIFICATION;
        }
        if self.disable_sdk_logging {
            bits |= Self::DISABLE_SDK_LOGGING;
        }
        bits
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRequirementConfig {
    pub event: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// File-backed client settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SdkSettings {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default)]
    pub features: Features,
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,
    #[serde(default)]
    pub event_requirements: Vec<EventRequirementConfig>,
}

fn default_telemetry_capacity() -> usize {
    DEFAULT_TELEMETRY_CAPACITY
}

impl SdkSettings {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            features: Features::default(),
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            event_requirements: Vec::new(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        if self.app_id.trim().is_empty() {
            return Err(SdkError::invalid_argument("app_id must not be empty"));
        }
        if self.app_secret.trim().is_empty() {
            return Err(SdkError::invalid_argument("app_secret must not be empty"));
        }
        if self.telemetry_capacity == 0 {
            return Err(SdkError::invalid_argument("telemetry_capacity must be greater than zero"));
        }
        let mut seen = BTreeSet::new();
        for requirement in &self.event_requirements {
            let event = requirement.event.trim();
            if event.is_empty() {
                return Err(SdkError::invalid_argument("event requirement names must not be empty"));
            }
            if !seen.insert(event.to_owned()) {
                return Err(SdkError::invalid_argument(format!(
                    "event requirement '{event}' is declared more than once"
                )));
            }
        }
        Ok(())
    }
}
