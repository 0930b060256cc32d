use crate::error::SdkError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LoginScreen {
    #[default]
    Standard,
    Minimal,
}

/// Optional hints forwarded to the login flow.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginHints {
    /// Phone number including the country code; skips the phone entry step.
    pub phone: Option<String>,
    #[serde(default)]
    pub login_screen: LoginScreen,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PermissionRequest {
    permissions: Vec<String>,
    hints: LoginHints,
    #[serde(default)]
    extra_info: BTreeMap<String, JsonValue>,
}

impl PermissionRequest {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            hints: LoginHints::default(),
            extra_info: BTreeMap::new(),
        }
    }

    pub fn with_hints(mut self, hints: LoginHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_extra_info(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra_info.insert(key.into(), value);
        self
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn hints(&self) -> &LoginHints {
        &self.hints
    }

    pub fn extra_info(&self) -> &BTreeMap<String, JsonValue> {
        &self.extra_info
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        if self.permissions.is_empty() {
            return Err(SdkError::invalid_argument("at least one permission must be requested"));
        }
        let mut seen = BTreeSet::new();
        for permission in &self.permissions {
            let trimmed = permission.trim();
            if trimmed.is_empty() {
                return Err(SdkError::invalid_argument("permission names must not be empty"));
            }
            if !seen.insert(trimmed) {
                return Err(SdkError::invalid_argument(format!(
                    "permission '{trimmed}' is requested more than once"
                )));
            }
        }
        if let Some(phone) = &self.hints.phone {
            if !phone.trim_start().starts_with('+') {
                return Err(SdkError::invalid_argument(
                    "phone hint must include the country code (e.g. +15551234567)",
                ));
            }
        }
        Ok(())
    }
}

/// Token handed back by a successful `authenticate`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionDescriptor {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Service reply to the credential exchange.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct AuthGrantResponse {
    pub token: String,
    #[serde(default)]
    pub granted_permissions: Vec<String>,
}
