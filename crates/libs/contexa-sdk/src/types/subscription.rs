use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SubscriptionState {
    Requested,
    Active,
    Removed,
    Failed,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Removed | Self::Failed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub event_name: String,
    pub identifier: String,
    #[serde(default)]
    pub webhook_id: Option<String>,
    #[serde(default = "active_state")]
    pub state: SubscriptionState,
}

fn active_state() -> SubscriptionState {
    SubscriptionState::Active
}

impl Subscription {
    pub fn new(
        event_name: impl Into<String>,
        identifier: impl Into<String>,
        webhook_id: Option<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            identifier: identifier.into(),
            webhook_id,
            state: SubscriptionState::Requested,
        }
    }

    pub fn with_state(mut self, state: SubscriptionState) -> Self {
        self.state = state;
        self
    }
}

/// What an event still needs before it can be subscribed to.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MissingData {
    pub event_name: String,
    #[serde(default)]
    pub missing_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub missing_permissions: BTreeSet<String>,
    #[serde(default)]
    pub details: JsonValue,
}

impl MissingData {
    pub fn is_satisfied(&self) -> bool {
        self.missing_capabilities.is_empty() && self.missing_permissions.is_empty()
    }
}

/// Point-in-time snapshot returned by `get_user_situation`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserSituation {
    pub timestamp: i64,
    pub current: JsonValue,
    #[serde(default)]
    pub previous: Option<JsonValue>,
    #[serde(default)]
    pub next: Option<JsonValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub accepted: bool,
    #[serde(default)]
    pub reference: Option<String>,
}
