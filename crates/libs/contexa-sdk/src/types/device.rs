use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeviceDescriptor {
    pub name: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub extensions: BTreeMap<String, JsonValue>,
}

/// Result of a completed device-picker flow.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LinkedDevice {
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}
