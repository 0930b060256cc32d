//! Local knowledge about devices, capabilities and event data requirements.

use crate::types::{DeviceDescriptor, EventRequirementConfig, MissingData};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use time::OffsetDateTime;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry<T> {
    pub items: Vec<T>,
    #[serde(with = "time::serde::rfc3339")]
    pub refreshed_at: OffsetDateTime,
}

impl<T> CatalogEntry<T> {
    fn now(items: Vec<T>) -> Self {
        Self { items, refreshed_at: OffsetDateTime::now_utc() }
    }
}

/// What an event needs before it can be subscribed to.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRequirement {
    pub event_name: String,
    pub required_capabilities: BTreeSet<String>,
    pub required_permissions: BTreeSet<String>,
}

impl From<&EventRequirementConfig> for EventRequirement {
    fn from(config: &EventRequirementConfig) -> Self {
        Self {
            event_name: config.event.trim().to_owned(),
            required_capabilities: config.capabilities.clone(),
            required_permissions: config.permissions.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogSnapshot {
    pub devices: Option<CatalogEntry<DeviceDescriptor>>,
    pub capabilities: Option<CatalogEntry<String>>,
    pub linked_capabilities: BTreeSet<String>,
    pub requirements: Vec<EventRequirement>,
}

#[derive(Default)]
struct CatalogState {
    devices: Option<CatalogEntry<DeviceDescriptor>>,
    capabilities: Option<CatalogEntry<String>>,
    linked: BTreeSet<String>,
    requirements: BTreeMap<String, EventRequirement>,
}

#[derive(Default)]
pub(crate) struct Catalog {
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_requirements(&self, configs: &[EventRequirementConfig]) {
        let mut state = self.state.lock().expect("catalog mutex poisoned");
        for config in configs {
            let requirement = EventRequirement::from(config);
            state.requirements.insert(requirement.event_name.clone(), requirement);
        }
    }

    pub fn record_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state.lock().expect("catalog mutex poisoned").devices =
            Some(CatalogEntry::now(devices));
    }

    pub fn record_capabilities(&self, capabilities: Vec<String>) {
        self.state.lock().expect("catalog mutex poisoned").capabilities =
            Some(CatalogEntry::now(capabilities));
    }

    pub fn mark_linked<I>(&self, capabilities: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.state.lock().expect("catalog mutex poisoned");
        for capability in capabilities {
            let capability = capability.trim();
            if !capability.is_empty() {
                state.linked.insert(capability.to_owned());
            }
        }
    }

    pub fn unmark_linked(&self, capability: &str) {
        self.state.lock().expect("catalog mutex poisoned").linked.remove(capability);
    }

    /// Applies a service answer: everything it lists is required and missing,
    /// every other known capability requirement is satisfied.
    pub fn learn_missing_data(&self, missing: &MissingData) {
        let mut state = self.state.lock().expect("catalog mutex poisoned");
        let requirement = state
            .requirements
            .entry(missing.event_name.clone())
            .or_insert_with(|| EventRequirement {
                event_name: missing.event_name.clone(),
                ..Default::default()
            });
        requirement.required_capabilities.extend(missing.missing_capabilities.iter().cloned());
        requirement.required_permissions.extend(missing.missing_permissions.iter().cloned());
        let satisfied: Vec<String> = requirement
            .required_capabilities
            .difference(&missing.missing_capabilities)
            .cloned()
            .collect();
        state.linked.extend(satisfied);
        for capability in &missing.missing_capabilities {
            state.linked.remove(capability);
        }
    }

    /// Local check only. Events without a known requirement are never missing data.
    pub fn is_missing_data(&self, event_name: &str, granted: &BTreeSet<String>) -> bool {
        let state = self.state.lock().expect("catalog mutex poisoned");
        let Some(requirement) = state.requirements.get(event_name) else {
            return false;
        };
        requirement
            .required_capabilities
            .iter()
            .any(|capability| !state.linked.contains(capability))
            || requirement
                .required_permissions
                .iter()
                .any(|permission| !granted.contains(permission))
    }

    pub fn clear_linked(&self) {
        self.state.lock().expect("catalog mutex poisoned").linked.clear();
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.lock().expect("catalog mutex poisoned");
        CatalogSnapshot {
            devices: state.devices.clone(),
            capabilities: state.capabilities.clone(),
            linked_capabilities: state.linked.clone(),
            requirements: state.requirements.values().cloned().collect(),
        }
    }
}
