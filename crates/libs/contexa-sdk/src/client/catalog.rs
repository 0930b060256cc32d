use super::Client;
use crate::catalog::CatalogSnapshot;
use crate::error::SdkError;
use crate::lifecycle::SdkMethod;
use crate::presentation::PresentationFlow;
use crate::transport::ApiRequest;
use crate::types::{
    DeviceDescriptor, LinkedDevice, PermissionDescriptor, Subscription, SubscriptionState,
};
use std::collections::BTreeSet;

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}

impl Client {
    /// Permissions granted to the user; the session's granted set follows the answer.
    pub async fn get_permissions(&self) -> Result<Vec<PermissionDescriptor>, SdkError> {
        self.run(SdkMethod::GetPermissions, async {
            let generation = self.credentials.generation();
            let permissions: Vec<PermissionDescriptor> = self.call(ApiRequest::Permissions).await?;
            let active: BTreeSet<String> = permissions
                .iter()
                .filter(|permission| permission.active)
                .map(|permission| permission.name.clone())
                .collect();
            if !self.credentials.replace_permissions(generation, active) {
                log::debug!("session changed while permissions were loading; keeping current set");
            }
            Ok(permissions)
        })
        .await
    }

    /// Server-side subscriptions. The local registry is reconciled against the answer.
    pub async fn get_subscriptions_list(&self) -> Result<Vec<Subscription>, SdkError> {
        self.run(SdkMethod::GetSubscriptions, async {
            let subscriptions: Vec<Subscription> = self.call(ApiRequest::Subscriptions).await?;
            self.registry.reconcile(&subscriptions);
            Ok(subscriptions
                .into_iter()
                .map(|subscription| subscription.with_state(SubscriptionState::Active))
                .collect())
        })
        .await
    }

    pub async fn get_supported_devices(&self) -> Result<Vec<DeviceDescriptor>, SdkError> {
        self.run(SdkMethod::GetSupportedDevices, async {
            let devices: Vec<DeviceDescriptor> = self.call(ApiRequest::SupportedDevices).await?;
            self.catalog.record_devices(devices.clone());
            Ok(devices)
        })
        .await
    }

    pub async fn get_supported_capabilities(&self) -> Result<Vec<String>, SdkError> {
        self.run(SdkMethod::GetSupportedCapabilities, self.fetch_capabilities()).await
    }

    async fn fetch_capabilities(&self) -> Result<Vec<String>, SdkError> {
        let capabilities: Vec<String> = self.call(ApiRequest::SupportedCapabilities).await?;
        self.catalog.record_capabilities(capabilities.clone());
        Ok(capabilities)
    }

    /// Fails with `InvalidCapability` unless the name is a supported capability.
    pub async fn has_device_with_capability(&self, capability: &str) -> Result<bool, SdkError> {
        self.run(SdkMethod::HasDeviceWithCapability, async {
            let capability = capability.trim();
            if capability.is_empty() {
                return Err(SdkError::invalid_argument("capability name must not be empty"));
            }
            let supported = self.fetch_capabilities().await?;
            if !supported.iter().any(|known| known == capability) {
                return Err(SdkError::InvalidCapability { capability: capability.to_owned() });
            }
            let has_device: bool = self
                .call(ApiRequest::HasDevice { capability: capability.to_owned() })
                .await?;
            if has_device {
                self.catalog.mark_linked([capability.to_owned()]);
            } else {
                self.catalog.unmark_linked(capability);
            }
            Ok(has_device)
        })
        .await
    }

    /// Opens the device picker. Empty filters show every device.
    pub async fn add_device(
        &self,
        capability: Option<&str>,
        device_name: Option<&str>,
    ) -> Result<LinkedDevice, SdkError> {
        self.run(SdkMethod::AddDevice, async {
            let capability = non_empty(capability);
            let device_name = non_empty(device_name);
            let device: LinkedDevice = self
                .presenter
                .present(PresentationFlow::DevicePicker {
                    capability: capability.clone(),
                    device_name,
                })
                .await?
                .into_completed("device_picker")?;
            let mut linked = device.capabilities.clone();
            linked.extend(capability);
            log::info!("device '{}' linked ({} capabilities)", device.name, linked.len());
            self.catalog.mark_linked(linked);
            Ok(device)
        })
        .await
    }

    pub fn catalog_snapshot(&self) -> CatalogSnapshot {
        self.catalog.snapshot()
    }
}
