use super::Client;
use crate::error::SdkError;
use crate::lifecycle::SdkMethod;
use crate::transport::{normalize_missing_data, ApiRequest};
use crate::types::{Ack, MissingData, Subscription, UserSituation};
use serde_json::Value as JsonValue;

fn required(value: &str, what: &str) -> Result<String, SdkError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SdkError::invalid_argument(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

impl Client {
    /// Local answer from linked devices and granted permissions; no service call.
    pub fn is_missing_data_for_event(&self, event_name: &str) -> bool {
        let granted = self.credentials.view().granted_permissions;
        self.catalog.is_missing_data(event_name.trim(), &granted)
    }

    pub async fn get_missing_data_for_event(
        &self,
        event_name: &str,
    ) -> Result<MissingData, SdkError> {
        self.run(SdkMethod::GetMissingData, async {
            let event_name = required(event_name, "event name")?;
            let missing: MissingData = self
                .call(ApiRequest::MissingData { event_name: event_name.clone() })
                .await?;
            let missing = normalize_missing_data(&event_name, missing);
            self.catalog.learn_missing_data(&missing);
            Ok(missing)
        })
        .await
    }

    /// Subscribes `identifier` to `event_name`, optionally routed to a webhook.
    ///
    /// Rejected locally with `DataMissing` when the event's requirements are
    /// not met and with `DuplicateSubscription` while the identifier is taken.
    pub async fn subscribe(
        &self,
        event_name: &str,
        identifier: &str,
        webhook_id: Option<&str>,
    ) -> Result<Subscription, SdkError> {
        self.run(SdkMethod::Subscribe, async {
            let event_name = required(event_name, "event name")?;
            let identifier = required(identifier, "subscription identifier")?;
            let webhook_id =
                webhook_id.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned);
            if self.is_missing_data_for_event(&event_name) {
                return Err(SdkError::DataMissing { event_name });
            }

            let pending = self.registry.begin(&event_name, &identifier, webhook_id.clone())?;
            let request = ApiRequest::Subscribe { event_name, identifier, webhook_id };
            match self.call::<JsonValue>(request).await {
                Ok(_) => Ok(self.registry.confirm(pending)),
                Err(err) => {
                    log::debug!("subscribe '{}' rejected: {err}", pending.identifier);
                    self.registry.fail(pending);
                    Err(err)
                }
            }
        })
        .await
    }

    /// Removes a subscription. Identifiers unknown locally always resolve
    /// successfully, in any session state; the service is still told when a
    /// user session exists. A service "not found" counts as removed.
    pub async fn unsubscribe(&self, identifier: &str) -> Result<(), SdkError> {
        let identifier = identifier.trim();
        if !self.registry.contains(identifier) {
            self.forget_unknown_subscription(identifier).await;
            return self.finish(SdkMethod::Unsubscribe, Ok(()));
        }
        self.run(SdkMethod::Unsubscribe, async {
            let request = ApiRequest::Unsubscribe { identifier: identifier.to_owned() };
            match self.call::<JsonValue>(request).await {
                Ok(_) | Err(SdkError::NotFound { .. }) => {
                    self.registry.remove(identifier);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
        .await
    }

    /// Best effort; failures are only logged.
    async fn forget_unknown_subscription(&self, identifier: &str) {
        if identifier.is_empty() || !self.credentials.is_authenticated() {
            log::debug!("unsubscribe of unknown '{identifier}' needs no service call");
            return;
        }
        let request = ApiRequest::Unsubscribe { identifier: identifier.to_owned() };
        if let Err(err) = self.call::<JsonValue>(request).await {
            log::debug!("best-effort unsubscribe of unknown '{identifier}' failed: {err}");
        }
    }

    /// Local registry contents, including in-flight requests.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.snapshot()
    }

    pub async fn get_user_situation(
        &self,
        timestamp: i64,
        contextual: bool,
    ) -> Result<UserSituation, SdkError> {
        self.run(SdkMethod::GetUserSituation, async {
            let mut situation: UserSituation =
                self.call(ApiRequest::UserSituation { timestamp, contextual }).await?;
            if !contextual {
                situation.previous = None;
                situation.next = None;
            }
            Ok(situation)
        })
        .await
    }

    pub async fn send_feedback(&self, event_id: &str, approved: bool) -> Result<Ack, SdkError> {
        self.run(SdkMethod::SendFeedback, async {
            let event_id = required(event_id, "event id")?;
            self.call(ApiRequest::Feedback { event_id, approved }).await
        })
        .await
    }

    /// Uploads buffered diagnostics and returns how many were sent. Records are
    /// put back when the upload fails.
    pub async fn flush_telemetry(&self) -> Result<usize, SdkError> {
        crate::lifecycle::ensure_method_legal(SdkMethod::FlushTelemetry, self.session_state())?;
        if self.telemetry.is_disabled() {
            return Ok(0);
        }
        let batch = self.telemetry.take();
        if batch.is_empty() {
            return Ok(0);
        }
        let records = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SdkError::decode(format!("telemetry record: {err}")))?;
        match self.call::<JsonValue>(ApiRequest::UploadLogs { records }).await {
            Ok(_) => {
                log::debug!("uploaded {} diagnostic record(s)", batch.len());
                Ok(batch.len())
            }
            Err(err) => {
                self.telemetry.restore(batch);
                Err(err)
            }
        }
    }
}
