use super::{AuthAttempt, Client};
use crate::error::SdkError;
use crate::lifecycle::{ensure_method_legal, SdkMethod};
use crate::presentation::{PresentationFlow, PresentationOutcome};
use crate::transport::ApiRequest;
use crate::types::{AuthGrantResponse, AuthToken, Features, PermissionRequest};
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Clears the in-flight slot when the attempt ends, including when the
/// caller drops the future.
struct AttemptGuard<'a> {
    slot: &'a Mutex<Option<AuthAttempt>>,
    id: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().expect("auth mutex poisoned");
        if slot.as_ref().is_some_and(|attempt| attempt.id == self.id) {
            *slot = None;
        }
    }
}

impl Client {
    /// Sets the application identity. Reconfiguring with another app id ends
    /// the current user session.
    pub fn configure(&self, app_id: &str, app_secret: &str) -> Result<(), SdkError> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(SdkError::invalid_argument("app_id must not be empty"));
        }
        if app_secret.trim().is_empty() {
            return Err(SdkError::invalid_argument("app_secret must not be empty"));
        }
        let was_configured = self.credentials.is_configured();
        if self.credentials.set_identity(app_id.to_owned(), app_secret.to_owned()) {
            let cancelled = self.cancel_auth();
            self.catalog.clear_linked();
            self.registry.clear();
            if cancelled {
                log::info!("app identity changed; pending authentication cancelled");
            }
            log::info!("app identity changed; user session cleared");
        } else if was_configured {
            log::info!("client reconfigured for app '{app_id}'");
        } else {
            log::info!("client configured for app '{app_id}'");
        }
        Ok(())
    }

    /// Replaces the whole feature set.
    pub fn enable_features(&self, features: Features) {
        *self.features.lock().expect("features mutex poisoned") = features;
        self.reporter.set_custom_notification(features.custom_error_notification);
        self.telemetry.set_disabled(features.disable_sdk_logging);
    }

    pub fn enable_feature_bits(&self, bits: u32) {
        self.enable_features(Features::from_bits(bits));
    }

    pub fn features(&self) -> Features {
        *self.features.lock().expect("features mutex poisoned")
    }

    /// Runs the login flow and exchanges its grant for a user token.
    ///
    /// Only one attempt may be in flight; a concurrent call fails at once with
    /// `AuthenticationInProgress`. `logout` cancels a pending attempt. A failed
    /// attempt leaves any previous session untouched.
    pub async fn authenticate(&self, request: PermissionRequest) -> Result<AuthToken, SdkError> {
        let result = self.authenticate_flow(request).await;
        self.finish(SdkMethod::Authenticate, result)
    }

    async fn authenticate_flow(&self, request: PermissionRequest) -> Result<AuthToken, SdkError> {
        let (id, cancel) = self.begin_auth()?;
        let _guard = AttemptGuard { slot: &self.auth, id };
        request.validate()?;

        let granted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SdkError::cancelled("authenticate")),
            result = self.login_and_exchange(&request) => result?,
        };

        let permissions: BTreeSet<String> = if granted.granted_permissions.is_empty() {
            request.permissions().iter().map(|name| name.trim().to_owned()).collect()
        } else {
            granted.granted_permissions.into_iter().collect()
        };
        {
            // Commit under the auth lock so a concurrent logout either wins
            // before this check or clears the session after it.
            let mut slot = self.auth.lock().expect("auth mutex poisoned");
            let current = slot
                .as_ref()
                .is_some_and(|attempt| attempt.id == id && !attempt.cancel.is_cancelled());
            if !current {
                return Err(SdkError::cancelled("authenticate"));
            }
            self.credentials.establish_session(granted.token.clone(), permissions);
            *slot = None;
        }
        log::info!("user session established");
        Ok(AuthToken(granted.token))
    }

    fn begin_auth(&self) -> Result<(u64, CancellationToken), SdkError> {
        let mut slot = self.auth.lock().expect("auth mutex poisoned");
        if slot.is_some() {
            return Err(SdkError::AuthenticationInProgress);
        }
        ensure_method_legal(SdkMethod::Authenticate, self.derive_state(false))?;
        let id = self.next_auth_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *slot = Some(AuthAttempt { id, cancel: cancel.clone() });
        Ok((id, cancel))
    }

    async fn login_and_exchange(
        &self,
        request: &PermissionRequest,
    ) -> Result<AuthGrantResponse, SdkError> {
        let app_id = self.credentials.view().app_id.ok_or(SdkError::NotConfigured)?;
        let outcome = self
            .presenter
            .present(PresentationFlow::Login { app_id, request: request.clone() })
            .await?;
        let grant = match outcome {
            PresentationOutcome::Completed(grant) => grant,
            PresentationOutcome::Dismissed => {
                return Err(SdkError::Dismissed { flow: "login".to_owned() })
            }
        };
        let response: AuthGrantResponse = self
            .call(ApiRequest::Authenticate {
                grant,
                permissions: request.permissions().to_vec(),
                hints: request.hints().clone(),
                extra_info: request.extra_info().clone(),
            })
            .await?;
        if response.token.trim().is_empty() {
            return Err(SdkError::decode("authenticate response carried an empty token"));
        }
        Ok(response)
    }

    fn cancel_auth(&self) -> bool {
        match self.auth.lock().expect("auth mutex poisoned").take() {
            Some(attempt) => {
                attempt.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Ends the user session. Idempotent.
    pub fn logout(&self) {
        let cancelled = self.cancel_auth();
        let had_session = self.credentials.clear_session();
        self.catalog.clear_linked();
        self.registry.clear();
        if had_session || cancelled {
            log::info!("user logged out");
        } else {
            log::debug!("logout without an active session");
        }
    }

    /// Shows the permission settings panel. Without a user session this is a no-op.
    pub async fn open_settings_panel(&self) -> Result<(), SdkError> {
        if !self.credentials.is_authenticated() {
            log::warn!("open_settings_panel called without an authenticated session");
            return Ok(());
        }
        let permissions = self.credentials.view().granted_permissions.into_iter().collect();
        let outcome = self
            .presenter
            .present(PresentationFlow::SettingsPanel { permissions })
            .await
            .map(|_| ());
        self.finish(SdkMethod::OpenSettingsPanel, outcome)
    }
}
