use crate::catalog::Catalog;
use crate::credentials::{CredentialStore, SessionView};
use crate::delivery::DeliveryContext;
use crate::error::SdkError;
use crate::error_bus::{ErrorBatch, ErrorBus, ErrorReporter};
use crate::lifecycle::{ensure_method_legal, SdkMethod, SessionState};
use crate::presentation::Presenter;
use crate::push::PushRouter;
use crate::subscriptions::SubscriptionRegistry;
use crate::telemetry::{DiagnosticRecord, TelemetryBuffer};
use crate::transport::{decode_response, ApiCall, ApiRequest, Transport};
use crate::types::{Features, SdkSettings, DEFAULT_TELEMETRY_CAPACITY};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

mod catalog;
mod events;
mod session;

struct AuthAttempt {
    id: u64,
    cancel: CancellationToken,
}

/// Entry point of the SDK. One instance per app identity; share it behind an `Arc`.
///
/// Async operations resolve on the task that awaits them. Listener callbacks
/// and default error notices run on the [`DeliveryContext`] given at construction.
pub struct Client {
    transport: Arc<dyn Transport>,
    presenter: Arc<dyn Presenter>,
    credentials: CredentialStore,
    features: Mutex<Features>,
    auth: Mutex<Option<AuthAttempt>>,
    next_auth_id: AtomicU64,
    catalog: Catalog,
    registry: SubscriptionRegistry,
    reporter: Arc<ErrorReporter>,
    push: Arc<PushRouter>,
    telemetry: TelemetryBuffer,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.session_state())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(
        transport: Arc<dyn Transport>,
        presenter: Arc<dyn Presenter>,
        delivery: DeliveryContext,
    ) -> Self {
        let reporter = Arc::new(ErrorReporter::new(
            Arc::new(ErrorBus::new()),
            Arc::clone(&presenter),
            delivery,
        ));
        Self {
            transport,
            presenter,
            credentials: CredentialStore::new(),
            features: Mutex::new(Features::default()),
            auth: Mutex::new(None),
            next_auth_id: AtomicU64::new(1),
            catalog: Catalog::new(),
            registry: SubscriptionRegistry::new(),
            push: Arc::new(PushRouter::new(Arc::clone(&reporter))),
            reporter,
            telemetry: TelemetryBuffer::new(DEFAULT_TELEMETRY_CAPACITY),
        }
    }

    /// Builds a configured client from validated settings.
    pub fn from_settings(
        settings: &SdkSettings,
        transport: Arc<dyn Transport>,
        presenter: Arc<dyn Presenter>,
        delivery: DeliveryContext,
    ) -> Result<Self, SdkError> {
        settings.validate()?;
        let client = Self::new(transport, presenter, delivery);
        client.telemetry.set_capacity(settings.telemetry_capacity);
        client.configure(&settings.app_id, &settings.app_secret)?;
        client.enable_features(settings.features);
        client.catalog.install_requirements(&settings.event_requirements);
        Ok(client)
    }

    pub fn session_state(&self) -> SessionState {
        let in_flight = self.auth.lock().expect("auth mutex poisoned").is_some();
        self.derive_state(in_flight)
    }

    pub fn session(&self) -> SessionView {
        self.credentials.view()
    }

    pub fn error_bus(&self) -> &Arc<ErrorBus> {
        self.reporter.bus()
    }

    pub fn push(&self) -> &Arc<PushRouter> {
        &self.push
    }

    pub fn delivery(&self) -> &DeliveryContext {
        self.reporter.delivery()
    }

    pub fn telemetry_snapshot(&self) -> Vec<DiagnosticRecord> {
        self.telemetry.snapshot()
    }

    fn derive_state(&self, auth_in_flight: bool) -> SessionState {
        if !self.credentials.is_configured() {
            SessionState::Unconfigured
        } else if self.credentials.is_authenticated() {
            SessionState::Authenticated
        } else if auth_in_flight {
            SessionState::Authenticating
        } else {
            SessionState::LoggedOut
        }
    }

    /// Checks legality, runs the operation, and records its outcome.
    async fn run<T, F>(&self, method: SdkMethod, operation: F) -> Result<T, SdkError>
    where
        F: Future<Output = Result<T, SdkError>>,
    {
        let result = match ensure_method_legal(method, self.session_state()) {
            Ok(()) => operation.await,
            Err(err) => Err(err),
        };
        self.finish(method, result)
    }

    fn finish<T>(&self, method: SdkMethod, result: Result<T, SdkError>) -> Result<T, SdkError> {
        match &result {
            Ok(_) => self.telemetry.record(method, "ok"),
            Err(err) => {
                log::debug!("{} failed: {err}", method.as_str());
                self.telemetry.record(method, err.code());
            }
        }
        result
    }

    /// Sends one request with the current credentials. Notices carried by the
    /// response are reported once, whether or not the request succeeded; a
    /// failure made of notices also resolves as `SdkError::Environment`.
    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, SdkError> {
        let identity = self.credentials.identity().ok_or(SdkError::NotConfigured)?;
        let call = ApiCall {
            app_id: identity.app_id.clone(),
            app_secret: identity.app_secret.as_str().to_owned(),
            user_token: self.credentials.user_token(),
            request: request.clone(),
        };
        log::debug!("sending {} request", request.op());
        let response = self.transport.send(call).await?;
        let reply = decode_response::<T>(&request, response);
        if !reply.notices.is_empty() {
            self.reporter.report(ErrorBatch::new(reply.notices));
        }
        reply.result
    }
}
