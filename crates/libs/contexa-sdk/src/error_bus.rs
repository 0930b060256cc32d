use crate::delivery::DeliveryContext;
use crate::error::{SdkError, SdkErrorCode, ERROR_DOMAIN};
use crate::presentation::{PresentationFlow, Presenter};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 64;

/// Handle returned by listener registration; pass it back to remove the listener.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorNotice {
    pub domain: String,
    pub code: SdkErrorCode,
    pub message: String,
}

#[derive(Deserialize)]
struct WireNotice {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorNotice {
    pub fn new(code: SdkErrorCode, message: impl Into<String>) -> Self {
        Self { domain: ERROR_DOMAIN.to_owned(), code, message: message.into() }
    }

    /// Parses a `[{"code": 1001, "message": "..."}]` list. Unknown or absent
    /// codes become `General`; entries that are not objects are skipped.
    pub(crate) fn parse_list(value: Option<&JsonValue>) -> Vec<Self> {
        let Some(JsonValue::Array(entries)) = value else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                if !entry.is_object() {
                    log::debug!("skipping malformed error notice: {entry}");
                    return None;
                }
                let wire = serde_json::from_value::<WireNotice>(entry.clone()).ok()?;
                let code = wire
                    .code
                    .and_then(|value| u32::try_from(value).ok())
                    .map(SdkErrorCode::from_u32_or_general)
                    .unwrap_or(SdkErrorCode::General);
                let message = wire.message.unwrap_or_else(|| code.as_str().replace('_', " "));
                Some(Self::new(code, message))
            })
            .collect()
    }
}

impl From<&ErrorNotice> for SdkError {
    fn from(notice: &ErrorNotice) -> Self {
        SdkError::Environment { code: notice.code, message: notice.message.clone() }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBatch {
    pub errors: Vec<ErrorNotice>,
}

impl ErrorBatch {
    pub fn new(errors: Vec<ErrorNotice>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn codes(&self) -> Vec<SdkErrorCode> {
        self.errors.iter().map(|notice| notice.code).collect()
    }
}

pub type ErrorListener = Arc<dyn Fn(&ErrorBatch) + Send + Sync>;

/// Fan-out channel for environment and permission errors.
///
/// `publish` calls the callback listeners in registration order on the calling
/// task; the SDK only publishes from a delivery-context job, so listeners see
/// batches on the host's delivery task. Batches published while nobody
/// listens are dropped.
pub struct ErrorBus {
    listeners: Mutex<Vec<(ListenerId, ErrorListener)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<ErrorBatch>,
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBus")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl ErrorBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { listeners: Mutex::new(Vec::new()), next_id: AtomicU64::new(1), sender }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ErrorBatch) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .expect("error bus mutex poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("error bus mutex poisoned");
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver for async consumers. Slow receivers observe `Lagged`.
    pub fn receiver(&self) -> broadcast::Receiver<ErrorBatch> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("error bus mutex poisoned").len()
    }

    /// Returns how many callback listeners were invoked.
    pub fn publish(&self, batch: &ErrorBatch) -> usize {
        let listeners: Vec<ErrorListener> = self
            .listeners
            .lock()
            .expect("error bus mutex poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let delivered_to_receivers = self.sender.send(batch.clone()).is_ok();
        if listeners.is_empty() && !delivered_to_receivers {
            log::warn!("error batch with {} notice(s) published with no listener", batch.len());
            return 0;
        }
        for listener in &listeners {
            listener(batch);
        }
        listeners.len()
    }
}

/// Routes batches onto the delivery context: bus first, then the default
/// notice unless the host handles errors itself.
pub(crate) struct ErrorReporter {
    bus: Arc<ErrorBus>,
    presenter: Arc<dyn Presenter>,
    delivery: DeliveryContext,
    custom_notification: AtomicBool,
}

impl ErrorReporter {
    pub fn new(
        bus: Arc<ErrorBus>,
        presenter: Arc<dyn Presenter>,
        delivery: DeliveryContext,
    ) -> Self {
        Self { bus, presenter, delivery, custom_notification: AtomicBool::new(false) }
    }

    pub fn bus(&self) -> &Arc<ErrorBus> {
        &self.bus
    }

    pub fn delivery(&self) -> &DeliveryContext {
        &self.delivery
    }

    pub fn set_custom_notification(&self, enabled: bool) {
        self.custom_notification.store(enabled, Ordering::SeqCst);
    }

    pub fn report(&self, batch: ErrorBatch) {
        if batch.is_empty() {
            return;
        }
        let bus = Arc::clone(&self.bus);
        let presenter = Arc::clone(&self.presenter);
        let present_default = !self.custom_notification.load(Ordering::SeqCst);
        self.delivery.dispatch_async(async move {
            bus.publish(&batch);
            if present_default {
                if let Err(err) = presenter.present(PresentationFlow::ErrorNotice { batch }).await {
                    log::warn!("default error notice failed: {err}");
                }
            }
        });
    }
}
