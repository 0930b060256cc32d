//! Inbound push payload decoding and listener dispatch.
//!
//! Two integration modes exist per client. Automatic mode hands the platform
//! interceptor an [`AutomaticPushHook`]; manual mode has the host call
//! [`PushRouter::deliver`] itself. Both funnel into the same routing path.

use crate::delivery::DeliveryContext;
use crate::error::SdkError;
use crate::error_bus::{ErrorBatch, ErrorNotice, ErrorReporter, ListenerId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushEvent {
    pub event_id: String,
    pub event_name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PushPayload {
    Event(PushEvent),
    Errors(ErrorBatch),
    Unrecognized,
}

impl PushPayload {
    pub fn kind(&self) -> PushKind {
        match self {
            Self::Event(_) => PushKind::TypedEvent,
            Self::Errors(_) => PushKind::ErrorBatch,
            Self::Unrecognized => PushKind::Unrecognized,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    TypedEvent,
    ErrorBatch,
    Unrecognized,
}

impl PushKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypedEvent => "typed_event",
            Self::ErrorBatch => "error_batch",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PushMode {
    Unset,
    Automatic,
    Manual,
}

/// Classifies a raw payload. Never fails; anything unexpected is `Unrecognized`.
pub fn decode_payload(payload: &JsonValue) -> PushPayload {
    match payload.get("type").and_then(JsonValue::as_str) {
        Some("event") => {
            decode_event(payload).map_or(PushPayload::Unrecognized, PushPayload::Event)
        }
        Some("errors") => {
            let notices = ErrorNotice::parse_list(payload.get("errors"));
            if notices.is_empty() {
                PushPayload::Unrecognized
            } else {
                PushPayload::Errors(ErrorBatch::new(notices))
            }
        }
        _ => PushPayload::Unrecognized,
    }
}

fn decode_event(payload: &JsonValue) -> Option<PushEvent> {
    let event = payload.get("event")?;
    let event_name = event.get("name")?.as_str()?.trim();
    if event_name.is_empty() {
        return None;
    }
    let event_id = match event.get("id")? {
        JsonValue::String(id) => id.clone(),
        JsonValue::Number(id) => id.to_string(),
        _ => return None,
    };
    Some(PushEvent {
        event_id,
        event_name: event_name.to_owned(),
        identifier: payload.get("identifier").and_then(JsonValue::as_str).map(str::to_owned),
        timestamp: payload.get("timestamp").and_then(JsonValue::as_i64),
        data: payload.get("data").cloned().unwrap_or(JsonValue::Null),
    })
}

pub type EventListener = Arc<dyn Fn(&PushEvent) + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    /// `None` registers a wildcard.
    event_name: Option<String>,
    listener: EventListener,
}

struct RouterState {
    mode: PushMode,
    device_token: Option<String>,
    listeners: Vec<ListenerEntry>,
}

pub struct PushRouter {
    state: Mutex<RouterState>,
    next_listener_id: AtomicU64,
    reporter: Arc<ErrorReporter>,
}

impl std::fmt::Debug for PushRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("push router mutex poisoned");
        f.debug_struct("PushRouter")
            .field("mode", &state.mode)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl PushRouter {
    pub(crate) fn new(reporter: Arc<ErrorReporter>) -> Self {
        Self {
            state: Mutex::new(RouterState {
                mode: PushMode::Unset,
                device_token: None,
                listeners: Vec::new(),
            }),
            next_listener_id: AtomicU64::new(1),
            reporter,
        }
    }

    /// Switches to automatic mode. Allowed once, and only before any manual delivery.
    pub fn register_automatic(self: &Arc<Self>) -> Result<AutomaticPushHook, SdkError> {
        let mut state = self.state.lock().expect("push router mutex poisoned");
        match state.mode {
            PushMode::Unset => {
                state.mode = PushMode::Automatic;
                log::info!("automatic push integration registered");
                Ok(AutomaticPushHook { router: Arc::clone(self) })
            }
            PushMode::Automatic => {
                Err(SdkError::mode_conflict("automatic push integration is already registered"))
            }
            PushMode::Manual => Err(SdkError::mode_conflict(
                "payloads were already delivered manually; automatic mode is unavailable",
            )),
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.state.lock().expect("push router mutex poisoned").mode == PushMode::Automatic
    }

    /// Stores the platform token as lowercase hex and returns it.
    pub fn set_device_token(&self, raw_token: &[u8]) -> String {
        let normalized = hex::encode(raw_token);
        let mut state = self.state.lock().expect("push router mutex poisoned");
        if state.device_token.as_deref() != Some(normalized.as_str()) {
            log::debug!("push device token updated ({} bytes)", raw_token.len());
            state.device_token = Some(normalized.clone());
        }
        normalized
    }

    pub fn device_token(&self) -> Option<String> {
        self.state.lock().expect("push router mutex poisoned").device_token.clone()
    }

    /// Manual entry point. Rejected once automatic mode is registered.
    pub fn deliver(&self, payload: &JsonValue) -> Result<PushKind, SdkError> {
        {
            let mut state = self.state.lock().expect("push router mutex poisoned");
            match state.mode {
                PushMode::Automatic => {
                    return Err(SdkError::mode_conflict(
                        "automatic push integration owns delivery; manual deliver is unavailable",
                    ))
                }
                PushMode::Unset => state.mode = PushMode::Manual,
                PushMode::Manual => {}
            }
        }
        Ok(self.route(payload))
    }

    pub fn on_event<F>(&self, event_name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        self.add_listener(Some(event_name.into()), Arc::new(listener))
    }

    /// Called for events no name-specific listener handles.
    pub fn on_any_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        self.add_listener(None, Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock().expect("push router mutex poisoned");
        let before = state.listeners.len();
        state.listeners.retain(|entry| entry.id != id);
        state.listeners.len() != before
    }

    fn add_listener(&self, event_name: Option<String>, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.state
            .lock()
            .expect("push router mutex poisoned")
            .listeners
            .push(ListenerEntry { id, event_name, listener });
        id
    }

    fn route(&self, payload: &JsonValue) -> PushKind {
        let decoded = decode_payload(payload);
        let kind = decoded.kind();
        match decoded {
            PushPayload::Event(event) => self.dispatch_event(event),
            PushPayload::Errors(batch) => self.reporter.report(batch),
            PushPayload::Unrecognized => {
                log::debug!("dropping unrecognized push payload");
            }
        }
        kind
    }

    fn dispatch_event(&self, event: PushEvent) {
        let targets = {
            let state = self.state.lock().expect("push router mutex poisoned");
            let exact: Vec<EventListener> = state
                .listeners
                .iter()
                .filter(|entry| entry.event_name.as_deref() == Some(event.event_name.as_str()))
                .map(|entry| Arc::clone(&entry.listener))
                .collect();
            if exact.is_empty() {
                state
                    .listeners
                    .iter()
                    .filter(|entry| entry.event_name.is_none())
                    .map(|entry| Arc::clone(&entry.listener))
                    .collect()
            } else {
                exact
            }
        };
        if targets.is_empty() {
            log::debug!("no listener for push event '{}'", event.event_name);
            return;
        }
        log::debug!(
            "routing push event '{}' to {} listener(s)",
            event.event_name,
            targets.len()
        );
        self.delivery().dispatch(move || {
            for listener in &targets {
                listener(&event);
            }
        });
    }

    fn delivery(&self) -> &DeliveryContext {
        self.reporter.delivery()
    }
}

/// Handed to the platform interceptor in automatic mode.
#[derive(Clone, Debug)]
pub struct AutomaticPushHook {
    router: Arc<PushRouter>,
}

impl AutomaticPushHook {
    pub fn deliver(&self, payload: &JsonValue) -> PushKind {
        self.router.route(payload)
    }

    pub fn set_device_token(&self, raw_token: &[u8]) -> String {
        self.router.set_device_token(raw_token)
    }
}
