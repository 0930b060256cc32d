#![allow(dead_code)]

use async_trait::async_trait;
use contexa_sdk::{
    ApiCall, ApiRequest, ApiResponse, Client, DeliveryContext, PresentationFlow,
    PresentationOutcome, Presenter, SdkError, Transport, TransportError,
};
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

pub const TOKEN: &str = "abc";
pub const GRANT: &str = "grant-from-login";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .is_test(true)
            .try_init();
    });
}

#[derive(Default)]
struct ServiceState {
    subscriptions: BTreeMap<String, JsonValue>,
    linked_capabilities: BTreeSet<String>,
    uploaded_records: usize,
}

/// In-memory service speaking the SDK's response envelope.
pub struct FakeService {
    state: Mutex<ServiceState>,
    /// Events whose subscription needs these capabilities linked.
    requirements: BTreeMap<String, BTreeSet<String>>,
    /// Notices attached to every successful answer.
    notices: Mutex<Vec<JsonValue>>,
    pub calls: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        let mut requirements = BTreeMap::new();
        requirements.insert(
            "event.needs.device".to_owned(),
            BTreeSet::from(["heart_rate".to_owned()]),
        );
        Self {
            state: Mutex::new(ServiceState::default()),
            requirements,
            notices: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn attach_notice(&self, code: u32, message: &str) {
        self.notices
            .lock()
            .expect("notices mutex poisoned")
            .push(json!({ "code": code, "message": message }));
    }

    pub fn link_capability(&self, capability: &str) {
        self.state
            .lock()
            .expect("service mutex poisoned")
            .linked_capabilities
            .insert(capability.to_owned());
    }

    pub fn server_subscriptions(&self) -> Vec<String> {
        self.state.lock().expect("service mutex poisoned").subscriptions.keys().cloned().collect()
    }

    /// Simulates a subscription removed through another channel (e.g. the web console).
    pub fn remove_server_subscription(&self, identifier: &str) {
        self.state.lock().expect("service mutex poisoned").subscriptions.remove(identifier);
    }

    pub fn uploaded_records(&self) -> usize {
        self.state.lock().expect("service mutex poisoned").uploaded_records
    }

    fn ok(&self, data: JsonValue) -> ApiResponse {
        let notices = self.notices.lock().expect("notices mutex poisoned").clone();
        if notices.is_empty() {
            ApiResponse::ok(data)
        } else {
            ApiResponse { status_code: 200, body: json!({ "data": data, "errors": notices }) }
        }
    }

    fn missing_for(&self, state: &ServiceState, event_name: &str) -> BTreeSet<String> {
        self.requirements
            .get(event_name)
            .map(|required| required.difference(&state.linked_capabilities).cloned().collect())
            .unwrap_or_default()
    }

    fn handle(&self, call: ApiCall) -> ApiResponse {
        if call.app_id != "X" || call.app_secret != "Y" {
            return ApiResponse::failure(403, "unknown application");
        }
        let needs_user = !matches!(
            call.request,
            ApiRequest::Authenticate { .. }
                | ApiRequest::SupportedDevices
                | ApiRequest::SupportedCapabilities
                | ApiRequest::UploadLogs { .. }
        );
        if needs_user && call.user_token.as_deref() != Some(TOKEN) {
            return ApiResponse::failure(401, "token expired");
        }

        let mut state = self.state.lock().expect("service mutex poisoned");
        match call.request {
            ApiRequest::Authenticate { grant, permissions, .. } => {
                if grant["code"] != GRANT {
                    return ApiResponse::failure(400, "invalid grant");
                }
                self.ok(json!({ "token": TOKEN, "granted_permissions": permissions }))
            }
            ApiRequest::Permissions => self.ok(json!([
                { "name": "permission.location", "display_name": "Location" },
                { "name": "permission.revoked", "active": false },
            ])),
            ApiRequest::Subscriptions => {
                self.ok(JsonValue::Array(state.subscriptions.values().cloned().collect()))
            }
            ApiRequest::SupportedDevices => self.ok(json!([
                { "name": "Band", "vendor": "Acme", "capabilities": ["heart_rate", "steps"] },
            ])),
            ApiRequest::SupportedCapabilities => {
                self.ok(json!(["heart_rate", "steps", "location"]))
            }
            ApiRequest::HasDevice { capability } => {
                self.ok(json!(state.linked_capabilities.contains(&capability)))
            }
            ApiRequest::MissingData { event_name } => {
                let missing = self.missing_for(&state, &event_name);
                self.ok(json!({ "event_name": event_name, "missing_capabilities": missing }))
            }
            ApiRequest::Subscribe { event_name, identifier, webhook_id } => {
                if !self.missing_for(&state, &event_name).is_empty() {
                    return ApiResponse::failure(422, "event data is missing");
                }
                if state.subscriptions.contains_key(&identifier) {
                    return ApiResponse::failure(409, "identifier exists");
                }
                let record = json!({
                    "event_name": event_name,
                    "identifier": identifier,
                    "webhook_id": webhook_id,
                });
                state.subscriptions.insert(identifier, record);
                self.ok(json!({ "accepted": true }))
            }
            ApiRequest::Unsubscribe { identifier } => {
                match state.subscriptions.remove(&identifier) {
                    Some(_) => self.ok(json!({ "accepted": true })),
                    None => ApiResponse::failure(404, "no such subscription"),
                }
            }
            ApiRequest::UserSituation { timestamp, contextual } => {
                let mut situation =
                    json!({ "timestamp": timestamp, "current": { "situation": "home" } });
                if contextual {
                    situation["previous"] = json!({ "situation": "commute" });
                    situation["next"] = json!({ "situation": "work" });
                }
                self.ok(situation)
            }
            ApiRequest::Feedback { event_id, .. } => {
                self.ok(json!({ "accepted": true, "reference": format!("fb-{event_id}") }))
            }
            ApiRequest::UploadLogs { records } => {
                state.uploaded_records += records.len();
                self.ok(JsonValue::Null)
            }
            _ => ApiResponse::failure(400, "unsupported request"),
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn send(&self, call: ApiCall) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.handle(call))
    }
}

/// Answers interactive flows from a script; error notices are only recorded.
pub struct ScriptedPresenter {
    device_pickers: Mutex<VecDeque<Result<PresentationOutcome, SdkError>>>,
    dismiss_login: bool,
    flows: Mutex<Vec<PresentationFlow>>,
    service: Option<Arc<FakeService>>,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self {
            device_pickers: Mutex::new(VecDeque::new()),
            dismiss_login: false,
            flows: Mutex::new(Vec::new()),
            service: None,
        }
    }

    pub fn dismissing_login() -> Self {
        Self { dismiss_login: true, ..Self::new() }
    }

    /// A completed device picker also links the device on the service side.
    pub fn linking_on(mut self, service: Arc<FakeService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn queue_device_picker(&self, outcome: Result<PresentationOutcome, SdkError>) {
        self.device_pickers.lock().expect("pickers mutex poisoned").push_back(outcome);
    }

    pub fn flow_names(&self) -> Vec<&'static str> {
        self.flows
            .lock()
            .expect("flows mutex poisoned")
            .iter()
            .map(PresentationFlow::name)
            .collect()
    }

    pub fn error_notices(&self) -> usize {
        self.flow_names().into_iter().filter(|name| *name == "error_notice").count()
    }
}

#[async_trait]
impl Presenter for ScriptedPresenter {
    async fn present(&self, flow: PresentationFlow) -> Result<PresentationOutcome, SdkError> {
        self.flows.lock().expect("flows mutex poisoned").push(flow.clone());
        match flow {
            PresentationFlow::Login { .. } if self.dismiss_login => {
                Ok(PresentationOutcome::Dismissed)
            }
            PresentationFlow::Login { .. } => {
                Ok(PresentationOutcome::Completed(json!({ "code": GRANT })))
            }
            PresentationFlow::DevicePicker { capability, .. } => {
                let scripted =
                    self.device_pickers.lock().expect("pickers mutex poisoned").pop_front();
                let outcome = scripted.unwrap_or_else(|| {
                    Ok(PresentationOutcome::Completed(json!({
                        "name": "Band",
                        "capabilities": capability.iter().collect::<Vec<_>>(),
                    })))
                })?;
                if let (PresentationOutcome::Completed(device), Some(service)) =
                    (&outcome, &self.service)
                {
                    for linked in device["capabilities"].as_array().into_iter().flatten() {
                        if let Some(linked) = linked.as_str() {
                            service.link_capability(linked);
                        }
                    }
                    if let Some(capability) = &capability {
                        service.link_capability(capability);
                    }
                }
                Ok(outcome)
            }
            _ => Ok(PresentationOutcome::Dismissed),
        }
    }
}

pub struct Harness {
    pub client: Arc<Client>,
    pub service: Arc<FakeService>,
    pub presenter: Arc<ScriptedPresenter>,
}

pub fn harness() -> Harness {
    let service = Arc::new(FakeService::new());
    harness_with(Arc::clone(&service), ScriptedPresenter::new().linking_on(service))
}

pub fn harness_with(service: Arc<FakeService>, presenter: ScriptedPresenter) -> Harness {
    init_logging();
    let presenter = Arc::new(presenter);
    let client = Client::new(service.clone(), presenter.clone(), DeliveryContext::spawn());
    client.configure("X", "Y").expect("configure");
    Harness { client: Arc::new(client), service, presenter }
}
