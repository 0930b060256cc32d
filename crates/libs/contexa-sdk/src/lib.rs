#![allow(clippy::result_large_err)]

pub mod catalog;
mod client;
mod credentials;
pub mod delivery;
mod error;
pub mod error_bus;
mod lifecycle;
pub mod presentation;
pub mod push;
mod subscriptions;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use catalog::{CatalogEntry, CatalogSnapshot, EventRequirement};
pub use client::Client;
pub use credentials::SessionView;
pub use delivery::{DeliveryContext, DeliveryLoop};
pub use error::{code as error_code, ErrorCategory, SdkError, SdkErrorCode, ERROR_DOMAIN};
pub use error_bus::{ErrorBatch, ErrorBus, ErrorNotice, ListenerId};
pub use lifecycle::{ensure_method_legal, SdkMethod, SessionState};
pub use presentation::{PresentationFlow, PresentationOutcome, Presenter};
pub use push::{decode_payload, AutomaticPushHook, PushEvent, PushKind, PushPayload, PushRouter};
pub use telemetry::DiagnosticRecord;
pub use transport::{ApiCall, ApiRequest, ApiResponse, Transport, TransportError};
pub use types::{
    Ack, AuthToken, DeviceDescriptor, EventRequirementConfig, Features, LinkedDevice, LoginHints,
    LoginScreen, MissingData, PermissionDescriptor, PermissionRequest, SdkSettings, Subscription,
    SubscriptionState, UserSituation,
};

/// Semantic version of this SDK build.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
