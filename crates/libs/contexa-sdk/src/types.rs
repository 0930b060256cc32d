mod config;
mod device;
mod session;
mod subscription;

pub use config::{EventRequirementConfig, Features, SdkSettings, DEFAULT_TELEMETRY_CAPACITY};
pub use device::{DeviceDescriptor, LinkedDevice};
pub(crate) use session::AuthGrantResponse;
pub use session::{AuthToken, LoginHints, LoginScreen, PermissionDescriptor, PermissionRequest};
pub use subscription::{Ack, MissingData, Subscription, SubscriptionState, UserSituation};
