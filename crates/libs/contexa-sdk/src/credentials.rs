//! Application identity and the current user session.
//!
//! Readers get cloned views; every mutation is `pub(crate)` and only the
//! session controller in `client::session` calls them.

use std::collections::BTreeSet;
use std::sync::RwLock;
use zeroize::Zeroizing;

#[derive(Clone)]
pub(crate) struct AppIdentity {
    pub app_id: String,
    pub app_secret: Zeroizing<String>,
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Default)]
struct Credentials {
    identity: Option<AppIdentity>,
    user_token: Option<Zeroizing<String>>,
    granted_permissions: BTreeSet<String>,
    generation: u64,
}

/// Read-only view of the session handed to components and callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub app_id: Option<String>,
    pub authenticated: bool,
    pub granted_permissions: BTreeSet<String>,
}

#[derive(Default)]
pub struct CredentialStore {
    inner: RwLock<Credentials>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").field("session", &self.view()).finish()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SessionView {
        let guard = self.inner.read().expect("credentials rwlock poisoned");
        SessionView {
            app_id: guard.identity.as_ref().map(|identity| identity.app_id.clone()),
            authenticated: guard.user_token.is_some(),
            granted_permissions: guard.granted_permissions.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.read().expect("credentials rwlock poisoned").identity.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().expect("credentials rwlock poisoned").user_token.is_some()
    }

    /// Bumped on every session change; lets late results detect a stale session.
    pub fn generation(&self) -> u64 {
        self.inner.read().expect("credentials rwlock poisoned").generation
    }

    pub(crate) fn identity(&self) -> Option<AppIdentity> {
        self.inner.read().expect("credentials rwlock poisoned").identity.clone()
    }

    pub(crate) fn user_token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("credentials rwlock poisoned")
            .user_token
            .as_ref()
            .map(|token| token.as_str().to_owned())
    }

    /// Returns `true` when the app id changed. Any user session of the previous
    /// app is dropped.
    pub(crate) fn set_identity(&self, app_id: String, app_secret: String) -> bool {
        let mut guard = self.inner.write().expect("credentials rwlock poisoned");
        let app_changed =
            guard.identity.as_ref().is_some_and(|identity| identity.app_id != app_id);
        guard.identity = Some(AppIdentity { app_id, app_secret: Zeroizing::new(app_secret) });
        if app_changed && guard.user_token.is_some() {
            guard.user_token = None;
            guard.granted_permissions.clear();
            guard.generation = guard.generation.wrapping_add(1);
        }
        app_changed
    }

    pub(crate) fn establish_session(
        &self,
        token: String,
        granted_permissions: BTreeSet<String>,
    ) -> u64 {
        let mut guard = self.inner.write().expect("credentials rwlock poisoned");
        guard.user_token = Some(Zeroizing::new(token));
        guard.granted_permissions = granted_permissions;
        guard.generation = guard.generation.wrapping_add(1);
        guard.generation
    }

    /// Only applies when `generation` still names the current session.
    pub(crate) fn replace_permissions(
        &self,
        generation: u64,
        granted_permissions: BTreeSet<String>,
    ) -> bool {
        let mut guard = self.inner.write().expect("credentials rwlock poisoned");
        if guard.generation != generation || guard.user_token.is_none() {
            return false;
        }
        guard.granted_permissions = granted_permissions;
        true
    }

    /// Returns `true` if a session was actually cleared.
    pub(crate) fn clear_session(&self) -> bool {
        let mut guard = self.inner.write().expect("credentials rwlock poisoned");
        let had_session = guard.user_token.is_some();
        guard.user_token = None;
        guard.granted_permissions.clear();
        guard.generation = guard.generation.wrapping_add(1);
        had_session
    }
}
