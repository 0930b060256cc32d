//! Local bookkeeping for event subscriptions.
//!
//! Entries move `Requested -> Active`; a rejected request removes its entry
//! (the caller sees `Failed`) and an unsubscribe removes it (`Removed`). The
//! lock is only held for map updates, never across a service call.

use crate::error::SdkError;
use crate::types::{Subscription, SubscriptionState};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

struct Entry {
    subscription: Subscription,
    /// Distinguishes a re-created identifier from the request that created it.
    generation: u64,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Mutex<BTreeMap<String, Entry>>,
    next_generation: AtomicU64,
}

/// Token for one in-flight subscribe request.
#[derive(Debug)]
pub(crate) struct PendingSubscription {
    pub identifier: String,
    requested: Subscription,
    generation: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(
        &self,
        event_name: &str,
        identifier: &str,
        webhook_id: Option<String>,
    ) -> Result<PendingSubscription, SdkError> {
        let mut entries = self.entries.lock().expect("subscription registry mutex poisoned");
        if entries.contains_key(identifier) {
            return Err(SdkError::DuplicateSubscription { identifier: identifier.to_owned() });
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let requested = Subscription::new(event_name, identifier, webhook_id);
        entries.insert(
            identifier.to_owned(),
            Entry { subscription: requested.clone(), generation },
        );
        Ok(PendingSubscription { identifier: identifier.to_owned(), requested, generation })
    }

    /// Marks the request acknowledged. If the entry was removed meanwhile the
    /// returned subscription reports `Removed`.
    pub fn confirm(&self, pending: PendingSubscription) -> Subscription {
        let mut entries = self.entries.lock().expect("subscription registry mutex poisoned");
        match entries.get_mut(&pending.identifier) {
            Some(entry) if entry.generation == pending.generation => {
                entry.subscription.state = SubscriptionState::Active;
                entry.subscription.clone()
            }
            _ => {
                log::debug!(
                    "subscription '{}' was removed before its acknowledgment",
                    pending.identifier
                );
                pending.requested.with_state(SubscriptionState::Removed)
            }
        }
    }

    /// Drops the entry so the identifier can be used again.
    pub fn fail(&self, pending: PendingSubscription) {
        let mut entries = self.entries.lock().expect("subscription registry mutex poisoned");
        if entries
            .get(&pending.identifier)
            .is_some_and(|entry| entry.generation == pending.generation)
        {
            entries.remove(&pending.identifier);
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries
            .lock()
            .expect("subscription registry mutex poisoned")
            .contains_key(identifier)
    }

    pub fn remove(&self, identifier: &str) -> Option<Subscription> {
        self.entries
            .lock()
            .expect("subscription registry mutex poisoned")
            .remove(identifier)
            .map(|entry| entry.subscription.with_state(SubscriptionState::Removed))
    }

    /// The service list wins: local active entries it lacks are dropped and
    /// entries it has are adopted as active. In-flight requests are untouched.
    pub fn reconcile(&self, server: &[Subscription]) {
        let mut entries = self.entries.lock().expect("subscription registry mutex poisoned");
        let server_ids: BTreeSet<&str> =
            server.iter().map(|subscription| subscription.identifier.as_str()).collect();
        entries.retain(|identifier, entry| {
            entry.subscription.state == SubscriptionState::Requested
                || server_ids.contains(identifier.as_str())
        });
        for subscription in server {
            match entries.get_mut(&subscription.identifier) {
                Some(entry) if entry.subscription.state == SubscriptionState::Requested => {}
                Some(entry) => {
                    entry.subscription = subscription.clone().with_state(SubscriptionState::Active);
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    entries.insert(
                        subscription.identifier.clone(),
                        Entry {
                            subscription: subscription
                                .clone()
                                .with_state(SubscriptionState::Active),
                            generation,
                        },
                    );
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries
            .lock()
            .expect("subscription registry mutex poisoned")
            .values()
            .map(|entry| entry.subscription.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("subscription registry mutex poisoned").clear();
    }
}
