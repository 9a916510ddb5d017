//! # reg-memory
//!
//! In-process implementations of every reg-core port.
//! Nothing survives a restart; delivered messages, emails and lockouts are
//! recorded so they can be inspected afterwards.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use xmltree::Element;

use reg_core::traits::{
    Clock, ConfigStore, EmailTransport, GroupStore, ListenerId, LockoutStore, MessageRouter,
    PrivacyListStore, UserEventListener, UserEventSource,
};
use reg_core::{Email, EventParams, Group, Jid, Message, PendingLockout, PrivacyList, User};

/// Key/value settings held in a sorted map.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store, e.g. from a host configuration file.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Router that records every stanza in arrival order.
#[derive(Debug, Default)]
pub struct RecordingRouter {
    routed: Mutex<Vec<Message>>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.routed.lock().clone()
    }

    /// Messages addressed to `to`, in arrival order.
    pub fn messages_to(&self, to: &str) -> Vec<Message> {
        self.routed
            .lock()
            .iter()
            .filter(|m| m.recipient() == Some(to))
            .cloned()
            .collect()
    }
}

impl MessageRouter for RecordingRouter {
    fn route(&self, message: Message) {
        debug!(to = ?message.recipient(), "message routed");
        self.routed.lock().push(message);
    }
}

/// Mail transport that records instead of sending.
/// Addresses registered with [`RecordingMailer::fail_for`] are rejected.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: RwLock<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.write().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

impl EmailTransport for RecordingMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        if self.failing.read().contains(&email.to_address) {
            bail!("mailbox unavailable: {}", email.to_address);
        }
        info!(to = %email.to_address, subject = %email.subject, "email recorded");
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

/// Groups keyed by name.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: DashMap<String, Vec<Jid>>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_group(&self, name: &str) {
        self.groups.entry(name.to_string()).or_default();
    }

    pub fn members(&self, name: &str) -> Vec<Jid> {
        self.groups
            .get(name)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }
}

impl GroupStore for MemoryGroupStore {
    fn get_group(&self, name: &str) -> anyhow::Result<Option<Group>> {
        Ok(self.groups.contains_key(name).then(|| Group {
            name: name.to_string(),
        }))
    }

    fn add_member(&self, group: &Group, member: &Jid) -> anyhow::Result<()> {
        let Some(mut members) = self.groups.get_mut(&group.name) else {
            bail!("group {} vanished", group.name);
        };
        if !members.contains(member) {
            members.push(member.clone());
        }
        Ok(())
    }
}

/// Privacy lists per owner, plus each owner's default list name.
#[derive(Debug, Default)]
pub struct MemoryPrivacyListStore {
    lists: DashMap<String, Vec<PrivacyList>>,
    defaults: DashMap<String, String>,
}

impl MemoryPrivacyListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lists(&self, owner: &str) -> Vec<PrivacyList> {
        self.lists
            .get(owner)
            .map(|lists| lists.value().clone())
            .unwrap_or_default()
    }

    pub fn default_list(&self, owner: &str) -> Option<String> {
        self.defaults.get(owner).map(|name| name.value().clone())
    }
}

impl PrivacyListStore for MemoryPrivacyListStore {
    fn create_list(&self, owner: &str, name: &str, template: &Element) -> anyhow::Result<PrivacyList> {
        let list = PrivacyList {
            owner: owner.to_string(),
            name: name.to_string(),
            items: template.clone(),
        };
        let mut lists = self.lists.entry(owner.to_string()).or_default();
        lists.retain(|existing| existing.name != name);
        lists.push(list.clone());
        Ok(list)
    }

    fn set_default(&self, owner: &str, list: &PrivacyList) -> anyhow::Result<()> {
        if list.owner != owner {
            bail!("list {} belongs to {}, not {}", list.name, list.owner, owner);
        }
        self.defaults.insert(owner.to_string(), list.name.clone());
        Ok(())
    }
}

/// Records scheduled lockouts; the latest one per account wins.
#[derive(Debug, Default)]
pub struct MemoryLockoutStore {
    lockouts: DashMap<String, PendingLockout>,
}

impl MemoryLockoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lockout(&self, username: &str) -> Option<PendingLockout> {
        self.lockouts.get(username).map(|l| l.value().clone())
    }

    /// Whether `username` is locked out at `at`.
    pub fn is_locked_out(&self, username: &str, at: DateTime<Utc>) -> bool {
        self.lockouts.get(username).is_some_and(|l| {
            l.start_time <= at && l.end_time.map_or(true, |end| at < end)
        })
    }

    pub fn len(&self) -> usize {
        self.lockouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lockouts.is_empty()
    }
}

impl LockoutStore for MemoryLockoutStore {
    fn disable_account(&self, lockout: &PendingLockout) -> anyhow::Result<()> {
        self.lockouts.insert(lockout.username.clone(), lockout.clone());
        Ok(())
    }
}

/// Synchronous user event dispatcher.
///
/// Listeners are invoked on the caller's thread, in registration order.
#[derive(Default)]
pub struct LocalUserEventDispatcher {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn UserEventListener>)>>,
}

impl LocalUserEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn dispatch_user_created(&self, user: &User, params: &EventParams) {
        for listener in self.snapshot() {
            listener.user_created(user, params);
        }
    }

    pub fn dispatch_user_deleting(&self, user: &User, params: &EventParams) {
        for listener in self.snapshot() {
            listener.user_deleting(user, params);
        }
    }

    pub fn dispatch_user_modified(&self, user: &User, params: &EventParams) {
        for listener in self.snapshot() {
            listener.user_modified(user, params);
        }
    }

    // Listeners may (de)register while being called.
    fn snapshot(&self) -> Vec<Arc<dyn UserEventListener>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

impl UserEventSource for LocalUserEventDispatcher {
    fn add_listener(&self, listener: Arc<dyn UserEventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
