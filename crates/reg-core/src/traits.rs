//! # Core Traits (Ports)
//!
//! Everything the registration pipeline touches outside its own memory goes
//! through one of these. Any plugin must implement them to be wired into
//! the binary. Calls are synchronous: a registration event is handled on the
//! thread that delivered it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use xmltree::Element;

use crate::models::{Email, EventParams, Group, Jid, Message, PendingLockout, PrivacyList, User};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Persisted key/value configuration.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Removes the key entirely. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Fire-and-forget delivery of message stanzas.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait MessageRouter: Send + Sync {
    fn route(&self, message: Message);
}

/// Outbound mail. Each call may fail independently.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait EmailTransport: Send + Sync {
    fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Group membership contract.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait GroupStore: Send + Sync {
    /// Returns `None` when no group carries that name.
    fn get_group(&self, name: &str) -> anyhow::Result<Option<Group>>;
    fn add_member(&self, group: &Group, member: &Jid) -> anyhow::Result<()>;
}

/// Privacy list persistence contract.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait PrivacyListStore: Send + Sync {
    /// Creates a list named `name` for `owner` from the rules in `template`.
    fn create_list(&self, owner: &str, name: &str, template: &Element) -> anyhow::Result<PrivacyList>;
    fn set_default(&self, owner: &str, list: &PrivacyList) -> anyhow::Result<()>;
}

/// Account lockout contract.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait LockoutStore: Send + Sync {
    fn disable_account(&self, lockout: &PendingLockout) -> anyhow::Result<()>;
}

/// Callback interface for user lifecycle events.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait UserEventListener: Send + Sync {
    fn user_created(&self, user: &User, params: &EventParams);

    fn user_deleting(&self, _user: &User, _params: &EventParams) {}

    fn user_modified(&self, _user: &User, _params: &EventParams) {}
}

/// Handle returned by [`UserEventSource::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The host's user event dispatcher.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait UserEventSource: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn UserEventListener>) -> ListenerId;
    /// Returns false if the id was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Time source, swapped for a fixed clock in tests.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
