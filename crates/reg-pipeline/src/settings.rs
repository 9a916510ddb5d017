//! Typed access to the plugin's persisted settings.
//!
//! All reads and writes go through [`Settings`]; the pipeline itself only
//! ever sees a [`RegistrationConfig`] snapshot taken once per event.

use std::sync::Arc;

use reg_core::{ConfigStore, Jid, Result};

/// Persisted setting keys.
pub mod keys {
    pub const IM_NOTIFICATION_ENABLED: &str = "registration.imnotification.enabled";
    pub const EMAIL_NOTIFICATION_ENABLED: &str = "registration.emailnotification.enabled";
    pub const WELCOME_ENABLED: &str = "registration.welcome.enabled";
    pub const GROUP_ENABLED: &str = "registration.group.enabled";
    pub const PRIVACY_LIST_ENABLED: &str = "registration.privacylist.enabled";
    pub const WEB_ENABLED: &str = "registration.web.enabled";
    pub const RECAPTCHA_ENABLED: &str = "registration.recaptcha.enabled";
    pub const RECAPTCHA_NOSCRIPT: &str = "registration.recaptcha.noscript";
    pub const RECAPTCHA_PUBLIC_KEY: &str = "registration.recaptcha.key.public";
    pub const RECAPTCHA_PRIVATE_KEY: &str = "registration.recaptcha.key.private";
    pub const IM_CONTACTS: &str = "registration.notification.imContacts";
    pub const EMAIL_CONTACTS: &str = "registration.notification.emailContacts";
    pub const WELCOME_MESSAGE: &str = "registration.welcome.message";
    pub const WELCOME_RAW_MESSAGE: &str = "registration.welcome.message.raw";
    pub const WELCOME_MESSAGE_FROM: &str = "registration.welcome.message.from";
    pub const GROUP: &str = "registration.group";
    pub const PRIVACY_LIST: &str = "registration.privacylist";
    pub const PRIVACY_LIST_NAME: &str = "registration.privacylist.name";
    pub const AUTOMATIC_LOCKOUT_SECONDS: &str = "registration.automatic.lockout.seconds";
    pub const HEADER: &str = "registration.header";

    /// Keys written by the first plugin release, removed on startup.
    pub const LEGACY: [&str; 2] = [
        "registration.notification.contact",
        "registration.notification.enabled",
    ];
}

pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome!";
pub const DEFAULT_HEADER: &str = "Web Sign-In";

/// Thin typed wrapper over the configuration store.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn ConfigStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Non-empty string value, or `None`.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.get(key)?.filter(|value| !value.is_empty()))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get_string(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.store.set(key, value)?)
    }

    /// Only a case-insensitive "true" counts as true.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(match self.store.get(key)? {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        })
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" })
    }

    /// Unparseable values fall back to `default`.
    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .store
            .get(key)?
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default))
    }

    pub fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        Ok(self.store.delete(key)?)
    }

    /// Reads every value the pipeline needs in one pass.
    pub fn snapshot(&self) -> Result<RegistrationConfig> {
        Ok(RegistrationConfig {
            im_notification_enabled: self.get_bool(keys::IM_NOTIFICATION_ENABLED, false)?,
            email_notification_enabled: self.get_bool(keys::EMAIL_NOTIFICATION_ENABLED, false)?,
            welcome_enabled: self.get_bool(keys::WELCOME_ENABLED, false)?,
            welcome_message: self.get_string_or(keys::WELCOME_MESSAGE, DEFAULT_WELCOME_MESSAGE)?,
            welcome_raw_message: self.get_string(keys::WELCOME_RAW_MESSAGE)?,
            welcome_from: self
                .get_string(keys::WELCOME_MESSAGE_FROM)?
                .map(Jid::from),
            group_enabled: self.get_bool(keys::GROUP_ENABLED, false)?,
            group: self.get_string(keys::GROUP)?,
            privacy_list_enabled: self.get_bool(keys::PRIVACY_LIST_ENABLED, false)?,
            privacy_list_name: self.get_string(keys::PRIVACY_LIST_NAME)?,
            automatic_lockout_after: self.get_i64(keys::AUTOMATIC_LOCKOUT_SECONDS, -1)?,
        })
    }
}

/// Immutable view of the settings for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    pub im_notification_enabled: bool,
    pub email_notification_enabled: bool,
    pub welcome_enabled: bool,
    pub welcome_message: String,
    pub welcome_raw_message: Option<String>,
    pub welcome_from: Option<Jid>,
    pub group_enabled: bool,
    pub group: Option<String>,
    pub privacy_list_enabled: bool,
    pub privacy_list_name: Option<String>,
    /// Seconds; zero or less disables the lockout.
    pub automatic_lockout_after: i64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            im_notification_enabled: false,
            email_notification_enabled: false,
            welcome_enabled: false,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            welcome_raw_message: None,
            welcome_from: None,
            group_enabled: false,
            group: None,
            privacy_list_enabled: false,
            privacy_list_name: None,
            automatic_lockout_after: -1,
        }
    }
}

impl RegistrationConfig {
    pub fn automatic_lockout_enabled(&self) -> bool {
        self.automatic_lockout_after > 0
    }
}
