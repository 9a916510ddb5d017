//! # RegistrationPlugin
//!
//! Owns the pipeline and its shared state, wires it to the host's user
//! event source and exposes the administration accessors.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use reg_core::{
    ConfigStore, ListenerId, RegistrationError, Result, ServerIdentity, UserEventListener,
    UserEventSource,
};

use crate::actions::Collaborators;
use crate::contacts::{ContactKind, ContactList};
use crate::pipeline::RegistrationPipeline;
use crate::privacy::PrivacyListCache;
use crate::settings::{keys, Settings, DEFAULT_HEADER, DEFAULT_WELCOME_MESSAGE};
use crate::validation::is_valid_address;

/// Path of the public sign-up page, relative to the admin console.
pub const SIGN_UP_PATH: &str = "registration/sign-up.jsp";

pub struct RegistrationPlugin {
    server: ServerIdentity,
    settings: Settings,
    im_contacts: Arc<ContactList>,
    email_contacts: Arc<ContactList>,
    privacy_cache: Arc<PrivacyListCache>,
    pipeline: Arc<RegistrationPipeline>,
    events: Arc<dyn UserEventSource>,
    subscription: Mutex<Option<ListenerId>>,
}

impl RegistrationPlugin {
    /// Loads both contact lists and drops settings left by the first release.
    pub fn new(
        server: ServerIdentity,
        config: Arc<dyn ConfigStore>,
        events: Arc<dyn UserEventSource>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let settings = Settings::new(config);
        for key in keys::LEGACY {
            settings.delete(key)?;
        }

        let im_contacts = Arc::new(ContactList::load(ContactKind::Im, settings.clone())?);
        let email_contacts = Arc::new(ContactList::load(ContactKind::Email, settings.clone())?);
        let privacy_cache = Arc::new(PrivacyListCache::new());
        let pipeline = Arc::new(RegistrationPipeline::new(
            server.clone(),
            settings.clone(),
            im_contacts.clone(),
            email_contacts.clone(),
            privacy_cache.clone(),
            collaborators,
        ));

        Ok(Self {
            server,
            settings,
            im_contacts,
            email_contacts,
            privacy_cache,
            pipeline,
            events,
            subscription: Mutex::new(None),
        })
    }

    /// Subscribes the pipeline to user events. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return;
        }
        let listener: Arc<dyn UserEventListener> = self.pipeline.clone();
        *subscription = Some(self.events.add_listener(listener));
        info!(domain = %self.server.domain, "registration plugin started");
    }

    /// Unsubscribes and drops the cached privacy list.
    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            if !self.events.remove_listener(id) {
                warn!(?id, "registration listener was already removed");
            }
        }
        self.privacy_cache.invalidate();
        info!("registration plugin stopped");
    }

    pub fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn pipeline(&self) -> &Arc<RegistrationPipeline> {
        &self.pipeline
    }

    pub fn privacy_cache(&self) -> &PrivacyListCache {
        &self.privacy_cache
    }

    // ── Notifications ───────────────────────────────────────────────────────

    pub fn set_im_notification_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::IM_NOTIFICATION_ENABLED, enable)
    }

    pub fn im_notification_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::IM_NOTIFICATION_ENABLED, false)
    }

    pub fn set_email_notification_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::EMAIL_NOTIFICATION_ENABLED, enable)
    }

    pub fn email_notification_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::EMAIL_NOTIFICATION_ENABLED, false)
    }

    /// Sorted.
    pub fn im_contacts(&self) -> Vec<String> {
        self.im_contacts.list()
    }

    pub fn add_im_contact(&self, contact: &str) -> Result<bool> {
        self.im_contacts.add(contact)
    }

    pub fn remove_im_contact(&self, contact: &str) -> Result<bool> {
        self.im_contacts.remove(contact)
    }

    /// Sorted.
    pub fn email_contacts(&self) -> Vec<String> {
        self.email_contacts.list()
    }

    /// Rejects anything that does not look like `local@domain.tld`.
    pub fn add_email_contact(&self, contact: &str) -> Result<bool> {
        let trimmed = contact.trim();
        if !is_valid_address(Some(trimmed)) {
            return Err(RegistrationError::InvalidAddress(trimmed.to_string()));
        }
        self.email_contacts.add(trimmed)
    }

    pub fn remove_email_contact(&self, contact: &str) -> Result<bool> {
        self.email_contacts.remove(contact)
    }

    // ── Welcome message ─────────────────────────────────────────────────────

    pub fn set_welcome_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::WELCOME_ENABLED, enable)
    }

    pub fn welcome_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::WELCOME_ENABLED, false)
    }

    pub fn set_welcome_message(&self, message: &str) -> Result<()> {
        self.settings.set_string(keys::WELCOME_MESSAGE, message)
    }

    pub fn welcome_message(&self) -> Result<String> {
        self.settings
            .get_string_or(keys::WELCOME_MESSAGE, DEFAULT_WELCOME_MESSAGE)
    }

    pub fn set_welcome_raw_message(&self, message: &str) -> Result<()> {
        self.settings.set_string(keys::WELCOME_RAW_MESSAGE, message)
    }

    pub fn welcome_raw_message(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::WELCOME_RAW_MESSAGE)
    }

    pub fn set_welcome_message_from(&self, from: &str) -> Result<()> {
        self.settings.set_string(keys::WELCOME_MESSAGE_FROM, from)
    }

    pub fn welcome_message_from(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::WELCOME_MESSAGE_FROM)
    }

    // ── Group ───────────────────────────────────────────────────────────────

    pub fn set_group_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::GROUP_ENABLED, enable)
    }

    pub fn group_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::GROUP_ENABLED, false)
    }

    pub fn set_group(&self, group: &str) -> Result<()> {
        self.settings.set_string(keys::GROUP, group)
    }

    pub fn group(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::GROUP)
    }

    // ── Privacy list ────────────────────────────────────────────────────────

    pub fn set_privacy_list_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::PRIVACY_LIST_ENABLED, enable)
    }

    pub fn privacy_list_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::PRIVACY_LIST_ENABLED, false)
    }

    /// Stores the document and invalidates the cached template atomically.
    pub fn set_privacy_list(&self, document: &str) -> Result<()> {
        self.privacy_cache
            .update(|| self.settings.set_string(keys::PRIVACY_LIST, document))
    }

    pub fn privacy_list(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::PRIVACY_LIST)
    }

    pub fn set_privacy_list_name(&self, name: &str) -> Result<()> {
        self.settings.set_string(keys::PRIVACY_LIST_NAME, name)
    }

    pub fn privacy_list_name(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::PRIVACY_LIST_NAME)
    }

    // ── Automatic lockout ───────────────────────────────────────────────────

    pub fn set_automatic_lockout_after(&self, seconds: i64) -> Result<()> {
        self.settings.set_i64(keys::AUTOMATIC_LOCKOUT_SECONDS, seconds)
    }

    /// Seconds; zero or less means disabled.
    pub fn automatic_lockout_after(&self) -> Result<i64> {
        self.settings.get_i64(keys::AUTOMATIC_LOCKOUT_SECONDS, -1)
    }

    pub fn is_automatic_lockout_enabled(&self) -> Result<bool> {
        Ok(self.automatic_lockout_after()? > 0)
    }

    // ── Web sign-up ─────────────────────────────────────────────────────────

    pub fn set_web_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::WEB_ENABLED, enable)
    }

    pub fn web_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::WEB_ENABLED, false)
    }

    pub fn web_registration_address(&self) -> String {
        format!(
            "http://{}:{}/plugins/{}",
            self.server.domain, self.server.admin_port, SIGN_UP_PATH
        )
    }

    pub fn set_header(&self, header: &str) -> Result<()> {
        self.settings.set_string(keys::HEADER, header)
    }

    pub fn header(&self) -> Result<String> {
        self.settings.get_string_or(keys::HEADER, DEFAULT_HEADER)
    }

    pub fn set_recaptcha_enabled(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::RECAPTCHA_ENABLED, enable)
    }

    pub fn recaptcha_enabled(&self) -> Result<bool> {
        self.settings.get_bool(keys::RECAPTCHA_ENABLED, false)
    }

    pub fn set_recaptcha_noscript(&self, enable: bool) -> Result<()> {
        self.settings.set_bool(keys::RECAPTCHA_NOSCRIPT, enable)
    }

    pub fn recaptcha_noscript(&self) -> Result<bool> {
        self.settings.get_bool(keys::RECAPTCHA_NOSCRIPT, true)
    }

    pub fn set_recaptcha_public_key(&self, key: &str) -> Result<()> {
        self.settings.set_string(keys::RECAPTCHA_PUBLIC_KEY, key)
    }

    pub fn recaptcha_public_key(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::RECAPTCHA_PUBLIC_KEY)
    }

    pub fn set_recaptcha_private_key(&self, key: &str) -> Result<()> {
        self.settings.set_string(keys::RECAPTCHA_PRIVATE_KEY, key)
    }

    pub fn recaptcha_private_key(&self) -> Result<Option<String>> {
        self.settings.get_string(keys::RECAPTCHA_PRIVATE_KEY)
    }
}
