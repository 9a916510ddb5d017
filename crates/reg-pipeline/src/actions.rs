//! The side effects run for every new account.
//!
//! Each action reads only the per-event [`RegistrationConfig`] snapshot and
//! the collaborator handles it is given. The pipeline decides whether an
//! action runs; the functions here assume it is enabled.

use std::fmt;
use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{debug, error};

use reg_core::{
    Clock, Email, EmailTransport, GroupStore, LockoutStore, Message, MessageRouter, PendingLockout,
    PrivacyListStore, RegistrationError, Result, ServerIdentity, User,
};

use crate::contacts::ContactList;
use crate::privacy::PrivacyListCache;
use crate::settings::{keys, RegistrationConfig, Settings};
use crate::template::WelcomeTemplate;

pub const IM_NOTIFICATION_SUBJECT: &str = "Registration Notification";
pub const EMAIL_NOTIFICATION_SUBJECT: &str = "User Registration";

/// One configurable side effect. Variants are listed in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationAction {
    ImNotification,
    EmailNotification,
    WelcomeMessage,
    GroupEnrollment,
    PrivacyList,
    AutomaticLockout,
}

impl RegistrationAction {
    /// Fixed run order, independent of configuration.
    pub const ORDER: [RegistrationAction; 6] = [
        RegistrationAction::ImNotification,
        RegistrationAction::EmailNotification,
        RegistrationAction::WelcomeMessage,
        RegistrationAction::GroupEnrollment,
        RegistrationAction::PrivacyList,
        RegistrationAction::AutomaticLockout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RegistrationAction::ImNotification => "im-notification",
            RegistrationAction::EmailNotification => "email-notification",
            RegistrationAction::WelcomeMessage => "welcome-message",
            RegistrationAction::GroupEnrollment => "group-enrollment",
            RegistrationAction::PrivacyList => "privacy-list",
            RegistrationAction::AutomaticLockout => "automatic-lockout",
        }
    }

    pub fn is_enabled(self, config: &RegistrationConfig) -> bool {
        match self {
            RegistrationAction::ImNotification => config.im_notification_enabled,
            RegistrationAction::EmailNotification => config.email_notification_enabled,
            RegistrationAction::WelcomeMessage => config.welcome_enabled,
            RegistrationAction::GroupEnrollment => config.group_enabled,
            RegistrationAction::PrivacyList => config.privacy_list_enabled,
            RegistrationAction::AutomaticLockout => config.automatic_lockout_enabled(),
        }
    }
}

impl fmt::Display for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// External handles the actions deliver through.
#[derive(Clone)]
pub struct Collaborators {
    pub router: Arc<dyn MessageRouter>,
    pub mailer: Arc<dyn EmailTransport>,
    pub groups: Arc<dyn GroupStore>,
    pub privacy_lists: Arc<dyn PrivacyListStore>,
    pub lockouts: Arc<dyn LockoutStore>,
    pub clock: Arc<dyn Clock>,
}

/// What every action knows about the registration being handled.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub user: &'a User,
    pub config: &'a RegistrationConfig,
    pub server: &'a ServerIdentity,
}

pub fn notification_body(username: &str) -> String {
    format!("A new user with the username '{username}' just registered.")
}

/// Sends one instant message per IM contact, in sorted order.
pub fn notify_im(ctx: &ActionContext<'_>, contacts: &ContactList, router: &dyn MessageRouter) -> usize {
    let from = ctx.server.address();
    let body = notification_body(&ctx.user.username);
    let recipients = contacts.list();
    for contact in &recipients {
        let to = ctx.server.user_address(contact);
        router.route(Message::chat(&to, &from, Some(IM_NOTIFICATION_SUBJECT), &body));
    }
    recipients.len()
}

/// Emails every email contact, in insertion order.
///
/// A failed send is logged and the remaining recipients are still tried.
/// Returns how many sends succeeded.
pub fn notify_email(ctx: &ActionContext<'_>, contacts: &ContactList, mailer: &dyn EmailTransport) -> usize {
    let body = notification_body(&ctx.user.username);
    let from_address = format!("no_reply@{}", ctx.server.domain);
    let mut delivered = 0;
    for recipient in contacts.entries() {
        let email = Email {
            to_name: None,
            to_address: recipient.clone(),
            from_name: ctx.server.name.clone(),
            from_address: from_address.clone(),
            subject: EMAIL_NOTIFICATION_SUBJECT.to_string(),
            text_body: body.clone(),
            html_body: None,
        };
        match mailer.send(&email) {
            Ok(()) => delivered += 1,
            Err(err) => {
                let err = RegistrationError::Transport(err);
                error!(recipient = %recipient, error = %err, "unable to send registration email");
            }
        }
    }
    delivered
}

/// Routes the expanded welcome template to the new account.
pub fn send_welcome(ctx: &ActionContext<'_>, router: &dyn MessageRouter) -> Result<usize> {
    let to = ctx.server.user_address(&ctx.user.username);
    let from = ctx
        .config
        .welcome_from
        .clone()
        .unwrap_or_else(|| ctx.server.address());
    let messages = WelcomeTemplate::from_config(ctx.config).expand(&to, &from)?;
    let count = messages.len();
    for message in messages {
        router.route(message);
    }
    Ok(count)
}

/// Adds the new account to the configured group.
pub fn enroll_in_group(ctx: &ActionContext<'_>, groups: &dyn GroupStore) -> Result<()> {
    let name = ctx
        .config
        .group
        .as_deref()
        .ok_or(RegistrationError::ConfigurationMissing(keys::GROUP))?;
    let group = groups
        .get_group(name)?
        .ok_or_else(|| RegistrationError::GroupNotFound(name.to_string()))?;
    groups.add_member(&group, &ctx.server.user_address(&ctx.user.username))?;
    Ok(())
}

/// Creates the default privacy list for the new account from the cached
/// template. Returns false when no usable template is configured.
pub fn assign_privacy_list(
    ctx: &ActionContext<'_>,
    cache: &PrivacyListCache,
    settings: &Settings,
    store: &dyn PrivacyListStore,
) -> Result<bool> {
    let Some(template) = cache.get(|| settings.get_string(keys::PRIVACY_LIST))? else {
        return Ok(false);
    };
    let name = ctx
        .config
        .privacy_list_name
        .as_deref()
        .ok_or(RegistrationError::ConfigurationMissing(keys::PRIVACY_LIST_NAME))?;
    debug!(username = %ctx.user.username, list = name, "adding default privacy list");

    let list = store.create_list(&ctx.user.username, name, &template)?;
    store.set_default(&ctx.user.username, &list)?;
    Ok(true)
}

/// Schedules the account to be disabled `automatic_lockout_after` seconds
/// from now, with no expiry.
pub fn schedule_lockout(
    ctx: &ActionContext<'_>,
    clock: &dyn Clock,
    lockouts: &dyn LockoutStore,
) -> Result<PendingLockout> {
    let seconds = ctx.config.automatic_lockout_after;
    let start_time = TimeDelta::try_seconds(seconds)
        .and_then(|delay| clock.now().checked_add_signed(delay))
        .ok_or_else(|| RegistrationError::InvalidSetting {
            key: keys::AUTOMATIC_LOCKOUT_SECONDS,
            value: seconds.to_string(),
        })?;
    let lockout = PendingLockout {
        username: ctx.user.username.clone(),
        start_time,
        end_time: None,
    };
    lockouts.disable_account(&lockout)?;
    Ok(lockout)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use reg_core::{
        Group, Jid, MockClock, MockEmailTransport, MockGroupStore, MockLockoutStore,
        MockMessageRouter,
    };

    use super::*;
    use crate::contacts::ContactKind;
    use reg_core::MockConfigStore;

    fn server() -> ServerIdentity {
        ServerIdentity::new("example.org")
    }

    fn contacts(kind: ContactKind, joined: &'static str) -> ContactList {
        let mut store = MockConfigStore::new();
        store.expect_get().returning(move |_| Ok(Some(joined.to_string())));
        ContactList::load(kind, Settings::new(Arc::new(store))).unwrap()
    }

    #[test]
    fn actions_run_in_fixed_order() {
        let names: Vec<_> = RegistrationAction::ORDER.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "im-notification",
                "email-notification",
                "welcome-message",
                "group-enrollment",
                "privacy-list",
                "automatic-lockout",
            ]
        );
    }

    #[test]
    fn im_notification_goes_to_sorted_contacts() {
        let user = User::new("alice");
        let config = RegistrationConfig::default();
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut router = MockMessageRouter::new();
        let mut seq = mockall::Sequence::new();
        for expected in ["admin@example.org", "zed@example.org"] {
            router
                .expect_route()
                .withf(move |m| m.recipient() == Some(expected))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| ());
        }

        let sent = notify_im(&ctx, &contacts(ContactKind::Im, "zed,admin"), &router);
        assert_eq!(sent, 2);
    }

    #[test]
    fn email_failure_does_not_stop_remaining_recipients() {
        let user = User::new("alice");
        let config = RegistrationConfig::default();
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut mailer = MockEmailTransport::new();
        mailer
            .expect_send()
            .withf(|e| e.to_address == "broken@example.org")
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        mailer
            .expect_send()
            .withf(|e| e.to_address == "ops@example.org")
            .times(1)
            .returning(|e| {
                assert_eq!(e.subject, EMAIL_NOTIFICATION_SUBJECT);
                assert_eq!(e.from_address, "no_reply@example.org");
                Ok(())
            });

        let list = contacts(ContactKind::Email, "broken@example.org,ops@example.org");
        assert_eq!(notify_email(&ctx, &list, &mailer), 1);
    }

    #[test]
    fn welcome_uses_configured_sender() {
        let user = User::new("alice");
        let config = RegistrationConfig {
            welcome_enabled: true,
            welcome_message: "Hello!".to_string(),
            welcome_from: Some(Jid::from("greeter@example.org")),
            ..RegistrationConfig::default()
        };
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut router = MockMessageRouter::new();
        router
            .expect_route()
            .withf(|m| {
                m.sender() == Some("greeter@example.org")
                    && m.recipient() == Some("alice@example.org")
                    && m.body().as_deref() == Some("Hello!")
            })
            .times(1)
            .returning(|_| ());

        assert_eq!(send_welcome(&ctx, &router).unwrap(), 1);
    }

    #[test]
    fn missing_group_is_reported() {
        let user = User::new("alice");
        let config = RegistrationConfig {
            group_enabled: true,
            group: Some("newcomers".to_string()),
            ..RegistrationConfig::default()
        };
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut groups = MockGroupStore::new();
        groups
            .expect_get_group()
            .with(eq("newcomers"))
            .returning(|_| Ok(None));
        groups.expect_add_member().never();

        let err = enroll_in_group(&ctx, &groups).unwrap_err();
        assert!(matches!(err, RegistrationError::GroupNotFound(name) if name == "newcomers"));
    }

    #[test]
    fn group_enrollment_adds_full_address() {
        let user = User::new("alice");
        let config = RegistrationConfig {
            group: Some("newcomers".to_string()),
            ..RegistrationConfig::default()
        };
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut groups = MockGroupStore::new();
        groups
            .expect_get_group()
            .returning(|name| Ok(Some(Group { name: name.to_string() })));
        groups
            .expect_add_member()
            .withf(|group, member| group.name == "newcomers" && member.as_str() == "alice@example.org")
            .times(1)
            .returning(|_, _| Ok(()));

        enroll_in_group(&ctx, &groups).unwrap();
    }

    #[test]
    fn group_name_is_required() {
        let user = User::new("alice");
        let config = RegistrationConfig::default();
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };
        let groups = MockGroupStore::new();

        let err = enroll_in_group(&ctx, &groups).unwrap_err();
        assert!(matches!(err, RegistrationError::ConfigurationMissing(keys::GROUP)));
    }

    #[test]
    fn lockout_starts_after_delay_and_never_expires() {
        let user = User::new("alice");
        let config = RegistrationConfig {
            automatic_lockout_after: 60,
            ..RegistrationConfig::default()
        };
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut clock = MockClock::new();
        clock.expect_now().return_const(now);
        let mut lockouts = MockLockoutStore::new();
        lockouts
            .expect_disable_account()
            .withf(move |l| {
                l.username == "alice"
                    && l.start_time == now + TimeDelta::seconds(60)
                    && l.end_time.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let lockout = schedule_lockout(&ctx, &clock, &lockouts).unwrap();
        assert_eq!(lockout.start_time, now + TimeDelta::seconds(60));
    }

    #[test]
    fn overflowing_lockout_is_invalid() {
        let user = User::new("alice");
        let config = RegistrationConfig {
            automatic_lockout_after: i64::MAX,
            ..RegistrationConfig::default()
        };
        let server = server();
        let ctx = ActionContext { user: &user, config: &config, server: &server };

        let mut clock = MockClock::new();
        clock.expect_now().return_const(Utc::now());
        let mut lockouts = MockLockoutStore::new();
        lockouts.expect_disable_account().never();

        let err = schedule_lockout(&ctx, &clock, &lockouts).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidSetting { .. }));
    }
}
