//! # Registration Event Pipeline
//!
//! Runs the enabled [`RegistrationAction`]s for each new account in their
//! fixed order. A failing action is logged and the next one still runs; the
//! event source never sees an error.

use std::sync::Arc;

use tracing::{debug, error, info};

use reg_core::{EventParams, Result, ServerIdentity, User, UserEventListener};

use crate::actions::{self, ActionContext, Collaborators, RegistrationAction};
use crate::contacts::ContactList;
use crate::privacy::PrivacyListCache;
use crate::settings::Settings;

/// How one action fared for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Disabled in configuration.
    Skipped,
    Completed,
    /// Holds the error's display text.
    Failed(String),
}

/// Per-action outcomes of one registration, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub outcomes: Vec<(RegistrationAction, ActionOutcome)>,
}

impl PipelineReport {
    pub fn outcome(&self, action: RegistrationAction) -> Option<&ActionOutcome> {
        self.outcomes
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ActionOutcome::Failed(_)))
            .count()
    }
}

/// The terminal consumer of "account created" events.
pub struct RegistrationPipeline {
    server: ServerIdentity,
    settings: Settings,
    im_contacts: Arc<ContactList>,
    email_contacts: Arc<ContactList>,
    privacy_cache: Arc<PrivacyListCache>,
    collaborators: Collaborators,
}

impl RegistrationPipeline {
    pub fn new(
        server: ServerIdentity,
        settings: Settings,
        im_contacts: Arc<ContactList>,
        email_contacts: Arc<ContactList>,
        privacy_cache: Arc<PrivacyListCache>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            server,
            settings,
            im_contacts,
            email_contacts,
            privacy_cache,
            collaborators,
        }
    }

    /// Runs every enabled action for `user`.
    ///
    /// If the settings cannot be read nothing runs and every action is
    /// reported as failed.
    pub fn handle_user_created(&self, user: &User) -> PipelineReport {
        debug!(username = %user.username, "registering new user");

        let config = match self.settings.snapshot() {
            Ok(config) => config,
            Err(err) => {
                error!(username = %user.username, error = %err, "unable to read registration settings");
                let reason = err.to_string();
                return PipelineReport {
                    outcomes: RegistrationAction::ORDER
                        .iter()
                        .map(|action| (*action, ActionOutcome::Failed(reason.clone())))
                        .collect(),
                };
            }
        };

        let ctx = ActionContext {
            user,
            config: &config,
            server: &self.server,
        };

        let mut report = PipelineReport::default();
        for action in RegistrationAction::ORDER {
            let outcome = if !action.is_enabled(&config) {
                ActionOutcome::Skipped
            } else {
                debug!(username = %user.username, %action, "running registration action");
                match self.run(action, &ctx) {
                    Ok(()) => ActionOutcome::Completed,
                    Err(err) => {
                        error!(username = %user.username, %action, error = %err, "registration action failed");
                        ActionOutcome::Failed(err.to_string())
                    }
                }
            };
            report.outcomes.push((action, outcome));
        }

        info!(
            username = %user.username,
            failures = report.failures(),
            "registration actions finished"
        );
        report
    }

    fn run(&self, action: RegistrationAction, ctx: &ActionContext<'_>) -> Result<()> {
        let c = &self.collaborators;
        match action {
            RegistrationAction::ImNotification => {
                let sent = actions::notify_im(ctx, &self.im_contacts, c.router.as_ref());
                debug!(sent, "registration notification messages routed");
            }
            RegistrationAction::EmailNotification => {
                let delivered = actions::notify_email(ctx, &self.email_contacts, c.mailer.as_ref());
                debug!(delivered, "registration notification emails sent");
            }
            RegistrationAction::WelcomeMessage => {
                let sent = actions::send_welcome(ctx, c.router.as_ref())?;
                debug!(sent, "welcome messages routed");
            }
            RegistrationAction::GroupEnrollment => {
                actions::enroll_in_group(ctx, c.groups.as_ref())?;
            }
            RegistrationAction::PrivacyList => {
                actions::assign_privacy_list(
                    ctx,
                    &self.privacy_cache,
                    &self.settings,
                    c.privacy_lists.as_ref(),
                )?;
            }
            RegistrationAction::AutomaticLockout => {
                let lockout = actions::schedule_lockout(ctx, c.clock.as_ref(), c.lockouts.as_ref())?;
                debug!(start = %lockout.start_time, "automatic lockout scheduled");
            }
        }
        Ok(())
    }
}

impl UserEventListener for RegistrationPipeline {
    fn user_created(&self, user: &User, _params: &EventParams) {
        self.handle_user_created(user);
    }
}
