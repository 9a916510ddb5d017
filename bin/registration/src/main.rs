//! # Registration Binary
//!
//! Assembles the registration plugin from the compiled-in plugins, then
//! dispatches one "account created" event per username given on the command
//! line through the local event source.

mod config;

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reg_core::{EmailTransport, EventParams, SystemClock, User};
use reg_memory::{
    LocalUserEventDispatcher, MemoryConfigStore, MemoryGroupStore, MemoryLockoutStore,
    MemoryPrivacyListStore, RecordingMailer, RecordingRouter,
};
use reg_pipeline::{Collaborators, RegistrationPlugin};

use crate::config::{AppConfig, LoggingConfig};

#[cfg(feature = "mail-smtp")]
use reg_mail_smtp::SmtpMailer;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    let store = Arc::new(MemoryConfigStore::with_values(config.properties.clone()));
    let events = Arc::new(LocalUserEventDispatcher::new());
    let router = Arc::new(RecordingRouter::new());
    let lockouts = Arc::new(MemoryLockoutStore::new());

    let collaborators = Collaborators {
        router: router.clone(),
        mailer: build_mailer(&config)?,
        groups: Arc::new(MemoryGroupStore::new()),
        privacy_lists: Arc::new(MemoryPrivacyListStore::new()),
        lockouts: lockouts.clone(),
        clock: Arc::new(SystemClock),
    };

    let plugin = RegistrationPlugin::new(config.server.clone(), store, events.clone(), collaborators)
        .context("failed to initialise registration plugin")?;
    plugin.start();
    info!(
        sign_up = %plugin.web_registration_address(),
        "registration ready"
    );

    // Each event reaches the pipeline through the subscription made by `start`.
    let params = EventParams::new();
    for username in std::env::args().skip(1) {
        events.dispatch_user_created(&User::new(username), &params);
    }

    info!(
        messages = router.messages().len(),
        lockouts = lockouts.len(),
        "done"
    );
    plugin.stop();
    Ok(())
}

#[cfg(feature = "mail-smtp")]
fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn EmailTransport>> {
    match &config.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp).context("failed to configure SMTP")?;
            info!(host = %smtp.host, port = smtp.port, "using SMTP relay");
            Ok(Arc::new(mailer))
        }
        None => {
            warn!("no SMTP relay configured, emails are only recorded");
            Ok(Arc::new(RecordingMailer::new()))
        }
    }
}

#[cfg(not(feature = "mail-smtp"))]
fn build_mailer(_config: &AppConfig) -> anyhow::Result<Arc<dyn EmailTransport>> {
    Ok(Arc::new(RecordingMailer::new()))
}

fn init_tracing(config: &LoggingConfig) {
    let base_level = config.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.format.as_deref().unwrap_or("pretty") {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        "compact" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init(),
    }
}
