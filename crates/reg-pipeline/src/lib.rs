//! reg-pipeline
//!
//! Reacts to "account created" events by running the configured
//! registration side effects: operator notifications, a welcome message,
//! group enrollment, a default privacy list and an automatic lockout.

pub mod actions;
pub mod contacts;
pub mod pipeline;
pub mod plugin;
pub mod privacy;
pub mod settings;
pub mod template;
pub mod validation;

pub use actions::{Collaborators, RegistrationAction};
pub use contacts::{ContactKind, ContactList};
pub use pipeline::{ActionOutcome, PipelineReport, RegistrationPipeline};
pub use plugin::RegistrationPlugin;
pub use privacy::PrivacyListCache;
pub use settings::{RegistrationConfig, Settings};
pub use template::WelcomeTemplate;
pub use validation::is_valid_address;
