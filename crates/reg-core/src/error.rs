//! # RegistrationError
//!
//! Centralized error handling for the registration pipeline.
//! Every action maps its failure to one of these before it is logged.

use thiserror::Error;

/// The primary error type for all reg-core operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// A welcome or privacy-list document is not well-formed XML
    #[error("unable to parse {document} document: {reason}")]
    TemplateParse {
        document: &'static str,
        reason: String,
    },

    /// The configured registration group does not exist
    #[error("group not found with name {0}")]
    GroupNotFound(String),

    /// Message or email delivery failed
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),

    /// An enabled action needs a setting that is absent
    #[error("required setting {0} is not configured")]
    ConfigurationMissing(&'static str),

    /// A setting is present but unusable
    #[error("invalid value for {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },

    /// Contact rejected by the address validator
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Infrastructure failure in one of the backing stores
    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// A specialized Result type for registration logic.
pub type Result<T> = std::result::Result<T, RegistrationError>;
