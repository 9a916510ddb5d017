//! Process configuration: server identity, logging, the SMTP relay and the
//! initial plugin properties.
//!
//! Sources, later ones winning: `registration.{toml,yaml,json}` in the
//! working directory, then `REGISTRATION__*` environment variables
//! (`REGISTRATION__SERVER__DOMAIN=example.org`).

use std::collections::BTreeMap;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use reg_core::ServerIdentity;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerIdentity,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[cfg(feature = "mail-smtp")]
    pub smtp: Option<reg_mail_smtp::SmtpConfig>,
    /// Seeds the property store, keyed by the dotted plugin keys
    /// (`registration.welcome.enabled = "true"`).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Base filter directive. `RUST_LOG` takes precedence when set.
    pub level: Option<String>,
    /// `pretty` (default), `compact` or `json`.
    pub format: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Config::builder()
            .set_default("server.domain", "localhost")?
            .add_source(File::with_name("registration").required(false))
            .add_source(Environment::with_prefix("REGISTRATION").separator("__"))
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn properties_keep_dotted_keys() {
        let toml = r#"
            [server]
            domain = "example.org"

            [properties]
            "registration.welcome.enabled" = "true"
            "registration.automatic.lockout.seconds" = "60"
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.domain, "example.org");
        assert_eq!(config.server.admin_port, 9090);
        assert_eq!(
            config.properties.get("registration.welcome.enabled").map(String::as_str),
            Some("true")
        );
        assert_eq!(config.properties.len(), 2);
        assert!(config.logging.format.is_none());
    }
}
