//! # Domain Models
//!
//! These structs represent the entities the registration pipeline reads and
//! produces. Outbound instant messages keep their XML stanza form so that
//! templated welcome messages survive untouched apart from addressing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xmltree::{Element, XMLNode};

/// Free-form attributes delivered alongside a user lifecycle event.
pub type EventParams = serde_json::Map<String, serde_json::Value>;

/// A bare address on the messaging platform (`node@domain` or just `domain`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Builds `node@domain`.
    pub fn new(node: &str, domain: &str) -> Self {
        Self(format!("{node}@{domain}"))
    }

    /// The address of a server component or the server itself.
    pub fn domain(domain: &str) -> Self {
        Self(domain.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `@`, if any.
    pub fn node(&self) -> Option<&str> {
        self.0.split_once('@').map(|(node, _)| node)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jid {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for Jid {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Who this server is. Used for addressing and for outbound email headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// The messaging domain (e.g. "example.org").
    pub domain: String,
    /// Display name used as the sender name of notification emails.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Port of the administration console hosting the sign-up page.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

fn default_server_name() -> String {
    "Registration".to_string()
}

fn default_admin_port() -> u16 {
    9090
}

impl ServerIdentity {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: default_server_name(),
            admin_port: default_admin_port(),
        }
    }

    /// The server's own address, the default sender of every message.
    pub fn address(&self) -> Jid {
        Jid::domain(&self.domain)
    }

    /// The full address of a local account.
    pub fn user_address(&self, username: &str) -> Jid {
        Jid::new(username, &self.domain)
    }
}

/// A freshly created account as reported by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            name: None,
            email: None,
            created_at: Utc::now(),
        }
    }
}

/// An outbound message stanza, ready to hand to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    stanza: Element,
}

impl Message {
    /// Builds a plain `<message>` with an optional subject and a text body.
    pub fn chat(to: &Jid, from: &Jid, subject: Option<&str>, body: &str) -> Self {
        let mut stanza = Element::new("message");
        if let Some(subject) = subject {
            stanza.children.push(text_element("subject", subject));
        }
        stanza.children.push(text_element("body", body));
        Self::from_element(stanza, to, from)
    }

    /// Wraps an arbitrary element, overwriting its addressing.
    pub fn from_element(mut stanza: Element, to: &Jid, from: &Jid) -> Self {
        stanza.attributes.insert("to".to_string(), to.to_string());
        stanza.attributes.insert("from".to_string(), from.to_string());
        Self { stanza }
    }

    pub fn recipient(&self) -> Option<&str> {
        self.stanza.attributes.get("to").map(String::as_str)
    }

    pub fn sender(&self) -> Option<&str> {
        self.stanza.attributes.get("from").map(String::as_str)
    }

    pub fn subject(&self) -> Option<String> {
        child_text(&self.stanza, "subject")
    }

    pub fn body(&self) -> Option<String> {
        child_text(&self.stanza, "body")
    }

    pub fn stanza(&self) -> &Element {
        &self.stanza
    }
}

fn text_element(name: &str, text: &str) -> XMLNode {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    XMLNode::Element(element)
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.into_owned())
}

/// One notification email as handed to the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to_name: Option<String>,
    pub to_address: String,
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// A named group of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// A privacy (blocking) list owned by one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyList {
    pub owner: String,
    pub name: String,
    /// The `<list>` element the rules were created from.
    pub items: Element,
}

/// A scheduled account disablement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLockout {
    pub username: String,
    pub start_time: DateTime<Utc>,
    /// `None` keeps the account locked until an administrator lifts it.
    pub end_time: Option<DateTime<Utc>>,
}
