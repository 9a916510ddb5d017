//! Welcome message expansion.
//!
//! A welcome is either a plain text body or a raw XML document holding one
//! `<message/>` or a `<messages>` container of several.

use xmltree::{Element, XMLNode};

use reg_core::{Jid, Message, RegistrationError, Result};

use crate::settings::RegistrationConfig;

pub const WELCOME_SUBJECT: &str = "Welcome";

/// Root element name that marks a multi-message document.
const CONTAINER: &str = "messages";

/// Parses `source` into its single root element.
///
/// Comments and processing instructions around the root are ignored. A
/// second root element or stray text is rejected like any other
/// malformed document.
pub fn parse_document(document: &'static str, source: &str) -> Result<Element> {
    let malformed = |reason: String| RegistrationError::TemplateParse { document, reason };

    let nodes = Element::parse_all(source.as_bytes()).map_err(|err| malformed(err.to_string()))?;
    let mut root = None;
    for node in nodes {
        match node {
            XMLNode::Element(element) => {
                if root.is_some() {
                    return Err(malformed("content after the root element".to_string()));
                }
                root = Some(element);
            }
            XMLNode::Text(text) | XMLNode::CData(text) if !text.trim().is_empty() => {
                return Err(malformed("text outside the root element".to_string()));
            }
            _ => {}
        }
    }
    root.ok_or_else(|| malformed("no root element".to_string()))
}

/// The welcome message as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeTemplate<'a> {
    Plain(&'a str),
    Raw(&'a str),
}

impl<'a> WelcomeTemplate<'a> {
    /// A non-empty raw document wins over the plain body.
    pub fn from_config(config: &'a RegistrationConfig) -> Self {
        match config.welcome_raw_message.as_deref() {
            Some(raw) if !raw.trim().is_empty() => WelcomeTemplate::Raw(raw),
            _ => WelcomeTemplate::Plain(&config.welcome_message),
        }
    }

    /// Produces the messages to route, in document order.
    ///
    /// A malformed raw document yields an error and no messages at all.
    pub fn expand(&self, to: &Jid, from: &Jid) -> Result<Vec<Message>> {
        match *self {
            WelcomeTemplate::Plain(body) => Ok(vec![Message::chat(to, from, Some(WELCOME_SUBJECT), body)]),
            WelcomeTemplate::Raw(raw) => {
                let root = parse_document("welcome message", raw)?;
                if root.name == CONTAINER {
                    Ok(root
                        .children
                        .into_iter()
                        .filter_map(|node| match node {
                            XMLNode::Element(element) => Some(Message::from_element(element, to, from)),
                            _ => None,
                        })
                        .collect())
                } else {
                    Ok(vec![Message::from_element(root, to, from)])
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses() -> (Jid, Jid) {
        (Jid::from("alice@example.org"), Jid::domain("example.org"))
    }

    #[test]
    fn plain_body_becomes_single_message() {
        let (to, from) = addresses();
        let messages = WelcomeTemplate::Plain("Hi there").expand(&to, &from).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject().as_deref(), Some(WELCOME_SUBJECT));
        assert_eq!(messages[0].body().as_deref(), Some("Hi there"));
        assert_eq!(messages[0].recipient(), Some("alice@example.org"));
    }

    #[test]
    fn container_expands_each_child_in_order() {
        let (to, from) = addresses();
        let raw = r#"<messages>
            <message type="chat"><body>one</body></message>
            <message type="headline"><body>two</body></message>
            <message><body>three</body></message>
        </messages>"#;
        let messages = WelcomeTemplate::Raw(raw).expand(&to, &from).unwrap();
        let bodies: Vec<_> = messages.iter().filter_map(Message::body).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
        for message in &messages {
            assert_eq!(message.recipient(), Some("alice@example.org"));
            assert_eq!(message.sender(), Some("example.org"));
        }
        assert_eq!(
            messages[1].stanza().attributes.get("type").map(String::as_str),
            Some("headline")
        );
    }

    #[test]
    fn single_root_is_one_message() {
        let (to, _) = addresses();
        let from = Jid::from("welcome-bot@example.org");
        let raw = r#"<message to="ignored@else"><subject>Hello</subject><body>Read the rules</body></message>"#;
        let messages = WelcomeTemplate::Raw(raw).expand(&to, &from).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient(), Some("alice@example.org"));
        assert_eq!(messages[0].sender(), Some("welcome-bot@example.org"));
        assert_eq!(messages[0].subject().as_deref(), Some("Hello"));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let (to, from) = addresses();
        let err = WelcomeTemplate::Raw("<messages><message>").expand(&to, &from).unwrap_err();
        assert!(matches!(err, RegistrationError::TemplateParse { .. }));
    }

    #[test]
    fn second_root_rejects_whole_document() {
        let (to, from) = addresses();
        let raw = "<message><body>one</body></message><message><body>two</body></message>";
        let err = WelcomeTemplate::Raw(raw).expand(&to, &from).unwrap_err();
        assert!(matches!(err, RegistrationError::TemplateParse { .. }));
    }

    #[test]
    fn comments_around_root_are_ignored() {
        let root = parse_document(
            "welcome message",
            "<?xml version=\"1.0\"?><!-- greeting --><message><body>hi</body></message><!-- end -->",
        )
        .unwrap();
        assert_eq!(root.name, "message");
    }

    #[test]
    fn empty_document_is_a_parse_error() {
        assert!(matches!(
            parse_document("welcome message", "<!-- nothing -->"),
            Err(RegistrationError::TemplateParse { .. })
        ));
    }

    #[test]
    fn blank_raw_falls_back_to_plain() {
        let config = RegistrationConfig {
            welcome_raw_message: Some("   ".to_string()),
            welcome_message: "Hello".to_string(),
            ..RegistrationConfig::default()
        };
        assert_eq!(WelcomeTemplate::from_config(&config), WelcomeTemplate::Plain("Hello"));
    }
}
