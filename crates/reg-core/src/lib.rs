//! reg-core
//!
//! Domain models and interface definitions for the registration pipeline.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn chat_message_carries_addressing_subject_and_body() {
        let server = ServerIdentity::new("example.org");
        let msg = Message::chat(
            &server.user_address("alice"),
            &server.address(),
            Some("Welcome"),
            "Hello Alice",
        );
        assert_eq!(msg.recipient(), Some("alice@example.org"));
        assert_eq!(msg.sender(), Some("example.org"));
        assert_eq!(msg.subject().as_deref(), Some("Welcome"));
        assert_eq!(msg.body().as_deref(), Some("Hello Alice"));
    }

    #[test]
    fn from_element_overwrites_existing_addressing() {
        let mut stanza = xmltree::Element::new("message");
        stanza
            .attributes
            .insert("to".to_string(), "someone@else".to_string());
        let msg = Message::from_element(stanza, &Jid::from("bob@example.org"), &Jid::domain("example.org"));
        assert_eq!(msg.recipient(), Some("bob@example.org"));
        assert_eq!(msg.sender(), Some("example.org"));
        assert_eq!(msg.body(), None);
    }

    #[test]
    fn jid_parts() {
        let jid = Jid::from("  carol@example.org ");
        assert_eq!(jid.as_str(), "carol@example.org");
        assert_eq!(jid.node(), Some("carol"));
        assert_eq!(Jid::domain("example.org").node(), None);
    }
}
