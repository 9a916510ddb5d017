//! Minimal structural check for email-like addresses.

use once_cell::sync::Lazy;
use regex::Regex;

// x@x.xx at the very least. Not RFC 5322.
static ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+@.+\..{2,}$").expect("static regex"));

/// Returns true when `address` looks like `local@domain.tld`.
pub fn is_valid_address(address: Option<&str>) -> bool {
    match address {
        Some(address) if !address.is_empty() => ADDRESS.is_match(address),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_address() {
        assert!(is_valid_address(Some("a@b.co")));
        assert!(is_valid_address(Some("first.last@mail.example.org")));
    }

    #[test]
    fn rejects_missing_parts() {
        assert!(!is_valid_address(Some("a@b")));
        assert!(!is_valid_address(Some("a@b.c")));
        assert!(!is_valid_address(Some("@b.co")));
        assert!(!is_valid_address(Some("ab.co")));
        assert!(!is_valid_address(Some("")));
        assert!(!is_valid_address(None));
    }

    #[test]
    fn rejects_line_breaks() {
        assert!(!is_valid_address(Some("a@b.co\nx")));
    }
}
