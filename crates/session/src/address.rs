//! Recipient normalization and JID translation.

use wacore_binary::jid::Jid;

use crate::error::{Error, Result};

/// Domain suffix of the canonical chat identifier for direct chats.
const CHAT_SUFFIX: &str = "@c.us";

/// Server the client library uses for direct chats. The public identifier
/// keeps the legacy `@c.us` form; it is translated on the way in.
const DIRECT_SERVER: &str = "s.whatsapp.net";

/// Derive the canonical chat identifier for a recipient.
///
/// Bare phone numbers gain the `@c.us` suffix; identifiers that already
/// carry a domain pass through unchanged.
pub fn normalize_chat_id(number: &str) -> String {
    if number.contains('@') {
        number.to_string()
    } else {
        format!("{number}{CHAT_SUFFIX}")
    }
}

/// Parse a normalized chat identifier into the client's JID type.
pub fn to_jid(chat_id: &str) -> Result<Jid> {
    let native = match chat_id.strip_suffix(CHAT_SUFFIX) {
        Some(user) => format!("{user}@{DIRECT_SERVER}"),
        None => chat_id.to_string(),
    };
    native
        .parse()
        .map_err(|e| Error::invalid_recipient(format!("bad chat identifier '{chat_id}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gains_suffix() {
        assert_eq!(normalize_chat_id("50912345678"), "50912345678@c.us");
    }

    #[test]
    fn suffixed_number_passes_through() {
        assert_eq!(normalize_chat_id("50912345678@c.us"), "50912345678@c.us");
    }

    #[test]
    fn foreign_domain_passes_through() {
        assert_eq!(
            normalize_chat_id("1234@s.whatsapp.net"),
            "1234@s.whatsapp.net"
        );
    }

    #[test]
    fn chat_suffix_translates_to_native_server() {
        let jid = to_jid("50912345678@c.us").unwrap();
        assert_eq!(jid.to_string(), "50912345678@s.whatsapp.net");
    }

    #[test]
    fn native_identifier_parses_unchanged() {
        let jid = to_jid("50912345678@s.whatsapp.net").unwrap();
        assert_eq!(jid.to_string(), "50912345678@s.whatsapp.net");
    }
}
