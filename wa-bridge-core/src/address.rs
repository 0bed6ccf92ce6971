// ABOUTME: Recipient addressing between E.164-style `+<digits>` and network chat ids
// ABOUTME: Outbound strips `+` and appends the contact suffix; inbound reverses it for numeric ids

/// Network suffix for one-to-one contact chats.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Convert a caller-supplied recipient into the network's chat id form.
///
/// `+15551234567` becomes `15551234567@c.us`. Ids that already carry a
/// network suffix (contacts or groups) pass through untouched.
pub fn to_chat_id(recipient: &str) -> String {
    let trimmed = recipient.trim();
    if trimmed.contains('@') {
        return trimmed.to_string();
    }
    let local = trimmed.strip_prefix('+').unwrap_or(trimmed);
    format!("{}{}", local, CONTACT_SUFFIX)
}

/// Whether a recipient can be turned into a chat id.
///
/// Accepts `+<digits>` or bare digits, and `<local>@<suffix>` ids with both
/// parts non-empty. Anything else (`+`, `+1a`, `@c.us`) is rejected.
pub fn is_valid_recipient(recipient: &str) -> bool {
    let trimmed = recipient.trim();
    if let Some((local, suffix)) = trimmed.split_once('@') {
        return !local.is_empty() && !suffix.is_empty() && !suffix.contains('@');
    }
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Convert a network chat id into the canonical sender address.
///
/// Purely numeric contact ids become `+<digits>`; anything else (groups,
/// unknown suffixes, non-numeric locals) is returned unchanged.
pub fn from_chat_id(chat_id: &str) -> String {
    match chat_id.strip_suffix(CONTACT_SUFFIX) {
        Some(local) if !local.is_empty() && local.chars().all(|c| c.is_ascii_digit()) => {
            format!("+{}", local)
        }
        _ => chat_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chat_id_strips_plus() {
        assert_eq!(to_chat_id("+15551234567"), "15551234567@c.us");
        assert_eq!(to_chat_id("15551234567"), "15551234567@c.us");
        assert_eq!(to_chat_id("  +15551234567 "), "15551234567@c.us");
    }

    #[test]
    fn test_to_chat_id_passes_through_network_ids() {
        assert_eq!(to_chat_id("15551234567@c.us"), "15551234567@c.us");
        assert_eq!(to_chat_id("120363000000@g.us"), "120363000000@g.us");
    }

    #[test]
    fn test_valid_recipients() {
        assert!(is_valid_recipient("+15551234567"));
        assert!(is_valid_recipient("15551234567"));
        assert!(is_valid_recipient(" +1555 "));
        assert!(is_valid_recipient("15551234567@c.us"));
        assert!(is_valid_recipient("120363000000@g.us"));
    }

    #[test]
    fn test_malformed_recipients() {
        for recipient in ["", "+", " + ", "+1555a", "bob", "@c.us", "1555@", "a@b@c"] {
            assert!(!is_valid_recipient(recipient), "{recipient:?} should be rejected");
        }
    }

    #[test]
    fn test_from_chat_id_numeric_contact() {
        assert_eq!(from_chat_id("15551234567@c.us"), "+15551234567");
    }

    #[test]
    fn test_from_chat_id_passes_through_others() {
        assert_eq!(from_chat_id("120363000000@g.us"), "120363000000@g.us");
        assert_eq!(from_chat_id("status@broadcast"), "status@broadcast");
        assert_eq!(from_chat_id("abc@c.us"), "abc@c.us");
        assert_eq!(from_chat_id("@c.us"), "@c.us");
    }

    #[test]
    fn test_round_trip_for_numeric_recipient() {
        let original = "+15551234567";
        assert_eq!(from_chat_id(&to_chat_id(original)), original);
    }
}
