//! Sender normalization and hashing.
//!
//! A normalized identity is the key every sender-scoped decision uses. It
//! is hashed before it reaches any store or log line.

use crate::{DispatchError, DispatchResult};
use courier_config_and_utils::ChannelKind;
use sha2::{Digest, Sha256};

const MAX_HANDLE_LEN: usize = 50;
const EMAIL_LOCAL_SPECIALS: &str = "._%-!#$&'*=?^`{|}~";

/// Canonical form of a sender for a channel.
pub fn normalize_sender(kind: ChannelKind, raw: &str) -> DispatchResult<String> {
    match kind {
        ChannelKind::Email => normalize_email(raw),
        ChannelKind::Xmpp => normalize_jid(raw),
        ChannelKind::Social => normalize_handle(raw),
    }
}

/// sha256 of a normalized identity, lowercase hex.
pub fn hash_identity(normalized: &str) -> String {
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// `Name <Local+tag@Domain>` becomes `local@domain`.
fn normalize_email(raw: &str) -> DispatchResult<String> {
    let raw = raw.trim();
    let address = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    let address = address.trim().to_lowercase();

    let (local, domain) = address
        .rsplit_once('@')
        .ok_or_else(|| invalid("email address without '@'"))?;
    let local = local.split_once('+').map_or(local, |(base, _)| base);

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || EMAIL_LOCAL_SPECIALS.contains(c));
    if !local_ok {
        return Err(invalid("malformed email local part"));
    }
    if !is_domain(domain) {
        return Err(invalid("malformed email domain"));
    }
    Ok(format!("{local}@{domain}"))
}

/// `xmpp:User@Domain/resource` becomes `user@domain`.
fn normalize_jid(raw: &str) -> DispatchResult<String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("xmpp:").unwrap_or(raw);
    let bare = raw.split_once('/').map_or(raw, |(bare, _)| bare).to_lowercase();

    let (node, domain) = bare
        .split_once('@')
        .ok_or_else(|| invalid("jid without '@'"))?;
    let node_ok = !node.is_empty()
        && !node
            .chars()
            .any(|c| c.is_whitespace() || "\"&'/:<>@".contains(c));
    if !node_ok || !is_domain(domain) {
        return Err(invalid("malformed jid"));
    }
    Ok(bare)
}

/// `@Handle` becomes `handle`; numeric account ids pass as-is.
fn normalize_handle(raw: &str) -> DispatchResult<String> {
    let handle = raw.trim().trim_start_matches('@').to_lowercase();
    let ok = !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(handle)
    } else {
        Err(invalid("malformed handle"))
    }
}

fn is_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn invalid(reason: &str) -> DispatchError {
    DispatchError::Address(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_variants_collapse_to_one_identity() {
        for raw in [
            "alice@example.com",
            "ALICE@Example.COM",
            "Alice <alice+tor@example.com>",
            "  \"Alice A.\" <Alice@example.com>  ",
        ] {
            assert_eq!(
                normalize_sender(ChannelKind::Email, raw).unwrap(),
                "alice@example.com",
                "{raw}"
            );
        }
    }

    #[test]
    fn malformed_email_rejected() {
        for raw in ["", "alice", "@example.com", "alice@localhost", "al ice@example.com", "a@b..c"] {
            assert!(
                matches!(
                    normalize_sender(ChannelKind::Email, raw),
                    Err(DispatchError::Address(_))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn jid_drops_resource() {
        assert_eq!(
            normalize_sender(ChannelKind::Xmpp, "Bob@Jabber.Example.org/Laptop").unwrap(),
            "bob@jabber.example.org"
        );
        assert_eq!(
            normalize_sender(ChannelKind::Xmpp, "xmpp:bob@example.org").unwrap(),
            "bob@example.org"
        );
        assert!(normalize_sender(ChannelKind::Xmpp, "example.org/res").is_err());
    }

    #[test]
    fn social_handles() {
        assert_eq!(normalize_sender(ChannelKind::Social, "@Some_User").unwrap(), "some_user");
        assert_eq!(normalize_sender(ChannelKind::Social, "1234567890").unwrap(), "1234567890");
        assert!(normalize_sender(ChannelKind::Social, "@").is_err());
        assert!(normalize_sender(ChannelKind::Social, "bad-handle").is_err());
    }

    #[test]
    fn hash_is_stable_hex() {
        let hash = hash_identity("alice@example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_identity("alice@example.com"));
        assert_ne!(hash, hash_identity("bob@example.com"));
    }
}
