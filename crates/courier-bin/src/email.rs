//! Stdin email adapter.
//!
//! Inbound mail arrives as one RFC 5322 message (headers, blank line,
//! body). The receiving MTA has already verified DKIM and prepended its
//! verdict as the topmost `Authentication-Results` header; any such header
//! further down came with the message and is ignored. Replies are spooled
//! as files into the outbox directory for the MTA to pick up.

use async_trait::async_trait;
use courier_config_and_utils::ChannelKind;
use dispatcher::{Channel, ChannelError, InboundMessage, OutboundMessage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const SPOOL_EXTENSION: &str = "eml";

pub struct EmailChannel {
    outbox: PathBuf,
    auth_servers: Vec<String>,
}

impl EmailChannel {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
            auth_servers: Vec::new(),
        }
    }

    /// Only accept a verdict stamped by one of these authserv-ids.
    pub fn with_auth_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.auth_servers = servers
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }
}

/// Unfolded `(name, value)` header pairs, names lowercased.
fn parse_headers(block: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

impl EmailChannel {
    /// DKIM verdict of the topmost `Authentication-Results` header.
    fn dkim_passed(&self, headers: &[(String, String)]) -> bool {
        let Some(results) = header(headers, "authentication-results") else {
            return false;
        };
        let results = results.to_lowercase();
        let mut parts = results.split(';');

        // authserv-id, optionally followed by a version number
        let authserv_id = parts
            .next()
            .and_then(|id| id.split_whitespace().next())
            .unwrap_or_default();
        if !self.auth_servers.is_empty() && !self.auth_servers.iter().any(|s| s == authserv_id) {
            warn!(authserv_id, "Authentication-Results from an untrusted server");
            return false;
        }

        parts.any(|resinfo| {
            resinfo
                .split_whitespace()
                .any(|token| token == "dkim=pass")
        })
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn receive(&self, raw: &str) -> Result<InboundMessage, ChannelError> {
        let raw = raw.replace("\r\n", "\n");
        let (head, body) = raw
            .split_once("\n\n")
            .unwrap_or((raw.as_str(), ""));

        let headers = parse_headers(head);
        let sender = header(&headers, "from")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ChannelError::Parse("missing From header".to_string()))?;

        Ok(InboundMessage {
            sender: sender.to_string(),
            recipient: header(&headers, "to").map(str::to_string),
            body: body.to_string(),
            authenticated: self.dkim_passed(&headers),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let spool_err = |e: std::io::Error| ChannelError::Send(e.to_string());
        tokio::fs::create_dir_all(&self.outbox).await.map_err(spool_err)?;

        let name = format!("{}.{SPOOL_EXTENSION}", Uuid::new_v4());
        let tmp = self.outbox.join(format!(".{name}.tmp"));
        let path = self.outbox.join(&name);
        let content = format!(
            "To: {}\nSubject: {}\n\n{}\n",
            message.to, message.subject, message.body
        );

        tokio::fs::write(&tmp, content).await.map_err(spool_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(spool_err)?;
        debug!(path = %path.display(), "Reply spooled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SIGNED: &str = "From: Alice <alice@example.com>\r\n\
        To: gettor+es@example.org\r\n\
        Authentication-Results: mx.example.org;\r\n\
        \tdkim=pass header.d=example.com\r\n\
        Subject: hi\r\n\
        \r\n\
        windows\r\n";

    #[test]
    fn receive_reads_headers_and_body() {
        let channel = EmailChannel::new("unused");
        let inbound = channel.receive(SIGNED).unwrap();
        assert_eq!(inbound.sender, "Alice <alice@example.com>");
        assert_eq!(inbound.recipient.as_deref(), Some("gettor+es@example.org"));
        assert_eq!(inbound.body, "windows\n");
        assert!(inbound.authenticated);
    }

    #[test]
    fn missing_or_failed_dkim_is_unauthenticated() {
        let channel = EmailChannel::new("unused");
        let inbound = channel.receive("From: a@example.com\n\nlinux").unwrap();
        assert!(!inbound.authenticated);

        let inbound = channel
            .receive("From: a@example.com\nAuthentication-Results: mx; dkim=fail\n\nlinux")
            .unwrap();
        assert!(!inbound.authenticated);
    }

    #[test]
    fn only_the_topmost_verdict_counts() {
        let channel = EmailChannel::new("unused");
        let raw = "Authentication-Results: mx.example.org; dkim=fail\n\
            From: mallory@evil.example\n\
            Authentication-Results: forged; dkim=pass\n\
            \n\
            linux\n";
        assert!(!channel.receive(raw).unwrap().authenticated);

        let raw = "Authentication-Results: mx.example.org; spf=pass; dkim=pass header.d=a.example\n\
            Authentication-Results: older.example; dkim=fail\n\
            From: alice@a.example\n\nlinux";
        assert!(channel.receive(raw).unwrap().authenticated);
    }

    #[test]
    fn verdict_must_come_from_a_configured_server() {
        let channel = EmailChannel::new("unused").with_auth_servers(["MX.example.org"]);
        let trusted = "Authentication-Results: mx.example.org 1; dkim=pass\n\
            From: alice@a.example\n\nlinux";
        assert!(channel.receive(trusted).unwrap().authenticated);

        let forged = "Authentication-Results: evil.example; dkim=pass\n\
            From: mallory@evil.example\n\nlinux";
        assert!(!channel.receive(forged).unwrap().authenticated);
    }

    #[test]
    fn dkim_pass_must_be_a_whole_result() {
        let channel = EmailChannel::new("unused");
        let raw = "Authentication-Results: mx.example.org; dkim=passive\n\
            From: alice@a.example\n\nlinux";
        assert!(!channel.receive(raw).unwrap().authenticated);
    }

    #[test]
    fn missing_from_is_a_parse_error() {
        let channel = EmailChannel::new("unused");
        assert!(matches!(
            channel.receive("To: x@example.org\n\nlinux"),
            Err(ChannelError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn send_spools_one_file_per_reply() {
        let dir = tempdir().unwrap();
        let channel = EmailChannel::new(dir.path().join("outbox"));
        let message = OutboundMessage {
            to: "alice@example.com".to_string(),
            subject: "Your download links".to_string(),
            body: "links".to_string(),
        };
        channel.send(&message).await.unwrap();
        channel.send(&message).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(channel.outbox())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 2);
        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert!(content.starts_with("To: alice@example.com\nSubject: Your download links\n\n"));
    }
}
