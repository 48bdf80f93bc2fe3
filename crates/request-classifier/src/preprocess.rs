//! Channel pre-processing.
//!
//! Reduces a message body to the text its sender actually wrote before it
//! reaches the shared tokenizer.

use crate::ClassifierResult;
use courier_config_and_utils::ChannelKind;
use regex::Regex;

/// Compiled patterns for every channel.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    attribution: Regex,
    html_tag: Regex,
    lang_marker: Regex,
    plus_tag: Regex,
}

/// Body with the locale marker lifted out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedBody {
    pub body: String,
    /// Lowercased code of the first `Lang:` line, if any.
    pub marker: Option<String>,
}

impl Preprocessor {
    pub fn new() -> ClassifierResult<Self> {
        Ok(Self {
            attribution: Regex::new(r"(?i)^\s*on\s.*\bwrote:\s*$")?,
            html_tag: Regex::new(r"<[^>]*>")?,
            lang_marker: Regex::new(r"(?i)^\s*lang\s*:\s*([a-z]{2,3}(?:[_-][a-z0-9]{2,4})?)\s*$")?,
            plus_tag: Regex::new(r"^[^@+\s]+\+([A-Za-z_-]{2,8})@")?,
        })
    }

    /// Strip channel noise from a body.
    pub fn clean(&self, channel: ChannelKind, body: &str) -> String {
        match channel {
            ChannelKind::Email => self.clean_email(body),
            ChannelKind::Xmpp | ChannelKind::Social => self.clean_markup(body),
        }
    }

    /// Drop quoted lines, attribution lines, and the signature block.
    fn clean_email(&self, body: &str) -> String {
        let mut kept = Vec::new();
        for line in body.lines() {
            if line.trim_end() == "--" {
                break;
            }
            if line.trim_start().starts_with('>') || self.attribution.is_match(line) {
                continue;
            }
            kept.push(line);
        }
        kept.join("\n")
    }

    /// Drop HTML tags and decode the common entities.
    fn clean_markup(&self, body: &str) -> String {
        let text = self.html_tag.replace_all(body, " ");
        decode_entities(&text)
    }

    /// Remove the first `Lang: <code>` line and return its code.
    pub fn take_lang_marker(&self, body: &str) -> MarkedBody {
        let mut marker = None;
        let mut lines = Vec::new();
        for line in body.lines() {
            if marker.is_none() {
                if let Some(caps) = self.lang_marker.captures(line) {
                    marker = caps.get(1).map(|m| m.as_str().to_lowercase());
                    continue;
                }
            }
            lines.push(line);
        }
        MarkedBody {
            body: lines.join("\n"),
            marker,
        }
    }

    /// Locale hint from a `service+<code>@host` recipient, with or without
    /// a display name.
    pub fn plus_tag_locale(&self, recipient: &str) -> Option<String> {
        let recipient = recipient.trim();
        let address = match (recipient.rfind('<'), recipient.rfind('>')) {
            (Some(start), Some(end)) if start < end => &recipient[start + 1..end],
            _ => recipient,
        };
        self.plus_tag
            .captures(address.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
