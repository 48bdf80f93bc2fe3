//! Shared tokenizer and scanner.

use crate::preprocess::Preprocessor;
use crate::request::{ClassifierPolicy, Request, Vocabulary};
use crate::ClassifierResult;
use courier_config_and_utils::{LocalePolicy, LocaleStrategy, RequestType};
use tracing::debug;

const HELP_KEYWORDS: &[&str] = &["help"];
const MIRROR_KEYWORDS: &[&str] = &["mirror", "mirrors"];
const PT_KEYWORDS: &[&str] = &[
    "pt",
    "transport",
    "transports",
    "bridge",
    "bridges",
    "meek",
    "snowflake",
];
const PT_PREFIXES: &[&str] = &["obfs"];
const SPLIT_KEYWORD: &str = "split";

/// Lowercased words of a body with surrounding punctuation trimmed.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '_')
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
}

fn is_pt_keyword(token: &str) -> bool {
    PT_KEYWORDS.contains(&token) || PT_PREFIXES.iter().any(|p| token.starts_with(p))
}

/// Classifies message bodies for one channel.
#[derive(Debug, Clone)]
pub struct Classifier {
    vocabulary: Vocabulary,
    policy: ClassifierPolicy,
    preprocessor: Preprocessor,
}

impl Classifier {
    pub fn new(vocabulary: Vocabulary, policy: ClassifierPolicy) -> ClassifierResult<Self> {
        Ok(Self {
            vocabulary,
            policy,
            preprocessor: Preprocessor::new()?,
        })
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Classify a body.
    pub fn parse(&self, sender_id: &str, raw_text: &str) -> Request {
        self.parse_with_recipient(sender_id, raw_text, None)
    }

    /// Classify a body, also using the address the message was sent to as
    /// a locale hint on line-marker channels.
    pub fn parse_with_recipient(
        &self,
        sender_id: &str,
        raw_text: &str,
        recipient: Option<&str>,
    ) -> Request {
        let cleaned = self.preprocessor.clean(self.policy.channel, raw_text);

        let (body, marker_locale) = match self.policy.locale_strategy {
            LocaleStrategy::LineMarker => {
                let marked = self.preprocessor.take_lang_marker(&cleaned);
                let hint = marked.marker.or_else(|| {
                    recipient.and_then(|r| self.preprocessor.plus_tag_locale(r))
                });
                (marked.body, hint)
            }
            LocaleStrategy::InlineToken => (cleaned, None),
        };

        let scan = self.scan(&body);

        let locale = match (scan.locale, marker_locale) {
            (Some(inline), _) => inline,
            (None, Some(requested)) => self.resolve_requested_locale(requested),
            (None, None) => self.vocabulary.default_locale.clone(),
        };

        let request_type = scan.request_type.unwrap_or(RequestType::Help);
        let os = match request_type {
            RequestType::Links => scan.os,
            _ => None,
        };

        let request = Request {
            sender_id: sender_id.to_string(),
            channel: self.policy.channel,
            request_type,
            os,
            locale,
            wants_pt_info: scan.wants_pt_info,
            wants_split_delivery: scan.wants_split_delivery,
        };
        debug!(
            channel = %request.channel,
            request_type = request.request_type.as_str(),
            os = ?request.os,
            locale = %request.locale,
            pt = request.wants_pt_info,
            split = request.wants_split_delivery,
            "Request classified"
        );
        request
    }

    /// Marker or plus-tag locale, checked against the vocabulary.
    fn resolve_requested_locale(&self, requested: String) -> String {
        if self.vocabulary.locale(&requested).is_some() {
            return requested;
        }
        match self.policy.locale_policy {
            LocalePolicy::Fallback => self.vocabulary.default_locale.clone(),
            // Kept so the reply can name the locale it cannot serve.
            LocalePolicy::Reject => requested,
        }
    }

    /// Left-to-right scan; the first signal of each kind wins.
    fn scan(&self, body: &str) -> Scan {
        let mut scan = Scan::default();
        let inline_locales = self.policy.locale_strategy == LocaleStrategy::InlineToken;

        for token in tokenize(body) {
            let seen_signal = scan.os.is_some() || scan.locale.is_some();
            if !seen_signal && HELP_KEYWORDS.contains(&token.as_str()) {
                return Scan {
                    request_type: Some(RequestType::Help),
                    ..scan
                };
            }

            if let Some(os) = self.vocabulary.os(&token) {
                if scan.os.is_none() {
                    scan.os = Some(os.to_string());
                    scan.request_type.get_or_insert(RequestType::Links);
                }
            } else if let Some(locale) = self.vocabulary.locale(&token).filter(|_| inline_locales) {
                if scan.locale.is_none() {
                    scan.locale = Some(locale.to_string());
                }
            } else if MIRROR_KEYWORDS.contains(&token.as_str()) {
                scan.mirrors = true;
                scan.request_type.get_or_insert(RequestType::Mirrors);
            } else if is_pt_keyword(&token) {
                scan.wants_pt_info = true;
            } else if token == SPLIT_KEYWORD && self.policy.allow_split {
                scan.wants_split_delivery = true;
            }

            if scan.locale.is_some() && (scan.os.is_some() || scan.mirrors) {
                break;
            }
        }
        scan
    }
}

#[derive(Debug, Default)]
struct Scan {
    request_type: Option<RequestType>,
    os: Option<String>,
    /// Inline locale only; marker locales never end the scan early.
    locale: Option<String>,
    mirrors: bool,
    wants_pt_info: bool,
    wants_split_delivery: bool,
}
