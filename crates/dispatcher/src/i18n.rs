//! Reply texts.
//!
//! Every user-visible string comes from a [`Translator`]. The built-in one
//! carries English templates and takes per-locale overrides from
//! `<dir>/<locale>.json` files mapping message keys to templates.
//! Templates use `{name}` placeholders filled by [`fill`].

use courier_config_and_utils::{CoreError, CoreResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Every reply text the dispatcher can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Subject,
    Help,
    Unauthenticated,
    LinksIntro,
    PtGuidance,
    Mirrors,
    MirrorsUnavailable,
    UnsupportedOs,
    UnsupportedLocale,
    InternalError,
    SplitPart,
}

impl MessageKey {
    pub const ALL: [MessageKey; 11] = [
        Self::Subject,
        Self::Help,
        Self::Unauthenticated,
        Self::LinksIntro,
        Self::PtGuidance,
        Self::Mirrors,
        Self::MirrorsUnavailable,
        Self::UnsupportedOs,
        Self::UnsupportedLocale,
        Self::InternalError,
        Self::SplitPart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Help => "help",
            Self::Unauthenticated => "unauthenticated",
            Self::LinksIntro => "links_intro",
            Self::PtGuidance => "pt_guidance",
            Self::Mirrors => "mirrors",
            Self::MirrorsUnavailable => "mirrors_unavailable",
            Self::UnsupportedOs => "unsupported_os",
            Self::UnsupportedLocale => "unsupported_locale",
            Self::InternalError => "internal_error",
            Self::SplitPart => "split_part",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }

    fn english(&self) -> &'static str {
        match self {
            Self::Subject => "Your download links",
            Self::Help => {
                "Hello! This service sends download links for the browser bundle.\n\n\
                 Reply with the name of your operating system ({supported_os}) to get links.\n\
                 Reply with 'mirrors' to get a list of mirror sites.\n\
                 Add a language code ({supported_locales}) to get the bundle in that language."
            }
            Self::Unauthenticated => {
                "We could not verify that your message came from the address it claims.\n\
                 Please write from a mail provider that signs its messages (DKIM). \
                 This notice is sent only once; further unverified messages are ignored."
            }
            Self::LinksIntro => {
                "Here are the links for {os} ({locale}). Verify the signature of the \
                 package before running it."
            }
            Self::PtGuidance => {
                "If the network is censored where you are, use a pluggable transport \
                 (obfs4, meek, snowflake). You can select one when the browser starts."
            }
            Self::Mirrors => "Mirror sites:",
            Self::MirrorsUnavailable => {
                "The list of mirrors is currently unavailable. Please try again later."
            }
            Self::UnsupportedOs => {
                "Sorry, '{os}' is not a supported operating system. \
                 Supported systems: {supported_os}."
            }
            Self::UnsupportedLocale => {
                "Sorry, '{locale}' is not an available language. \
                 Available languages: {supported_locales}."
            }
            Self::InternalError => {
                "Something went wrong on our side. Please try again later."
            }
            Self::SplitPart => "[{part}/{total}]",
        }
    }
}

/// Source of localized reply templates.
pub trait Translator: Send + Sync {
    /// Template for a key in a locale, falling back to English.
    fn text(&self, locale: &str, key: MessageKey) -> String;
}

/// English templates plus optional per-locale overrides.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTranslator {
    overrides: HashMap<String, HashMap<MessageKey, String>>,
}

impl BuiltinTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<locale>.json` in a directory. A missing directory means
    /// no overrides; unknown keys are skipped.
    pub fn load(dir: &Path) -> CoreResult<Self> {
        let mut translator = Self::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(translator),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            let raw: HashMap<String, String> = serde_json::from_str(&content)
                .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
            translator.insert_all(locale, raw);
        }
        Ok(translator)
    }

    /// Add overrides for a locale from key-name pairs.
    pub fn insert_all(&mut self, locale: &str, templates: HashMap<String, String>) {
        let locale = locale.to_lowercase();
        let table = self.overrides.entry(locale.clone()).or_default();
        for (name, template) in templates {
            match MessageKey::parse(&name) {
                Some(key) => {
                    table.insert(key, template);
                }
                None => warn!(locale = %locale, key = %name, "Unknown translation key"),
            }
        }
        debug!(locale = %locale, entries = table.len(), "Translations loaded");
    }

    pub fn with(mut self, locale: &str, key: MessageKey, template: &str) -> Self {
        self.overrides
            .entry(locale.to_lowercase())
            .or_default()
            .insert(key, template.to_string());
        self
    }
}

impl Translator for BuiltinTranslator {
    fn text(&self, locale: &str, key: MessageKey) -> String {
        self.overrides
            .get(&locale.to_lowercase())
            .and_then(|table| table.get(&key))
            .cloned()
            .unwrap_or_else(|| key.english().to_string())
    }
}

/// Substitute `{name}` placeholders.
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (name, value) in args {
        result = result.replace(&format!("{{{name}}}"), value);
    }
    result
}
