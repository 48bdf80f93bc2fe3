//! Classifier inputs and output.

use courier_config_and_utils::{
    CatalogSettings, ChannelKind, ChannelPolicy, LocalePolicy, LocaleStrategy, RequestType,
};
use serde::{Deserialize, Serialize};

/// What the catalog can answer: supported OS names and locales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub supported_os: Vec<String>,
    pub supported_locales: Vec<String>,
    pub default_locale: String,
}

impl Vocabulary {
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self {
            supported_os: lowercase_all(&settings.supported_os),
            supported_locales: lowercase_all(&settings.supported_locales),
            default_locale: settings.default_locale.to_lowercase(),
        }
    }

    pub(crate) fn os(&self, token: &str) -> Option<&str> {
        self.supported_os
            .iter()
            .find(|os| os.as_str() == token)
            .map(String::as_str)
    }

    pub(crate) fn locale(&self, token: &str) -> Option<&str> {
        self.supported_locales
            .iter()
            .find(|l| l.as_str() == token)
            .map(String::as_str)
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Channel-specific classifier behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub channel: ChannelKind,
    pub locale_strategy: LocaleStrategy,
    pub locale_policy: LocalePolicy,
    pub allow_split: bool,
}

impl ClassifierPolicy {
    /// Policy for a channel, with the unsupported-locale policy already
    /// resolved against the catalog-wide default.
    pub fn for_channel(channel: ChannelKind, policy: &ChannelPolicy, locale_policy: LocalePolicy) -> Self {
        Self {
            channel,
            locale_strategy: policy.locale_strategy,
            locale_policy,
            allow_split: policy.allow_split,
        }
    }
}

/// A normalized request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Hashed sender identity.
    pub sender_id: String,
    pub channel: ChannelKind,
    pub request_type: RequestType,
    /// Set only for `links` requests.
    pub os: Option<String>,
    pub locale: String,
    pub wants_pt_info: bool,
    pub wants_split_delivery: bool,
}

impl Request {
    pub fn is_links(&self) -> bool {
        self.request_type == RequestType::Links
    }
}
