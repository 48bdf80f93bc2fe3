//! Configuration management.
//!
//! A deployment is described by one JSON file (`<base>/config.json`).
//! Every field has a default, so an absent file yields a working setup.
//! [`Config::load`] validates before returning; an invalid config is a
//! fatal [`CoreError::Config`] and nothing starts.

use crate::{ChannelKind, CoreError, CoreResult, LocalePolicy, LocaleStrategy, Paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Locale used when a request names none.
pub const DEFAULT_LOCALE: &str = "en";

/// Environment override for the log level.
const LOG_LEVEL_ENV: &str = "LINKCOURIER_LOG_LEVEL";

/// Vocabulary of the link catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Operating systems every provider file declares a section for, in
    /// section order.
    pub supported_os: Vec<String>,
    /// Locale codes requests may name.
    pub supported_locales: Vec<String>,
    /// Locale used for fallback, both globally and per provider.
    pub default_locale: String,
    /// Policy applied when a channel does not set its own.
    pub locale_policy: LocalePolicy,
    /// Catalog directory; defaults to `<base>/catalogs`.
    pub directory: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            supported_os: ["windows", "linux", "osx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            supported_locales: ["en", "es", "de", "fr", "it", "pt", "ru", "zh", "fa", "ar"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_locale: DEFAULT_LOCALE.to_string(),
            locale_policy: LocalePolicy::Fallback,
            directory: None,
        }
    }
}

impl CatalogSettings {
    /// Whether `os` is in the supported set (case-insensitive).
    pub fn supports_os(&self, os: &str) -> bool {
        self.supported_os.iter().any(|s| s.eq_ignore_ascii_case(os))
    }

    /// Whether `locale` is in the supported set (case-insensitive).
    pub fn supports_locale(&self, locale: &str) -> bool {
        self.supported_locales
            .iter()
            .any(|s| s.eq_ignore_ascii_case(locale))
    }
}

/// Per-channel behavior of the trust gate and the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Run the authentication tier (meaningful only where the channel
    /// supplies an authenticity signal).
    pub require_authentication: bool,
    /// Requests allowed per window before the throughput tier denies.
    pub max_requests: u32,
    /// Window length in minutes.
    pub wait_minutes: u32,
    /// Where the requested locale is found in a message.
    pub locale_strategy: LocaleStrategy,
    /// Overrides the catalog-wide unsupported-locale policy.
    #[serde(default)]
    pub locale_policy: Option<LocalePolicy>,
    /// Honor the `split` keyword.
    #[serde(default)]
    pub allow_split: bool,
}

impl ChannelPolicy {
    /// Defaults for a channel kind.
    pub fn default_for(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Email => Self {
                require_authentication: true,
                max_requests: 3,
                wait_minutes: 60,
                locale_strategy: LocaleStrategy::LineMarker,
                locale_policy: None,
                allow_split: true,
            },
            ChannelKind::Xmpp | ChannelKind::Social => Self {
                require_authentication: false,
                max_requests: 5,
                wait_minutes: 30,
                locale_strategy: LocaleStrategy::InlineToken,
                locale_policy: None,
                allow_split: false,
            },
        }
    }
}

fn default_email_policy() -> ChannelPolicy {
    ChannelPolicy::default_for(ChannelKind::Email)
}

fn default_xmpp_policy() -> ChannelPolicy {
    ChannelPolicy::default_for(ChannelKind::Xmpp)
}

fn default_social_policy() -> ChannelPolicy {
    ChannelPolicy::default_for(ChannelKind::Social)
}

/// Policies for every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicies {
    #[serde(default = "default_email_policy")]
    pub email: ChannelPolicy,
    #[serde(default = "default_xmpp_policy")]
    pub xmpp: ChannelPolicy,
    #[serde(default = "default_social_policy")]
    pub social: ChannelPolicy,
}

impl Default for ChannelPolicies {
    fn default() -> Self {
        Self {
            email: default_email_policy(),
            xmpp: default_xmpp_policy(),
            social: default_social_policy(),
        }
    }
}

impl ChannelPolicies {
    /// Policy for a channel kind.
    pub fn get(&self, kind: ChannelKind) -> &ChannelPolicy {
        match kind {
            ChannelKind::Email => &self.email,
            ChannelKind::Xmpp => &self.xmpp,
            ChannelKind::Social => &self.social,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Link catalog vocabulary and location.
    #[serde(default)]
    pub catalog: CatalogSettings,
    /// Per-channel trust and classifier policies.
    #[serde(default)]
    pub channels: ChannelPolicies,
    /// Normalized sender identities that bypass the authentication tier.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Our own address per channel; messages from it are dropped (loop).
    #[serde(default)]
    pub service_addresses: Vec<String>,
    /// authserv-ids of the receiving mail servers whose
    /// `Authentication-Results` verdict is trusted. Empty trusts the
    /// topmost header whatever its id.
    #[serde(default)]
    pub auth_servers: Vec<String>,
    /// File holding the current mirrors text.
    #[serde(default)]
    pub mirrors_file: Option<PathBuf>,
    /// Directory with per-locale `<locale>.json` reply overrides.
    #[serde(default)]
    pub translations_dir: Option<PathBuf>,
    /// Keep a raw copy of every message whose reply could not be sent.
    #[serde(default = "default_archive_failed")]
    pub archive_failed: bool,
    /// Archive directory; defaults to `<base>/archive`.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_archive_failed() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            catalog: CatalogSettings::default(),
            channels: ChannelPolicies::default(),
            allowlist: Vec::new(),
            service_addresses: Vec::new(),
            auth_servers: Vec::new(),
            mirrors_file: None,
            translations_dir: None,
            archive_failed: true,
            archive_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from `<base>/config.json`, falling back to
    /// defaults, then apply environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file (no validation).
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        std::fs::create_dir_all(paths.base_dir())?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV) {
            self.log_level = log_level;
        }
    }

    /// Reject configurations the request path cannot run on.
    pub fn validate(&self) -> CoreResult<()> {
        let catalog = &self.catalog;
        if catalog.supported_os.is_empty() {
            return Err(CoreError::Config(
                "catalog.supported_os must not be empty".to_string(),
            ));
        }
        if catalog.supported_os.iter().any(|os| !is_section_name(os)) {
            return Err(CoreError::Config(
                "catalog.supported_os entries must be lowercase ASCII words".to_string(),
            ));
        }
        let unique: BTreeSet<_> = catalog.supported_os.iter().collect();
        if unique.len() != catalog.supported_os.len() {
            return Err(CoreError::Config(
                "catalog.supported_os contains duplicates".to_string(),
            ));
        }
        if !catalog.supports_locale(&catalog.default_locale) {
            return Err(CoreError::Config(format!(
                "default locale '{}' is not in catalog.supported_locales",
                catalog.default_locale
            )));
        }
        for kind in ChannelKind::ALL {
            let policy = self.channels.get(kind);
            if policy.max_requests == 0 {
                return Err(CoreError::Config(format!(
                    "channels.{kind}.max_requests must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Unsupported-locale policy in force for a channel.
    pub fn locale_policy_for(&self, kind: ChannelKind) -> LocalePolicy {
        self.channels
            .get(kind)
            .locale_policy
            .unwrap_or(self.catalog.locale_policy)
    }

    /// Catalog directory, defaulting under the base directory.
    pub fn catalog_dir(&self, paths: &Paths) -> PathBuf {
        self.catalog
            .directory
            .clone()
            .unwrap_or_else(|| paths.catalog_dir())
    }

    /// Failed-message archive directory, defaulting under the base directory.
    pub fn archive_dir(&self, paths: &Paths) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| paths.archive_dir())
    }
}

/// OS names double as catalog section headers.
fn is_section_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.catalog.default_locale, DEFAULT_LOCALE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "channels": {
                "xmpp": {
                    "require_authentication": false,
                    "max_requests": 10,
                    "wait_minutes": 5,
                    "locale_strategy": "inline_token",
                    "locale_policy": "reject"
                }
            }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.channels.xmpp.max_requests, 10);
        assert_eq!(config.channels.email, ChannelPolicy::default_for(ChannelKind::Email));
        assert_eq!(config.locale_policy_for(ChannelKind::Xmpp), LocalePolicy::Reject);
        assert_eq!(config.locale_policy_for(ChannelKind::Email), LocalePolicy::Fallback);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.allowlist = vec!["admin@example.org".to_string()];
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.allowlist, config.allowlist);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.catalog, CatalogSettings::default());
    }

    #[test]
    fn test_validate_rejects_unsupported_default_locale() {
        let mut config = Config::default();
        config.catalog.default_locale = "xx".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_max_requests() {
        let mut config = Config::default();
        config.channels.social.max_requests = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("social"));
    }

    #[test]
    fn test_validate_rejects_bad_os_names() {
        let mut config = Config::default();
        config.catalog.supported_os = vec!["Linux 64".to_string()];
        assert!(config.validate().is_err());

        config.catalog.supported_os = Vec::new();
        assert!(config.validate().is_err());

        config.catalog.supported_os = vec!["linux".to_string(), "linux".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_fails_on_invalid_config() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let mut config = Config::default();
        config.catalog.supported_locales = vec!["es".to_string()];
        config.save(&paths).unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_catalog_settings_case_insensitive() {
        let settings = CatalogSettings::default();
        assert!(settings.supports_os("Windows"));
        assert!(settings.supports_locale("ES"));
        assert!(!settings.supports_os("plan9"));
    }
}
