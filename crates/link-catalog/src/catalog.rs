//! Link catalog service.
//!
//! Read side (`get_links`, `get_link_blocks`) is used by the dispatcher on
//! every request. Write side (`create_catalog`, `add_link`) is used by the
//! publishing tooling only; it assumes a single writer per provider.

use crate::format::{CatalogFile, LinkRecord, Release};
use crate::storage::{provider_key, CatalogStorage};
use crate::{CatalogError, CatalogResult};
use courier_config_and_utils::{CatalogSettings, ChannelKind, Config, LocalePolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Versioned, localized download links of every provider.
#[derive(Clone)]
pub struct LinkCatalog {
    storage: Arc<dyn CatalogStorage>,
    settings: CatalogSettings,
    channel_policies: HashMap<ChannelKind, LocalePolicy>,
}

impl LinkCatalog {
    /// Catalog using the settings' locale policy for every channel.
    pub fn new(storage: Arc<dyn CatalogStorage>, settings: CatalogSettings) -> Self {
        Self {
            storage,
            settings,
            channel_policies: HashMap::new(),
        }
    }

    /// Catalog with the per-channel locale policies of a deployment.
    pub fn from_config(storage: Arc<dyn CatalogStorage>, config: &Config) -> Self {
        let mut catalog = Self::new(storage, config.catalog.clone());
        for kind in ChannelKind::ALL {
            catalog = catalog.with_locale_policy(kind, config.locale_policy_for(kind));
        }
        catalog
    }

    /// Override the unsupported-locale policy for one channel.
    pub fn with_locale_policy(mut self, kind: ChannelKind, policy: LocalePolicy) -> Self {
        self.channel_policies.insert(kind, policy);
        self
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn supported_os(&self) -> &[String] {
        &self.settings.supported_os
    }

    pub fn supported_locales(&self) -> &[String] {
        &self.settings.supported_locales
    }

    pub fn default_locale(&self) -> &str {
        &self.settings.default_locale
    }

    /// Unsupported-locale policy in force for a channel.
    pub fn locale_policy(&self, channel: ChannelKind) -> LocalePolicy {
        self.channel_policies
            .get(&channel)
            .copied()
            .unwrap_or(self.settings.locale_policy)
    }

    /// Provider keys known to storage, sorted.
    pub fn providers(&self) -> CatalogResult<Vec<String>> {
        self.storage.list()
    }

    /// All providers' latest links for `os`/`locale` as one reply body.
    pub fn get_links(&self, channel: ChannelKind, os: &str, locale: &str) -> CatalogResult<String> {
        Ok(self.get_link_blocks(channel, os, locale)?.join("\n\n"))
    }

    /// One formatted block per provider that has links for `os`/`locale`,
    /// in provider-name order.
    pub fn get_link_blocks(
        &self,
        channel: ChannelKind,
        os: &str,
        locale: &str,
    ) -> CatalogResult<Vec<String>> {
        let os = os.trim().to_lowercase();
        if !self.settings.supports_os(&os) {
            return Err(CatalogError::UnsupportedOs(os));
        }
        let locale = self.resolve_locale(channel, locale)?;

        let mut found: Vec<(String, String)> = Vec::new();
        for provider in self.storage.list()? {
            let file = match self.load(&provider) {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Skipping unreadable catalog");
                    continue;
                }
            };

            let Some(section) = file.section(&os) else {
                warn!(provider = %provider, os = %os, "Catalog has no section for OS");
                continue;
            };
            let entry = section
                .entry(&locale)
                .or_else(|| section.entry(&self.settings.default_locale));
            if let Some(release) = entry.and_then(|e| e.latest()) {
                found.push((file.name.clone(), format_block(&file, release)));
            }
        }

        if found.is_empty() {
            return Err(CatalogError::Internal(format!(
                "no provider has links for {os}/{locale}"
            )));
        }

        found.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
        debug!(os = %os, locale = %locale, providers = found.len(), "Links resolved");
        Ok(found.into_iter().map(|(_, block)| block).collect())
    }

    /// Start a provider's catalog from scratch.
    ///
    /// An existing catalog is moved aside first and put back if the new
    /// skeleton cannot be written.
    pub fn create_catalog(&self, provider: &str, fingerprint: &str) -> CatalogResult<()> {
        let name = provider.trim();
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return Err(CatalogError::LinkFormat(
                "signing key fingerprint must not be empty".to_string(),
            ));
        }
        let key = provider_key(name)?;

        let skeleton = CatalogFile::skeleton(name, fingerprint, &self.settings.supported_os);
        let backed_up = self.storage.backup(&key)?;

        if let Err(e) = self.storage.write(&key, &skeleton.render()) {
            if backed_up {
                if let Err(restore_err) = self.storage.restore(&key) {
                    warn!(provider = %key, error = %restore_err, "Catalog backup restore failed");
                }
            }
            return Err(e);
        }

        info!(provider = %key, backed_up, "Catalog created");
        Ok(())
    }

    /// Append a release to a provider's `os`/`locale` history.
    pub fn add_link(&self, provider: &str, os: &str, locale: &str, link: &str) -> CatalogResult<()> {
        let os = os.trim().to_lowercase();
        let locale = locale.trim().to_lowercase();
        if !self.settings.supports_os(&os) {
            return Err(CatalogError::UnsupportedOs(os));
        }
        if !self.settings.supports_locale(&locale) {
            return Err(CatalogError::UnsupportedLocale(locale));
        }
        let release = Release::parse(link)?;

        let key = provider_key(provider)?;
        let mut file = self.load(&key)?.ok_or_else(|| {
            CatalogError::LinkFile(format!("no catalog for provider '{key}'"))
        })?;

        let section = file.section_mut(&os).ok_or_else(|| {
            CatalogError::Internal(format!("catalog '{key}' has no [{os}] section"))
        })?;
        section.append(&locale, release);

        self.storage.write(&key, &file.render())?;
        info!(provider = %key, os = %os, locale = %locale, "Link added");
        Ok(())
    }

    fn resolve_locale(&self, channel: ChannelKind, locale: &str) -> CatalogResult<String> {
        let locale = locale.trim().to_lowercase();
        if self.settings.supports_locale(&locale) {
            return Ok(locale);
        }
        match self.locale_policy(channel) {
            LocalePolicy::Fallback => {
                debug!(requested = %locale, "Unsupported locale, using default");
                Ok(self.settings.default_locale.to_lowercase())
            }
            LocalePolicy::Reject => Err(CatalogError::UnsupportedLocale(locale)),
        }
    }

    fn load(&self, provider: &str) -> CatalogResult<Option<CatalogFile>> {
        match self.storage.read(provider)? {
            Some(content) => Ok(Some(CatalogFile::parse(&content)?)),
            None => Ok(None),
        }
    }
}

fn format_block(file: &CatalogFile, release: &Release) -> String {
    let mut block = format!("=== {} ===\n", file.name);
    let groups: Vec<String> = release.records.iter().map(format_record).collect();
    block.push_str(&groups.join("\n\n"));
    block.push_str(&format!("\n\nSigning key fingerprint: {}", file.fingerprint));
    block
}

fn format_record(record: &LinkRecord) -> String {
    format!(
        "Package: {}\nSignature: {}\nSHA256 checksum: {}",
        record.binary_url, record.signature_url, record.sha256
    )
}
