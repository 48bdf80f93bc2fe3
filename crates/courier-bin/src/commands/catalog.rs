//! Link catalog maintenance commands.

use super::parse_channel;
use anyhow::Result;
use courier_config_and_utils::{Config, Paths};
use link_catalog::{FsCatalogStorage, LinkCatalog};
use std::sync::Arc;

fn open_catalog(config: &Config, paths: &Paths) -> LinkCatalog {
    let storage = Arc::new(FsCatalogStorage::new(config.catalog_dir(paths)));
    LinkCatalog::from_config(storage, config)
}

/// Start a provider catalog.
pub fn catalog_create(config: &Config, paths: &Paths, provider: &str, fingerprint: &str) -> Result<()> {
    open_catalog(config, paths).create_catalog(provider, fingerprint)?;
    println!("Created catalog for {provider}");
    Ok(())
}

/// Add a release to a provider catalog.
pub fn catalog_add_link(
    config: &Config,
    paths: &Paths,
    provider: &str,
    os: &str,
    locale: &str,
    link: &str,
) -> Result<()> {
    open_catalog(config, paths).add_link(provider, os, locale, link)?;
    println!("Added {os}/{locale} link for {provider}");
    Ok(())
}

/// List provider catalogs.
pub fn catalog_list(config: &Config, paths: &Paths) -> Result<()> {
    let providers = open_catalog(config, paths).providers()?;
    if providers.is_empty() {
        println!("No catalogs found");
    }
    for provider in providers {
        println!("{provider}");
    }
    Ok(())
}

/// Print the link text a request for `os`/`locale` would get.
pub fn catalog_show(config: &Config, paths: &Paths, channel: &str, os: &str, locale: &str) -> Result<()> {
    let kind = parse_channel(channel)?;
    let links = open_catalog(config, paths).get_links(kind, os, locale)?;
    println!("{links}");
    Ok(())
}
