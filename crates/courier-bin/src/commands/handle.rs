//! One inbound message, end to end.

use super::{open_database, parse_channel};
use crate::email::EmailChannel;
use anyhow::{bail, Context, Result};
use courier_config_and_utils::{ChannelKind, Config, Paths};
use courier_database::AsyncDatabase;
use dispatcher::{BuiltinTranslator, Dispatcher, MessageArchive, SqliteUsageSink};
use link_catalog::{FsCatalogStorage, LinkCatalog};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use trust_gate::{SqliteTrustStore, TrustGate};

/// Read one message, dispatch it, and spool the replies.
pub async fn handle(config: &Config, paths: &Paths, channel: &str, input: Option<&Path>) -> Result<()> {
    let kind = parse_channel(channel)?;
    if kind != ChannelKind::Email {
        bail!("The {kind} channel has no stdin adapter");
    }

    let bytes = match input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read message from stdin")?;
            bytes
        }
    };
    // Legacy 8-bit bodies still get an answer and a usage record.
    let raw = String::from_utf8_lossy(&bytes);

    let db = open_database(paths).await?;
    let dispatcher = build_dispatcher(config, paths, db.clone())?;
    let channel = EmailChannel::new(paths.outbox_dir()).with_auth_servers(&config.auth_servers);
    let record = dispatcher.handle(&raw, &channel).await;
    drop(dispatcher);
    db.close().await?;

    info!(
        status = record.status.as_str(),
        request_type = record.request_type.map_or("-", |t| t.as_str()),
        "Handled message"
    );
    Ok(())
}

fn build_dispatcher(config: &Config, paths: &Paths, db: AsyncDatabase) -> Result<Dispatcher> {
    let storage = Arc::new(FsCatalogStorage::new(config.catalog_dir(paths)));
    let catalog = LinkCatalog::from_config(storage, config);
    let gate = TrustGate::with_store(SqliteTrustStore::new(db.clone()))
        .with_allowlist(&config.allowlist);
    let translator = match &config.translations_dir {
        Some(dir) => BuiltinTranslator::load(dir)?,
        None => BuiltinTranslator::new(),
    };

    let mut dispatcher = Dispatcher::new(
        config,
        catalog,
        gate,
        Arc::new(translator),
        Arc::new(SqliteUsageSink::new(db)),
    )?;
    if config.archive_failed {
        dispatcher = dispatcher.with_archive(MessageArchive::new(config.archive_dir(paths)));
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_database::{queries, UsageStatus};
    use tempfile::tempdir;

    #[tokio::test]
    async fn handle_spools_reply_and_records_usage() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        let config = Config::default();

        let catalog = LinkCatalog::from_config(
            Arc::new(FsCatalogStorage::new(config.catalog_dir(&paths))),
            &config,
        );
        catalog.create_catalog("Acme", "FP").unwrap();
        catalog
            .add_link("Acme", "linux", "en", "https://a/l$https://a/l.asc$abc$")
            .unwrap();

        let message = dir.path().join("message.eml");
        std::fs::write(
            &message,
            "From: alice@example.com\nAuthentication-Results: mx; dkim=pass\n\nlinux\n",
        )
        .unwrap();

        handle(&config, &paths, "email", Some(&message)).await.unwrap();

        let spooled: Vec<_> = std::fs::read_dir(paths.outbox_dir()).unwrap().collect();
        assert_eq!(spooled.len(), 1);

        let db = open_database(&paths).await.unwrap();
        let rows = db
            .call(|conn| queries::list_usage_records(conn, 10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, UsageStatus::Ok);
    }

    #[tokio::test]
    async fn handle_records_non_utf8_messages() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();

        let message = dir.path().join("latin1.eml");
        let mut bytes = b"From: alice@example.com\nAuthentication-Results: mx; dkim=pass\n\nmirrors caf".to_vec();
        bytes.push(0xE9);
        std::fs::write(&message, bytes).unwrap();

        handle(&Config::default(), &paths, "email", Some(&message))
            .await
            .unwrap();

        let db = open_database(&paths).await.unwrap();
        let rows = db
            .call(|conn| queries::list_usage_records(conn, 10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_type, Some(courier_config_and_utils::RequestType::Mirrors));
    }

    #[tokio::test]
    async fn handle_rejects_channels_without_adapter() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let err = handle(&Config::default(), &paths, "xmpp", None).await.unwrap_err();
        assert!(err.to_string().contains("xmpp"));
    }
}
