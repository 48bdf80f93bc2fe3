//! Operator actions on per-sender trust state.

use super::{open_database, parse_channel};
use anyhow::Result;
use courier_config_and_utils::Paths;
use dispatcher::address::{hash_identity, normalize_sender};
use trust_gate::{SqliteTrustStore, TrustGate};

/// Gate over the deployment database, and the `(user_hash, service)` key
/// of a sender as written on its channel.
async fn resolve(paths: &Paths, channel: &str, sender: &str) -> Result<(TrustGate, String, &'static str)> {
    let kind = parse_channel(channel)?;
    let user_hash = hash_identity(&normalize_sender(kind, sender)?);
    let db = open_database(paths).await?;
    Ok((
        TrustGate::with_store(SqliteTrustStore::new(db)),
        user_hash,
        kind.as_str(),
    ))
}

pub async fn sender_block(paths: &Paths, channel: &str, sender: &str) -> Result<()> {
    let (gate, user_hash, service) = resolve(paths, channel, sender).await?;
    gate.block(&user_hash, service).await?;
    println!("Blocked {user_hash} on {service}");
    Ok(())
}

pub async fn sender_unblock(paths: &Paths, channel: &str, sender: &str) -> Result<()> {
    let (gate, user_hash, service) = resolve(paths, channel, sender).await?;
    gate.unblock(&user_hash, service).await?;
    println!("Unblocked {user_hash} on {service}");
    Ok(())
}

pub async fn sender_reset(paths: &Paths, channel: &str, sender: &str) -> Result<()> {
    let (gate, user_hash, service) = resolve(paths, channel, sender).await?;
    if gate.reset(&user_hash, service).await? {
        println!("Reset {user_hash} on {service}");
    } else {
        println!("No record for {user_hash} on {service}");
    }
    Ok(())
}

pub async fn sender_show(paths: &Paths, channel: &str, sender: &str) -> Result<()> {
    let (gate, user_hash, service) = resolve(paths, channel, sender).await?;
    match gate.record(&user_hash, service).await? {
        Some(record) => {
            println!("{:<16} {}", "user_hash", record.user_hash);
            println!("{:<16} {}", "service", record.service);
            println!("{:<16} {}", "request_count", record.request_count);
            println!("{:<16} {}", "blocked", record.blocked);
            println!("{:<16} {}", "last_request_at", record.last_request_at.to_rfc3339());
        }
        None => println!("No record for {user_hash} on {service}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn block_then_reset_by_raw_address() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        sender_block(&paths, "email", "Alice <ALICE+x@example.com>").await.unwrap();
        let (gate, user_hash, service) = resolve(&paths, "email", "alice@example.com")
            .await
            .unwrap();
        assert!(gate.record(&user_hash, service).await.unwrap().unwrap().blocked);

        sender_reset(&paths, "email", "alice@example.com").await.unwrap();
        assert!(gate.record(&user_hash, service).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_sender_is_an_error() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        assert!(sender_block(&paths, "email", "nobody").await.is_err());
    }
}
