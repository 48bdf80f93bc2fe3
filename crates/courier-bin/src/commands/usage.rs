//! Usage record reports.

use super::open_database;
use anyhow::Result;
use chrono::{Duration, Utc};
use courier_config_and_utils::Paths;
use courier_database::queries;

/// Print the most recent usage records, newest first.
pub async fn usage_recent(paths: &Paths, limit: usize) -> Result<()> {
    let db = open_database(paths).await?;
    let records = db
        .call(move |conn| queries::list_usage_records(conn, limit))
        .await?;
    db.close().await?;

    if records.is_empty() {
        println!("No usage records");
        return Ok(());
    }
    println!(
        "{:<26} {:<7} {:<8} {:<8} {:<6} {:<18} {}",
        "Date", "Channel", "Type", "OS", "Locale", "Status", "Ref"
    );
    println!("{}", "-".repeat(100));
    for record in records {
        println!(
            "{:<26} {:<7} {:<8} {:<8} {:<6} {:<18} {}",
            record.timestamp.to_rfc3339(),
            record.channel.as_str(),
            record.request_type.map_or("-", |t| t.as_str()),
            record.os.as_deref().unwrap_or("-"),
            record.locale.as_deref().unwrap_or("-"),
            record.status.as_str(),
            record.diagnostic_ref.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Print record counts per status for the last `hours`.
pub async fn usage_summary(paths: &Paths, hours: i64) -> Result<()> {
    let since = Utc::now() - Duration::hours(hours);
    let db = open_database(paths).await?;
    let counts = db
        .call(move |conn| queries::count_usage_by_status(conn, since))
        .await?;
    db.close().await?;

    println!("Since {}", since.to_rfc3339());
    for (status, count) in counts {
        println!("{:<18} {count}", status.as_str());
    }
    Ok(())
}
