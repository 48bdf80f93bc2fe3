//! Standalone query functions that work with any Connection.
//!
//! Each function takes a `&Connection` (or `&mut Connection` when it opens
//! a transaction) as its first parameter, so they run unchanged inside
//! [`crate::AsyncDatabase::call`] and in plain synchronous tests.

use crate::{AbuseRecord, DatabaseResult, UsageRecord, UsageStatus};
use chrono::{DateTime, Utc};
use courier_config_and_utils::{ChannelKind, RequestType};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

// ==========================================
// Abuse records
// ==========================================

/// Get the abuse record for a sender on a service.
pub fn get_abuse_record(
    conn: &Connection,
    user_hash: &str,
    service: &str,
) -> DatabaseResult<Option<AbuseRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_hash, service, request_count, blocked, last_request_at
         FROM abuse_records WHERE user_hash = ?1 AND service = ?2",
    )?;

    let record = stmt
        .query_row(params![user_hash, service], row_to_abuse_record)
        .optional()?;
    Ok(record)
}

/// Insert or overwrite an abuse record.
pub fn put_abuse_record(conn: &Connection, record: &AbuseRecord) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO abuse_records (user_hash, service, request_count, blocked, last_request_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_hash, service) DO UPDATE SET
            request_count = excluded.request_count,
            blocked = excluded.blocked,
            last_request_at = excluded.last_request_at",
        params![
            record.user_hash,
            record.service,
            record.request_count,
            record.blocked,
            record.last_request_at.timestamp(),
        ],
    )?;
    Ok(())
}

/// Atomically read, transform, and write the abuse record of one key.
///
/// Runs inside a `BEGIN IMMEDIATE` transaction: the write lock is taken
/// before the read, so no other connection can read a stale count between
/// our read and our write. Returns the record as it was before the call
/// and the record as written.
pub fn update_abuse_record_with<F>(
    conn: &mut Connection,
    user_hash: &str,
    service: &str,
    f: F,
) -> DatabaseResult<(Option<AbuseRecord>, AbuseRecord)>
where
    F: FnOnce(Option<AbuseRecord>) -> AbuseRecord,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = get_abuse_record(&tx, user_hash, service)?;
    let next = f(current.clone());
    put_abuse_record(&tx, &next)?;
    tx.commit()?;
    debug!(
        user_hash,
        service,
        request_count = next.request_count,
        blocked = next.blocked,
        "Abuse record updated"
    );
    Ok((current, next))
}

/// Set or clear the administrative block flag, creating the record if the
/// sender was never seen.
pub fn set_abuse_blocked(
    conn: &Connection,
    user_hash: &str,
    service: &str,
    blocked: bool,
    now: DateTime<Utc>,
) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO abuse_records (user_hash, service, request_count, blocked, last_request_at)
         VALUES (?1, ?2, 0, ?3, ?4)
         ON CONFLICT(user_hash, service) DO UPDATE SET blocked = excluded.blocked",
        params![user_hash, service, blocked, now.timestamp()],
    )?;
    Ok(())
}

/// Delete an abuse record (administrative purge).
pub fn delete_abuse_record(conn: &Connection, user_hash: &str, service: &str) -> DatabaseResult<bool> {
    let count = conn.execute(
        "DELETE FROM abuse_records WHERE user_hash = ?1 AND service = ?2",
        params![user_hash, service],
    )?;
    Ok(count > 0)
}

fn row_to_abuse_record(row: &Row<'_>) -> rusqlite::Result<AbuseRecord> {
    Ok(AbuseRecord {
        user_hash: row.get(0)?,
        service: row.get(1)?,
        request_count: row.get(2)?,
        blocked: row.get(3)?,
        last_request_at: epoch_to_datetime(4, row.get(4)?)?,
    })
}

// ==========================================
// Warned senders
// ==========================================

/// Record that a sender received the unauthenticated-mail explanation.
///
/// Returns `true` only for the call that created the marker.
pub fn mark_warned(
    conn: &Connection,
    user_hash: &str,
    service: &str,
    now: DateTime<Utc>,
) -> DatabaseResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO warned_senders (user_hash, service, warned_at) VALUES (?1, ?2, ?3)",
        params![user_hash, service, now.timestamp()],
    )?;
    Ok(inserted == 1)
}

/// Whether a sender was already warned.
pub fn is_warned(conn: &Connection, user_hash: &str, service: &str) -> DatabaseResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM warned_senders WHERE user_hash = ?1 AND service = ?2",
            params![user_hash, service],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Forget a warned marker (administrative).
pub fn clear_warned(conn: &Connection, user_hash: &str, service: &str) -> DatabaseResult<bool> {
    let count = conn.execute(
        "DELETE FROM warned_senders WHERE user_hash = ?1 AND service = ?2",
        params![user_hash, service],
    )?;
    Ok(count > 0)
}

// ==========================================
// Usage records
// ==========================================

/// Append a usage record. Returns its row id.
pub fn insert_usage_record(conn: &Connection, record: &UsageRecord) -> DatabaseResult<i64> {
    conn.execute(
        "INSERT INTO usage_records (date, request_type, os, locale, channel, status, diagnostic_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.timestamp.to_rfc3339(),
            record.request_type.map(|t| t.as_str()),
            record.os,
            record.locale,
            record.channel.as_str(),
            record.status.as_str(),
            record.diagnostic_ref,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// List the most recent usage records, newest first.
pub fn list_usage_records(conn: &Connection, limit: usize) -> DatabaseResult<Vec<UsageRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT date, request_type, os, locale, channel, status, diagnostic_ref
         FROM usage_records ORDER BY id DESC LIMIT ?1",
    )?;

    let records = stmt
        .query_map(params![limit as i64], row_to_usage_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Count usage records per status since a point in time.
pub fn count_usage_by_status(
    conn: &Connection,
    since: DateTime<Utc>,
) -> DatabaseResult<Vec<(UsageStatus, i64)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT status, COUNT(*) FROM usage_records
         WHERE date >= ?1 GROUP BY status ORDER BY status",
    )?;

    let counts = stmt
        .query_map(params![since.to_rfc3339()], |row| {
            let status: String = row.get(0)?;
            Ok((UsageStatus::from_str(&status), row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}

fn row_to_usage_record(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    let date: String = row.get(0)?;
    let request_type: Option<String> = row.get(1)?;
    let channel: String = row.get(4)?;
    let status: String = row.get(5)?;

    let timestamp = DateTime::parse_from_rfc3339(&date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let channel = ChannelKind::parse(&channel).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown channel '{channel}'").into(),
        )
    })?;

    Ok(UsageRecord {
        timestamp,
        channel,
        request_type: request_type.as_deref().map(RequestType::from_str),
        os: row.get(2)?,
        locale: row.get(3)?,
        status: UsageStatus::from_str(&status),
        diagnostic_ref: row.get(6)?,
    })
}

fn epoch_to_datetime(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;
    use chrono::{Duration, TimeZone};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn abuse_record_missing_is_none() {
        let conn = conn();
        assert!(get_abuse_record(&conn, "h", "email").unwrap().is_none());
    }

    #[test]
    fn put_then_get_abuse_record() {
        let conn = conn();
        let record = AbuseRecord {
            user_hash: "h".to_string(),
            service: "email".to_string(),
            request_count: 4,
            blocked: true,
            last_request_at: at(1_700_000_000),
        };
        put_abuse_record(&conn, &record).unwrap();

        assert_eq!(get_abuse_record(&conn, "h", "email").unwrap(), Some(record));
        assert!(get_abuse_record(&conn, "h", "xmpp").unwrap().is_none());
    }

    #[test]
    fn update_with_sees_previous_value() {
        let mut conn = conn();
        let now = at(1_700_000_000);

        let (before, first) = update_abuse_record_with(&mut conn, "h", "email", |current| {
            assert!(current.is_none());
            AbuseRecord::first("h", "email", now)
        })
        .unwrap();
        assert!(before.is_none());
        assert_eq!(first.request_count, 1);

        let (before, second) = update_abuse_record_with(&mut conn, "h", "email", |current| {
            let mut record = current.unwrap();
            record.request_count += 1;
            record
        })
        .unwrap();
        assert_eq!(before, Some(first));
        assert_eq!(second.request_count, 2);
        assert_eq!(
            get_abuse_record(&conn, "h", "email").unwrap().unwrap().request_count,
            2
        );
    }

    #[test]
    fn set_blocked_creates_and_preserves_count() {
        let conn = conn();
        let now = at(1_700_000_000);
        set_abuse_blocked(&conn, "h", "email", true, now).unwrap();
        let record = get_abuse_record(&conn, "h", "email").unwrap().unwrap();
        assert!(record.blocked);
        assert_eq!(record.request_count, 0);

        put_abuse_record(
            &conn,
            &AbuseRecord {
                request_count: 9,
                ..record
            },
        )
        .unwrap();
        set_abuse_blocked(&conn, "h", "email", false, now).unwrap();
        let record = get_abuse_record(&conn, "h", "email").unwrap().unwrap();
        assert!(!record.blocked);
        assert_eq!(record.request_count, 9);
    }

    #[test]
    fn delete_abuse_record_reports_presence() {
        let conn = conn();
        put_abuse_record(&conn, &AbuseRecord::first("h", "email", at(1))).unwrap();
        assert!(delete_abuse_record(&conn, "h", "email").unwrap());
        assert!(!delete_abuse_record(&conn, "h", "email").unwrap());
    }

    #[test]
    fn mark_warned_only_once() {
        let conn = conn();
        let now = at(1_700_000_000);
        assert!(!is_warned(&conn, "h", "email").unwrap());
        assert!(mark_warned(&conn, "h", "email", now).unwrap());
        assert!(!mark_warned(&conn, "h", "email", now).unwrap());
        assert!(is_warned(&conn, "h", "email").unwrap());
        assert!(clear_warned(&conn, "h", "email").unwrap());
        assert!(!is_warned(&conn, "h", "email").unwrap());
    }

    #[test]
    fn usage_records_list_newest_first() {
        let conn = conn();
        let base = at(1_700_000_000);
        let mut first = UsageRecord::unclassified(ChannelKind::Email, UsageStatus::Malformed, base);
        first.diagnostic_ref = Some("ref-1".to_string());
        let second = UsageRecord {
            timestamp: base + Duration::minutes(1),
            channel: ChannelKind::Xmpp,
            request_type: Some(RequestType::Links),
            os: Some("linux".to_string()),
            locale: Some("en".to_string()),
            status: UsageStatus::Ok,
            diagnostic_ref: None,
        };
        insert_usage_record(&conn, &first).unwrap();
        insert_usage_record(&conn, &second).unwrap();

        let listed = list_usage_records(&conn, 10).unwrap();
        assert_eq!(listed, vec![second, first]);
        assert!(listed[1].request_type.is_none());
        assert_eq!(list_usage_records(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn usage_counts_group_by_status() {
        let conn = conn();
        let base = at(1_700_000_000);
        for status in [UsageStatus::Ok, UsageStatus::Ok, UsageStatus::SendFailed] {
            insert_usage_record(&conn, &UsageRecord::unclassified(ChannelKind::Email, status, base))
                .unwrap();
        }

        let counts = count_usage_by_status(&conn, base - Duration::days(1)).unwrap();
        assert!(counts.contains(&(UsageStatus::Ok, 2)));
        assert!(counts.contains(&(UsageStatus::SendFailed, 1)));
        assert!(count_usage_by_status(&conn, base + Duration::days(1))
            .unwrap()
            .is_empty());
    }
}
