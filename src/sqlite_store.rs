//! SQLite-backed message source and checkpoint store.
//!
//! Messages live in `messages`; every completed ingest run appends a row to
//! `processed_chunks`, and the checkpoint is the largest recorded
//! `last_message_ts`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use chatmem_core::models::{Message, Role};
use chatmem_core::store::{CheckpointStore, MessageSource};

/// SQLite implementation of [`MessageSource`] and [`CheckpointStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert messages, skipping exact repeats. Returns the number inserted.
    pub async fn insert_messages(&self, messages: &[Message]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for msg in messages {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO messages (session_id, ts, role, content) VALUES (?, ?, ?, ?)",
            )
            .bind(&msg.session_id)
            .bind(format_db_ts(&msg.timestamp))
            .bind(msg.role.as_str())
            .bind(&msg.content)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

/// Fixed-width UTC timestamp used for every stored `ts` column.
pub fn format_db_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid stored timestamp: {}", s))?
        .with_timezone(&Utc))
}

#[async_trait]
impl MessageSource for SqliteStore {
    async fn fetch_messages(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<Message>> {
        // An empty lower bound compares below every stored timestamp.
        let since = since.map(|ts| format_db_ts(&ts)).unwrap_or_default();
        let rows = sqlx::query(
            r#"
            SELECT session_id, ts, role, content
            FROM messages
            WHERE role IN ('user', 'assistant') AND ts >= ?
            ORDER BY ts ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let ts: String = row.get("ts");
                let role: String = row.get("role");
                Ok(Message {
                    session_id: row.get("session_id"),
                    timestamp: parse_db_ts(&ts)?,
                    role: Role::from(role),
                    content: row.get("content"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn last_processed(&self) -> Result<Option<DateTime<Utc>>> {
        let max: Option<String> = sqlx::query_scalar("SELECT MAX(last_message_ts) FROM processed_chunks")
            .fetch_one(&self.pool)
            .await?;
        max.as_deref().map(parse_db_ts).transpose()
    }

    async fn record_processed(&self, ts: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO processed_chunks (last_message_ts, processed_at) VALUES (?, ?)")
            .bind(format_db_ts(&ts))
            .bind(format_db_ts(&Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::create_schema;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn message(minutes: i64, role: Role, content: &str) -> Message {
        Message {
            session_id: "s1".to_string(),
            timestamp: base() + Duration::minutes(minutes),
            role,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_filters_roles_and_orders() {
        let store = store().await;
        let inserted = store
            .insert_messages(&[
                message(2, Role::Assistant, "second"),
                message(0, Role::User, "first"),
                message(1, Role::Other("system".into()), "hidden"),
                message(3, Role::User, "third"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 4);

        let all = store.fetch_messages(None, 10).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(all[1].role, Role::Assistant);
        assert_eq!(all[0].timestamp, base());

        let since = store
            .fetch_messages(Some(base() + Duration::minutes(2)), 1)
            .await
            .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].content, "second");
    }

    #[tokio::test]
    async fn test_insert_skips_repeats() {
        let store = store().await;
        let batch = [message(0, Role::User, "hello")];
        assert_eq!(store.insert_messages(&batch).await.unwrap(), 1);
        assert_eq!(store.insert_messages(&batch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_checkpoint_is_max() {
        let store = store().await;
        assert_eq!(store.last_processed().await.unwrap(), None);
        store.record_processed(base() + Duration::minutes(10)).await.unwrap();
        store.record_processed(base()).await.unwrap();
        assert_eq!(
            store.last_processed().await.unwrap(),
            Some(base() + Duration::minutes(10))
        );
    }

    #[test]
    fn test_db_ts_is_fixed_width() {
        assert_eq!(format_db_ts(&base()), "2025-03-14T09:00:00.000000Z");
        assert_eq!(parse_db_ts("2025-03-14T09:00:00.000000Z").unwrap(), base());
    }
}
