//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::channels::ContentKind;
use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{AutoReplyRule, ScheduledMessage, Store, StoreStats, User};

/// libSQL store backend.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create data directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp text: second-resolution RFC 3339 in UTC.
/// All rows use the same format, so string comparison orders correctly.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

/// Map a row to a User.
/// Column order: 0:id, 1:address, 2:name, 3:is_admin, 4:is_blocked, 5:created_at, 6:last_seen
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    Ok(User {
        id: row.get(0)?,
        address: row.get(1)?,
        name: row.get::<Option<String>>(2)?,
        is_admin: row.get::<i64>(3)? != 0,
        is_blocked: row.get::<i64>(4)? != 0,
        created_at: parse_datetime(&row.get::<String>(5)?),
        last_seen: parse_datetime(&row.get::<String>(6)?),
    })
}

/// Column order: 0:id, 1:trigger_text, 2:reply_text, 3:is_active, 4:created_at
fn row_to_rule(row: &libsql::Row) -> Result<AutoReplyRule, libsql::Error> {
    Ok(AutoReplyRule {
        id: row.get(0)?,
        trigger_text: row.get(1)?,
        reply_text: row.get(2)?,
        is_active: row.get::<i64>(3)? != 0,
        created_at: parse_datetime(&row.get::<String>(4)?),
    })
}

/// Column order: 0:id, 1:conversation_id, 2:message, 3:scheduled_time, 4:is_sent, 5:created_at
fn row_to_scheduled(row: &libsql::Row) -> Result<ScheduledMessage, libsql::Error> {
    Ok(ScheduledMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        message: row.get(2)?,
        scheduled_time: parse_datetime(&row.get::<String>(3)?),
        is_sent: row.get::<i64>(4)? != 0,
        created_at: parse_datetime(&row.get::<String>(5)?),
    })
}

#[async_trait]
impl Store for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get_user(&self, address: &str) -> Result<Option<User>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, address, name, is_admin, is_blocked, created_at, last_seen
                 FROM users WHERE address = ?1",
                params![address],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn upsert_user(
        &self,
        address: &str,
        name: Option<&str>,
        is_admin: Option<bool>,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        self.conn()
            .execute(
                "INSERT INTO users (address, name, is_admin, is_blocked, created_at, last_seen)
                 VALUES (?1, ?2, COALESCE(?3, 0), 0, ?4, ?4)
                 ON CONFLICT(address) DO UPDATE SET
                     name = COALESCE(?2, users.name),
                     is_admin = COALESCE(?3, users.is_admin)",
                params![address, name, is_admin.map(i64::from), now],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn touch_last_seen(&self, address: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE users SET last_seen = ?1 WHERE address = ?2",
                params![fmt_ts(Utc::now()), address],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn set_blocked(&self, address: &str, blocked: bool) -> Result<bool, StoreError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET is_blocked = ?1 WHERE address = ?2",
                params![i64::from(blocked), address],
            )
            .await
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    async fn list_active_auto_replies(&self) -> Result<Vec<AutoReplyRule>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, trigger_text, reply_text, is_active, created_at
                 FROM auto_replies WHERE is_active = 1 ORDER BY id ASC",
                (),
            )
            .await
            .map_err(query_err)?;

        let mut rules = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            rules.push(row_to_rule(&row).map_err(query_err)?);
        }
        Ok(rules)
    }

    async fn add_auto_reply(&self, trigger: &str, reply: &str) -> Result<i64, StoreError> {
        self.conn()
            .execute(
                "INSERT INTO auto_replies (trigger_text, reply_text, is_active, created_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![trigger, reply, fmt_ts(Utc::now())],
            )
            .await
            .map_err(query_err)?;
        Ok(self.conn().last_insert_rowid())
    }

    async fn deactivate_auto_reply(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE auto_replies SET is_active = 0 WHERE id = ?1 AND is_active = 1",
                params![id],
            )
            .await
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    async fn add_scheduled_message(
        &self,
        conversation_id: &str,
        text: &str,
        when: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.conn()
            .execute(
                "INSERT INTO scheduled_messages
                     (conversation_id, message, scheduled_time, is_sent, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![conversation_id, text, fmt_ts(when), fmt_ts(Utc::now())],
            )
            .await
            .map_err(query_err)?;
        Ok(self.conn().last_insert_rowid())
    }

    async fn list_due_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, conversation_id, message, scheduled_time, is_sent, created_at
                 FROM scheduled_messages
                 WHERE is_sent = 0 AND scheduled_time <= ?1
                 ORDER BY id ASC",
                params![fmt_ts(now)],
            )
            .await
            .map_err(query_err)?;

        let mut due = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            due.push(row_to_scheduled(&row).map_err(query_err)?);
        }
        Ok(due)
    }

    async fn mark_delivered(&self, id: i64) -> Result<bool, StoreError> {
        // Compare-and-set: only flips rows that are still pending, so an
        // overlapping sweep can never record a second delivery.
        let changed = self
            .conn()
            .execute(
                "UPDATE scheduled_messages SET is_sent = 1 WHERE id = ?1 AND is_sent = 0",
                params![id],
            )
            .await
            .map_err(query_err)?;
        Ok(changed > 0)
    }

    async fn log_message(
        &self,
        address: &str,
        conversation_id: &str,
        content: &str,
        kind: ContentKind,
        from_bot: bool,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO messages (address, conversation_id, content, kind, from_bot, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    address,
                    conversation_id,
                    content,
                    kind.as_str(),
                    i64::from(from_bot),
                    fmt_ts(Utc::now())
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, fmt_ts(Utc::now())],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT
                     (SELECT COUNT(*) FROM users),
                     (SELECT COUNT(*) FROM messages),
                     (SELECT COUNT(*) FROM auto_replies WHERE is_active = 1),
                     (SELECT COUNT(*) FROM scheduled_messages WHERE is_sent = 0)",
                (),
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(StoreStats {
                total_users: row.get::<i64>(0).map_err(query_err)? as u64,
                total_messages: row.get::<i64>(1).map_err(query_err)? as u64,
                active_auto_replies: row.get::<i64>(2).map_err(query_err)? as u64,
                pending_scheduled: row.get::<i64>(3).map_err(query_err)? as u64,
            }),
            None => Ok(StoreStats::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn user_created_then_flags_preserved_on_upsert() {
        let store = LibSqlStore::new_memory().await.unwrap();

        store
            .upsert_user("+1234", Some("Alice"), Some(true))
            .await
            .unwrap();
        // A later upsert without flags must not clear admin or name.
        store.upsert_user("+1234", None, None).await.unwrap();

        let user = store.get_user("+1234").await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert!(user.is_admin);
        assert!(!user.is_blocked);
    }

    #[tokio::test]
    async fn set_blocked_reports_unknown_address() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(!store.set_blocked("+999", true).await.unwrap());

        store.upsert_user("+999", None, None).await.unwrap();
        assert!(store.set_blocked("+999", true).await.unwrap());
        assert!(store.get_user("+999").await.unwrap().unwrap().is_blocked);
    }

    #[tokio::test]
    async fn auto_replies_listed_in_insertion_order() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let first = store.add_auto_reply("hello", "Hi!").await.unwrap();
        store.add_auto_reply("bye", "See you!").await.unwrap();

        let rules = store.list_active_auto_replies().await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, first);
        assert_eq!(rules[0].trigger_text, "hello");

        assert!(store.deactivate_auto_reply(first).await.unwrap());
        assert!(!store.deactivate_auto_reply(first).await.unwrap());
        let rules = store.list_active_auto_replies().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].trigger_text, "bye");
    }

    #[tokio::test]
    async fn due_query_respects_scheduled_time() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let target = Utc::now();
        store
            .add_scheduled_message("c1", "Happy New Year!", target)
            .await
            .unwrap();

        let before = store
            .list_due_pending(target - ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert!(before.is_empty());

        let after = store
            .list_due_pending(target + ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].conversation_id, "c1");
        assert!(!after[0].is_sent);
    }

    #[tokio::test]
    async fn mark_delivered_is_compare_and_set() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store
            .add_scheduled_message("c1", "hi", Utc::now())
            .await
            .unwrap();

        assert!(store.mark_delivered(id).await.unwrap());
        assert!(!store.mark_delivered(id).await.unwrap());
        assert!(!store.mark_delivered(9999).await.unwrap());

        let due = store
            .list_due_pending(Utc::now() + ChronoDuration::seconds(5))
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn settings_roundtrip_and_overwrite() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert_eq!(store.get_setting("greeting").await.unwrap(), None);

        store.set_setting("greeting", "hello").await.unwrap();
        store.set_setting("greeting", "hi").await.unwrap();
        assert_eq!(
            store.get_setting("greeting").await.unwrap().as_deref(),
            Some("hi")
        );
    }

    #[tokio::test]
    async fn stats_count_all_tables() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.upsert_user("+1", None, None).await.unwrap();
        store
            .log_message("+1", "c1", "hello", ContentKind::Text, false)
            .await
            .unwrap();
        store.add_auto_reply("a", "b").await.unwrap();
        store
            .add_scheduled_message("c1", "later", Utc::now())
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_messages, 1);
        assert_eq!(stats.active_auto_replies, 1);
        assert_eq!(stats.pending_scheduled, 1);
    }
}
