//! Unified `Store` trait — single async interface for all persistence.
//!
//! The store is the single source of truth for users, auto-reply rules, and
//! scheduled messages. No component caches rows beyond one handling cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::channels::ContentKind;
use crate::error::StoreError;

/// A known user, created on the first observed message from an address.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    /// Channel-native address.
    pub address: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A configured trigger/reply pair. Read-only during matching.
#[derive(Debug, Clone)]
pub struct AutoReplyRule {
    pub id: i64,
    pub trigger_text: String,
    pub reply_text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A deferred outbound message.
///
/// `is_sent` transitions false→true exactly once, only after
/// `now >= scheduled_time`, and never back.
#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    pub id: i64,
    pub conversation_id: String,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts for `/stats` and the digest sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub total_users: u64,
    pub total_messages: u64,
    pub active_auto_replies: u64,
    pub pending_scheduled: u64,
}

/// Backend-agnostic persistence trait.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Look up a user by address.
    async fn get_user(&self, address: &str) -> Result<Option<User>, StoreError>;

    /// Create a user, or update the fields that are `Some` on conflict.
    /// Existing flags are preserved when the corresponding argument is `None`.
    async fn upsert_user(
        &self,
        address: &str,
        name: Option<&str>,
        is_admin: Option<bool>,
    ) -> Result<(), StoreError>;

    /// Update a user's last-seen timestamp to now.
    async fn touch_last_seen(&self, address: &str) -> Result<(), StoreError>;

    /// Set or clear the blocked flag. Returns false if the address is unknown.
    async fn set_blocked(&self, address: &str, blocked: bool) -> Result<bool, StoreError>;

    // ── Auto-replies ────────────────────────────────────────────────

    /// All active rules in insertion order.
    async fn list_active_auto_replies(&self) -> Result<Vec<AutoReplyRule>, StoreError>;

    /// Add a rule. Returns the new rule id.
    async fn add_auto_reply(&self, trigger: &str, reply: &str) -> Result<i64, StoreError>;

    /// Deactivate a rule. Returns false if the id is unknown or already inactive.
    async fn deactivate_auto_reply(&self, id: i64) -> Result<bool, StoreError>;

    // ── Scheduled messages ──────────────────────────────────────────

    /// Insert a pending scheduled message. Returns the new row id.
    async fn add_scheduled_message(
        &self,
        conversation_id: &str,
        text: &str,
        when: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// All pending rows whose scheduled time has passed, in insertion order.
    async fn list_due_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>, StoreError>;

    /// Mark a row delivered, conditioned on it still being pending.
    /// Returns false if the row was already delivered (or is unknown).
    async fn mark_delivered(&self, id: i64) -> Result<bool, StoreError>;

    // ── Message log / settings / stats ──────────────────────────────

    /// Append to the message log.
    async fn log_message(
        &self,
        address: &str,
        conversation_id: &str,
        content: &str,
        kind: ContentKind,
        from_bot: bool,
    ) -> Result<(), StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Aggregate counts: users, messages, active rules, pending schedules.
    async fn get_stats(&self) -> Result<StoreStats, StoreError>;
}
