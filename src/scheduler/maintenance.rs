//! Maintenance sweeps: stale-upload cleanup, usage digest, health snapshot.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;

use crate::procinfo::{format_uptime, process_memory_mb};
use crate::scheduler::Scheduler;

/// Upload subdirectories the cleanup sweep scans.
const UPLOAD_SUBDIRS: [&str; 4] = ["images", "documents", "audio", "videos"];

/// Point-in-time health reading, published on the health broadcast channel.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub uptime_secs: u64,
    pub memory_mb: u64,
    pub total_users: u64,
    pub total_messages: u64,
    pub pending_scheduled: u64,
    pub timestamp: DateTime<Utc>,
}

impl Scheduler {
    /// Remove uploaded files older than the retention window. Returns the
    /// number of files removed. IO failures on individual files are logged
    /// and skipped.
    pub async fn run_cleanup_sweep(&self) -> usize {
        let Some(cutoff) = SystemTime::now().checked_sub(self.config.retention) else {
            return 0;
        };

        let mut removed = 0;
        for subdir in UPLOAD_SUBDIRS {
            let dir = self.config.uploads_dir.join(subdir);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Subdirectories are created lazily on first upload.
                Err(_) => continue,
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(dir = %dir.display(), "Cleanup read_dir failed: {e}");
                        break;
                    }
                };

                let stale = entry
                    .metadata()
                    .await
                    .and_then(|m| m.modified())
                    .map(|modified| modified <= cutoff)
                    .unwrap_or(false);
                if !stale {
                    continue;
                }

                match fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        tracing::info!(path = %entry.path().display(), "Removed stale upload");
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), "Cleanup remove failed: {e}")
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Cleanup sweep finished");
        }
        removed
    }

    /// Send the usage digest to the operator conversation, if one is
    /// configured.
    pub async fn run_digest_sweep(&self) {
        let Some(operator) = self.config.operator_address.as_deref() else {
            tracing::debug!("No operator configured, skipping digest");
            return;
        };

        let stats = match self.store.get_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Digest stats query failed: {e}");
                return;
            }
        };

        let digest = format!(
            "📊 Weekly Usage Report\n\n\
             Total Users: {}\n\
             Total Messages: {}\n\
             Active Auto-replies: {}\n\
             Pending Scheduled Messages: {}\n\n\
             Performance:\n\
             Uptime: {}\n\
             Memory Usage: {} MB\n\n\
             Report generated: {}",
            stats.total_users,
            stats.total_messages,
            stats.active_auto_replies,
            stats.pending_scheduled,
            format_uptime(self.started_at.elapsed()),
            process_memory_mb(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );

        if let Err(e) = self.channel.send(operator, &digest).await {
            tracing::error!(operator = %operator, "Failed to send digest: {e}");
        }
    }

    /// Take a health reading, publish it, and warn if memory use is above
    /// the configured threshold.
    pub async fn run_health_sweep(&self) {
        let stats = match self.store.get_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Health stats query failed: {e}");
                return;
            }
        };

        let snapshot = HealthSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            memory_mb: process_memory_mb(),
            total_users: stats.total_users,
            total_messages: stats.total_messages,
            pending_scheduled: stats.pending_scheduled,
            timestamp: Utc::now(),
        };

        if snapshot.memory_mb > self.config.memory_warn_mb {
            tracing::warn!(
                memory_mb = snapshot.memory_mb,
                threshold_mb = self.config.memory_warn_mb,
                "Memory usage above threshold"
            );
        } else {
            tracing::debug!(
                memory_mb = snapshot.memory_mb,
                uptime_secs = snapshot.uptime_secs,
                "Health snapshot"
            );
        }

        // No subscribers is fine; snapshots are advisory.
        let _ = self.health_tx.send(snapshot);
    }
}
