//! Persistence layer — libSQL-backed storage for users, rules, and schedules.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{AutoReplyRule, ScheduledMessage, Store, StoreStats, User};
