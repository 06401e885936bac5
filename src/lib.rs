//! Courier — conversational automation engine.

pub mod autoreply;
pub mod channels;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod procinfo;
pub mod scheduler;
pub mod services;
pub mod store;
