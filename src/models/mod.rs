// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains the data structures shared by the pipeline stages:
//! the certified-device record, file configuration, and runtime settings.

mod config;
mod record;
mod settings;

// Re-export all public types
pub use config::{
    Config, FeedConfig, FieldAliases, NotifyConfig, ParserConfig, StatusConfig, StorageConfig,
};
pub use record::Record;
pub use settings::{API_BASE_VAR, CHAT_ID_VAR, Credentials, Settings, TOKEN_VAR};
