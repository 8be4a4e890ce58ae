//! Data models: layout configuration and extraction records.

pub mod config;
pub mod layout;
pub mod record;
