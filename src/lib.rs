//! Social stream importer library.
//!
//! Pulls posts from Twitter, Instagram, YouTube and Facebook, normalizes them
//! into one record shape with sanitized content, and upserts them into a
//! SQLite store keyed by source and source id.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod cache;
pub mod config;
pub mod db;
pub mod http;
pub mod importer;
pub mod model;
pub mod oauth1;
pub mod sanitize;
pub mod settings;
pub mod sources;
pub mod store;
pub mod token;
