//! # Notion Sync Core
//!
//! Transport-free logic for notion-sync: document and page models,
//! content fingerprinting, markdown-to-block conversion, the mapping
//! store, document source, and page gateway traits, the link reconciler,
//! and the sync decision engine that ties them together.
//!
//! This crate does no filesystem or network I/O of its own. Every
//! collaborator is a trait object handed to [`engine::SyncEngine`];
//! in-memory implementations of each trait live next to the trait and
//! back the unit tests.

pub mod block;
pub mod convert;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod links;
pub mod models;
pub mod source;
pub mod store;
