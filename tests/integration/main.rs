//! Integration Tests
//!
//! Cross-crate tests through the `divan` facade:
//! - Store: writes, reads and pagination over the in-memory database
//! - Config: loading `divan.toml` into a connected store

mod config;
mod store;
