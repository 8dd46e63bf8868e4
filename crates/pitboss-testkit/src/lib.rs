//! # Pitboss Testkit
//!
//! Shared fixtures for tests across the workspace: a staff directory with a
//! resolver, staff builders that mint valid tokens, and helpers for minting
//! deliberately stale or forged credentials.

pub mod fixtures;

pub use fixtures::{FloorFixture, TestStaff};
