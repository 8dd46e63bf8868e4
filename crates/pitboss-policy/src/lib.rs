//! # Pitboss Policy - Row-Level Access Control
//!
//! Per-entity access rules evaluated on every row read and write. Each
//! entity kind registers exactly one policy family; dispatch is on the
//! family tag, never on strings. Hybrid precedence is fixed workspace-wide:
//! resolved context wins whenever present, claims are the fallback and never
//! the override.

pub mod engine;
pub mod family;
pub mod rules;

pub use engine::{AccessSubject, Decision, DenyReason, MutationKind, PolicyEngine};
pub use family::PolicyFamily;
pub use rules::{floor_rules, PolicyRule};
