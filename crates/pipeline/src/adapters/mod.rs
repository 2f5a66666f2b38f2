// Rust guideline compliant 2026-03-07

//! Adapters (secondary ports) for the transfer-pipeline binaries.
//!
//! Each sub-module implements one or more hexagonal port traits defined in
//! the `domain` crate. Adapters are intentionally isolated from gateway and
//! consumer logic.

pub mod file_audit_log;
pub mod in_memory_wallet_store;
pub mod log_alert;

// ---------------------------------------------------------------------------
// End-to-end pipeline tests
// ---------------------------------------------------------------------------
