//! Signing Service - multi-party document signing workflow engine.
//!
//! Tracks a document through an ordered set of signers, enforces
//! sequential/parallel signing policy, gates signing actions behind a second
//! factor, cascades terminal outcomes across participants, and runs the
//! time-based reconciliation sweeps (reminders, expiry warnings, forced
//! expiry).

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
