//! HRW: HR request approval workflow
//!
//! Staff file leave, cash-advance and other requests; a sales manager and
//! then an HR manager sign off in order. Every decision is an append-only,
//! signed ledger row, committed atomically with the request's status change.

pub mod cli;
pub mod core;
