//! Application layer: the advance lifecycle manager, disbursement
//! coordinator, repayment allocator and reconciliation gateway, plus the
//! `AdvanceEngine` facade that owns storage and serializes work per
//! employee and per transaction.

pub mod disbursement;
pub mod engine;
pub mod lifecycle;
pub mod locks;
pub mod monitor;
pub mod reconciliation;
pub mod repayment;
