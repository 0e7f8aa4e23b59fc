//! Domain layer: entities, value objects, pure calculators and the ports
//! (async traits) through which the application layer reaches stores and
//! external collaborators.

pub mod accrual;
pub mod advance;
pub mod config;
pub mod employee;
pub mod event;
pub mod money;
pub mod payment;
pub mod phone;
pub mod ports;

/// Identifier of an employee in the external directory.
pub type EmployeeId = u32;
/// Identifier of an advance record.
pub type AdvanceId = u32;
/// Internal identifier of a payment transaction.
pub type PaymentId = u64;
