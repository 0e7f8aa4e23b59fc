use super::EmployeeId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Employee record as served by the external directory.
///
/// Read-only to this crate; the directory owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub phone: String,
    pub email: String,
    /// Unset for employees without a configured payroll record; advance
    /// requests for them fail with a configuration error.
    pub base_salary: Option<Decimal>,
    /// Last day of employment, when notice has been given.
    pub employment_end_date: Option<NaiveDate>,
}
