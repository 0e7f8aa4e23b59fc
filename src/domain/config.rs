use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Administrator-configured date range during which new advance requests
/// are blocked. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuspensionPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SuspensionPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Read-only configuration snapshot passed explicitly into each operation.
///
/// Callers refresh it between calls; nothing in this crate caches or
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvanceConfig {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Maximum repayment period in months.
    pub max_repayment_period: u32,
    /// Cap on the accrued advance, as a percentage of base salary.
    pub max_advance_percentage: Decimal,
    /// Maximum number of concurrently active advances per employee.
    pub max_active_advances: usize,
    /// Monthly-equivalent simple interest rate, percent.
    pub default_interest_rate: Decimal,
    pub suspension_periods: Vec<SuspensionPeriod>,
    /// Public holidays skipped by the working-day accrual model.
    pub holidays: Vec<NaiveDate>,
    /// Country code prefix used to canonicalize phone numbers.
    pub country_prefix: String,
    /// Alert when the network-reported disbursement account balance falls
    /// below this value.
    pub balance_alert_threshold: Option<Decimal>,
    /// Recipient of operational alerts.
    pub ops_email: String,
}

impl Default for AdvanceConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::from(500u32),
            max_amount: Decimal::from(100_000u32),
            max_repayment_period: 6,
            max_advance_percentage: Decimal::from(50u32),
            max_active_advances: 3,
            default_interest_rate: Decimal::from(5u32),
            suspension_periods: Vec::new(),
            holidays: Vec::new(),
            country_prefix: "254".to_string(),
            balance_alert_threshold: None,
            ops_email: "ops@example.com".to_string(),
        }
    }
}

impl AdvanceConfig {
    /// Returns true if any configured suspension period covers `date`.
    pub fn suspended_on(&self, date: NaiveDate) -> bool {
        self.suspension_periods.iter().any(|p| p.contains(date))
    }
}
