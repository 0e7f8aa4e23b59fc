use super::money::{Amount, Balance};
use super::{AdvanceId, EmployeeId};
use crate::error::{AdvanceError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an advance.
///
/// `Declined` and `Repaid` are terminal; once reached the record only
/// changes through audit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    Pending,
    Approved,
    Declined,
    Disbursed,
    Repaying,
    Repaid,
}

impl AdvanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Repaid)
    }

    /// Active advances count towards the per-employee concurrency ceiling.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Approved | Self::Disbursed | Self::Repaying
        )
    }

    /// The canonical transition table. Everything else is rejected.
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Declined)
                | (Self::Approved, Self::Disbursed)
                | (Self::Disbursed, Self::Repaying)
                | (Self::Repaying, Self::Repaid)
        )
    }
}

impl fmt::Display for AdvanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Disbursed => "disbursed",
            Self::Repaying => "repaying",
            Self::Repaid => "repaid",
        };
        f.write_str(s)
    }
}

/// A short-term, interest-bearing salary draw owed by an employee.
///
/// Status moves only through [`Advance::transition`], and only the
/// lifecycle manager calls it; the allocator and coordinator mutate the
/// running balances through the guarded methods below and ask the
/// lifecycle manager to recompute status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advance {
    pub id: AdvanceId,
    pub employee: EmployeeId,
    pub amount: Amount,
    /// Monthly-equivalent simple interest rate, percent.
    pub interest_rate: Decimal,
    /// Principal plus interest.
    pub total_repayment: Decimal,
    pub installment: Decimal,
    pub amount_repaid: Balance,
    pub amount_withdrawn: Balance,
    pub period_months: u32,
    pub status: AdvanceStatus,
    pub requested_date: NaiveDate,
    pub approved_date: Option<DateTime<Utc>>,
    pub disbursed_date: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub disbursed_by: Option<String>,
    pub comments: Option<String>,
    pub payout_channel: String,
}

impl Advance {
    /// Builds a pending advance, computing simple interest
    /// (`amount * rate * period / 1200`), the total repayment due and the
    /// monthly installment (2 decimal places).
    pub fn new(
        id: AdvanceId,
        employee: EmployeeId,
        amount: Amount,
        interest_rate: Decimal,
        period_months: u32,
        requested_date: NaiveDate,
        payout_channel: String,
    ) -> Result<Self> {
        if period_months == 0 {
            return Err(AdvanceError::Validation(
                "Repayment period must be at least one month".to_string(),
            ));
        }
        let principal = amount.value();
        let interest =
            principal * interest_rate * Decimal::from(period_months) / Decimal::from(1200u32);
        let total_repayment = principal + interest;
        let installment = (total_repayment / Decimal::from(period_months)).round_dp(2);

        Ok(Self {
            id,
            employee,
            amount,
            interest_rate,
            total_repayment,
            installment,
            amount_repaid: Balance::ZERO,
            amount_withdrawn: Balance::ZERO,
            period_months,
            status: AdvanceStatus::Pending,
            requested_date,
            approved_date: None,
            disbursed_date: None,
            approved_by: None,
            disbursed_by: None,
            comments: None,
            payout_channel,
        })
    }

    /// Repayment still owed.
    pub fn outstanding(&self) -> Decimal {
        self.total_repayment - self.amount_repaid.value()
    }

    /// Approved principal not yet paid out.
    pub fn withdrawable(&self) -> Decimal {
        self.amount.value() - self.amount_withdrawn.value()
    }

    pub fn fully_withdrawn(&self) -> bool {
        self.amount_withdrawn.value() >= self.amount.value()
    }

    pub fn settled(&self) -> bool {
        self.amount_repaid.value() >= self.total_repayment
    }

    /// Applies a status change through the canonical transition table.
    pub fn transition(&mut self, to: AdvanceStatus) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(AdvanceError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Credits a repayment, keeping `amount_repaid <= total_repayment`.
    pub fn credit_repayment(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AdvanceError::Validation(
                "Repayment credit must be positive".to_string(),
            ));
        }
        if self.amount_repaid.value() + amount > self.total_repayment {
            return Err(AdvanceError::Validation(format!(
                "Credit of {} would exceed total repayment of {}",
                amount, self.total_repayment
            )));
        }
        self.amount_repaid += amount;
        Ok(())
    }

    /// Records a payout, keeping `amount_withdrawn <= amount`.
    pub fn record_withdrawal(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AdvanceError::Validation(
                "Withdrawal must be positive".to_string(),
            ));
        }
        if self.amount_withdrawn.value() + amount > self.amount.value() {
            return Err(AdvanceError::Validation(format!(
                "Withdrawal of {} would exceed approved amount of {}",
                amount, self.amount
            )));
        }
        self.amount_withdrawn += amount;
        Ok(())
    }

    /// Compensating action for a failed outbound settlement: restores the
    /// withdrawn amount recorded at initiation.
    pub fn revert_withdrawal(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO || amount > self.amount_withdrawn.value() {
            return Err(AdvanceError::Validation(format!(
                "Cannot revert withdrawal of {} from {}",
                amount, self.amount_withdrawn
            )));
        }
        self.amount_withdrawn -= amount;
        Ok(())
    }
}
