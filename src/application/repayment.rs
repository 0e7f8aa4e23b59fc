use super::lifecycle::LifecycleManager;
use crate::domain::advance::{Advance, AdvanceStatus};
use crate::domain::ports::AdvanceStoreRef;
use crate::domain::{AdvanceId, EmployeeId};
use crate::error::{AdvanceError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of allocating one incoming payment across advances.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// Amount credited across advances.
    pub applied: Decimal,
    /// Amount beyond the employee's total outstanding debt. Reported for
    /// manual reconciliation, never auto-refunded and never dropped.
    pub surplus: Decimal,
    /// Advances touched, in allocation order.
    pub touched: Vec<AdvanceId>,
}

/// Applies an inbound payment across an employee's outstanding advances,
/// oldest-approved-first.
///
/// Callers must hold the per-employee lock; the engine facade enforces
/// this so two racing callbacks can never interleave partial applies.
pub struct RepaymentAllocator {
    advances: AdvanceStoreRef,
    lifecycle: Arc<LifecycleManager>,
}

impl RepaymentAllocator {
    pub fn new(advances: AdvanceStoreRef, lifecycle: Arc<LifecycleManager>) -> Self {
        Self { advances, lifecycle }
    }

    pub async fn apply_repayment(
        &self,
        employee: EmployeeId,
        amount: Decimal,
    ) -> Result<AllocationResult> {
        if amount <= Decimal::ZERO {
            return Err(AdvanceError::Validation(
                "Repayment amount must be positive".to_string(),
            ));
        }

        let mut open: Vec<Advance> = self
            .advances
            .for_employee(employee)
            .await?
            .into_iter()
            .filter(|a| {
                matches!(a.status, AdvanceStatus::Disbursed | AdvanceStatus::Repaying)
                    && a.outstanding() > Decimal::ZERO
            })
            .collect();
        open.sort_by_key(|a| (a.approved_date, a.id));

        // Collect all changes, then commit, so a failure mid-walk never
        // leaves a partial apply behind.
        let mut remaining = amount;
        let mut touched = Vec::new();
        for advance in open.iter_mut() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let portion = remaining.min(advance.outstanding());
            advance.credit_repayment(portion)?;
            self.lifecycle.recompute_after_repayment(advance)?;
            touched.push(advance.id);
            remaining -= portion;
        }
        for advance in &open {
            if touched.contains(&advance.id) {
                self.advances.store(advance.clone()).await?;
            }
        }

        let applied = amount - remaining;
        if remaining > Decimal::ZERO {
            tracing::warn!(
                employee,
                surplus = %remaining,
                "repayment exceeds outstanding debt; surplus needs manual reconciliation"
            );
        }
        tracing::info!(employee, %applied, advances = touched.len(), "repayment allocated");
        Ok(AllocationResult {
            applied,
            surplus: remaining,
            touched,
        })
    }
}
