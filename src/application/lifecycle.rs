use crate::domain::accrual;
use crate::domain::advance::{Advance, AdvanceStatus};
use crate::domain::config::AdvanceConfig;
use crate::domain::employee::Employee;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{AdvanceStoreRef, EmployeeDirectoryRef, NotificationSenderRef};
use crate::domain::{AdvanceId, EmployeeId};
use crate::error::{AdvanceError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

/// A new advance request as received from the caller.
#[derive(Debug, Clone)]
pub struct AdvanceRequest {
    pub id: AdvanceId,
    pub employee: EmployeeId,
    pub amount: Decimal,
    pub period_months: u32,
    pub payout_channel: String,
    pub comments: Option<String>,
}

/// Owns the advance state machine. The only component that writes
/// `Advance.status`; the allocator and coordinator hand mutated balances
/// back here for a status recompute.
pub struct LifecycleManager {
    advances: AdvanceStoreRef,
    directory: EmployeeDirectoryRef,
    notifier: NotificationSenderRef,
}

impl LifecycleManager {
    pub fn new(
        advances: AdvanceStoreRef,
        directory: EmployeeDirectoryRef,
        notifier: NotificationSenderRef,
    ) -> Self {
        Self {
            advances,
            directory,
            notifier,
        }
    }

    pub async fn employee(&self, id: EmployeeId) -> Result<Employee> {
        self.directory
            .get(id)
            .await?
            .ok_or_else(|| AdvanceError::NotFound(format!("Employee {id}")))
    }

    /// Validates eligibility and persists a new pending advance.
    ///
    /// No state is written when any check fails.
    pub async fn create(
        &self,
        request: AdvanceRequest,
        config: &AdvanceConfig,
        as_of: NaiveDate,
    ) -> Result<Advance> {
        let employee = self.employee(request.employee).await?;

        if self.advances.get(request.id).await?.is_some() {
            return Err(AdvanceError::Validation(format!(
                "Advance {} already exists",
                request.id
            )));
        }
        if let Some(end) = employee.employment_end_date {
            let final_month = end < as_of
                || (end.year() == as_of.year() && end.month() == as_of.month());
            if final_month {
                return Err(AdvanceError::Validation(
                    "Employee is within the final month of employment".to_string(),
                ));
            }
        }
        if config.suspended_on(as_of) {
            return Err(AdvanceError::SuspensionActive);
        }
        if request.amount < config.min_amount || request.amount > config.max_amount {
            return Err(AdvanceError::Validation(format!(
                "Amount must be between {} and {}",
                config.min_amount, config.max_amount
            )));
        }
        if request.period_months > config.max_repayment_period {
            return Err(AdvanceError::Validation(format!(
                "Repayment period exceeds maximum of {} months",
                config.max_repayment_period
            )));
        }

        let existing = self.advances.for_employee(request.employee).await?;
        let pending_this_month = existing.iter().any(|a| {
            a.status == AdvanceStatus::Pending
                && a.requested_date.year() == as_of.year()
                && a.requested_date.month() == as_of.month()
        });
        if pending_this_month {
            return Err(AdvanceError::Validation(
                "A pending advance request already exists for this period".to_string(),
            ));
        }
        let active = existing.iter().filter(|a| a.status.is_active()).count();
        if active >= config.max_active_advances {
            return Err(AdvanceError::Validation(format!(
                "Active advance limit of {} reached",
                config.max_active_advances
            )));
        }

        let accrued = accrual::available_advance(&employee, as_of, config)?;
        let outstanding: Decimal = existing
            .iter()
            .filter(|a| a.status.is_active())
            .map(Advance::outstanding)
            .sum();
        let available = (accrued - outstanding).max(Decimal::ZERO);
        if request.amount > available {
            return Err(AdvanceError::EligibilityExceeded {
                requested: request.amount,
                available,
            });
        }

        let mut advance = Advance::new(
            request.id,
            request.employee,
            Amount::new(request.amount)?,
            config.default_interest_rate,
            request.period_months,
            as_of,
            request.payout_channel,
        )?;
        advance.comments = request.comments;

        self.advances.store(advance.clone()).await?;
        tracing::info!(
            advance = advance.id,
            employee = advance.employee,
            amount = %advance.amount,
            "advance requested"
        );
        self.notify_sms(
            &employee.phone,
            &format!(
                "Your advance request of {} over {} months has been received.",
                advance.amount, advance.period_months
            ),
        )
        .await;
        Ok(advance)
    }

    /// The sole authorized path for status changes. Stamps the acting
    /// user and timestamp on the matching lifecycle field, persists and
    /// sends a status-specific notification.
    pub async fn update_status(
        &self,
        id: AdvanceId,
        actor: &str,
        new_status: AdvanceStatus,
        comments: Option<String>,
    ) -> Result<Advance> {
        let mut advance = self
            .advances
            .get(id)
            .await?
            .ok_or_else(|| AdvanceError::NotFound(format!("Advance {id}")))?;

        advance.transition(new_status)?;
        match new_status {
            AdvanceStatus::Approved => {
                advance.approved_by = Some(actor.to_string());
                advance.approved_date = Some(Utc::now());
            }
            AdvanceStatus::Disbursed => {
                advance.disbursed_by = Some(actor.to_string());
                advance.disbursed_date = Some(Utc::now());
            }
            _ => {}
        }
        if let Some(comments) = comments {
            advance.comments = Some(comments);
        }

        self.advances.store(advance.clone()).await?;
        tracing::info!(advance = id, status = %new_status, actor, "advance status updated");

        if let Ok(Some(employee)) = self.directory.get(advance.employee).await {
            let text = match new_status {
                AdvanceStatus::Approved => Some(format!(
                    "Your advance of {} was approved. Total repayment {}, installment {}.",
                    advance.amount, advance.total_repayment, advance.installment
                )),
                AdvanceStatus::Declined => Some(format!(
                    "Your advance request of {} was declined.",
                    advance.amount
                )),
                AdvanceStatus::Disbursed => Some(format!(
                    "Your advance of {} is ready for withdrawal.",
                    advance.amount
                )),
                _ => None,
            };
            if let Some(text) = text {
                self.notify_sms(&employee.phone, &text).await;
            }
        }
        Ok(advance)
    }

    /// Amount-driven recompute after a withdrawal: a fully drawn advance
    /// starts repaying.
    pub(crate) fn recompute_after_withdrawal(&self, advance: &mut Advance) -> Result<()> {
        if advance.status == AdvanceStatus::Disbursed && advance.fully_withdrawn() {
            advance.transition(AdvanceStatus::Repaying)?;
        }
        Ok(())
    }

    /// Amount-driven recompute after a repayment credit.
    pub(crate) fn recompute_after_repayment(&self, advance: &mut Advance) -> Result<()> {
        if advance.status == AdvanceStatus::Disbursed {
            advance.transition(AdvanceStatus::Repaying)?;
        }
        if advance.status == AdvanceStatus::Repaying && advance.settled() {
            advance.transition(AdvanceStatus::Repaid)?;
        }
        Ok(())
    }

    /// Compensation for a failed outbound settlement: restores the
    /// withdrawn amount and, when the advance had flipped to repaying
    /// solely because of that withdrawal, returns it to disbursed. The
    /// one status move outside the forward table.
    pub(crate) fn compensate_failed_withdrawal(
        &self,
        advance: &mut Advance,
        amount: Decimal,
    ) -> Result<()> {
        advance.revert_withdrawal(amount)?;
        if advance.status == AdvanceStatus::Repaying
            && advance.amount_repaid == Balance::ZERO
            && !advance.fully_withdrawn()
        {
            advance.status = AdvanceStatus::Disbursed;
        }
        Ok(())
    }

    async fn notify_sms(&self, phone: &str, text: &str) {
        if let Err(err) = self.notifier.send_sms(phone, text).await {
            tracing::warn!(error = %err, "notification delivery failed");
        }
    }
}
