use super::lifecycle::LifecycleManager;
use crate::domain::advance::{Advance, AdvanceStatus};
use crate::domain::config::AdvanceConfig;
use crate::domain::money::Amount;
use crate::domain::payment::{Direction, Owner, PaymentTransaction};
use crate::domain::phone::canonical_phone;
use crate::domain::ports::{
    AdvanceStoreRef, NotificationSenderRef, PaymentNetworkRef, PaymentStoreRef,
};
use crate::domain::EmployeeId;
use crate::error::{AdvanceError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Converts approved advance balances into an outbound payment.
///
/// The requested amount is split across the employee's disbursed and
/// repaying advances oldest-approval-first, but only one payment request
/// goes to the network. Settlement arrives later through the
/// reconciliation gateway; the allocation split is recorded on the
/// transaction so a failed settlement can be compensated.
pub struct DisbursementCoordinator {
    advances: AdvanceStoreRef,
    payments: PaymentStoreRef,
    lifecycle: Arc<LifecycleManager>,
    notifier: NotificationSenderRef,
    network: PaymentNetworkRef,
}

impl DisbursementCoordinator {
    pub fn new(
        advances: AdvanceStoreRef,
        payments: PaymentStoreRef,
        lifecycle: Arc<LifecycleManager>,
        notifier: NotificationSenderRef,
        network: PaymentNetworkRef,
    ) -> Self {
        Self {
            advances,
            payments,
            lifecycle,
            notifier,
            network,
        }
    }

    pub async fn withdraw(
        &self,
        employee_id: EmployeeId,
        amount: Decimal,
        config: &AdvanceConfig,
    ) -> Result<PaymentTransaction> {
        let amount = Amount::new(amount)?;
        let employee = self.lifecycle.employee(employee_id).await?;

        let mut open: Vec<Advance> = self
            .advances
            .for_employee(employee_id)
            .await?
            .into_iter()
            .filter(|a| {
                matches!(a.status, AdvanceStatus::Disbursed | AdvanceStatus::Repaying)
                    && a.withdrawable() > Decimal::ZERO
            })
            .collect();
        open.sort_by_key(|a| (a.approved_date, a.id));

        let capacity: Decimal = open.iter().map(Advance::withdrawable).sum();
        if amount.value() > capacity {
            return Err(AdvanceError::InsufficientApprovedBalance {
                requested: amount.value(),
                available: capacity,
            });
        }

        // Single external call for the full amount. Nothing local is
        // mutated until the network has accepted the request.
        let phone = canonical_phone(&employee.phone, &config.country_prefix);
        let correlation = self
            .network
            .initiate_outbound(
                &phone,
                amount.value(),
                &format!("Salary advance withdrawal for employee {employee_id}"),
            )
            .await?;

        let mut remaining = amount.value();
        let mut allocations = Vec::new();
        for advance in open.iter_mut() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let portion = remaining.min(advance.withdrawable());
            advance.record_withdrawal(portion)?;
            self.lifecycle.recompute_after_withdrawal(advance)?;
            allocations.push((advance.id, portion));
            remaining -= portion;
        }
        for advance in &open {
            self.advances.store(advance.clone()).await?;
        }

        let mut tx = PaymentTransaction::new(
            self.payments.next_id().await?,
            Direction::Outbound,
            Owner::Employee(employee_id),
            amount,
            phone.clone(),
        );
        tx.merchant_ref = correlation.merchant_ref;
        tx.network_ref = correlation.network_ref;
        tx.allocations = allocations;
        self.payments.store(tx.clone()).await?;

        tracing::info!(
            employee = employee_id,
            payment = tx.id,
            amount = %amount,
            "disbursement initiated"
        );
        let balance_left = capacity - amount.value();
        if let Err(err) = self
            .notifier
            .send_sms(
                &employee.phone,
                &format!(
                    "Your withdrawal of {amount} is being processed. \
                     Remaining advance balance: {balance_left}."
                ),
            )
            .await
        {
            tracing::warn!(error = %err, "notification delivery failed");
        }
        Ok(tx)
    }
}
