use super::disbursement::DisbursementCoordinator;
use super::lifecycle::{AdvanceRequest, LifecycleManager};
use super::locks::KeyedLocks;
use super::reconciliation::{ReconciliationGateway, ReconciliationOutcome};
use super::repayment::{AllocationResult, RepaymentAllocator};
use crate::domain::advance::{Advance, AdvanceStatus};
use crate::domain::config::AdvanceConfig;
use crate::domain::event::{Event, EventKind};
use crate::domain::money::Amount;
use crate::domain::payment::{
    AnomalyRecord, Direction, Owner, PaymentTransaction, SettlementNotice,
};
use crate::domain::phone::canonical_phone;
use crate::domain::ports::{
    AdvanceStoreRef, EmployeeDirectoryRef, NotificationSenderRef, PaymentNetworkRef,
    PaymentStoreRef,
};
use crate::domain::{AdvanceId, EmployeeId, PaymentId};
use crate::error::{AdvanceError, Result};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The main entry point for advance processing.
///
/// Owns the storage backends and the per-employee / per-transaction lock
/// registries, and routes each operation through the matching component.
/// Every read-modify-write for one employee runs under that employee's
/// lock, so a withdrawal racing a repayment callback can never interleave.
pub struct AdvanceEngine {
    advances: AdvanceStoreRef,
    payments: PaymentStoreRef,
    network: PaymentNetworkRef,
    lifecycle: Arc<LifecycleManager>,
    disbursement: DisbursementCoordinator,
    allocator: Arc<RepaymentAllocator>,
    gateway: ReconciliationGateway,
    employee_locks: Arc<KeyedLocks<EmployeeId>>,
}

impl AdvanceEngine {
    pub fn new(
        advances: AdvanceStoreRef,
        payments: PaymentStoreRef,
        directory: EmployeeDirectoryRef,
        notifier: NotificationSenderRef,
        network: PaymentNetworkRef,
    ) -> Self {
        let employee_locks = Arc::new(KeyedLocks::new());
        let tx_locks = Arc::new(KeyedLocks::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&advances),
            Arc::clone(&directory),
            Arc::clone(&notifier),
        ));
        let allocator = Arc::new(RepaymentAllocator::new(
            Arc::clone(&advances),
            Arc::clone(&lifecycle),
        ));
        let disbursement = DisbursementCoordinator::new(
            Arc::clone(&advances),
            Arc::clone(&payments),
            Arc::clone(&lifecycle),
            Arc::clone(&notifier),
            Arc::clone(&network),
        );
        let gateway = ReconciliationGateway::new(
            Arc::clone(&payments),
            Arc::clone(&advances),
            Arc::clone(&directory),
            Arc::clone(&lifecycle),
            Arc::clone(&allocator),
            Arc::clone(&notifier),
            Arc::clone(&employee_locks),
            tx_locks,
        );
        Self {
            advances,
            payments,
            network,
            lifecycle,
            disbursement,
            allocator,
            gateway,
            employee_locks,
        }
    }

    pub async fn request_advance(
        &self,
        request: AdvanceRequest,
        config: &AdvanceConfig,
        as_of: NaiveDate,
    ) -> Result<Advance> {
        let _guard = self.employee_locks.acquire(request.employee).await;
        self.lifecycle.create(request, config, as_of).await
    }

    pub async fn update_status(
        &self,
        id: AdvanceId,
        actor: &str,
        new_status: AdvanceStatus,
        comments: Option<String>,
    ) -> Result<Advance> {
        let advance = self
            .advances
            .get(id)
            .await?
            .ok_or_else(|| AdvanceError::NotFound(format!("Advance {id}")))?;
        let _guard = self.employee_locks.acquire(advance.employee).await;
        self.lifecycle
            .update_status(id, actor, new_status, comments)
            .await
    }

    pub async fn withdraw(
        &self,
        employee: EmployeeId,
        amount: Decimal,
        config: &AdvanceConfig,
    ) -> Result<PaymentTransaction> {
        let _guard = self.employee_locks.acquire(employee).await;
        self.disbursement.withdraw(employee, amount, config).await
    }

    /// Initiates an inbound payment request (e.g. a push prompt on the
    /// employee's phone) to repay outstanding advances. The actual credit
    /// happens when the settlement callback arrives.
    pub async fn request_repayment(
        &self,
        employee: EmployeeId,
        amount: Decimal,
        config: &AdvanceConfig,
    ) -> Result<PaymentTransaction> {
        let _guard = self.employee_locks.acquire(employee).await;
        let amount = Amount::new(amount)?;
        let record = self.lifecycle.employee(employee).await?;
        let phone = canonical_phone(&record.phone, &config.country_prefix);
        let reference = format!("ADV-{employee}");
        let correlation = self
            .network
            .initiate_inbound(&phone, amount.value(), &reference)
            .await?;

        let mut tx = PaymentTransaction::new(
            self.payments.next_id().await?,
            Direction::Inbound,
            Owner::Employee(employee),
            amount,
            phone,
        );
        tx.merchant_ref = correlation.merchant_ref;
        tx.network_ref = correlation.network_ref;
        tx.reference = Some(reference);
        self.payments.store(tx.clone()).await?;
        tracing::info!(employee, payment = tx.id, amount = %amount, "repayment requested");
        Ok(tx)
    }

    /// Applies a confirmed repayment directly, e.g. a payroll deduction.
    pub async fn apply_repayment(
        &self,
        employee: EmployeeId,
        amount: Decimal,
    ) -> Result<AllocationResult> {
        let _guard = self.employee_locks.acquire(employee).await;
        self.allocator.apply_repayment(employee, amount).await
    }

    /// Feeds one settlement callback through the reconciliation gateway.
    /// The gateway takes its own transaction and employee locks.
    pub async fn handle_callback(
        &self,
        notice: SettlementNotice,
        config: &AdvanceConfig,
    ) -> Result<ReconciliationOutcome> {
        self.gateway.process_settlement(notice, config).await
    }

    pub async fn stale_pending(&self, age: Duration) -> Result<Vec<PaymentTransaction>> {
        self.gateway.stale_pending(age).await
    }

    /// Durably records a callback that could not even be parsed, so the
    /// stream leaves a trace for manual review.
    pub async fn record_callback_anomaly(
        &self,
        description: &str,
        payload: Option<String>,
    ) -> Result<AnomalyRecord> {
        self.gateway.record_anomaly(description, payload).await
    }

    pub async fn force_resolve(
        &self,
        id: PaymentId,
        success: bool,
        note: &str,
    ) -> Result<PaymentTransaction> {
        self.gateway.force_resolve(id, success, note).await
    }

    /// Dispatches one batch event.
    pub async fn process_event(
        &self,
        event: Event,
        config: &AdvanceConfig,
        as_of: NaiveDate,
    ) -> Result<()> {
        match event.r#type {
            EventKind::Request => {
                let request = AdvanceRequest {
                    id: require(event.id, "id")?,
                    employee: require(event.employee, "employee")?,
                    amount: require(event.amount, "amount")?,
                    period_months: require(event.period, "period")?,
                    payout_channel: event.channel.unwrap_or_else(|| "mobile".to_string()),
                    comments: event.comments,
                };
                self.request_advance(request, config, as_of).await?;
            }
            EventKind::Approve => {
                self.update_status(
                    require(event.id, "id")?,
                    &require(event.actor, "actor")?,
                    AdvanceStatus::Approved,
                    event.comments,
                )
                .await?;
            }
            EventKind::Decline => {
                self.update_status(
                    require(event.id, "id")?,
                    &require(event.actor, "actor")?,
                    AdvanceStatus::Declined,
                    event.comments,
                )
                .await?;
            }
            EventKind::Disburse => {
                self.update_status(
                    require(event.id, "id")?,
                    &require(event.actor, "actor")?,
                    AdvanceStatus::Disbursed,
                    event.comments,
                )
                .await?;
            }
            EventKind::Withdraw => {
                self.withdraw(
                    require(event.employee, "employee")?,
                    require(event.amount, "amount")?,
                    config,
                )
                .await?;
            }
            EventKind::Repay => {
                self.request_repayment(
                    require(event.employee, "employee")?,
                    require(event.amount, "amount")?,
                    config,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Final state of all advances, for reporting.
    pub async fn advances_report(&self) -> Result<Vec<Advance>> {
        let mut advances = self.advances.all().await?;
        advances.sort_by_key(|a| a.id);
        Ok(advances)
    }

    /// Final state of all payment transactions, including the
    /// unattributed bucket.
    pub async fn payments_report(&self) -> Result<Vec<PaymentTransaction>> {
        let mut payments = self.payments.all().await?;
        payments.sort_by_key(|t| t.id);
        Ok(payments)
    }

    /// Callbacks that could not be applied anywhere, for manual review.
    pub async fn anomalies_report(&self) -> Result<Vec<AnomalyRecord>> {
        let mut anomalies = self.payments.anomalies().await?;
        anomalies.sort_by_key(|a| a.id);
        Ok(anomalies)
    }
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AdvanceError::Validation(format!("Event is missing the {field} field")))
}
