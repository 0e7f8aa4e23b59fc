use super::lifecycle::LifecycleManager;
use super::locks::KeyedLocks;
use super::repayment::RepaymentAllocator;
use crate::domain::config::AdvanceConfig;
use crate::domain::money::Amount;
use crate::domain::payment::{
    AnomalyRecord, Direction, Owner, PaymentStatus, PaymentTransaction, SettlementNotice,
};
use crate::domain::phone::canonical_phone;
use crate::domain::ports::{
    AdvanceStoreRef, EmployeeDirectoryRef, NotificationSenderRef, PaymentStoreRef,
};
use crate::domain::{EmployeeId, PaymentId};
use crate::error::{AdvanceError, Result};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// What a settlement callback amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// Applied to a known pending transaction.
    Applied(PaymentId),
    /// Replay of an already-terminal transaction; nothing changed.
    Duplicate(PaymentId),
    /// No match; a new auditable record was created instead.
    Unattributed(PaymentId),
}

/// Consumes asynchronous settlement confirmations from the payment
/// network and idempotently applies them to exactly one internal
/// transaction, and transitively to the advance records.
///
/// Callbacks arrive duplicated, delayed and out of order; every one of
/// them must end in either a state update or a new auditable record.
pub struct ReconciliationGateway {
    payments: PaymentStoreRef,
    advances: AdvanceStoreRef,
    directory: EmployeeDirectoryRef,
    lifecycle: Arc<LifecycleManager>,
    allocator: Arc<RepaymentAllocator>,
    notifier: NotificationSenderRef,
    employee_locks: Arc<KeyedLocks<EmployeeId>>,
    tx_locks: Arc<KeyedLocks<PaymentId>>,
}

impl ReconciliationGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payments: PaymentStoreRef,
        advances: AdvanceStoreRef,
        directory: EmployeeDirectoryRef,
        lifecycle: Arc<LifecycleManager>,
        allocator: Arc<RepaymentAllocator>,
        notifier: NotificationSenderRef,
        employee_locks: Arc<KeyedLocks<EmployeeId>>,
        tx_locks: Arc<KeyedLocks<PaymentId>>,
    ) -> Self {
        Self {
            payments,
            advances,
            directory,
            lifecycle,
            allocator,
            notifier,
            employee_locks,
            tx_locks,
        }
    }

    pub async fn process_settlement(
        &self,
        notice: SettlementNotice,
        config: &AdvanceConfig,
    ) -> Result<ReconciliationOutcome> {
        let phone = notice
            .phone
            .as_deref()
            .map(|p| canonical_phone(p, &config.country_prefix));

        let matched = self.match_notice(&notice, phone.as_deref()).await?;
        let outcome = match matched {
            Some(candidate) => {
                // Serialize per transaction, then per employee. Lock order
                // matters: engine-side operations only ever take the
                // employee lock.
                let _tx_guard = self.tx_locks.acquire(candidate.id).await;
                let mut tx = self
                    .payments
                    .get(candidate.id)
                    .await?
                    .ok_or_else(|| AdvanceError::NotFound(format!("Payment {}", candidate.id)))?;
                if tx.is_terminal() {
                    tracing::warn!(
                        payment = tx.id,
                        status = %tx.status,
                        "duplicate settlement callback ignored"
                    );
                    return Ok(ReconciliationOutcome::Duplicate(tx.id));
                }
                let _emp_guard = match tx.owner {
                    Owner::Employee(id) => Some(self.employee_locks.acquire(id).await),
                    Owner::Unattributed => None,
                };

                self.absorb_notice_metadata(&mut tx, &notice);
                self.apply_terminal(&mut tx, notice.succeeded(), notice.amount, notice.result_desc.clone())
                    .await?;
                self.payments.store(tx.clone()).await?;
                tracing::info!(payment = tx.id, status = %tx.status, "settlement applied");
                ReconciliationOutcome::Applied(tx.id)
            }
            None => self.record_unmatched(&notice, phone.as_deref()).await?,
        };

        self.check_balance_threshold(&notice, config).await;
        Ok(outcome)
    }

    /// Pending transactions older than `age`, awaiting a callback that
    /// may never come.
    pub async fn stale_pending(&self, age: Duration) -> Result<Vec<PaymentTransaction>> {
        self.payments.find_stale_pending(Utc::now() - age).await
    }

    /// Manually settles a transaction whose callback never arrived.
    pub async fn force_resolve(
        &self,
        id: PaymentId,
        success: bool,
        note: &str,
    ) -> Result<PaymentTransaction> {
        let _tx_guard = self.tx_locks.acquire(id).await;
        let mut tx = self
            .payments
            .get(id)
            .await?
            .ok_or_else(|| AdvanceError::NotFound(format!("Payment {id}")))?;
        if tx.is_terminal() {
            return Err(AdvanceError::Validation(format!(
                "Payment {} is already {}",
                tx.id, tx.status
            )));
        }
        let _emp_guard = match tx.owner {
            Owner::Employee(emp) => Some(self.employee_locks.acquire(emp).await),
            Owner::Unattributed => None,
        };
        self.apply_terminal(&mut tx, success, None, format!("manually resolved: {note}"))
            .await?;
        self.payments.store(tx.clone()).await?;
        tracing::info!(payment = id, status = %tx.status, "transaction manually resolved");
        Ok(tx)
    }

    /// Matching priority: exact correlation ids first, then the
    /// direction/phone/amount fallback for callbacks that raced ahead of
    /// the persisted correlation ids.
    async fn match_notice(
        &self,
        notice: &SettlementNotice,
        phone: Option<&str>,
    ) -> Result<Option<PaymentTransaction>> {
        if notice.merchant_ref.is_some() || notice.network_ref.is_some() {
            let hit = self
                .payments
                .find_by_correlation(notice.merchant_ref.as_deref(), notice.network_ref.as_deref())
                .await?;
            if hit.is_some() {
                return Ok(hit);
            }
        }
        if let (Some(phone), Some(amount)) = (phone, notice.amount) {
            return self
                .payments
                .find_pending_match(notice.direction, phone, amount)
                .await;
        }
        Ok(None)
    }

    /// Direction-specific terminal effects, shared by callback processing
    /// and manual resolution. Caller persists the transaction afterwards.
    async fn apply_terminal(
        &self,
        tx: &mut PaymentTransaction,
        success: bool,
        settled_amount: Option<Decimal>,
        note: String,
    ) -> Result<()> {
        match (tx.direction, success) {
            (Direction::Outbound, true) => {
                // Balances were moved at initiation; the receipt metadata
                // is all that is left to record.
                tx.settle(PaymentStatus::Completed, Some(note))?;
            }
            (Direction::Outbound, false) => {
                self.compensate_outbound_failure(tx).await?;
                tx.settle(PaymentStatus::Failed, Some(note))?;
                self.notify_owner_of_failure(tx).await;
            }
            (Direction::Inbound, true) => {
                if let Owner::Employee(employee) = tx.owner {
                    let amount = settled_amount.unwrap_or_else(|| tx.amount.value());
                    self.allocator.apply_repayment(employee, amount).await?;
                }
                tx.settle(PaymentStatus::Completed, Some(note))?;
            }
            (Direction::Inbound, false) => {
                tx.settle(PaymentStatus::Failed, Some(note))?;
            }
        }
        Ok(())
    }

    /// Restores the advance amounts optimistically moved at withdrawal
    /// initiation.
    async fn compensate_outbound_failure(&self, tx: &PaymentTransaction) -> Result<()> {
        for (advance_id, amount) in &tx.allocations {
            let mut advance = self
                .advances
                .get(*advance_id)
                .await?
                .ok_or_else(|| AdvanceError::NotFound(format!("Advance {advance_id}")))?;
            self.lifecycle
                .compensate_failed_withdrawal(&mut advance, *amount)?;
            self.advances.store(advance).await?;
        }
        if !tx.allocations.is_empty() {
            tracing::warn!(
                payment = tx.id,
                "outbound settlement failed; withdrawal allocations reverted"
            );
        }
        Ok(())
    }

    /// No silent drops: an unmatched callback becomes a new terminal
    /// record, attributed by repayment reference when possible and to the
    /// unattributed bucket otherwise.
    async fn record_unmatched(
        &self,
        notice: &SettlementNotice,
        phone: Option<&str>,
    ) -> Result<ReconciliationOutcome> {
        // A replayed notice with no correlation ids (the pay-bill shape)
        // cannot find its own prior record through the pending match; the
        // external receipt number is the stable handle for deduplication.
        if let Some(receipt) = notice.receipt.as_deref() {
            if let Some(existing) = self.payments.find_by_receipt(receipt).await? {
                tracing::warn!(
                    payment = existing.id,
                    receipt,
                    "settlement receipt already recorded; replay ignored"
                );
                return Ok(ReconciliationOutcome::Duplicate(existing.id));
            }
        }
        let Some(amount) = notice.amount else {
            self.record_anomaly(
                &format!(
                    "Settlement notice without an amount: {} (receipt {:?}, reference {:?})",
                    notice.result_desc, notice.receipt, notice.reference
                ),
                None,
            )
            .await?;
            return Err(AdvanceError::Validation(
                "Unmatched settlement notice carries no amount".to_string(),
            ));
        };
        let owner = match self.attribute_by_reference(notice).await? {
            Some(employee) => Owner::Employee(employee),
            None => Owner::Unattributed,
        };

        let mut tx = PaymentTransaction::new(
            self.payments.next_id().await?,
            notice.direction,
            owner,
            Amount::new(amount)?,
            phone.unwrap_or_default().to_string(),
        );
        self.absorb_notice_metadata(&mut tx, notice);

        if let Owner::Employee(employee) = owner {
            let _emp_guard = self.employee_locks.acquire(employee).await;
            if notice.succeeded() && notice.direction == Direction::Inbound {
                self.allocator.apply_repayment(employee, amount).await?;
            }
            tx.settle(
                if notice.succeeded() {
                    PaymentStatus::Completed
                } else {
                    PaymentStatus::Failed
                },
                Some(notice.result_desc.clone()),
            )?;
            self.payments.store(tx.clone()).await?;
            tracing::warn!(
                payment = tx.id,
                employee,
                "settlement had no pending transaction; recorded by repayment reference"
            );
            return Ok(ReconciliationOutcome::Applied(tx.id));
        }

        tx.settle(
            if notice.succeeded() {
                PaymentStatus::Completed
            } else {
                PaymentStatus::Failed
            },
            Some(notice.result_desc.clone()),
        )?;
        self.payments.store(tx.clone()).await?;
        tracing::warn!(
            payment = tx.id,
            direction = %notice.direction,
            amount = %amount,
            "unmatched settlement recorded in the unattributed bucket"
        );
        Ok(ReconciliationOutcome::Unattributed(tx.id))
    }

    /// Durable trace for a callback that could not be applied anywhere,
    /// so a rejected notice never vanishes with its error.
    pub async fn record_anomaly(
        &self,
        description: &str,
        payload: Option<String>,
    ) -> Result<AnomalyRecord> {
        let anomaly = AnomalyRecord {
            id: self.payments.next_id().await?,
            description: description.to_string(),
            payload,
            received_at: Utc::now(),
        };
        self.payments.record_anomaly(anomaly.clone()).await?;
        tracing::warn!(anomaly = anomaly.id, description, "callback recorded as anomaly");
        Ok(anomaly)
    }

    /// Inbound notices may carry a repayment reference naming the
    /// employee (e.g. a pay-bill account number like `ADV-7`).
    async fn attribute_by_reference(
        &self,
        notice: &SettlementNotice,
    ) -> Result<Option<EmployeeId>> {
        if notice.direction != Direction::Inbound {
            return Ok(None);
        }
        let Some(reference) = notice.reference.as_deref() else {
            return Ok(None);
        };
        let digits = reference.rsplit('-').next().unwrap_or(reference);
        let Ok(id) = digits.trim().parse::<EmployeeId>() else {
            return Ok(None);
        };
        Ok(self.directory.get(id).await?.map(|e| e.id))
    }

    fn absorb_notice_metadata(&self, tx: &mut PaymentTransaction, notice: &SettlementNotice) {
        if tx.merchant_ref.is_none() {
            tx.merchant_ref = notice.merchant_ref.clone();
        }
        if tx.network_ref.is_none() {
            tx.network_ref = notice.network_ref.clone();
        }
        if notice.receipt.is_some() {
            tx.receipt = notice.receipt.clone();
        }
        if notice.account_balance.is_some() {
            tx.account_balance = notice.account_balance;
        }
        if tx.reference.is_none() {
            tx.reference = notice.reference.clone();
        }
    }

    async fn notify_owner_of_failure(&self, tx: &PaymentTransaction) {
        let Owner::Employee(employee) = tx.owner else {
            return;
        };
        let Ok(Some(employee)) = self.directory.get(employee).await else {
            return;
        };
        let text = format!(
            "Your withdrawal of {} could not be completed. The amount has been returned to your advance balance.",
            tx.amount
        );
        if let Err(err) = self.notifier.send_sms(&employee.phone, &text).await {
            tracing::warn!(error = %err, "notification delivery failed");
        }
    }

    /// Fire-and-forget balance threshold monitoring; never blocks the
    /// reconciliation path.
    async fn check_balance_threshold(&self, notice: &SettlementNotice, config: &AdvanceConfig) {
        let (Some(balance), Some(threshold)) =
            (notice.account_balance, config.balance_alert_threshold)
        else {
            return;
        };
        if balance >= threshold {
            return;
        }
        tracing::warn!(%balance, %threshold, "disbursement account balance below threshold");
        if let Err(err) = self
            .notifier
            .send_email(
                &config.ops_email,
                "Disbursement account balance low",
                &format!(
                    "The payment network reports an account balance of {balance}, \
                     below the configured threshold of {threshold}."
                ),
            )
            .await
        {
            tracing::warn!(error = %err, "alert delivery failed");
        }
    }
}
