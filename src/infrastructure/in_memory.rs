use crate::domain::advance::Advance;
use crate::domain::employee::Employee;
use crate::domain::payment::{AnomalyRecord, Direction, PaymentStatus, PaymentTransaction};
use crate::domain::ports::{
    AdvanceStore, CorrelationIds, EmployeeDirectory, NotificationSender, PaymentNetwork,
    PaymentStore,
};
use crate::domain::{AdvanceId, EmployeeId, PaymentId};
use crate::error::{AdvanceError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for advances.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access. Used by
/// the batch CLI and throughout the tests.
#[derive(Default, Clone)]
pub struct InMemoryAdvanceStore {
    advances: Arc<RwLock<HashMap<AdvanceId, Advance>>>,
}

impl InMemoryAdvanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdvanceStore for InMemoryAdvanceStore {
    async fn store(&self, advance: Advance) -> Result<()> {
        let mut advances = self.advances.write().await;
        advances.insert(advance.id, advance);
        Ok(())
    }

    async fn get(&self, id: AdvanceId) -> Result<Option<Advance>> {
        let advances = self.advances.read().await;
        Ok(advances.get(&id).cloned())
    }

    async fn for_employee(&self, employee: EmployeeId) -> Result<Vec<Advance>> {
        let advances = self.advances.read().await;
        let mut found: Vec<Advance> = advances
            .values()
            .filter(|a| a.employee == employee)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.id);
        Ok(found)
    }

    async fn all(&self) -> Result<Vec<Advance>> {
        let advances = self.advances.read().await;
        Ok(advances.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for payment transactions.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, PaymentTransaction>>>,
    anomalies: Arc<RwLock<Vec<AnomalyRecord>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn store(&self, tx: PaymentTransaction) -> Result<()> {
        self.next_id.fetch_max(tx.id, Ordering::SeqCst);
        let mut payments = self.payments.write().await;
        payments.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn next_id(&self) -> Result<PaymentId> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn find_by_correlation(
        &self,
        merchant_ref: Option<&str>,
        network_ref: Option<&str>,
    ) -> Result<Option<PaymentTransaction>> {
        let payments = self.payments.read().await;
        let hit = payments
            .values()
            .filter(|tx| {
                let merchant_hit =
                    merchant_ref.is_some() && tx.merchant_ref.as_deref() == merchant_ref;
                let network_hit = network_ref.is_some() && tx.network_ref.as_deref() == network_ref;
                merchant_hit || network_hit
            })
            .min_by_key(|tx| tx.id)
            .cloned();
        Ok(hit)
    }

    async fn find_pending_match(
        &self,
        direction: Direction,
        phone: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>> {
        let payments = self.payments.read().await;
        // Oldest pending candidate wins, so replayed fallbacks stay
        // deterministic.
        let hit = payments
            .values()
            .filter(|tx| {
                tx.status == PaymentStatus::Pending
                    && tx.direction == direction
                    && tx.phone == phone
                    && tx.amount.value() == amount
            })
            .min_by_key(|tx| tx.id)
            .cloned();
        Ok(hit)
    }

    async fn find_by_receipt(&self, receipt: &str) -> Result<Option<PaymentTransaction>> {
        let payments = self.payments.read().await;
        let hit = payments
            .values()
            .filter(|tx| tx.receipt.as_deref() == Some(receipt))
            .min_by_key(|tx| tx.id)
            .cloned();
        Ok(hit)
    }

    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentTransaction>> {
        let payments = self.payments.read().await;
        let mut stale: Vec<PaymentTransaction> = payments
            .values()
            .filter(|tx| tx.status == PaymentStatus::Pending && tx.initiated_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.id);
        Ok(stale)
    }

    async fn all(&self) -> Result<Vec<PaymentTransaction>> {
        let payments = self.payments.read().await;
        Ok(payments.values().cloned().collect())
    }

    async fn record_anomaly(&self, anomaly: AnomalyRecord) -> Result<()> {
        self.next_id.fetch_max(anomaly.id, Ordering::SeqCst);
        let mut anomalies = self.anomalies.write().await;
        anomalies.push(anomaly);
        Ok(())
    }

    async fn anomalies(&self) -> Result<Vec<AnomalyRecord>> {
        Ok(self.anomalies.read().await.clone())
    }
}

/// Employee directory backed by a fixed roster, as loaded from the CLI's
/// employees file.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    employees: Arc<HashMap<EmployeeId, Employee>>,
}

impl InMemoryDirectory {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self {
            employees: Arc::new(employees.into_iter().map(|e| (e.id, e)).collect()),
        }
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryDirectory {
    async fn get(&self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.employees.get(&id).cloned())
    }
}

/// A notification recorded by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub channel: &'static str,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// Captures notifications instead of delivering them. The CLI uses it as
/// its best-effort sender; tests assert on what was recorded.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail, to exercise the best-effort paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send_sms(&self, phone: &str, text: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdvanceError::Network("SMS gateway unavailable".to_string()));
        }
        let mut sent = self.sent.write().await;
        sent.push(SentNotification {
            channel: "sms",
            to: phone.to_string(),
            subject: None,
            body: text.to_string(),
        });
        Ok(())
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdvanceError::Network("mail relay unavailable".to_string()));
        }
        let mut sent = self.sent.write().await;
        sent.push(SentNotification {
            channel: "email",
            to: to.to_string(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Payment network stand-in for batch runs and tests: accepts every
/// request, hands out sequential correlation ids and reports a fixed
/// account balance. Settlements still have to arrive through the
/// callback stream.
pub struct OfflineNetwork {
    counter: AtomicU64,
    balance: RwLock<Decimal>,
    unreachable: AtomicBool,
}

impl OfflineNetwork {
    pub fn new(balance: Decimal) -> Self {
        Self {
            counter: AtomicU64::new(0),
            balance: RwLock::new(balance),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn set_balance(&self, balance: Decimal) {
        *self.balance.write().await = balance;
    }

    fn issue(&self) -> CorrelationIds {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        CorrelationIds {
            merchant_ref: Some(format!("MER-{n}")),
            network_ref: Some(format!("NET-{n}")),
        }
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AdvanceError::Network(
                "payment network unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentNetwork for OfflineNetwork {
    async fn initiate_outbound(
        &self,
        _phone: &str,
        _amount: Decimal,
        _remarks: &str,
    ) -> Result<CorrelationIds> {
        self.check_reachable()?;
        Ok(self.issue())
    }

    async fn initiate_inbound(
        &self,
        _phone: &str,
        _amount: Decimal,
        _reference: &str,
    ) -> Result<CorrelationIds> {
        self.check_reachable()?;
        Ok(self.issue())
    }

    async fn account_balance(&self) -> Result<Decimal> {
        self.check_reachable()?;
        Ok(*self.balance.read().await)
    }
}
