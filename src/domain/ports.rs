use super::advance::Advance;
use super::employee::Employee;
use super::payment::{AnomalyRecord, Direction, PaymentTransaction};
use super::{AdvanceId, EmployeeId, PaymentId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

pub type AdvanceStoreRef = Arc<dyn AdvanceStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type EmployeeDirectoryRef = Arc<dyn EmployeeDirectory>;
pub type NotificationSenderRef = Arc<dyn NotificationSender>;
pub type PaymentNetworkRef = Arc<dyn PaymentNetwork>;

#[async_trait]
pub trait AdvanceStore: Send + Sync {
    async fn store(&self, advance: Advance) -> Result<()>;
    async fn get(&self, id: AdvanceId) -> Result<Option<Advance>>;
    async fn for_employee(&self, employee: EmployeeId) -> Result<Vec<Advance>>;
    async fn all(&self) -> Result<Vec<Advance>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store(&self, tx: PaymentTransaction) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>>;
    /// Allocates the next internal transaction id.
    async fn next_id(&self) -> Result<PaymentId>;
    /// Exact match on either correlation identifier.
    async fn find_by_correlation(
        &self,
        merchant_ref: Option<&str>,
        network_ref: Option<&str>,
    ) -> Result<Option<PaymentTransaction>>;
    /// Fallback match for callbacks that raced ahead of the correlation
    /// ids: direction, canonical phone and amount, pending only.
    async fn find_pending_match(
        &self,
        direction: Direction,
        phone: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>>;
    /// Transaction already carrying this external receipt number. The
    /// receipt is the only stable handle for deduplicating callbacks
    /// that arrive without correlation ids.
    async fn find_by_receipt(&self, receipt: &str) -> Result<Option<PaymentTransaction>>;
    /// Pending transactions initiated before `cutoff`, for manual review.
    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentTransaction>>;
    async fn all(&self) -> Result<Vec<PaymentTransaction>>;
    /// Durably records a callback that could not be applied anywhere.
    async fn record_anomaly(&self, anomaly: AnomalyRecord) -> Result<()>;
    /// All recorded anomalies, for manual review.
    async fn anomalies(&self) -> Result<Vec<AnomalyRecord>>;
}

/// External employee directory. Read-only collaborator.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn get(&self, id: EmployeeId) -> Result<Option<Employee>>;
}

/// Best-effort notification delivery. Failures are logged by callers and
/// never block core operations.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_sms(&self, phone: &str, text: &str) -> Result<()>;
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Correlation identifiers returned when the network accepts a payment
/// request. Either side may be absent until the settlement callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationIds {
    pub merchant_ref: Option<String>,
    pub network_ref: Option<String>,
}

/// Opaque boundary to the external payment network. Settlements arrive
/// later through asynchronous callbacks.
#[async_trait]
pub trait PaymentNetwork: Send + Sync {
    async fn initiate_outbound(
        &self,
        phone: &str,
        amount: Decimal,
        remarks: &str,
    ) -> Result<CorrelationIds>;
    async fn initiate_inbound(
        &self,
        phone: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<CorrelationIds>;
    /// Current disbursement account balance.
    async fn account_balance(&self) -> Result<Decimal>;
}
