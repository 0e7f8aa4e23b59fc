use super::money::Amount;
use super::{AdvanceId, EmployeeId, PaymentId};
use crate::error::{AdvanceError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Disbursement to an employee's payout channel.
    Outbound,
    /// Repayment or top-up from an employee.
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Who a transaction is attributed to.
///
/// Money that arrives with no identifiable owner lands in the explicit
/// `Unattributed` bucket for manual reconciliation; there is no default
/// owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Employee(EmployeeId),
    Unattributed,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Employee(id) => write!(f, "{id}"),
            Self::Unattributed => f.write_str("unattributed"),
        }
    }
}

/// One outbound or inbound payment attempt against the external network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentId,
    pub direction: Direction,
    pub owner: Owner,
    pub amount: Amount,
    /// Counter-party phone number in canonical form.
    pub phone: String,
    pub status: PaymentStatus,
    /// Merchant-side correlation id issued at initiation.
    pub merchant_ref: Option<String>,
    /// Network-side correlation id; may arrive only with the callback.
    pub network_ref: Option<String>,
    /// Unique external receipt number once settled.
    pub receipt: Option<String>,
    /// Free-form reference, e.g. the repayment tag on an inbound request.
    pub reference: Option<String>,
    /// How an outbound disbursement was split across advances at
    /// initiation. Used to compensate if the settlement fails.
    pub allocations: Vec<(AdvanceId, Decimal)>,
    pub initiated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub settlement_note: Option<String>,
    /// Post-transaction disbursement account balance, when the network
    /// reports one.
    pub account_balance: Option<Decimal>,
}

impl PaymentTransaction {
    pub fn new(
        id: PaymentId,
        direction: Direction,
        owner: Owner,
        amount: Amount,
        phone: String,
    ) -> Self {
        Self {
            id,
            direction,
            owner,
            amount,
            phone,
            status: PaymentStatus::Pending,
            merchant_ref: None,
            network_ref: None,
            receipt: None,
            reference: None,
            allocations: Vec::new(),
            initiated_at: Utc::now(),
            settled_at: None,
            settlement_note: None,
            account_balance: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != PaymentStatus::Pending
    }

    /// Moves the transaction to its one allowed terminal state.
    ///
    /// At most one terminal update is ever accepted; a second attempt is
    /// an error the gateway turns into a logged no-op.
    pub fn settle(&mut self, status: PaymentStatus, note: Option<String>) -> Result<()> {
        if self.is_terminal() {
            return Err(AdvanceError::Validation(format!(
                "Transaction {} is already {}",
                self.id, self.status
            )));
        }
        if status == PaymentStatus::Pending {
            return Err(AdvanceError::Validation(
                "Cannot settle a transaction back to pending".to_string(),
            ));
        }
        self.status = status;
        self.settled_at = Some(Utc::now());
        self.settlement_note = note;
        Ok(())
    }
}

/// Settlement callback from the payment network, parsed from one of the
/// known payload shapes into a single typed record before any business
/// logic runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementNotice {
    pub direction: Direction,
    pub merchant_ref: Option<String>,
    pub network_ref: Option<String>,
    /// 0 means success, anything else a failure.
    pub result_code: i64,
    pub result_desc: String,
    pub amount: Option<Decimal>,
    pub receipt: Option<String>,
    /// Counter-party phone as reported, not yet canonicalized.
    pub phone: Option<String>,
    /// Bill reference / account reference carried by inbound notices.
    pub reference: Option<String>,
    /// Post-transaction disbursement account balance.
    pub account_balance: Option<Decimal>,
}

impl SettlementNotice {
    pub fn succeeded(&self) -> bool {
        self.result_code == 0
    }
}

/// Durable trace of a callback that could not be applied anywhere: an
/// unparseable payload, or a notice missing the fields needed to route
/// it. Kept for manual review; never touches balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: PaymentId,
    pub description: String,
    /// Raw payload, when the caller still has it.
    pub payload: Option<String>,
    pub received_at: DateTime<Utc>,
}
