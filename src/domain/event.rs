use super::{AdvanceId, EmployeeId};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Request,
    Approve,
    Decline,
    Disburse,
    Withdraw,
    Repay,
}

/// One record of the batch event stream.
///
/// Fields are optional at the parsing layer; the engine validates the
/// ones each event kind requires.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Event {
    pub r#type: EventKind,
    pub employee: Option<EmployeeId>,
    pub id: Option<AdvanceId>,
    pub amount: Option<Decimal>,
    pub period: Option<u32>,
    pub actor: Option<String>,
    pub channel: Option<String>,
    pub comments: Option<String>,
}
