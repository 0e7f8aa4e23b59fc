//! Settlement callback parsing.
//!
//! The payment network posts three different JSON shapes depending on how
//! the money moved: an STK push result for customer-initiated inbound
//! payments, a B2C result for outbound disbursements, and a PayBill
//! confirmation for direct till payments. All three are normalized into a
//! [`SettlementNotice`] here so the reconciliation gateway only ever sees
//! one shape.

use crate::domain::payment::{Direction, SettlementNotice};
use crate::error::{AdvanceError, Result};
use rust_decimal::Decimal;
use serde_json::Value;

/// Parses a raw callback payload into a [`SettlementNotice`].
///
/// Returns a validation error when the payload matches none of the known
/// shapes; the caller decides whether that is fatal.
pub fn parse_callback(payload: &Value) -> Result<SettlementNotice> {
    if let Some(stk) = payload.pointer("/Body/stkCallback") {
        return parse_stk(stk);
    }
    if let Some(result) = payload.get("Result") {
        return parse_b2c(result);
    }
    if payload.get("TransID").is_some() {
        return parse_paybill(payload);
    }
    Err(AdvanceError::Validation(
        "Unrecognized callback payload shape".to_string(),
    ))
}

fn parse_stk(stk: &Value) -> Result<SettlementNotice> {
    let result_code = require_i64(stk, "ResultCode")?;
    let mut notice = SettlementNotice {
        direction: Direction::Inbound,
        merchant_ref: string_field(stk, "MerchantRequestID"),
        network_ref: string_field(stk, "CheckoutRequestID"),
        result_code,
        result_desc: string_field(stk, "ResultDesc").unwrap_or_default(),
        amount: None,
        receipt: None,
        phone: None,
        reference: None,
        account_balance: None,
    };

    if let Some(Value::Array(items)) = stk.pointer("/CallbackMetadata/Item") {
        for item in items {
            let value = item.get("Value");
            match item.get("Name").and_then(Value::as_str) {
                Some("Amount") => notice.amount = value.and_then(decimal_value),
                Some("MpesaReceiptNumber") => notice.receipt = value.and_then(scalar_string),
                Some("PhoneNumber") => notice.phone = value.and_then(scalar_string),
                _ => {}
            }
        }
    }
    Ok(notice)
}

fn parse_b2c(result: &Value) -> Result<SettlementNotice> {
    let result_code = require_i64(result, "ResultCode")?;
    let mut notice = SettlementNotice {
        direction: Direction::Outbound,
        merchant_ref: string_field(result, "OriginatorConversationID"),
        network_ref: string_field(result, "ConversationID"),
        result_code,
        result_desc: string_field(result, "ResultDesc").unwrap_or_default(),
        amount: None,
        receipt: string_field(result, "TransactionID"),
        phone: None,
        reference: None,
        account_balance: None,
    };

    if let Some(Value::Array(params)) = result.pointer("/ResultParameters/ResultParameter") {
        for param in params {
            let value = param.get("Value");
            match param.get("Key").and_then(Value::as_str) {
                Some("TransactionAmount") => notice.amount = value.and_then(decimal_value),
                Some("TransactionReceipt") => notice.receipt = value.and_then(scalar_string),
                // Reported as "{phone} - {NAME}".
                Some("ReceiverPartyPublicName") => {
                    notice.phone = value
                        .and_then(Value::as_str)
                        .and_then(|s| s.split_whitespace().next())
                        .map(str::to_string);
                }
                Some("B2CUtilityAccountAvailableFunds") => {
                    notice.account_balance = value.and_then(decimal_value);
                }
                _ => {}
            }
        }
    }
    Ok(notice)
}

/// PayBill confirmations carry no result code; their arrival is the
/// success signal.
fn parse_paybill(payload: &Value) -> Result<SettlementNotice> {
    Ok(SettlementNotice {
        direction: Direction::Inbound,
        merchant_ref: None,
        network_ref: None,
        result_code: 0,
        result_desc: "Confirmed".to_string(),
        amount: payload.get("TransAmount").and_then(decimal_value),
        receipt: string_field(payload, "TransID"),
        phone: string_field(payload, "MSISDN"),
        reference: string_field(payload, "BillRefNumber").filter(|r| !r.is_empty()),
        account_balance: None,
    })
}

fn require_i64(value: &Value, field: &str) -> Result<i64> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| AdvanceError::Validation(format!("Callback is missing {field}")))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(scalar_string)
}

/// Accepts both string and numeric JSON values, since the network is not
/// consistent about which it sends for ids and phone numbers.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses amounts through their decimal string form so float payloads do
/// not pick up binary rounding noise.
fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
