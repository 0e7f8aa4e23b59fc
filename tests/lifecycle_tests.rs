mod common;

use chrono::NaiveDate;
use common::{as_of, harness, harness_with, interest_free_config, roster};
use okoa::application::lifecycle::AdvanceRequest;
use okoa::domain::advance::AdvanceStatus;
use okoa::domain::config::{AdvanceConfig, SuspensionPeriod};
use okoa::error::AdvanceError;
use rust_decimal_macros::dec;

fn request(id: u32, employee: u32, amount: rust_decimal::Decimal) -> AdvanceRequest {
    AdvanceRequest {
        id,
        employee,
        amount,
        period_months: 3,
        payout_channel: "mobile".to_string(),
        comments: None,
    }
}

#[tokio::test]
async fn test_request_creates_pending_advance() {
    let h = harness_with(roster(), AdvanceConfig::default());
    let advance = h
        .engine
        .request_advance(request(1, 1, dec!(20000)), &h.config, as_of())
        .await
        .unwrap();

    assert_eq!(advance.status, AdvanceStatus::Pending);
    // 20000 * 5% * 3 / 12 = 750 interest
    assert_eq!(advance.total_repayment, dec!(20750));
    assert_eq!(advance.installment, dec!(6916.67));

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, "sms");
    assert_eq!(sent[0].to, "0712345678");
}

#[tokio::test]
async fn test_duplicate_advance_id_rejected() {
    let h = harness();
    h.engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    let err = h
        .engine
        .request_advance(request(1, 2, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_employee_rejected() {
    let h = harness();
    let err = h
        .engine
        .request_advance(request(1, 99, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::NotFound(_)));
}

#[tokio::test]
async fn test_amount_and_period_bounds() {
    let h = harness();
    let err = h
        .engine
        .request_advance(request(1, 1, dec!(400)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));

    let mut too_long = request(1, 1, dec!(1000));
    too_long.period_months = 7;
    let err = h
        .engine
        .request_advance(too_long, &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_accrued_eligibility_enforced() {
    let h = harness();
    // Salary 50000 at 50%: 20 of 22 working days elapsed on Aug 28,
    // 25000 * 20/22 = 22727.27 floored to 22700.
    let err = h
        .engine
        .request_advance(request(1, 1, dec!(22800)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdvanceError::EligibilityExceeded { available, .. } if available == dec!(22700)
    ));

    h.engine
        .request_advance(request(1, 1, dec!(22700)), &h.config, as_of())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_outstanding_debt_reduces_eligibility() {
    let h = harness();
    h.disbursed_advance(1, 1, dec!(10000)).await;

    let err = h
        .engine
        .request_advance(request(2, 1, dec!(13000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdvanceError::EligibilityExceeded { available, .. } if available == dec!(12700)
    ));
}

#[tokio::test]
async fn test_one_pending_request_per_month() {
    let h = harness();
    h.engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    let err = h
        .engine
        .request_advance(request(2, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_active_advance_limit() {
    let config = AdvanceConfig {
        max_active_advances: 1,
        ..interest_free_config()
    };
    let h = harness_with(roster(), config);
    h.disbursed_advance(1, 1, dec!(1000)).await;

    let err = h
        .engine
        .request_advance(request(2, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_suspension_period_blocks_requests() {
    let config = AdvanceConfig {
        suspension_periods: vec![SuspensionPeriod {
            from: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        }],
        ..interest_free_config()
    };
    let h = harness_with(roster(), config);
    let err = h
        .engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::SuspensionActive));
}

#[tokio::test]
async fn test_final_month_of_employment_blocks_requests() {
    let mut employees = roster();
    employees[0].employment_end_date = NaiveDate::from_ymd_opt(2026, 8, 31);
    let h = harness_with(employees, interest_free_config());
    let err = h
        .engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_approval_stamps_actor_and_notifies() {
    let h = harness();
    h.engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    let advance = h
        .engine
        .update_status(1, "jkamau", AdvanceStatus::Approved, None)
        .await
        .unwrap();

    assert_eq!(advance.status, AdvanceStatus::Approved);
    assert_eq!(advance.approved_by.as_deref(), Some("jkamau"));
    assert!(advance.approved_date.is_some());

    let sent = h.notifier.sent().await;
    assert!(sent.last().unwrap().body.contains("approved"));
}

#[tokio::test]
async fn test_decline_is_terminal() {
    let h = harness();
    h.engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    h.engine
        .update_status(1, "jkamau", AdvanceStatus::Declined, Some("over limit".to_string()))
        .await
        .unwrap();

    let err = h
        .engine
        .update_status(1, "jkamau", AdvanceStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn test_cannot_disburse_pending_advance() {
    let h = harness();
    h.engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    let err = h
        .engine
        .update_status(1, "jkamau", AdvanceStatus::Disbursed, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdvanceError::InvalidStatusTransition {
            from: AdvanceStatus::Pending,
            to: AdvanceStatus::Disbursed,
        }
    ));
}

#[tokio::test]
async fn test_failed_notification_does_not_block_request() {
    let h = harness();
    h.notifier.set_failing(true);
    let advance = h
        .engine
        .request_advance(request(1, 1, dec!(1000)), &h.config, as_of())
        .await
        .unwrap();
    assert_eq!(advance.status, AdvanceStatus::Pending);
}
