mod common;

use common::harness;
use okoa::application::reconciliation::ReconciliationOutcome;
use okoa::domain::advance::AdvanceStatus;
use okoa::domain::payment::{Direction, SettlementNotice};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_repayments_are_serialized() {
    let h = harness();
    h.disbursed_advance(1, 1, dec!(1000)).await;
    let engine = Arc::new(h.engine);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.apply_repayment(1, dec!(300)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Both credits landed; neither overwrote the other.
    let advance = &engine.advances_report().await.unwrap()[0];
    assert_eq!(advance.outstanding(), dec!(400));
}

#[tokio::test]
async fn test_concurrent_repayments_clip_at_total_debt() {
    let h = harness();
    h.disbursed_advance(1, 1, dec!(1000)).await;
    let engine = Arc::new(h.engine);

    // Leave 900 outstanding so the two 600 credits together overshoot.
    engine.apply_repayment(1, dec!(100)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.apply_repayment(1, dec!(600)).await
        }));
    }
    let mut applied = Decimal::ZERO;
    let mut surplus = Decimal::ZERO;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        applied += result.applied;
        surplus += result.surplus;
    }

    // Whichever task ran second found only 300 of debt left.
    assert_eq!(applied, dec!(900));
    assert_eq!(surplus, dec!(300));
    let advance = &engine.advances_report().await.unwrap()[0];
    assert_eq!(advance.outstanding(), Decimal::ZERO);
    assert_eq!(advance.status, AdvanceStatus::Repaid);
}

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_overdraw() {
    let h = harness();
    h.disbursed_advance(1, 1, dec!(1000)).await;
    let engine = Arc::new(h.engine);
    let config = h.config.clone();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            engine.withdraw(1, dec!(600), &config).await
        }));
    }
    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    let advance = &engine.advances_report().await.unwrap()[0];
    assert_eq!(advance.withdrawable(), dec!(400));
}

#[tokio::test]
async fn test_racing_duplicate_callbacks_apply_once() {
    let h = harness();
    h.disbursed_advance(1, 1, dec!(1000)).await;
    let engine = Arc::new(h.engine);
    let tx = engine.withdraw(1, dec!(600), &h.config).await.unwrap();

    let notice = SettlementNotice {
        direction: Direction::Outbound,
        merchant_ref: tx.merchant_ref.clone(),
        network_ref: tx.network_ref.clone(),
        result_code: 0,
        result_desc: "The service request is processed successfully.".to_string(),
        amount: Some(dec!(600)),
        receipt: Some("QHX81LPM2C".to_string()),
        phone: None,
        reference: None,
        account_balance: None,
    };

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let notice = notice.clone();
        let config = h.config.clone();
        handles.push(tokio::spawn(async move {
            engine.handle_callback(notice, &config).await
        }));
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert!(outcomes.contains(&ReconciliationOutcome::Applied(tx.id)));
    assert!(outcomes.contains(&ReconciliationOutcome::Duplicate(tx.id)));
}
