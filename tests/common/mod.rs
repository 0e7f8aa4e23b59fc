#![allow(dead_code)]

use chrono::NaiveDate;
use okoa::application::engine::AdvanceEngine;
use okoa::domain::advance::{Advance, AdvanceStatus};
use okoa::domain::config::AdvanceConfig;
use okoa::domain::employee::Employee;
use okoa::domain::ports::{
    AdvanceStoreRef, EmployeeDirectoryRef, NotificationSenderRef, PaymentNetworkRef,
    PaymentStoreRef,
};
use okoa::domain::{AdvanceId, EmployeeId};
use okoa::infrastructure::in_memory::{
    InMemoryAdvanceStore, InMemoryDirectory, InMemoryPaymentStore, OfflineNetwork,
    RecordingNotifier,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// In-memory engine plus handles on the recording infrastructure, so
/// tests can assert on notifications and flip network availability.
pub struct Harness {
    pub engine: AdvanceEngine,
    pub notifier: RecordingNotifier,
    pub network: Arc<OfflineNetwork>,
    pub config: AdvanceConfig,
}

/// Friday near month end: 20 of 22 working days of August 2026 elapsed.
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
}

pub fn roster() -> Vec<Employee> {
    vec![
        Employee {
            id: 1,
            name: "Jane Wanjiku".to_string(),
            phone: "0712345678".to_string(),
            email: "jane@example.com".to_string(),
            base_salary: Some(dec!(50000)),
            employment_end_date: None,
        },
        Employee {
            id: 2,
            name: "John Otieno".to_string(),
            phone: "254733000111".to_string(),
            email: "john@example.com".to_string(),
            base_salary: Some(dec!(80000)),
            employment_end_date: None,
        },
    ]
}

/// Interest-free configuration, so repayment totals equal principals.
pub fn interest_free_config() -> AdvanceConfig {
    AdvanceConfig {
        default_interest_rate: Decimal::ZERO,
        ..Default::default()
    }
}

pub fn harness() -> Harness {
    harness_with(roster(), interest_free_config())
}

pub fn harness_with(employees: Vec<Employee>, config: AdvanceConfig) -> Harness {
    let notifier = RecordingNotifier::new();
    let network = Arc::new(OfflineNetwork::new(dec!(1_000_000)));

    let advances: AdvanceStoreRef = Arc::new(InMemoryAdvanceStore::new());
    let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());
    let directory: EmployeeDirectoryRef = Arc::new(InMemoryDirectory::new(employees));
    let notifier_ref: NotificationSenderRef = Arc::new(notifier.clone());
    let network_ref: PaymentNetworkRef = Arc::clone(&network) as PaymentNetworkRef;

    Harness {
        engine: AdvanceEngine::new(advances, payments, directory, notifier_ref, network_ref),
        notifier,
        network,
        config,
    }
}

impl Harness {
    /// Requests, approves and disburses an advance in one step.
    pub async fn disbursed_advance(
        &self,
        id: AdvanceId,
        employee: EmployeeId,
        amount: Decimal,
    ) -> Advance {
        let request = okoa::application::lifecycle::AdvanceRequest {
            id,
            employee,
            amount,
            period_months: 3,
            payout_channel: "mobile".to_string(),
            comments: None,
        };
        self.engine
            .request_advance(request, &self.config, as_of())
            .await
            .unwrap();
        self.engine
            .update_status(id, "jkamau", AdvanceStatus::Approved, None)
            .await
            .unwrap();
        self.engine
            .update_status(id, "jkamau", AdvanceStatus::Disbursed, None)
            .await
            .unwrap()
    }

    pub async fn advance(&self, id: AdvanceId) -> Advance {
        self.engine
            .advances_report()
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.id == id)
            .unwrap()
    }
}
