use crate::domain::ports::{NotificationSenderRef, PaymentNetworkRef};
use crate::error::Result;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Recurring poll of the payment network's disbursement account balance.
///
/// Fire-and-forget: poll failures and alert failures are logged and the
/// loop keeps going. Reconciliation never waits on this.
pub struct BalanceMonitor {
    network: PaymentNetworkRef,
    notifier: NotificationSenderRef,
    threshold: Decimal,
    ops_email: String,
    period: Duration,
}

impl BalanceMonitor {
    pub fn new(
        network: PaymentNetworkRef,
        notifier: NotificationSenderRef,
        threshold: Decimal,
        ops_email: String,
        period: Duration,
    ) -> Self {
        Self {
            network,
            notifier,
            threshold,
            ops_email,
            period,
        }
    }

    /// One poll cycle. Returns the reported balance.
    pub async fn check_once(&self) -> Result<Decimal> {
        let balance = self.network.account_balance().await?;
        if balance < self.threshold {
            tracing::warn!(%balance, threshold = %self.threshold, "account balance below threshold");
            if let Err(err) = self
                .notifier
                .send_email(
                    &self.ops_email,
                    "Disbursement account balance low",
                    &format!(
                        "Polled account balance is {balance}, below the threshold of {}.",
                        self.threshold
                    ),
                )
                .await
            {
                tracing::warn!(error = %err, "alert delivery failed");
            }
        }
        Ok(balance)
    }

    /// Spawns the polling loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.period);
            loop {
                tick.tick().await;
                if let Err(err) = self.check_once().await {
                    tracing::warn!(error = %err, "balance poll failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::{OfflineNetwork, RecordingNotifier};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn monitor(balance: Decimal) -> (BalanceMonitor, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let monitor = BalanceMonitor::new(
            Arc::new(OfflineNetwork::new(balance)),
            Arc::new(notifier.clone()),
            dec!(10000),
            "ops@example.com".to_string(),
            Duration::from_secs(300),
        );
        (monitor, notifier)
    }

    #[tokio::test]
    async fn test_low_balance_alerts() {
        let (monitor, notifier) = monitor(dec!(4200));
        assert_eq!(monitor.check_once().await.unwrap(), dec!(4200));

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "email");
        assert_eq!(sent[0].to, "ops@example.com");
    }

    #[tokio::test]
    async fn test_healthy_balance_stays_quiet() {
        let (monitor, notifier) = monitor(dec!(50000));
        monitor.check_once().await.unwrap();
        assert!(notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_fail_the_poll() {
        let (monitor, notifier) = monitor(dec!(4200));
        notifier.set_failing(true);
        assert!(monitor.check_once().await.is_ok());
    }
}
