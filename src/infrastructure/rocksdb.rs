use crate::domain::advance::Advance;
use crate::domain::payment::{AnomalyRecord, Direction, PaymentStatus, PaymentTransaction};
use crate::domain::ports::{AdvanceStore, PaymentStore};
use crate::domain::{AdvanceId, EmployeeId, PaymentId};
use crate::error::{AdvanceError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;

/// Column family for advance records.
pub const CF_ADVANCES: &str = "advances";
/// Column family for payment transactions.
pub const CF_PAYMENTS: &str = "payments";
/// Column family for unroutable-callback anomaly records.
pub const CF_ANOMALIES: &str = "anomalies";

/// Persistent store backed by RocksDB.
///
/// Advances and payment transactions live in separate column families,
/// keyed by their big-endian ids so iteration order matches id order.
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens or creates a database at `path`, ensuring both column
    /// families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_advances = ColumnFamilyDescriptor::new(CF_ADVANCES, Options::default());
        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_anomalies = ColumnFamilyDescriptor::new(CF_ANOMALIES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_advances, cf_payments, cf_anomalies])?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            AdvanceError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn scan_payments(&self) -> Result<Vec<PaymentTransaction>> {
        let cf = self.cf(CF_PAYMENTS)?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            payments.push(serde_json::from_slice(&value)?);
        }
        Ok(payments)
    }

    /// Highest 8-byte key in the column family, or 0 when empty.
    fn last_key(&self, cf_name: &str) -> Result<PaymentId> {
        let cf = self.cf(cf_name)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _value) = item?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    AdvanceError::Internal(Box::new(std::io::Error::other(format!(
                        "{cf_name} key is not 8 bytes"
                    ))))
                })?;
                Ok(PaymentId::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl AdvanceStore for RocksDbStore {
    async fn store(&self, advance: Advance) -> Result<()> {
        let cf = self.cf(CF_ADVANCES)?;
        let key = advance.id.to_be_bytes();
        let value = serde_json::to_vec(&advance)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn get(&self, id: AdvanceId) -> Result<Option<Advance>> {
        let cf = self.cf(CF_ADVANCES)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn for_employee(&self, employee: EmployeeId) -> Result<Vec<Advance>> {
        Ok(AdvanceStore::all(self)
            .await?
            .into_iter()
            .filter(|a| a.employee == employee)
            .collect())
    }

    async fn all(&self) -> Result<Vec<Advance>> {
        let cf = self.cf(CF_ADVANCES)?;
        let mut advances = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            advances.push(serde_json::from_slice(&value)?);
        }
        Ok(advances)
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn store(&self, tx: PaymentTransaction) -> Result<()> {
        let cf = self.cf(CF_PAYMENTS)?;
        let key = tx.id.to_be_bytes();
        let value = serde_json::to_vec(&tx)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentTransaction>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn next_id(&self) -> Result<PaymentId> {
        // Anomalies share the id space so the two listings never collide.
        let last = self.last_key(CF_PAYMENTS)?.max(self.last_key(CF_ANOMALIES)?);
        Ok(last + 1)
    }

    async fn find_by_correlation(
        &self,
        merchant_ref: Option<&str>,
        network_ref: Option<&str>,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self.scan_payments()?.into_iter().find(|tx| {
            let merchant_hit = merchant_ref.is_some() && tx.merchant_ref.as_deref() == merchant_ref;
            let network_hit = network_ref.is_some() && tx.network_ref.as_deref() == network_ref;
            merchant_hit || network_hit
        }))
    }

    async fn find_pending_match(
        &self,
        direction: Direction,
        phone: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>> {
        Ok(self.scan_payments()?.into_iter().find(|tx| {
            tx.status == PaymentStatus::Pending
                && tx.direction == direction
                && tx.phone == phone
                && tx.amount.value() == amount
        }))
    }

    async fn find_by_receipt(&self, receipt: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .scan_payments()?
            .into_iter()
            .find(|tx| tx.receipt.as_deref() == Some(receipt)))
    }

    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentTransaction>> {
        Ok(self
            .scan_payments()?
            .into_iter()
            .filter(|tx| tx.status == PaymentStatus::Pending && tx.initiated_at < cutoff)
            .collect())
    }

    async fn all(&self) -> Result<Vec<PaymentTransaction>> {
        self.scan_payments()
    }

    async fn record_anomaly(&self, anomaly: AnomalyRecord) -> Result<()> {
        let cf = self.cf(CF_ANOMALIES)?;
        let key = anomaly.id.to_be_bytes();
        let value = serde_json::to_vec(&anomaly)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn anomalies(&self) -> Result<Vec<AnomalyRecord>> {
        let cf = self.cf(CF_ANOMALIES)?;
        let mut anomalies = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            anomalies.push(serde_json::from_slice(&value)?);
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::payment::Owner;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("Failed to open RocksDB");
        assert!(store.db.cf_handle(CF_ADVANCES).is_some());
        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
        assert!(store.db.cf_handle(CF_ANOMALIES).is_some());
    }

    #[tokio::test]
    async fn test_anomaly_roundtrip_and_id_sequence() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let id = PaymentStore::next_id(&store).await.unwrap();
        store
            .record_anomaly(AnomalyRecord {
                id,
                description: "notice without amount".to_string(),
                payload: None,
                received_at: Utc::now(),
            })
            .await
            .unwrap();

        let anomalies = store.anomalies().await.unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].id, 1);
        assert_eq!(PaymentStore::next_id(&store).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_advance_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let advance = Advance::new(
            1,
            7,
            Amount::new(dec!(20000)).unwrap(),
            dec!(5),
            3,
            NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            "mobile".to_string(),
        )
        .unwrap();
        AdvanceStore::store(&store, advance.clone()).await.unwrap();

        assert_eq!(AdvanceStore::get(&store, 1).await.unwrap().unwrap(), advance);
        assert!(AdvanceStore::get(&store, 2).await.unwrap().is_none());
        assert_eq!(store.for_employee(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_roundtrip_and_next_id() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        assert_eq!(PaymentStore::next_id(&store).await.unwrap(), 1);

        let mut tx = PaymentTransaction::new(
            3,
            Direction::Inbound,
            Owner::Unattributed,
            Amount::new(dec!(500)).unwrap(),
            "254700000000".to_string(),
        );
        tx.network_ref = Some("NET-1".to_string());
        PaymentStore::store(&store, tx.clone()).await.unwrap();

        assert_eq!(PaymentStore::get(&store, 3).await.unwrap().unwrap(), tx);
        assert_eq!(PaymentStore::next_id(&store).await.unwrap(), 4);

        let hit = store
            .find_by_correlation(None, Some("NET-1"))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().id, 3);
    }
}
