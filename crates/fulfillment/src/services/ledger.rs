//! Ledger client trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::OrderRecord;
use tokio::sync::RwLock;

use crate::error::LedgerError;

/// Result of an idempotent append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new record was written.
    Appended,
    /// A record with the same order id already existed; nothing was written.
    AlreadyRecorded,
}

/// Trait for the append-only order ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Appends one record. The store does not enforce uniqueness.
    async fn append(&self, record: &OrderRecord) -> Result<(), LedgerError>;

    /// Returns the first record with the given order id.
    async fn find_by_order_id(&self, id: &OrderId) -> Result<Option<OrderRecord>, LedgerError>;

    /// Appends `record` unless its order id is already present.
    ///
    /// A present-but-undecodable row counts as present. Implementations must
    /// make the check and the append behave as one step for concurrent
    /// callers in this process; the default does not.
    async fn append_once(&self, record: &OrderRecord) -> Result<AppendOutcome, LedgerError> {
        append_if_absent(self, record).await
    }
}

/// Looks the order up and appends `record` only if no row exists for it.
pub async fn append_if_absent<L: LedgerClient + ?Sized>(
    ledger: &L,
    record: &OrderRecord,
) -> Result<AppendOutcome, LedgerError> {
    match ledger.find_by_order_id(&record.order_id).await {
        Ok(Some(_)) | Err(LedgerError::Malformed(_)) => Ok(AppendOutcome::AlreadyRecorded),
        Ok(None) => {
            ledger.append(record).await?;
            Ok(AppendOutcome::Appended)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    records: Vec<OrderRecord>,
    fail_on_append: bool,
    fail_on_read: bool,
    calls: usize,
}

/// In-memory ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures appends to fail.
    pub async fn set_fail_on_append(&self, fail: bool) {
        self.state.write().await.fail_on_append = fail;
    }

    /// Configures lookups to fail.
    pub async fn set_fail_on_read(&self, fail: bool) {
        self.state.write().await.fail_on_read = fail;
    }

    /// Returns every stored record, in append order.
    pub async fn records(&self) -> Vec<OrderRecord> {
        self.state.read().await.records.clone()
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns the number of calls served (including failed ones).
    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls
    }
}

impl InMemoryLedgerState {
    fn find(&mut self, id: &OrderId) -> Result<Option<OrderRecord>, LedgerError> {
        self.calls += 1;
        if self.fail_on_read {
            return Err(LedgerError::Read("ledger unavailable".to_string()));
        }
        Ok(self.records.iter().find(|r| &r.order_id == id).cloned())
    }

    fn push(&mut self, record: &OrderRecord) -> Result<(), LedgerError> {
        self.calls += 1;
        if self.fail_on_append {
            return Err(LedgerError::Write("append rejected".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn append(&self, record: &OrderRecord) -> Result<(), LedgerError> {
        self.state.write().await.push(record)
    }

    async fn find_by_order_id(&self, id: &OrderId) -> Result<Option<OrderRecord>, LedgerError> {
        self.state.write().await.find(id)
    }

    async fn append_once(&self, record: &OrderRecord) -> Result<AppendOutcome, LedgerError> {
        let mut state = self.state.write().await;
        if state.find(&record.order_id)?.is_some() {
            return Ok(AppendOutcome::AlreadyRecorded);
        }
        state.push(record)?;
        Ok(AppendOutcome::Appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use domain::{Money, OrderStatus};

    fn record(id: &str) -> OrderRecord {
        OrderRecord {
            order_id: OrderId::new(id),
            created_at: DateTime::parse_from_rfc3339("2026-01-05T12:00:00+09:00").unwrap(),
            items: Vec::new(),
            total: Money::from_minor(1000),
            customer_email: String::new(),
            postal_code: String::new(),
            shipping_address: String::new(),
            customer_name: String::new(),
            phone: String::new(),
            status: OrderStatus::Unshipped,
            inventory_updated: true,
            notes: String::new(),
            dashboard_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let ledger = InMemoryLedger::new();
        ledger.append(&record("pi_1")).await.unwrap();

        let found = ledger.find_by_order_id(&OrderId::new("pi_1")).await.unwrap();
        assert_eq!(found.unwrap().order_id, OrderId::new("pi_1"));
        assert!(
            ledger
                .find_by_order_id(&OrderId::new("pi_2"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_plain_append_does_not_dedupe() {
        let ledger = InMemoryLedger::new();
        ledger.append(&record("pi_1")).await.unwrap();
        ledger.append(&record("pi_1")).await.unwrap();
        assert_eq!(ledger.record_count().await, 2);
    }

    #[tokio::test]
    async fn test_append_once_is_idempotent() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.append_once(&record("pi_1")).await.unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(
            ledger.append_once(&record("pi_1")).await.unwrap(),
            AppendOutcome::AlreadyRecorded
        );
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_append_once_writes_one_row() {
        let ledger = InMemoryLedger::new();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.append_once(&record("pi_1")).await.unwrap()
            }));
        }
        let mut appended = 0;
        for handle in handles {
            if handle.await.unwrap() == AppendOutcome::Appended {
                appended += 1;
            }
        }
        assert_eq!(appended, 1);
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_failures() {
        let ledger = InMemoryLedger::new();
        ledger.set_fail_on_append(true).await;
        assert!(matches!(
            ledger.append(&record("pi_1")).await,
            Err(LedgerError::Write(_))
        ));

        ledger.set_fail_on_read(true).await;
        assert!(matches!(
            ledger.find_by_order_id(&OrderId::new("pi_1")).await,
            Err(LedgerError::Read(_))
        ));
        assert_eq!(ledger.call_count().await, 2);
    }
}
