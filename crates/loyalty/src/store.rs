//! Customer state and transaction history stores.
//!
//! The in-memory implementations are backed by DashMap and serve
//! development and tests; a SQL-backed store implements the same traits.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tier_core::loyalty::{CustomerLoyaltyState, HistoryRecord};
use tier_core::{TierError, TierResult};
use tracing::debug;
use uuid::Uuid;

/// Current standing per customer, one row each.
pub trait CustomerStateStore: Send + Sync {
    fn get(&self, customer_id: Uuid) -> TierResult<Option<CustomerLoyaltyState>>;

    /// Insert or replace the row keyed by `state.customer_id`.
    fn upsert(&self, state: CustomerLoyaltyState) -> TierResult<()>;
}

/// Append-only log of processed transactions.
pub trait HistoryStore: Send + Sync {
    /// Fails with `DuplicateTransaction` if the transaction id is already logged.
    fn append(&self, record: HistoryRecord) -> TierResult<()>;

    fn contains(&self, transaction_id: Uuid) -> TierResult<bool>;

    /// Records for one customer, newest transaction first.
    fn for_customer(&self, customer_id: Uuid) -> TierResult<Vec<HistoryRecord>>;
}

#[derive(Default)]
pub struct InMemoryStateStore {
    rows: DashMap<Uuid, CustomerLoyaltyState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl CustomerStateStore for InMemoryStateStore {
    fn get(&self, customer_id: Uuid) -> TierResult<Option<CustomerLoyaltyState>> {
        Ok(self.rows.get(&customer_id).map(|r| r.value().clone()))
    }

    fn upsert(&self, state: CustomerLoyaltyState) -> TierResult<()> {
        debug!(customer_id = %state.customer_id, total_trx = state.total_trx, "State upserted");
        self.rows.insert(state.customer_id, state);
        Ok(())
    }
}

/// History keyed by transaction id, with a per-customer index.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: DashMap<Uuid, HistoryRecord>,
    by_customer: DashMap<Uuid, Vec<Uuid>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, record: HistoryRecord) -> TierResult<()> {
        let transaction_id = record.transaction_id;
        let customer_id = record.customer_id;

        match self.records.entry(transaction_id) {
            Entry::Occupied(_) => {
                return Err(TierError::DuplicateTransaction(transaction_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        self.by_customer
            .entry(customer_id)
            .or_default()
            .push(transaction_id);
        Ok(())
    }

    fn contains(&self, transaction_id: Uuid) -> TierResult<bool> {
        Ok(self.records.contains_key(&transaction_id))
    }

    fn for_customer(&self, customer_id: Uuid) -> TierResult<Vec<HistoryRecord>> {
        let ids = match self.by_customer.get(&customer_id) {
            Some(ids) => ids.value().clone(),
            None => return Ok(Vec::new()),
        };
        let mut records: Vec<HistoryRecord> = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect();
        records.sort_by(|a, b| b.transaction_time.cmp(&a.transaction_time));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use tier_core::loyalty::TierRemark;

    fn record(customer_id: Uuid, time: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            transaction_id: Uuid::new_v4(),
            customer_id,
            transaction_time: time,
            tier_id: Uuid::new_v4(),
            total_trx: 1,
            point: 0,
            remark: TierRemark::None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_upsert_replaces_row() {
        let store = InMemoryStateStore::new();
        let customer_id = Uuid::new_v4();
        let mut state = CustomerLoyaltyState {
            customer_id,
            tier_id: Uuid::new_v4(),
            total_trx: 1,
            last_transaction_id: Uuid::new_v4(),
            last_transaction_time: Utc::now(),
            last_point_awarded: 0,
            last_remark: TierRemark::FirstTransaction,
        };

        assert!(store.get(customer_id).unwrap().is_none());
        store.upsert(state.clone()).unwrap();
        state.total_trx = 2;
        store.upsert(state.clone()).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(customer_id).unwrap().unwrap().total_trx, 2);
    }

    #[test]
    fn test_history_rejects_duplicate_transaction() {
        let store = InMemoryHistoryStore::new();
        let first = record(Uuid::new_v4(), Utc::now());
        let id = first.transaction_id;

        store.append(first.clone()).unwrap();
        assert!(store.contains(id).unwrap());
        assert!(matches!(
            store.append(first),
            Err(TierError::DuplicateTransaction(dup)) if dup == id
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_newest_first_per_customer() {
        let store = InMemoryHistoryStore::new();
        let customer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let base = Utc::now();

        store.append(record(customer, base)).unwrap();
        store.append(record(customer, base + Duration::days(2))).unwrap();
        store.append(record(customer, base + Duration::days(1))).unwrap();
        store.append(record(other, base)).unwrap();

        let history = store.for_customer(customer).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history
            .windows(2)
            .all(|w| w[0].transaction_time >= w[1].transaction_time));
        assert!(store.for_customer(Uuid::new_v4()).unwrap().is_empty());
    }
}
