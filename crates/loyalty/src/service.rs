//! Loyalty service: the read-modify-write cycle around the transition
//! engine.
//!
//! At most one transition per customer is in flight at any time; each
//! customer id has its own async mutex so different customers proceed in
//! parallel.

use crate::catalog::ReferenceData;
use crate::engine::{TierTransitionEngine, TransitionPolicy};
use crate::store::{CustomerStateStore, HistoryStore, InMemoryHistoryStore, InMemoryStateStore};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tier_core::config::LoyaltyConfig;
use tier_core::loyalty::{
    CustomerSummary, HistoryRecord, ProcessedTransaction, TierWithPoints, TransactionEvent,
};
use tier_core::{TierError, TierResult};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub struct LoyaltyService {
    engine: TierTransitionEngine,
    states: Arc<dyn CustomerStateStore>,
    history: Arc<dyn HistoryStore>,
    customer_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl LoyaltyService {
    pub fn new(
        engine: TierTransitionEngine,
        states: Arc<dyn CustomerStateStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            engine,
            states,
            history,
            customer_locks: DashMap::new(),
        }
    }

    /// Build a service with in-memory stores and the configured program.
    pub fn from_config(config: &LoyaltyConfig) -> TierResult<Self> {
        config.validate()?;
        let data = match &config.reference_data_path {
            Some(path) => ReferenceData::from_json_file(path)?,
            None => ReferenceData::standard_program()?,
        };
        let engine =
            TierTransitionEngine::from_reference_data(Arc::new(data), TransitionPolicy::from(config));

        info!("Loyalty service initialized (in-memory stores, development mode)");
        Ok(Self::new(
            engine,
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryHistoryStore::new()),
        ))
    }

    pub fn engine(&self) -> &TierTransitionEngine {
        &self.engine
    }

    /// Fold one transaction into the customer's standing and record it.
    ///
    /// Nothing is written when the engine fails or the transaction id has
    /// already been processed.
    pub async fn process_transaction(
        &self,
        event: TransactionEvent,
    ) -> TierResult<ProcessedTransaction> {
        let customer_id = event.customer_id;
        let lease = self.lease_customer_lock(customer_id);

        let result = {
            let _guard = lease.mutex().lock().await;
            self.process_locked(&event)
        };
        drop(lease);

        if let Err(e) = &result {
            metrics::counter!("loyalty.transactions_failed").increment(1);
            warn!(
                customer_id = %customer_id,
                transaction_id = %event.transaction_id,
                error = %e,
                "Transaction not processed"
            );
        }
        result
    }

    fn process_locked(&self, event: &TransactionEvent) -> TierResult<ProcessedTransaction> {
        if self.history.contains(event.transaction_id)? {
            return Err(TierError::DuplicateTransaction(event.transaction_id));
        }

        let prior = self.states.get(event.customer_id)?;
        let transition = self.engine.transition(prior.as_ref(), event)?;

        // History first: its unique transaction id guards against a replay
        // racing in under a different customer id.
        self.history
            .append(HistoryRecord::from_state(&transition.state, Utc::now()))?;
        self.states.upsert(transition.state.clone())?;

        metrics::counter!("loyalty.transactions_processed").increment(1);

        let state = transition.state;
        Ok(ProcessedTransaction {
            customer_id: state.customer_id,
            transaction_id: state.last_transaction_id,
            transaction_time: state.last_transaction_time,
            status: transition.status,
            tier_id: state.tier_id,
            tier: transition.tier.name,
            total_trx: state.total_trx,
            point: state.last_point_awarded,
            remark: state.last_remark,
            remark_text: state.last_remark.description().to_string(),
        })
    }

    fn lease_customer_lock(&self, customer_id: Uuid) -> CustomerLockLease<'_> {
        let lock = self
            .customer_locks
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        CustomerLockLease {
            locks: &self.customer_locks,
            customer_id,
            lock: Some(lock),
        }
    }

    /// Current tier and progress. Customers without any transaction are
    /// reported on the lowest tier with a zero counter.
    pub fn customer_summary(&self, customer_id: Uuid) -> TierResult<CustomerSummary> {
        let catalog = self.engine.catalog();
        let (tier, total_trx) = match self.states.get(customer_id)? {
            Some(state) => (catalog.tier_by_id(state.tier_id)?, state.total_trx),
            None => (catalog.lowest_tier()?, 0),
        };
        Ok(CustomerSummary {
            customer_id,
            tier: tier.name,
            total_trx,
            max_trx: tier.max_trx,
        })
    }

    /// Processed transactions for a customer, newest first.
    pub fn customer_history(&self, customer_id: Uuid) -> TierResult<Vec<HistoryRecord>> {
        self.history.for_customer(customer_id)
    }

    /// Every tier ordered by level, with its point checkpoints.
    pub fn tier_program(&self) -> Vec<TierWithPoints> {
        let points = self.engine.point_schedule();
        self.engine
            .catalog()
            .tiers()
            .into_iter()
            .map(|tier| TierWithPoints {
                points: points.entries_for(tier.id),
                tier,
            })
            .collect()
    }
}

/// A handle on one customer's mutex. Dropping it, on completion or when the
/// owning future is cancelled, removes the map entry once no other lease
/// refers to it.
struct CustomerLockLease<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    customer_id: Uuid,
    lock: Option<Arc<Mutex<()>>>,
}

impl CustomerLockLease<'_> {
    fn mutex(&self) -> &Mutex<()> {
        // Only emptied in `drop`.
        match &self.lock {
            Some(lock) => &**lock,
            None => unreachable!("lease used after release"),
        }
    }
}

impl Drop for CustomerLockLease<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        self.locks
            .remove_if(&self.customer_id, |_, l| Arc::strong_count(l) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::standard::{BRONZE, SILVER};
    use tier_core::loyalty::{TierName, TierStatus};

    fn service() -> LoyaltyService {
        LoyaltyService::from_config(&LoyaltyConfig::default()).unwrap()
    }

    #[test]
    fn test_summary_for_unknown_customer() {
        let summary = service().customer_summary(Uuid::new_v4()).unwrap();
        assert_eq!(summary.tier, TierName::Bronze);
        assert_eq!(summary.total_trx, 0);
        assert_eq!(summary.max_trx, 7);
    }

    #[test]
    fn test_tier_program_lists_all_tiers() {
        let program = service().tier_program();
        assert_eq!(program.len(), 3);
        assert_eq!(program[0].tier.id, BRONZE);
        assert_eq!(program[1].tier.id, SILVER);
        assert_eq!(program[0].points.len(), 1);
    }

    #[test]
    fn test_from_config_rejects_bad_windows() {
        let config = LoyaltyConfig {
            active_window_days: 90,
            downgrade_window_days: 60,
            ..Default::default()
        };
        assert!(matches!(
            LoyaltyService::from_config(&config),
            Err(TierError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_missing_reference_file() {
        let config = LoyaltyConfig {
            reference_data_path: Some("/nonexistent/loyalty-program.json".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            LoyaltyService::from_config(&config),
            Err(TierError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_first_transaction_is_recorded() {
        let service = service();
        let event = TransactionEvent {
            customer_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            transaction_time: Utc::now(),
        };

        let result = service.process_transaction(event.clone()).await.unwrap();
        assert_eq!(result.status, TierStatus::Enrolled);
        assert_eq!(result.remark_text, "FIRST TRANSACTION");

        let history = service.customer_history(event.customer_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_id, event.transaction_id);
        assert!(service.customer_locks.is_empty());
    }

    fn lock_refs(service: &LoyaltyService, customer_id: Uuid) -> usize {
        service
            .customer_locks
            .get(&customer_id)
            .map(|l| Arc::strong_count(l.value()))
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_lock_entry() {
        let service = Arc::new(service());
        let customer_id = Uuid::new_v4();

        let holder = service.lease_customer_lock(customer_id);
        let guard = holder.mutex().lock().await;

        let waiter = tokio::spawn({
            let service = service.clone();
            async move {
                service
                    .process_transaction(TransactionEvent {
                        customer_id,
                        transaction_id: Uuid::new_v4(),
                        transaction_time: Utc::now(),
                    })
                    .await
            }
        });
        // Map entry, holder and the parked waiter.
        while lock_refs(&service, customer_id) < 3 {
            tokio::task::yield_now().await;
        }

        drop(guard);
        drop(holder);
        assert_eq!(lock_refs(&service, customer_id), 2);

        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert!(service.customer_locks.is_empty());
        assert!(service.customer_history(customer_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_transactions_leave_no_lock_entries() {
        let service = Arc::new(service());
        let customer_id = Uuid::new_v4();
        let start = Utc::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .process_transaction(TransactionEvent {
                            customer_id,
                            transaction_id: Uuid::new_v4(),
                            transaction_time: start,
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(service.customer_locks.is_empty());
        assert_eq!(service.customer_history(customer_id).unwrap().len(), 10);
    }
}
