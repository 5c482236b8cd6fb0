//! Tier transition engine: folds one transaction into a customer's
//! standing, deciding whether they keep, gain, lose, or reset their tier
//! and which checkpoint bonus comes with it.
//!
//! The engine holds no mutable state. Given the same prior state, event,
//! and reference data it always returns the same result.

use crate::catalog::{PointSchedule, ReferenceData, TierCatalog, TierJourneyGraph};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tier_core::config::LoyaltyConfig;
use tier_core::loyalty::{CustomerLoyaltyState, Tier, TierStatus, TransactionEvent};
use tier_core::{TierError, TierResult};
use tracing::{debug, info};
use uuid::Uuid;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Recency thresholds and ordering rules applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPolicy {
    /// Idle days (inclusive) within which keep/upgrade rules apply.
    pub active_window_days: i64,
    /// Idle days (inclusive) within which the customer drops one tier.
    pub downgrade_window_days: i64,
    /// Reject events timestamped before the customer's last transaction.
    /// When false they fall into the active window.
    pub reject_out_of_order: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::from(&LoyaltyConfig::default())
    }
}

impl From<&LoyaltyConfig> for TransitionPolicy {
    fn from(config: &LoyaltyConfig) -> Self {
        Self {
            active_window_days: config.active_window_days,
            downgrade_window_days: config.downgrade_window_days,
            reject_out_of_order: config.reject_out_of_order,
        }
    }
}

/// Result of one transition: the branch taken and the state to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: TierStatus,
    pub state: CustomerLoyaltyState,
    /// Resolved tier the customer ends up in.
    pub tier: Tier,
    pub previous_tier_id: Option<Uuid>,
    /// Idle days since the previous transaction; `None` on enrollment.
    pub days_without_trx: Option<i64>,
}

impl Transition {
    pub fn tier_changed(&self) -> bool {
        self.previous_tier_id
            .map(|prev| prev != self.state.tier_id)
            .unwrap_or(false)
    }
}

/// Whole days between two transactions, floored.
///
/// A difference that does not fit in milliseconds counts as zero days. Every
/// `DateTime<Utc>` lies within about 8.3e15 ms of the epoch, so the fallback
/// is never taken for representable timestamps; it stays in case the inputs
/// change type.
pub fn days_without_trx(last: DateTime<Utc>, current: DateTime<Utc>) -> i64 {
    current
        .timestamp_millis()
        .checked_sub(last.timestamp_millis())
        .map(|ms| ms.div_euclid(MS_PER_DAY))
        .unwrap_or(0)
}

pub struct TierTransitionEngine {
    catalog: Arc<dyn TierCatalog>,
    journey: Arc<dyn TierJourneyGraph>,
    points: Arc<dyn PointSchedule>,
    policy: TransitionPolicy,
}

impl TierTransitionEngine {
    pub fn new(
        catalog: Arc<dyn TierCatalog>,
        journey: Arc<dyn TierJourneyGraph>,
        points: Arc<dyn PointSchedule>,
        policy: TransitionPolicy,
    ) -> Self {
        info!(
            active_window_days = policy.active_window_days,
            downgrade_window_days = policy.downgrade_window_days,
            reject_out_of_order = policy.reject_out_of_order,
            "Tier transition engine initialized"
        );
        Self {
            catalog,
            journey,
            points,
            policy,
        }
    }

    /// Engine whose three lookups are all served by one program.
    pub fn from_reference_data(data: Arc<ReferenceData>, policy: TransitionPolicy) -> Self {
        Self::new(data.clone(), data.clone(), data, policy)
    }

    pub fn catalog(&self) -> &dyn TierCatalog {
        self.catalog.as_ref()
    }

    pub fn point_schedule(&self) -> &dyn PointSchedule {
        self.points.as_ref()
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Compute the customer's next state for `event`.
    ///
    /// Missing tiers or journey edges abort the transition; a missing point
    /// checkpoint awards zero.
    pub fn transition(
        &self,
        prior: Option<&CustomerLoyaltyState>,
        event: &TransactionEvent,
    ) -> TierResult<Transition> {
        let Some(prior) = prior else {
            return self.enroll(event);
        };

        let days = days_without_trx(prior.last_transaction_time, event.transaction_time);
        if days < 0 && self.policy.reject_out_of_order {
            return Err(TierError::OutOfOrderTransaction {
                transaction_id: event.transaction_id,
                transaction_time: event.transaction_time,
                last_transaction_time: prior.last_transaction_time,
            });
        }

        // Resolve the prior tier fresh; the id in the state may be stale.
        let prior_tier = self.catalog.tier_by_id(prior.tier_id)?;

        let (status, tier, total_trx) = if days <= self.policy.active_window_days {
            self.progress(&prior_tier, prior.total_trx)?
        } else if days <= self.policy.downgrade_window_days {
            let prev_id = self.journey.prev_tier_id(prior_tier.id)?;
            (TierStatus::Downgrade, self.catalog.tier_by_id(prev_id)?, 1)
        } else {
            (TierStatus::Reset, self.catalog.lowest_tier()?, 1)
        };

        let point = self.points.point_at(tier.id, total_trx);
        let state = CustomerLoyaltyState {
            customer_id: event.customer_id,
            tier_id: tier.id,
            total_trx,
            last_transaction_id: event.transaction_id,
            last_transaction_time: event.transaction_time,
            last_point_awarded: point,
            last_remark: status.remark(),
        };

        metrics::counter!("loyalty.transitions", "status" => status.as_str()).increment(1);

        if tier.id != prior_tier.id {
            info!(
                customer_id = %event.customer_id,
                old = %prior_tier.name,
                new = %tier.name,
                status = status.as_str(),
                days_without_trx = days,
                "Tier changed"
            );
        }
        debug!(
            customer_id = %event.customer_id,
            transaction_id = %event.transaction_id,
            status = status.as_str(),
            tier = %tier.name,
            total_trx = total_trx,
            point = point,
            days_without_trx = days,
            "Transition computed"
        );

        Ok(Transition {
            status,
            state,
            tier,
            previous_tier_id: Some(prior_tier.id),
            days_without_trx: Some(days),
        })
    }

    /// First transaction: lowest tier, counter at 1, no points.
    fn enroll(&self, event: &TransactionEvent) -> TierResult<Transition> {
        let tier = self.catalog.lowest_tier()?;
        let status = TierStatus::Enrolled;

        metrics::counter!("loyalty.transitions", "status" => status.as_str()).increment(1);
        debug!(
            customer_id = %event.customer_id,
            transaction_id = %event.transaction_id,
            tier = %tier.name,
            "Customer enrolled"
        );

        Ok(Transition {
            status,
            state: CustomerLoyaltyState {
                customer_id: event.customer_id,
                tier_id: tier.id,
                total_trx: 1,
                last_transaction_id: event.transaction_id,
                last_transaction_time: event.transaction_time,
                last_point_awarded: 0,
                last_remark: status.remark(),
            },
            tier,
            previous_tier_id: None,
            days_without_trx: None,
        })
    }

    /// Keep/upgrade rules inside the active window. The cap check runs
    /// before the exact-ceiling upgrade check.
    fn progress(&self, tier: &Tier, total_trx: u64) -> TierResult<(TierStatus, Tier, u64)> {
        let highest_level = self.catalog.highest_level()?;

        if tier.level == highest_level && total_trx >= tier.max_trx {
            return Ok((TierStatus::KeepAtCap, tier.clone(), total_trx.saturating_add(1)));
        }

        if total_trx == tier.max_trx {
            let next_id = self.journey.next_tier_id(tier.id)?;
            return Ok((TierStatus::Upgrade, self.catalog.tier_by_id(next_id)?, 1));
        }

        Ok((TierStatus::Keep, tier.clone(), total_trx.saturating_add(1)))
    }
}
