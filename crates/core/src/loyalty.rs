//! Loyalty tier domain types: reference data, per-customer state and history.
//!
//! Reference data (tiers, journeys, point checkpoints) is immutable and keyed
//! by tier id. Customer state refers to its tier by id only; resolving the
//! id is the job of the catalog collaborators in `tier-loyalty`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// ─── Reference Data ─────────────────────────────────────────────────────────

/// Tier names, ordered from the bottom of the program to the top.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierName {
    Bronze,
    Silver,
    Gold,
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierName::Bronze => "BRONZE",
            TierName::Silver => "SILVER",
            TierName::Gold => "GOLD",
        };
        f.write_str(name)
    }
}

/// A ranked loyalty level with a transaction-count ceiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Tier {
    pub id: Uuid,
    pub name: TierName,
    /// Rank within the program; the lowest tier is level 1.
    pub level: u32,
    /// Transactions needed within this tier before the next upgrade.
    pub max_trx: u64,
}

/// Allowed moves out of a tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TierJourney {
    pub current_tier_id: Uuid,
    #[serde(default)]
    pub next_1: Option<Uuid>,
    #[serde(default)]
    pub prev_1: Option<Uuid>,
    /// Two steps down. Kept with the graph; no rule consumes it.
    #[serde(default)]
    pub prev_2: Option<Uuid>,
}

/// Bonus points awarded when a customer reaches `at_trx` within a tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PointScheduleEntry {
    pub tier_id: Uuid,
    pub at_trx: u64,
    pub point: u32,
}

// ─── Transition Vocabulary ──────────────────────────────────────────────────

/// What happened to the customer's standing on a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierRemark {
    FirstTransaction,
    Upgrade,
    Downgrade,
    Reset,
    Maximum,
    None,
}

impl TierRemark {
    /// Human-readable text shown to customers and operators.
    pub fn description(&self) -> &'static str {
        match self {
            TierRemark::FirstTransaction => "FIRST TRANSACTION",
            TierRemark::Upgrade => "UPGRADE TO NEXT TIER",
            TierRemark::Downgrade => "DOWNGRADE TO PREVIOUS TIER",
            TierRemark::Reset => "RESET TO FIRST TIER",
            TierRemark::Maximum => "ALREADY GET POINT MAX TIER LEVEL",
            TierRemark::None => "",
        }
    }
}

/// The branch the transition engine took.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    /// First transaction ever; customer placed on the lowest tier.
    Enrolled,
    Keep,
    /// Top tier at or past its ceiling; the counter keeps growing.
    KeepAtCap,
    Upgrade,
    Downgrade,
    Reset,
}

impl TierStatus {
    pub fn remark(&self) -> TierRemark {
        match self {
            TierStatus::Enrolled => TierRemark::FirstTransaction,
            TierStatus::Keep => TierRemark::None,
            TierStatus::KeepAtCap => TierRemark::Maximum,
            TierStatus::Upgrade => TierRemark::Upgrade,
            TierStatus::Downgrade => TierRemark::Downgrade,
            TierStatus::Reset => TierRemark::Reset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TierStatus::Enrolled => "enrolled",
            TierStatus::Keep => "keep",
            TierStatus::KeepAtCap => "keep_at_cap",
            TierStatus::Upgrade => "upgrade",
            TierStatus::Downgrade => "downgrade",
            TierStatus::Reset => "reset",
        }
    }
}

// ─── Customer State ─────────────────────────────────────────────────────────

/// A purchase to fold into a customer's standing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TransactionEvent {
    pub customer_id: Uuid,
    pub transaction_id: Uuid,
    pub transaction_time: DateTime<Utc>,
}

/// Current standing of one customer. One row per customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CustomerLoyaltyState {
    pub customer_id: Uuid,
    pub tier_id: Uuid,
    /// Transactions counted in the current tier, always at least 1.
    pub total_trx: u64,
    pub last_transaction_id: Uuid,
    pub last_transaction_time: DateTime<Utc>,
    pub last_point_awarded: u32,
    pub last_remark: TierRemark,
}

/// Immutable record of one processed transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HistoryRecord {
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub transaction_time: DateTime<Utc>,
    pub tier_id: Uuid,
    pub total_trx: u64,
    pub point: u32,
    pub remark: TierRemark,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Snapshot the state as it stands right after a transaction.
    pub fn from_state(state: &CustomerLoyaltyState, recorded_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: state.last_transaction_id,
            customer_id: state.customer_id,
            transaction_time: state.last_transaction_time,
            tier_id: state.tier_id,
            total_trx: state.total_trx,
            point: state.last_point_awarded,
            remark: state.last_remark,
            recorded_at,
        }
    }
}

// ─── Read Models ────────────────────────────────────────────────────────────

/// Outcome of processing one transaction, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ProcessedTransaction {
    pub customer_id: Uuid,
    pub transaction_id: Uuid,
    pub transaction_time: DateTime<Utc>,
    pub status: TierStatus,
    pub tier_id: Uuid,
    pub tier: TierName,
    pub total_trx: u64,
    pub point: u32,
    pub remark: TierRemark,
    pub remark_text: String,
}

/// Where a customer stands, for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CustomerSummary {
    pub customer_id: Uuid,
    pub tier: TierName,
    pub total_trx: u64,
    pub max_trx: u64,
}

/// A tier with its point checkpoints, ordered by `at_trx`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TierWithPoints {
    #[serde(flatten)]
    pub tier: Tier,
    pub points: Vec<PointScheduleEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_name_ordering() {
        assert!(TierName::Bronze < TierName::Silver);
        assert!(TierName::Silver < TierName::Gold);
        assert_eq!(TierName::Gold.to_string(), "GOLD");
    }

    #[test]
    fn test_status_remarks() {
        assert_eq!(TierStatus::Enrolled.remark(), TierRemark::FirstTransaction);
        assert_eq!(TierStatus::Keep.remark(), TierRemark::None);
        assert_eq!(TierStatus::KeepAtCap.remark(), TierRemark::Maximum);
        assert_eq!(TierRemark::None.description(), "");
        assert_eq!(TierRemark::Reset.description(), "RESET TO FIRST TIER");
    }

    #[test]
    fn test_remark_serializes_as_tag() {
        let json = serde_json::to_string(&TierRemark::FirstTransaction).unwrap();
        assert_eq!(json, "\"FIRST_TRANSACTION\"");
        let name: TierName = serde_json::from_str("\"SILVER\"").unwrap();
        assert_eq!(name, TierName::Silver);
    }

    #[test]
    fn test_history_record_mirrors_state() {
        let now = Utc::now();
        let state = CustomerLoyaltyState {
            customer_id: Uuid::new_v4(),
            tier_id: Uuid::new_v4(),
            total_trx: 3,
            last_transaction_id: Uuid::new_v4(),
            last_transaction_time: now,
            last_point_awarded: 5,
            last_remark: TierRemark::None,
        };
        let record = HistoryRecord::from_state(&state, now);
        assert_eq!(record.transaction_id, state.last_transaction_id);
        assert_eq!(record.tier_id, state.tier_id);
        assert_eq!(record.total_trx, 3);
        assert_eq!(record.point, 5);
    }
}
