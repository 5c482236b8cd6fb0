use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub type TierResult<T> = Result<T, TierError>;

#[derive(Error, Debug)]
pub enum TierError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reference data refers to a tier that does not exist.
    #[error("Tier not found: {0}")]
    TierNotFound(String),

    /// A transition needs a journey edge the graph does not define.
    #[error("Missing {edge} journey edge for tier {tier_id}")]
    MissingJourneyEdge { tier_id: Uuid, edge: &'static str },

    #[error("Invalid reference data: {0}")]
    InvalidReferenceData(String),

    #[error("Transaction {0} has already been processed")]
    DuplicateTransaction(Uuid),

    #[error(
        "Transaction {transaction_id} at {transaction_time} predates the last transaction at {last_transaction_time}"
    )]
    OutOfOrderTransaction {
        transaction_id: Uuid,
        transaction_time: DateTime<Utc>,
        last_transaction_time: DateTime<Utc>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TierError {
    /// Missing tiers and journey edges mean the reference data is broken;
    /// the transaction cannot be processed until it is fixed.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            TierError::TierNotFound(_)
                | TierError::MissingJourneyEdge { .. }
                | TierError::InvalidReferenceData(_)
        )
    }
}
