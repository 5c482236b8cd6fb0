//! Read-only reference data consumed by the transition engine: the tier
//! catalog, the tier journey graph, and the point schedule.
//!
//! All three are loaded once at startup and shared across every
//! transition, so lookups take `&self` and never block.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tier_core::loyalty::{PointScheduleEntry, Tier, TierJourney, TierName};
use tier_core::{TierError, TierResult};
use tracing::info;
use uuid::Uuid;

/// Level of the bottom tier in every program.
pub const LOWEST_LEVEL: u32 = 1;

/// Tier lookups by level and by id.
pub trait TierCatalog: Send + Sync {
    fn tier_by_level(&self, level: u32) -> TierResult<Tier>;

    fn tier_by_id(&self, id: Uuid) -> TierResult<Tier>;

    /// Highest configured level, i.e. the capped tier.
    fn highest_level(&self) -> TierResult<u32>;

    /// All tiers ordered by level.
    fn tiers(&self) -> Vec<Tier>;

    fn lowest_tier(&self) -> TierResult<Tier> {
        self.tier_by_level(LOWEST_LEVEL)
    }
}

/// Adjacency of the tier graph.
pub trait TierJourneyGraph: Send + Sync {
    fn journey(&self, tier_id: Uuid) -> TierResult<TierJourney>;

    /// Tier reached on upgrade. Absence is a data-integrity error.
    fn next_tier_id(&self, tier_id: Uuid) -> TierResult<Uuid> {
        self.journey(tier_id)?
            .next_1
            .ok_or(TierError::MissingJourneyEdge {
                tier_id,
                edge: "next_1",
            })
    }

    /// Tier reached on downgrade. Absence is a data-integrity error.
    fn prev_tier_id(&self, tier_id: Uuid) -> TierResult<Uuid> {
        self.journey(tier_id)?
            .prev_1
            .ok_or(TierError::MissingJourneyEdge {
                tier_id,
                edge: "prev_1",
            })
    }
}

/// Bonus points per (tier, transaction count) checkpoint.
pub trait PointSchedule: Send + Sync {
    /// Points for reaching `at_trx` in `tier_id`; 0 when no checkpoint exists.
    fn point_at(&self, tier_id: Uuid, at_trx: u64) -> u32;

    /// Checkpoints configured for a tier, ordered by `at_trx`.
    fn entries_for(&self, tier_id: Uuid) -> Vec<PointScheduleEntry>;
}

/// Serialized form of a loyalty program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDataDocument {
    pub tiers: Vec<Tier>,
    pub journeys: Vec<TierJourney>,
    #[serde(default)]
    pub points: Vec<PointScheduleEntry>,
}

/// Stable ids of the built-in program's tiers.
pub mod standard {
    use uuid::Uuid;

    pub const BRONZE: Uuid = Uuid::from_u128(0x6f1c_2b8e_0001_4a10_9c3e_5d0b_0000_0001);
    pub const SILVER: Uuid = Uuid::from_u128(0x6f1c_2b8e_0001_4a10_9c3e_5d0b_0000_0002);
    pub const GOLD: Uuid = Uuid::from_u128(0x6f1c_2b8e_0001_4a10_9c3e_5d0b_0000_0003);

    pub const MAX_TRX: u64 = 7;
}

/// Validated, immutable in-memory implementation of all three lookups.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    tiers: HashMap<Uuid, Tier>,
    levels: BTreeMap<u32, Uuid>,
    journeys: HashMap<Uuid, TierJourney>,
    points: HashMap<(Uuid, u64), u32>,
}

impl ReferenceData {
    pub fn new(document: ReferenceDataDocument) -> TierResult<Self> {
        let mut tiers = HashMap::with_capacity(document.tiers.len());
        let mut levels = BTreeMap::new();

        for tier in document.tiers {
            if tier.max_trx == 0 {
                return Err(TierError::InvalidReferenceData(format!(
                    "tier {} has a zero max_trx",
                    tier.name
                )));
            }
            if levels.insert(tier.level, tier.id).is_some() {
                return Err(TierError::InvalidReferenceData(format!(
                    "duplicate tier level {}",
                    tier.level
                )));
            }
            if tiers.insert(tier.id, tier.clone()).is_some() {
                return Err(TierError::InvalidReferenceData(format!(
                    "duplicate tier id {}",
                    tier.id
                )));
            }
        }

        match levels.keys().next() {
            Some(&LOWEST_LEVEL) => {}
            Some(level) => {
                return Err(TierError::InvalidReferenceData(format!(
                    "lowest tier must be level {LOWEST_LEVEL}, found {level}"
                )))
            }
            None => {
                return Err(TierError::InvalidReferenceData(
                    "program has no tiers".to_string(),
                ))
            }
        }

        let mut journeys = HashMap::with_capacity(document.journeys.len());
        for journey in document.journeys {
            let edges = [
                Some(journey.current_tier_id),
                journey.next_1,
                journey.prev_1,
                journey.prev_2,
            ];
            if let Some(unknown) = edges.into_iter().flatten().find(|id| !tiers.contains_key(id)) {
                return Err(TierError::InvalidReferenceData(format!(
                    "journey for {} refers to unknown tier {unknown}",
                    journey.current_tier_id
                )));
            }
            if journeys.insert(journey.current_tier_id, journey).is_some() {
                return Err(TierError::InvalidReferenceData(
                    "duplicate journey entry".to_string(),
                ));
            }
        }

        let mut points = HashMap::with_capacity(document.points.len());
        for entry in document.points {
            if !tiers.contains_key(&entry.tier_id) {
                return Err(TierError::InvalidReferenceData(format!(
                    "point checkpoint refers to unknown tier {}",
                    entry.tier_id
                )));
            }
            if points.insert((entry.tier_id, entry.at_trx), entry.point).is_some() {
                return Err(TierError::InvalidReferenceData(format!(
                    "duplicate point checkpoint at {} for tier {}",
                    entry.at_trx, entry.tier_id
                )));
            }
        }

        Ok(Self {
            tiers,
            levels,
            journeys,
            points,
        })
    }

    /// Load a program from a JSON document on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> TierResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let document: ReferenceDataDocument = serde_json::from_str(&raw)?;
        let data = Self::new(document)?;
        info!(
            path = %path.display(),
            tiers = data.tiers.len(),
            checkpoints = data.points.len(),
            "Loyalty reference data loaded"
        );
        Ok(data)
    }

    /// The built-in BRONZE → SILVER → GOLD program, 7 transactions per tier.
    pub fn standard_program() -> TierResult<Self> {
        use standard::{BRONZE, GOLD, MAX_TRX, SILVER};

        let tier = |id, name, level| Tier {
            id,
            name,
            level,
            max_trx: MAX_TRX,
        };
        let point = |tier_id, at_trx, point| PointScheduleEntry {
            tier_id,
            at_trx,
            point,
        };

        let document = ReferenceDataDocument {
            tiers: vec![
                tier(BRONZE, TierName::Bronze, 1),
                tier(SILVER, TierName::Silver, 2),
                tier(GOLD, TierName::Gold, 3),
            ],
            journeys: vec![
                // A downgrade from the bottom stays at the bottom.
                TierJourney {
                    current_tier_id: BRONZE,
                    next_1: Some(SILVER),
                    prev_1: Some(BRONZE),
                    prev_2: None,
                },
                TierJourney {
                    current_tier_id: SILVER,
                    next_1: Some(GOLD),
                    prev_1: Some(BRONZE),
                    prev_2: None,
                },
                TierJourney {
                    current_tier_id: GOLD,
                    next_1: None,
                    prev_1: Some(SILVER),
                    prev_2: Some(BRONZE),
                },
            ],
            points: vec![
                point(BRONZE, MAX_TRX, 10),
                point(SILVER, 1, 5),
                point(SILVER, MAX_TRX, 20),
                point(GOLD, 1, 10),
                point(GOLD, MAX_TRX, 30),
            ],
        };

        Self::new(document)
    }
}

impl TierCatalog for ReferenceData {
    fn tier_by_level(&self, level: u32) -> TierResult<Tier> {
        self.levels
            .get(&level)
            .and_then(|id| self.tiers.get(id))
            .cloned()
            .ok_or_else(|| TierError::TierNotFound(format!("level {level}")))
    }

    fn tier_by_id(&self, id: Uuid) -> TierResult<Tier> {
        self.tiers
            .get(&id)
            .cloned()
            .ok_or_else(|| TierError::TierNotFound(id.to_string()))
    }

    fn highest_level(&self) -> TierResult<u32> {
        self.levels
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| TierError::TierNotFound("highest level".to_string()))
    }

    fn tiers(&self) -> Vec<Tier> {
        self.levels
            .values()
            .filter_map(|id| self.tiers.get(id))
            .cloned()
            .collect()
    }
}

impl TierJourneyGraph for ReferenceData {
    fn journey(&self, tier_id: Uuid) -> TierResult<TierJourney> {
        self.journeys
            .get(&tier_id)
            .cloned()
            .ok_or_else(|| TierError::TierNotFound(format!("journey for tier {tier_id}")))
    }
}

impl PointSchedule for ReferenceData {
    fn point_at(&self, tier_id: Uuid, at_trx: u64) -> u32 {
        self.points.get(&(tier_id, at_trx)).copied().unwrap_or(0)
    }

    fn entries_for(&self, tier_id: Uuid) -> Vec<PointScheduleEntry> {
        let mut entries: Vec<PointScheduleEntry> = self
            .points
            .iter()
            .filter(|((id, _), _)| *id == tier_id)
            .map(|(&(tier_id, at_trx), &point)| PointScheduleEntry {
                tier_id,
                at_trx,
                point,
            })
            .collect();
        entries.sort_by_key(|e| e.at_trx);
        entries
    }
}
