//! Domain model: works, tiers, lineage edges and promotion audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Significance tier without lock metadata
///
/// Ordering follows promotion order: `Jam < Plate < Canon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TierKind {
    /// Raw contribution
    Jam,
    /// Curator-approved
    Plate,
    /// Permanent, irreversible
    Canon,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TierKind::Jam => "JAM",
            TierKind::Plate => "PLATE",
            TierKind::Canon => "CANON",
        }
    }

    /// The only transition out of this tier, or `None` at the terminal tier
    pub fn next(self) -> Option<TierKind> {
        match self {
            TierKind::Jam => Some(TierKind::Plate),
            TierKind::Plate => Some(TierKind::Canon),
            TierKind::Canon => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JAM" => Ok(TierKind::Jam),
            "PLATE" => Ok(TierKind::Plate),
            "CANON" => Ok(TierKind::Canon),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Current tier of a work
///
/// The canon lock lives inside the `Canon` variant, so lock metadata cannot
/// exist on a lower tier and nothing can clear it without leaving `Canon`,
/// which no transition does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "UPPERCASE")]
pub enum Tier {
    Jam,
    Plate,
    Canon {
        /// When the work was permanently locked
        locked_at: DateTime<Utc>,
        /// Curator reference that signed the lock
        locked_by: String,
    },
}

impl Tier {
    pub fn kind(&self) -> TierKind {
        match self {
            Tier::Jam => TierKind::Jam,
            Tier::Plate => TierKind::Plate,
            Tier::Canon { .. } => TierKind::Canon,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Tier::Canon { .. })
    }

    /// Build the tier a work lands in after a promotion to `kind`
    ///
    /// `locked_at` and `locked_by` are only retained for `Canon`.
    pub fn entered(kind: TierKind, locked_at: DateTime<Utc>, locked_by: &str) -> Self {
        match kind {
            TierKind::Jam => Tier::Jam,
            TierKind::Plate => Tier::Plate,
            TierKind::Canon => Tier::Canon {
                locked_at,
                locked_by: locked_by.to_string(),
            },
        }
    }
}

/// A creative work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: Uuid,
    /// Unique URL-safe handle
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

impl Work {
    /// New work in JAM
    pub fn new(slug: String, title: String, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug,
            title,
            description,
            tier: Tier::Jam,
            created_at: Utc::now(),
        }
    }

    pub fn tier_kind(&self) -> TierKind {
        self.tier.kind()
    }

    pub fn is_canon(&self) -> bool {
        self.tier.is_locked()
    }
}

/// Kind of derivation an edge records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeType {
    /// Direct derivative
    Fork,
    /// Combination of sources
    Merge,
    /// Looser influence
    Derived,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Fork => "FORK",
            EdgeType::Merge => "MERGE",
            EdgeType::Derived => "DERIVED",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FORK" => Ok(EdgeType::Fork),
            "MERGE" => Ok(EdgeType::Merge),
            "DERIVED" => Ok(EdgeType::Derived),
            other => Err(format!("unknown edge type: {}", other)),
        }
    }
}

/// Directed derivation edge: `source_id` is the parent, `target_id` the derivative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEdge {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub created_at: DateTime<Utc>,
}

impl WorkEdge {
    pub fn new(source_id: Uuid, target_id: Uuid, edge_type: EdgeType) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            edge_type,
            created_at: Utc::now(),
        }
    }
}

/// Immutable audit record of one tier transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub id: Uuid,
    pub work_id: Uuid,
    pub from_tier: TierKind,
    pub to_tier: TierKind,
    pub justification: String,
    /// Durable display name of the signing curator
    pub curator_name: String,
    pub created_at: DateTime<Utc>,
}

/// Curator resolved by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorIdentity {
    /// Stable reference recorded on the canon lock
    pub id: String,
    /// Name recorded on promotion events
    pub display_name: String,
}

impl CuratorIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
