//! Lifecycle enums and wire types shared across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;

/// What a material row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Raw ingredient consumed by production (flour, butter, ...).
    Raw,
    /// Packaging material consumed when finished goods are packaged.
    Packaging,
    /// Finished product whose lots carry a lifecycle stage.
    Finished,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Raw => "raw",
            MaterialKind::Packaging => "packaging",
            MaterialKind::Finished => "finished",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(MaterialKind::Raw),
            "packaging" => Some(MaterialKind::Packaging),
            "finished" => Some(MaterialKind::Finished),
            _ => None,
        }
    }
}

/// Lot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotState {
    Available,
    Reserved,
    Depleted,
    Expired,
    Inactive,
}

impl LotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotState::Available => "available",
            LotState::Reserved => "reserved",
            LotState::Depleted => "depleted",
            LotState::Expired => "expired",
            LotState::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(LotState::Available),
            "reserved" => Some(LotState::Reserved),
            "depleted" => Some(LotState::Depleted),
            "expired" => Some(LotState::Expired),
            "inactive" => Some(LotState::Inactive),
            _ => None,
        }
    }

    /// States counted toward the available-stock aggregate.
    pub fn is_countable(&self) -> bool {
        matches!(self, LotState::Available | LotState::Reserved)
    }
}

/// Finished-goods lifecycle stage.
///
/// Lots leave production frozen and move into a sellable stage when packaged
/// or baked. The same lot code may exist in several stages at once while
/// material is in transit between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Frozen,
    Packaged,
    Baked,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Frozen => "frozen",
            Stage::Packaged => "packaged",
            Stage::Baked => "baked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "frozen" => Some(Stage::Frozen),
            "packaged" => Some(Stage::Packaged),
            "baked" => Some(Stage::Baked),
            _ => None,
        }
    }

    /// Sellable stages count toward externally visible available stock.
    pub fn is_sellable(&self) -> bool {
        matches!(self, Stage::Packaged | Stage::Baked)
    }

    /// Suffix appended to a source lot code when deriving the destination
    /// lot code of a stage transition.
    pub fn code_suffix(&self) -> &'static str {
        match self {
            Stage::Frozen => "F",
            Stage::Packaged => "P",
            Stage::Baked => "B",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an audit movement. Quantity is always a positive magnitude;
/// the type gives the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjust,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjust => "adjust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "adjust" => Some(MovementType::Adjust),
            _ => None,
        }
    }
}

/// Outbox job delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxState {
    Pending,
    Sent,
    Error,
}

impl OutboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxState::Pending => "pending",
            OutboxState::Sent => "sent",
            OutboxState::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxState::Pending),
            "sent" => Some(OutboxState::Sent),
            "error" => Some(OutboxState::Error),
            _ => None,
        }
    }
}

/// Payload posted to the external marketplace when finished goods enter a
/// sellable stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakePayload {
    /// Marketplace product identifier the bakery product is mapped to.
    pub marketplace_ref: String,
    pub lot_code: String,
    pub stage: Stage,
    pub quantity: Quantity,
    pub expires_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_string_round_trip() {
        for stage in [Stage::Frozen, Stage::Packaged, Stage::Baked] {
            assert_eq!(Stage::from_str(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::from_str("sold"), None);
    }

    #[test]
    fn sellable_stages() {
        assert!(!Stage::Frozen.is_sellable());
        assert!(Stage::Packaged.is_sellable());
        assert!(Stage::Baked.is_sellable());
    }

    #[test]
    fn countable_lot_states() {
        assert!(LotState::Available.is_countable());
        assert!(LotState::Reserved.is_countable());
        assert!(!LotState::Depleted.is_countable());
        assert!(!LotState::Expired.is_countable());
        assert!(!LotState::Inactive.is_countable());
    }

    #[test]
    fn stage_suffixes_are_distinct() {
        let suffixes = [
            Stage::Frozen.code_suffix(),
            Stage::Packaged.code_suffix(),
            Stage::Baked.code_suffix(),
        ];
        assert_eq!(suffixes.len(), 3);
        assert_ne!(suffixes[0], suffixes[1]);
        assert_ne!(suffixes[1], suffixes[2]);
    }
}
