use serde::{Deserialize, Serialize};
use std::fmt;

/// Lot lifecycle state. String values are the wire/storage contract (§9)
/// and must remain stable — they are persisted verbatim in the `Lots.state`
/// column and pattern-matched by name throughout the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotState {
    Received,
    Aging,
    Released,
    Sold,
    Disposed,
    Quarantined,
}

impl LotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotState::Received => "received",
            LotState::Aging => "aging",
            LotState::Released => "released",
            LotState::Sold => "sold",
            LotState::Disposed => "disposed",
            LotState::Quarantined => "quarantined",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "received" => Some(LotState::Received),
            "aging" => Some(LotState::Aging),
            "released" => Some(LotState::Released),
            "sold" => Some(LotState::Sold),
            "disposed" => Some(LotState::Disposed),
            "quarantined" => Some(LotState::Quarantined),
            _ => None,
        }
    }

    /// Terminal for most operations: breakdown, rework, mix, reservation, sale.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LotState::Sold | LotState::Disposed | LotState::Quarantined)
    }
}

impl fmt::Display for LotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// InventoryMovement.move_type. IN/OUT/LOSS classification lives in
/// `services::availability_service`, not here — this is only the storage tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    Receiving,
    BreakdownInput,
    BreakdownOutput,
    MixInput,
    MixOutput,
    ReworkInput,
    ReworkOutput,
    ReworkRemainder,
    QaSplitInput,
    QaPassOutput,
    QaFailOutput,
    Sale,
    AdjustmentIn,
    AdjustmentOut,
    /// `breakdown_loss:{CODE}` — the loss type code is carried in the
    /// string form, so this variant is rendered with `MoveType::loss(code)`
    /// rather than a fixed suffix.
    BreakdownLoss(String),
    /// `rework_loss:{CODE}`
    ReworkLoss(String),
}

impl MoveType {
    pub fn loss(code: &str) -> Self {
        MoveType::BreakdownLoss(code.to_string())
    }

    pub fn rework_loss(code: &str) -> Self {
        MoveType::ReworkLoss(code.to_string())
    }

    pub fn as_string(&self) -> String {
        match self {
            MoveType::Receiving => "receiving".to_string(),
            MoveType::BreakdownInput => "breakdown_input".to_string(),
            MoveType::BreakdownOutput => "breakdown_output".to_string(),
            MoveType::MixInput => "mix_input".to_string(),
            MoveType::MixOutput => "mix_output".to_string(),
            MoveType::ReworkInput => "rework_input".to_string(),
            MoveType::ReworkOutput => "rework_output".to_string(),
            MoveType::ReworkRemainder => "rework_remainder".to_string(),
            MoveType::QaSplitInput => "qa_split_input".to_string(),
            MoveType::QaPassOutput => "qa_pass_output".to_string(),
            MoveType::QaFailOutput => "qa_fail_output".to_string(),
            MoveType::Sale => "sale".to_string(),
            MoveType::AdjustmentIn => "adjustment_in".to_string(),
            MoveType::AdjustmentOut => "adjustment_out".to_string(),
            MoveType::BreakdownLoss(code) => format!("breakdown_loss:{}", code),
            MoveType::ReworkLoss(code) => format!("rework_loss:{}", code),
        }
    }
}

/// ProductionOrder.process_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Breakdown,
    Mix,
    QaSplit,
    Rework,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Breakdown => "breakdown",
            ProcessType::Mix => "mix",
            ProcessType::QaSplit => "qa_split",
            ProcessType::Rework => "rework",
        }
    }
}

/// QACheck.mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaMode {
    Full,
    Partial,
}

/// OfflineQueue.status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineStatus {
    Queued,
    Applied,
    Conflict,
    Rejected,
}

impl OfflineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfflineStatus::Queued => "queued",
            OfflineStatus::Applied => "applied",
            OfflineStatus::Conflict => "conflict",
            OfflineStatus::Rejected => "rejected",
        }
    }
}

/// OfflineQueue.action_type — the initial supported set (§4.13). Unknown
/// action types are rejected at submit time by the adapter layer, which
/// only accepts this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Receiving,
    Breakdown,
    Sale,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Receiving => "receiving",
            ActionType::Breakdown => "breakdown",
            ActionType::Sale => "sale",
        }
    }
}
