use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::LotState;

/// A traceable quantity of a single item from a single lineage step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub lot_code: String,
    pub item_id: i64,
    pub supplier_id: Option<i64>,
    pub state: LotState,
    pub received_at: DateTime<Utc>,
    pub aging_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub current_location_id: Option<i64>,
}

impl Lot {
    /// Breakdown/mix/rework/reservation/sale all forbid terminal states.
    pub fn is_eligible_for_consumption(&self) -> bool {
        !self.state.is_terminal()
    }
}

/// A signed, positive-valued record of material entering or leaving a lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: i64,
    pub lot_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity_kg: Decimal,
    pub moved_at: DateTime<Utc>,
    pub move_type: String,
}

/// An immutable audit entry attached to a lot. Never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotEvent {
    pub id: i64,
    pub lot_id: i64,
    pub event_type: String,
    pub reason: Option<String>,
    pub performed_by: i64,
    pub performed_at: DateTime<Utc>,
    /// DB transaction id the event was written under; correlated by the
    /// Audit Guard trigger against whichever transaction last changed the
    /// lot's lifecycle columns.
    pub txid: i64,
}

