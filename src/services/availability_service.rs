use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tiberius::Client;
use tokio_util::compat::Compat;

use crate::error::AppResult;
use crate::models::enums::LotState;

type Conn = Client<Compat<tokio::net::TcpStream>>;

/// Tolerance below which a quantity difference is treated as zero, per the
/// 1 g / 0.001 kg scale mandated for every mass-balance and availability
/// comparison in this system.
pub const QUANTITY_TOLERANCE_KG: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= QUANTITY_TOLERANCE_KG
}

/// IN move types that increase on-hand quantity (§4.2).
fn is_in_move(move_type: &str) -> bool {
    matches!(
        move_type,
        "receiving"
            | "breakdown_output"
            | "mix_output"
            | "adjustment_in"
            | "rework_output"
            | "rework_remainder"
            | "qa_pass_output"
            | "qa_fail_output"
    )
}

/// OUT move types that decrease on-hand quantity (§4.2).
fn is_out_move(move_type: &str) -> bool {
    matches!(
        move_type,
        "sale"
            | "breakdown_input"
            | "mix_input"
            | "adjustment_out"
            | "rework_input"
            | "qa_split_input"
    )
}

/// Any `breakdown_loss:*` or `rework_loss:*` movement reduces on-hand the
/// same way an OUT movement does (§4.2).
fn is_loss_move(move_type: &str) -> bool {
    move_type.starts_with("breakdown_loss:") || move_type.starts_with("rework_loss:")
}

#[derive(Debug, Clone, Copy)]
pub struct Availability {
    pub on_hand_kg: Decimal,
    pub reserved_kg: Decimal,
    pub available_kg: Decimal,
    pub available_for_sale_kg: Decimal,
}

/// Computes the four availability figures for a lot against whatever
/// transaction/connection the caller already has open. Must be called after
/// the caller has acquired the lot's row lock, and within the same
/// transaction as any write that depends on the result (§4.2).
pub async fn compute(
    conn: &mut Conn,
    lot_id: i64,
    state: LotState,
    ready_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<Availability> {
    let mut query = tiberius::Query::new(
        "SELECT move_type, quantity_kg FROM InventoryMovement WHERE lot_id = @P1",
    );
    query.bind(lot_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let mut on_hand = Decimal::ZERO;
    for row in &rows {
        let move_type: &str = row.get(0).unwrap_or("");
        let qty: Decimal = row.get(1).unwrap_or(Decimal::ZERO);
        if is_in_move(move_type) {
            on_hand += qty;
        } else if is_out_move(move_type) || is_loss_move(move_type) {
            on_hand -= qty;
        }
    }
    if on_hand < Decimal::ZERO {
        on_hand = Decimal::ZERO;
    }

    let mut reserve_query =
        tiberius::Query::new("SELECT quantity_kg FROM Reservation WHERE lot_id = @P1");
    reserve_query.bind(lot_id);
    let reserve_rows = reserve_query
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    let mut reserved = Decimal::ZERO;
    for row in &reserve_rows {
        let qty: Decimal = row.get(0).unwrap_or(Decimal::ZERO);
        reserved += qty;
    }

    let mut available = on_hand - reserved;
    if available < Decimal::ZERO {
        available = Decimal::ZERO;
    }

    let available_for_sale = if state == LotState::Released && ready_at.map(|r| r <= now).unwrap_or(false)
    {
        available
    } else {
        Decimal::ZERO
    };

    Ok(Availability {
        on_hand_kg: on_hand,
        reserved_kg: reserved,
        available_kg: available,
        available_for_sale_kg: available_for_sale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_out_loss_classification_is_exhaustive_and_disjoint() {
        assert!(is_in_move("receiving"));
        assert!(is_out_move("sale"));
        assert!(is_loss_move("breakdown_loss:DRIP"));
        assert!(is_loss_move("rework_loss:TRIM"));
        assert!(!is_in_move("sale"));
        assert!(!is_out_move("receiving"));
    }

    #[test]
    fn rework_output_and_remainder_count_as_in_moves() {
        // a RW or RM lot's only movement is rework_output/rework_remainder;
        // without this, its on_hand_kg is permanently zero
        assert!(is_in_move("rework_output"));
        assert!(is_in_move("rework_remainder"));
        assert!(!is_out_move("rework_output"));
        assert!(!is_out_move("rework_remainder"));
    }

    #[test]
    fn tolerance_absorbs_sub_gram_drift() {
        let a = Decimal::new(100_000, 3);
        let b = Decimal::new(100_0005, 4);
        assert!(within_tolerance(a, b));
        let c = Decimal::new(100_002, 3);
        assert!(!within_tolerance(a, c));
    }
}
