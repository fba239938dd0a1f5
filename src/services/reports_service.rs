use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::{LotState, QaMode};
use crate::models::lot::{InventoryMovement, LotEvent};
use crate::models::qa::QaCheck;
use crate::models::reports::{
    AtRiskFlag, AtRiskQuery, AtRiskResponse, GenealogyOrderRef, LotDetailResponse, LotQuantities,
    StockQuery, StockResponse, StockRow,
};
use crate::models::reservation::Reservation;
use crate::models::sale::SaleLine;
use crate::services::availability_service;

type Conn = Client<Compat<tokio::net::TcpStream>>;

fn qa_mode_from_str(s: &str) -> QaMode {
    match s {
        "partial" => QaMode::Partial,
        _ => QaMode::Full,
    }
}

async fn genealogy_for(
    conn: &mut Conn,
    side_table: &str,
    other_table: &str,
    lot_id: i64,
) -> AppResult<Vec<GenealogyOrderRef>> {
    let find_orders_sql = format!(
        "SELECT DISTINCT order_id FROM {} WHERE lot_id = @P1",
        side_table
    );
    let mut q = Query::new(find_orders_sql);
    q.bind(lot_id);
    let order_rows = q.query(&mut *conn).await?.into_first_result().await?;

    let mut refs = Vec::with_capacity(order_rows.len());
    for row in order_rows {
        let order_id: i64 = row
            .get(0)
            .ok_or_else(|| AppError::Database("order_id column missing".to_string()))?;

        let mut type_query = Query::new("SELECT process_type FROM ProductionOrder WHERE id = @P1");
        type_query.bind(order_id);
        let process_type: String = type_query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .and_then(|r| r.get::<&str, _>(0).map(|s| s.to_string()))
            .unwrap_or_default();

        let other_sql = format!("SELECT lot_id FROM {} WHERE order_id = @P1", other_table);
        let mut other_query = Query::new(other_sql);
        other_query.bind(order_id);
        let lot_ids = other_query
            .query(&mut *conn)
            .await?
            .into_first_result()
            .await?
            .iter()
            .filter_map(|r| r.get::<i64, _>(0))
            .collect();

        refs.push(GenealogyOrderRef {
            production_order_id: order_id,
            process_type,
            lot_ids,
        });
    }

    Ok(refs)
}

pub async fn lot_detail(pool: &DbPool, lot_id: i64) -> AppResult<LotDetailResponse> {
    let mut conn = pool.get().await?;
    let now = Utc::now();

    let mut lot_query = Query::new(
        "SELECT lot_code, item_id, supplier_id, current_location_id, state, ready_at FROM Lot WHERE id = @P1",
    );
    lot_query.bind(lot_id);
    let lot_row = lot_query
        .query(&mut conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lot {}", lot_id)))?;

    let lot_code: &str = lot_row.get(0).unwrap_or("");
    let item_id: i64 = lot_row.get(1).unwrap_or(0);
    let supplier_id: Option<i64> = lot_row.get(2);
    let current_location_id: Option<i64> = lot_row.get(3);
    let state_str: &str = lot_row.get(4).unwrap_or("received");
    let state = LotState::from_str_opt(state_str)
        .ok_or_else(|| AppError::Database(format!("Unrecognized lot state '{}'", state_str)))?;
    let ready_at: Option<DateTime<Utc>> = lot_row.get(5);

    let availability = availability_service::compute(&mut conn, lot_id, state, ready_at, now).await?;

    let mut received_query =
        Query::new("SELECT quantity_kg FROM InventoryMovement WHERE lot_id = @P1 AND move_type = 'receiving'");
    received_query.bind(lot_id);
    let received_kg: Decimal = received_query
        .query(&mut conn)
        .await?
        .into_row()
        .await?
        .and_then(|r| r.get(0))
        .unwrap_or(Decimal::ZERO);

    let mut movements = Vec::new();
    let mut movement_query = Query::new(
        "SELECT id, lot_id, from_location_id, to_location_id, quantity_kg, moved_at, move_type \
         FROM InventoryMovement WHERE lot_id = @P1 ORDER BY moved_at",
    );
    movement_query.bind(lot_id);
    for row in movement_query.query(&mut conn).await?.into_first_result().await? {
        movements.push(InventoryMovement {
            id: row.get(0).unwrap_or(0),
            lot_id: row.get(1).unwrap_or(0),
            from_location_id: row.get(2),
            to_location_id: row.get(3),
            quantity_kg: row.get(4).unwrap_or(Decimal::ZERO),
            moved_at: row
                .get(5)
                .ok_or_else(|| AppError::Database("moved_at column missing".to_string()))?,
            move_type: row.get::<&str, _>(6).unwrap_or("").to_string(),
        });
    }

    let mut events = Vec::new();
    let mut event_query = Query::new(
        "SELECT id, lot_id, event_type, reason, performed_by, performed_at, txid \
         FROM LotEvent WHERE lot_id = @P1 ORDER BY performed_at",
    );
    event_query.bind(lot_id);
    for row in event_query.query(&mut conn).await?.into_first_result().await? {
        events.push(LotEvent {
            id: row.get(0).unwrap_or(0),
            lot_id: row.get(1).unwrap_or(0),
            event_type: row.get::<&str, _>(2).unwrap_or("").to_string(),
            reason: row.get::<&str, _>(3).map(|s| s.to_string()),
            performed_by: row.get(4).unwrap_or(0),
            performed_at: row
                .get(5)
                .ok_or_else(|| AppError::Database("performed_at column missing".to_string()))?,
            txid: row.get(6).unwrap_or(0),
        });
    }

    let mut reservations = Vec::new();
    let mut reservation_query =
        Query::new("SELECT id, lot_id, customer_id, quantity_kg, reserved_at FROM Reservation WHERE lot_id = @P1");
    reservation_query.bind(lot_id);
    for row in reservation_query.query(&mut conn).await?.into_first_result().await? {
        reservations.push(Reservation {
            id: row.get(0).unwrap_or(0),
            lot_id: row.get(1).unwrap_or(0),
            customer_id: row.get(2).unwrap_or(0),
            quantity_kg: row.get(3).unwrap_or(Decimal::ZERO),
            reserved_at: row
                .get(4)
                .ok_or_else(|| AppError::Database("reserved_at column missing".to_string()))?,
        });
    }

    let mut qa_checks = Vec::new();
    let mut qa_query = Query::new(
        "SELECT id, lot_id, check_type, passed, mode, pass_qty_kg, fail_qty_kg, pass_lot_id, fail_lot_id, performed_at \
         FROM QACheck WHERE lot_id = @P1 ORDER BY performed_at",
    );
    qa_query.bind(lot_id);
    for row in qa_query.query(&mut conn).await?.into_first_result().await? {
        qa_checks.push(QaCheck {
            id: row.get(0).unwrap_or(0),
            lot_id: row.get(1).unwrap_or(0),
            check_type: row.get::<&str, _>(2).unwrap_or("").to_string(),
            passed: row.get(3).unwrap_or(false),
            mode: qa_mode_from_str(row.get::<&str, _>(4).unwrap_or("full")),
            pass_qty_kg: row.get(5),
            fail_qty_kg: row.get(6),
            pass_lot_id: row.get(7),
            fail_lot_id: row.get(8),
            performed_at: row
                .get(9)
                .ok_or_else(|| AppError::Database("performed_at column missing".to_string()))?,
        });
    }

    let mut sale_lines = Vec::new();
    let mut sale_line_query =
        Query::new("SELECT id, sale_id, lot_id, quantity_kg FROM SaleLine WHERE lot_id = @P1");
    sale_line_query.bind(lot_id);
    for row in sale_line_query.query(&mut conn).await?.into_first_result().await? {
        sale_lines.push(SaleLine {
            id: row.get(0).unwrap_or(0),
            sale_id: row.get(1).unwrap_or(0),
            lot_id: row.get(2).unwrap_or(0),
            quantity_kg: row.get(3).unwrap_or(Decimal::ZERO),
        });
    }

    let as_input_to = genealogy_for(&mut conn, "ProductionInput", "ProductionOutput", lot_id).await?;
    let as_output_of = genealogy_for(&mut conn, "ProductionOutput", "ProductionInput", lot_id).await?;

    Ok(LotDetailResponse {
        lot_id,
        lot_code: lot_code.to_string(),
        item_id,
        supplier_id,
        current_location_id,
        state: state.as_str().to_string(),
        quantities: LotQuantities {
            received_kg,
            available_kg: availability.available_kg,
            reserved_kg: availability.reserved_kg,
            sellable_kg: availability.available_for_sale_kg,
        },
        movements,
        events,
        reservations,
        qa_checks,
        sale_lines,
        as_input_to,
        as_output_of,
    })
}

/// Lots in {aging, released, quarantined} with one or more risk flags: aging
/// with no ready_at configured, aging that has not yet reached ready_at,
/// expiry inside the horizon, or outright quarantine.
pub async fn at_risk(pool: &DbPool, query: AtRiskQuery) -> AppResult<AtRiskResponse> {
    let mut conn = pool.get().await?;
    let now = Utc::now();
    let horizon_days = query.expiring_soon_days.unwrap_or(7).clamp(1, 60);
    let horizon = now + Duration::days(horizon_days);

    let sql = r#"
        SELECT id, lot_code, state, ready_at, expires_at
        FROM Lot
        WHERE state IN ('aging', 'released', 'quarantined')
        ORDER BY id
    "#;
    let rows = Query::new(sql).query(&mut conn).await?.into_first_result().await?;

    let mut lots = Vec::new();
    for row in rows {
        let lot_id: i64 = row.get(0).unwrap_or(0);
        let lot_code: String = row.get::<&str, _>(1).unwrap_or("").to_string();
        let state_str: &str = row.get(2).unwrap_or("received");
        let state = LotState::from_str_opt(state_str)
            .ok_or_else(|| AppError::Database(format!("Unrecognized lot state '{}'", state_str)))?;
        let ready_at: Option<DateTime<Utc>> = row.get(3);
        let expires_at: Option<DateTime<Utc>> = row.get(4);

        let mut flags = Vec::new();
        if state == LotState::Aging && ready_at.is_none() {
            flags.push("aging_missing_ready_at".to_string());
        }
        if state == LotState::Aging {
            if let Some(r) = ready_at {
                if r > now {
                    flags.push("aging_not_ready".to_string());
                }
            }
        }
        if let Some(e) = expires_at {
            if e <= horizon {
                flags.push("expiring_soon".to_string());
            }
        }
        if state == LotState::Quarantined {
            flags.push("quarantined".to_string());
        }

        if !flags.is_empty() {
            lots.push(AtRiskFlag {
                lot_id,
                lot_code,
                state: state.as_str().to_string(),
                flags,
                ready_at,
                expires_at,
            });
        }
    }

    Ok(AtRiskResponse {
        as_of: now,
        horizon_days,
        lots,
    })
}

/// Non-disposed lots with positive availability (or all of them, when
/// `include_zero` is set), with per-lot available/reserved/sellable figures.
pub async fn stock(pool: &DbPool, query: StockQuery) -> AppResult<StockResponse> {
    let mut conn = pool.get().await?;
    let now = Utc::now();
    let include_zero = query.include_zero.unwrap_or(false);

    let sql = r#"
        SELECT id, lot_code, item_id, state, ready_at
        FROM Lot
        WHERE state != 'disposed'
          AND (@P1 IS NULL OR item_id = @P1)
        ORDER BY id
    "#;
    let mut q = Query::new(sql);
    q.bind(query.item_id);

    let rows = q.query(&mut conn).await?.into_first_result().await?;

    let mut result_rows = Vec::new();
    for row in rows {
        let lot_id: i64 = row.get(0).unwrap_or(0);
        let lot_code: String = row.get::<&str, _>(1).unwrap_or("").to_string();
        let item_id: i64 = row.get(2).unwrap_or(0);
        let state_str: &str = row.get(3).unwrap_or("received");
        let state = LotState::from_str_opt(state_str)
            .ok_or_else(|| AppError::Database(format!("Unrecognized lot state '{}'", state_str)))?;
        let ready_at: Option<DateTime<Utc>> = row.get(4);

        let availability = availability_service::compute(&mut conn, lot_id, state, ready_at, now).await?;

        if !include_zero && availability.available_kg <= Decimal::ZERO {
            continue;
        }

        result_rows.push(StockRow {
            lot_id,
            lot_code,
            item_id,
            state: state.as_str().to_string(),
            available_kg: availability.available_kg,
            reserved_kg: availability.reserved_kg,
            sellable_kg: availability.available_for_sale_kg,
        });
    }

    Ok(StockResponse { rows: result_rows })
}
