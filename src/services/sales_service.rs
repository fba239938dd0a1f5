use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::LotState;
use crate::models::sale::{SaleCreateRequest, SaleCreateResponse};
use crate::services::availability_service;

type Conn = Client<Compat<tokio::net::TcpStream>>;

struct LockedLot {
    state: LotState,
    ready_at: Option<chrono::DateTime<Utc>>,
    current_location_id: Option<i64>,
}

async fn lock_lot(conn: &mut Conn, lot_id: i64) -> AppResult<LockedLot> {
    let mut q = Query::new(
        "SELECT state, ready_at, current_location_id FROM Lot WITH (UPDLOCK, ROWLOCK) WHERE id = @P1",
    );
    q.bind(lot_id);
    let row = q
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown lot_id {}", lot_id)))?;

    let state_str: &str = row.get(0).unwrap_or("received");
    let state = LotState::from_str_opt(state_str)
        .ok_or_else(|| AppError::Database(format!("Unrecognized lot state '{}'", state_str)))?;

    Ok(LockedLot {
        state,
        ready_at: row.get(1),
        current_location_id: row.get(2),
    })
}

/// A lot is sellable when released, ready, and not quarantined — the three
/// gates §4.11 names separately are folded into one predicate here since
/// they are always checked together at the point of sale.
fn is_sellable(state: LotState, ready_at: Option<chrono::DateTime<Utc>>, at: chrono::DateTime<Utc>) -> bool {
    state == LotState::Released && ready_at.map(|r| r <= at).unwrap_or(false)
}

pub async fn create_sale(pool: &DbPool, request: SaleCreateRequest) -> AppResult<SaleCreateResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match create_sale_txn(&mut conn, &request).await {
        Ok(result) => result,
        Err(e) => {
            let _ = conn.simple_query("ROLLBACK").await;
            return Err(e);
        }
    };

    conn.simple_query("COMMIT")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("COMMIT failed: {}", e)))?;

    Ok(result)
}

/// Exposed so the offline reconciler can dispatch into the same validation
/// on an already-open, SAVEPOINT-scoped connection.
pub async fn create_sale_txn(
    conn: &mut Conn,
    request: &SaleCreateRequest,
) -> AppResult<SaleCreateResponse> {
    if request.lines.is_empty() {
        return Err(AppError::Validation("lines must not be empty".to_string()));
    }

    let sold_at = request.sold_at.unwrap_or_else(Utc::now);

    let mut customer_check = Query::new("SELECT id FROM Customer WHERE id = @P1");
    customer_check.bind(request.customer_id);
    customer_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown customer_id {}", request.customer_id)))?;

    // Deadlock-free: lock every referenced lot exactly once, in ascending id
    // order, before reading any availability (§5).
    let mut distinct_lot_ids: Vec<i64> = request.lines.iter().map(|l| l.lot_id).collect();
    distinct_lot_ids.sort_unstable();
    distinct_lot_ids.dedup();

    let mut locked: BTreeMap<i64, LockedLot> = BTreeMap::new();
    for lot_id in &distinct_lot_ids {
        let lock = lock_lot(conn, *lot_id).await?;
        if !is_sellable(lock.state, lock.ready_at, sold_at) {
            return Err(AppError::BusinessInvariant(format!(
                "Lot {} is not released or not ready for sale",
                lot_id
            )));
        }
        locked.insert(*lot_id, lock);
    }

    // Sum repeated lines per lot before comparing against availability,
    // since a sale may reference the same lot more than once (§4.11).
    let mut qty_by_lot: BTreeMap<i64, Decimal> = BTreeMap::new();
    for line in &request.lines {
        *qty_by_lot.entry(line.lot_id).or_insert(Decimal::ZERO) += line.quantity_kg;
    }

    for (lot_id, total_qty) in &qty_by_lot {
        let lock = locked.get(lot_id).expect("locked above");
        let availability =
            availability_service::compute(conn, *lot_id, lock.state, lock.ready_at, sold_at).await?;
        if *total_qty > availability.available_for_sale_kg
            && !availability_service::within_tolerance(*total_qty, availability.available_for_sale_kg)
        {
            return Err(AppError::BusinessInvariant(format!(
                "Insufficient available quantity for sale on lot {}: requested {}, available {}",
                lot_id, total_qty, availability.available_for_sale_kg
            )));
        }
    }

    let mut insert_sale = Query::new(
        "INSERT INTO Sale (customer_id, sold_at, notes) OUTPUT INSERTED.id VALUES (@P1, @P2, @P3)",
    );
    insert_sale.bind(request.customer_id);
    insert_sale.bind(sold_at);
    insert_sale.bind(request.notes.as_deref());

    let sale_id: i64 = insert_sale
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT Sale did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("sale id column missing".to_string()))?;

    let mut sale_line_ids = Vec::with_capacity(request.lines.len());
    let mut movement_ids = Vec::with_capacity(request.lines.len());
    let mut lot_event_ids = Vec::with_capacity(request.lines.len());
    let mut touched_lots: HashSet<i64> = HashSet::new();

    for line in &request.lines {
        let lock = locked.get(&line.lot_id).expect("locked above");

        let mut insert_line = Query::new(
            "INSERT INTO SaleLine (sale_id, lot_id, quantity_kg) OUTPUT INSERTED.id VALUES (@P1, @P2, @P3)",
        );
        insert_line.bind(sale_id);
        insert_line.bind(line.lot_id);
        insert_line.bind(line.quantity_kg);
        let sale_line_id: i64 = insert_line
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT SaleLine did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("sale_line id column missing".to_string()))?;
        sale_line_ids.push(sale_line_id);

        let insert_movement_sql = r#"
            INSERT INTO InventoryMovement (lot_id, from_location_id, to_location_id, quantity_kg, moved_at, move_type)
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, NULL, @P3, @P4, 'sale')
        "#;
        let mut insert_movement = Query::new(insert_movement_sql);
        insert_movement.bind(line.lot_id);
        insert_movement.bind(lock.current_location_id);
        insert_movement.bind(line.quantity_kg);
        insert_movement.bind(sold_at);
        let movement_id: i64 = insert_movement
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT InventoryMovement did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("movement id column missing".to_string()))?;
        movement_ids.push(movement_id);

        let insert_event_sql = r#"
            INSERT INTO LotEvent (lot_id, event_type, reason, performed_by, performed_at, txid)
            OUTPUT INSERTED.id
            VALUES (@P1, 'sold', @P2, @P3, @P4, CAST(sys.dm_tran_current_transaction_id() AS BIGINT))
        "#;
        let mut insert_event = Query::new(insert_event_sql);
        insert_event.bind(line.lot_id);
        insert_event.bind(request.notes.as_deref());
        insert_event.bind(request.performed_by);
        insert_event.bind(sold_at);
        let lot_event_id: i64 = insert_event
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT LotEvent did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("lot_event id column missing".to_string()))?;
        lot_event_ids.push(lot_event_id);

        touched_lots.insert(line.lot_id);
    }

    // After all writes, check each distinct lot's remaining on-hand and flip
    // it to `sold` if it has been depleted to within tolerance of zero — the
    // Audit Guard is already satisfied by the `sold` event emitted above.
    for lot_id in touched_lots {
        let lock = locked.get(&lot_id).expect("locked above");
        let availability =
            availability_service::compute(conn, lot_id, lock.state, lock.ready_at, sold_at).await?;
        if availability_service::within_tolerance(availability.on_hand_kg, Decimal::ZERO) {
            let mut update_state = Query::new("UPDATE Lot SET state = 'sold' WHERE id = @P1");
            update_state.bind(lot_id);
            update_state.execute(&mut *conn).await?;
        }
    }

    tracing::info!(
        sale_id = %sale_id,
        customer_id = %request.customer_id,
        lines = %request.lines.len(),
        "Sale recorded"
    );

    Ok(SaleCreateResponse {
        sale_id,
        sale_line_ids,
        movement_ids,
        lot_event_ids,
    })
}
