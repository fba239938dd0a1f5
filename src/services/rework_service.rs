use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::LotState;
use crate::models::reference::PROFILE_NAME_REWORK;
use crate::models::rework::{ReworkLotRef, ReworkRequest, ReworkResponse};
use crate::services::{availability_service, lot_code_service};

type Conn = Client<Compat<tokio::net::TcpStream>>;

/// Remainder below this is not worth carrying as a sibling lot.
const REMAINDER_FLOOR_KG: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

struct LockedLot {
    state: LotState,
    supplier_id: Option<i64>,
    received_at: chrono::DateTime<Utc>,
    aging_started_at: Option<chrono::DateTime<Utc>>,
    ready_at: Option<chrono::DateTime<Utc>>,
    released_at: Option<chrono::DateTime<Utc>>,
    current_location_id: Option<i64>,
}

async fn lock_lot(conn: &mut Conn, lot_id: i64) -> AppResult<LockedLot> {
    let sql = r#"
        SELECT state, supplier_id, received_at, aging_started_at, ready_at, released_at, current_location_id
        FROM Lot WITH (UPDLOCK, ROWLOCK)
        WHERE id = @P1
    "#;
    let mut q = Query::new(sql);
    q.bind(lot_id);
    let row = q
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown input_lot_id {}", lot_id)))?;

    let state_str: &str = row.get(0).unwrap_or("received");
    let state = LotState::from_str_opt(state_str)
        .ok_or_else(|| AppError::Database(format!("Unrecognized lot state '{}'", state_str)))?;

    Ok(LockedLot {
        state,
        supplier_id: row.get(1),
        received_at: row
            .get(2)
            .ok_or_else(|| AppError::Database("received_at missing".to_string()))?,
        aging_started_at: row.get(3),
        ready_at: row.get(4),
        released_at: row.get(5),
        current_location_id: row.get(6),
    })
}

/// Unlike breakdown/QA split, rework keeps the source's fetch-or-create
/// behavior (§9 only calls out QA split's hard-coded id as needing fail-fast
/// treatment).
async fn fetch_or_create_rework_profile(conn: &mut Conn) -> AppResult<i64> {
    let mut select = Query::new("SELECT id FROM ProcessProfile WHERE name = @P1");
    select.bind(PROFILE_NAME_REWORK);
    if let Some(row) = select.query(&mut *conn).await?.into_row().await? {
        return row
            .get(0)
            .ok_or_else(|| AppError::Database("ProcessProfile id column missing".to_string()));
    }

    let mut insert = Query::new(
        "INSERT INTO ProcessProfile (name, allows_lot_mixing, default_aging_days, mode) \
         OUTPUT INSERTED.id VALUES (@P1, 0, NULL, NULL)",
    );
    insert.bind(PROFILE_NAME_REWORK);
    insert
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT ProcessProfile did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("ProcessProfile id column missing".to_string()))
}

async fn insert_movement(
    conn: &mut Conn,
    lot_id: i64,
    from_location_id: Option<i64>,
    to_location_id: Option<i64>,
    quantity_kg: Decimal,
    moved_at: chrono::DateTime<Utc>,
    move_type: &str,
) -> AppResult<i64> {
    let sql = r#"
        INSERT INTO InventoryMovement (lot_id, from_location_id, to_location_id, quantity_kg, moved_at, move_type)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6)
    "#;
    let mut q = Query::new(sql);
    q.bind(lot_id);
    q.bind(from_location_id);
    q.bind(to_location_id);
    q.bind(quantity_kg);
    q.bind(moved_at);
    q.bind(move_type);
    q.query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT InventoryMovement did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("movement id column missing".to_string()))
}

async fn insert_event(
    conn: &mut Conn,
    lot_id: i64,
    event_type: &str,
    reason: Option<&str>,
    performed_by: i64,
    performed_at: chrono::DateTime<Utc>,
) -> AppResult<i64> {
    let sql = r#"
        INSERT INTO LotEvent (lot_id, event_type, reason, performed_by, performed_at, txid)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, CAST(sys.dm_tran_current_transaction_id() AS BIGINT))
    "#;
    let mut q = Query::new(sql);
    q.bind(lot_id);
    q.bind(event_type);
    q.bind(reason);
    q.bind(performed_by);
    q.bind(performed_at);
    q.query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT LotEvent did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("lot_event id column missing".to_string()))
}

pub async fn rework_txn(conn: &mut Conn, request: &ReworkRequest) -> AppResult<ReworkResponse> {
    if request.rework_quantity_kg <= Decimal::ZERO {
        return Err(AppError::Validation(
            "rework_quantity_kg must be positive".to_string(),
        ));
    }

    let performed_at = request.performed_at.unwrap_or_else(Utc::now);
    let input_lot = lock_lot(conn, request.input_lot_id).await?;

    if input_lot.state.is_terminal() {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot be reworked",
            request.input_lot_id, input_lot.state
        )));
    }

    let availability = availability_service::compute(
        conn,
        request.input_lot_id,
        input_lot.state,
        input_lot.ready_at,
        performed_at,
    )
    .await?;

    if request.rework_quantity_kg > availability.available_kg
        && !availability_service::within_tolerance(
            request.rework_quantity_kg,
            availability.available_kg,
        )
    {
        return Err(AppError::BusinessInvariant(format!(
            "Insufficient available quantity on lot {}: requested {}, available {}",
            request.input_lot_id, request.rework_quantity_kg, availability.available_kg
        )));
    }

    let losses_sum: Decimal = request.losses.iter().map(|l| l.quantity_kg).sum();
    if losses_sum > request.rework_quantity_kg
        && !availability_service::within_tolerance(losses_sum, request.rework_quantity_kg)
    {
        return Err(AppError::BusinessInvariant(format!(
            "Weight mismatch: losses ({}) exceed rework_quantity_kg ({})",
            losses_sum, request.rework_quantity_kg
        )));
    }

    let remainder = (availability.available_kg - request.rework_quantity_kg).max(Decimal::ZERO);

    let profile_id = fetch_or_create_rework_profile(conn).await?;

    let mut insert_order = Query::new(
        "INSERT INTO ProductionOrder (process_profile_id, process_type, is_rework, started_at, completed_at) \
         OUTPUT INSERTED.id VALUES (@P1, 'rework', 1, @P2, @P2)",
    );
    insert_order.bind(profile_id);
    insert_order.bind(performed_at);
    let production_order_id: i64 = insert_order
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT ProductionOrder did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("production order id column missing".to_string()))?;

    let mut insert_input = Query::new(
        "INSERT INTO ProductionInput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
    );
    insert_input.bind(production_order_id);
    insert_input.bind(request.input_lot_id);
    insert_input.bind(availability.available_kg);
    insert_input.execute(&mut *conn).await?;

    insert_movement(
        conn,
        request.input_lot_id,
        input_lot.current_location_id,
        None,
        availability.available_kg,
        performed_at,
        "rework_input",
    )
    .await?;

    insert_event(
        conn,
        request.input_lot_id,
        "rework_consumed",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;

    let reworked_out = request.rework_quantity_kg - losses_sum;
    let output_lot_code = lot_code_service::next_lot_code(conn, "RW", performed_at).await?;

    let mut insert_output_lot = Query::new(
        r#"
        INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, aging_started_at,
                          ready_at, released_at, current_location_id)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)
        "#,
    );
    insert_output_lot.bind(output_lot_code.as_str());
    insert_output_lot.bind(request.output_item_id);
    insert_output_lot.bind(input_lot.supplier_id);
    insert_output_lot.bind(input_lot.state.as_str());
    insert_output_lot.bind(input_lot.received_at);
    insert_output_lot.bind(input_lot.aging_started_at);
    insert_output_lot.bind(input_lot.ready_at);
    insert_output_lot.bind(input_lot.released_at);
    insert_output_lot.bind(request.to_location_id);

    let output_lot_id: i64 = insert_output_lot
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT output Lot did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("output lot id column missing".to_string()))?;

    let mut insert_prod_output = Query::new(
        "INSERT INTO ProductionOutput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
    );
    insert_prod_output.bind(production_order_id);
    insert_prod_output.bind(output_lot_id);
    insert_prod_output.bind(reworked_out);
    insert_prod_output.execute(&mut *conn).await?;

    insert_movement(
        conn,
        output_lot_id,
        None,
        Some(request.to_location_id),
        reworked_out,
        performed_at,
        "rework_output",
    )
    .await?;

    insert_event(
        conn,
        output_lot_id,
        "rework_output",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;

    let output_lot = ReworkLotRef {
        id: output_lot_id,
        lot_code: output_lot_code,
        quantity_kg: reworked_out,
    };

    let remainder_lot = if remainder > REMAINDER_FLOOR_KG {
        let remainder_lot_code = lot_code_service::next_lot_code(conn, "RM", performed_at).await?;

        // Same item as the input, same location (§4.8). Read before the
        // input lot's UPDATE below so this isn't racing the disposal.
        let mut input_item_query = Query::new("SELECT item_id FROM Lot WHERE id = @P1");
        input_item_query.bind(request.input_lot_id);
        let input_item_id: i64 = input_item_query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("input lot vanished mid-transaction".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("item_id column missing".to_string()))?;

        let mut insert_remainder_lot2 = Query::new(
            r#"
            INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, aging_started_at,
                              ready_at, released_at, current_location_id)
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)
            "#,
        );
        insert_remainder_lot2.bind(remainder_lot_code.as_str());
        insert_remainder_lot2.bind(input_item_id);
        insert_remainder_lot2.bind(input_lot.supplier_id);
        insert_remainder_lot2.bind(input_lot.state.as_str());
        insert_remainder_lot2.bind(input_lot.received_at);
        insert_remainder_lot2.bind(input_lot.aging_started_at);
        insert_remainder_lot2.bind(input_lot.ready_at);
        insert_remainder_lot2.bind(input_lot.released_at);
        insert_remainder_lot2.bind(input_lot.current_location_id);

        let remainder_lot_id: i64 = insert_remainder_lot2
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT remainder Lot did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("remainder lot id column missing".to_string()))?;

        let mut insert_remainder_output = Query::new(
            "INSERT INTO ProductionOutput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
        );
        insert_remainder_output.bind(production_order_id);
        insert_remainder_output.bind(remainder_lot_id);
        insert_remainder_output.bind(remainder);
        insert_remainder_output.execute(&mut *conn).await?;

        insert_movement(
            conn,
            remainder_lot_id,
            None,
            input_lot.current_location_id,
            remainder,
            performed_at,
            "rework_remainder",
        )
        .await?;

        insert_event(
            conn,
            remainder_lot_id,
            "rework_remainder",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;

        Some(ReworkLotRef {
            id: remainder_lot_id,
            lot_code: remainder_lot_code,
            quantity_kg: remainder,
        })
    } else {
        None
    };

    for loss in &request.losses {
        let mut insert_loss = Query::new(
            "INSERT INTO BreakdownLoss (order_id, loss_type, quantity_kg, notes) \
             OUTPUT INSERTED.id VALUES (@P1, @P2, @P3, @P4)",
        );
        insert_loss.bind(production_order_id);
        insert_loss.bind(loss.loss_type.as_str());
        insert_loss.bind(loss.quantity_kg);
        insert_loss.bind(loss.notes.as_deref());
        insert_loss.query(&mut *conn).await?.into_row().await?;

        let loss_move_type = format!("rework_loss:{}", loss.loss_type);
        insert_movement(
            conn,
            request.input_lot_id,
            input_lot.current_location_id,
            None,
            loss.quantity_kg,
            performed_at,
            &loss_move_type,
        )
        .await?;

        insert_event(
            conn,
            request.input_lot_id,
            &loss_move_type,
            loss.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;
    }

    let mut dispose_input = Query::new("UPDATE Lot SET state = 'disposed' WHERE id = @P1");
    dispose_input.bind(request.input_lot_id);
    dispose_input.execute(&mut *conn).await?;

    insert_event(
        conn,
        request.input_lot_id,
        "disposed",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;

    tracing::info!(
        production_order_id = %production_order_id,
        input_lot_id = %request.input_lot_id,
        remainder_kg = %remainder,
        "Rework recorded"
    );

    Ok(ReworkResponse {
        production_order_id,
        input_lot_id: request.input_lot_id,
        output_lot,
        remainder_lot,
        loss_total_kg: losses_sum,
    })
}

pub async fn rework(pool: &DbPool, request: ReworkRequest) -> AppResult<ReworkResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match rework_txn(&mut conn, &request).await {
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
