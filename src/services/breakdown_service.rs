use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::breakdown::{BreakdownOutputOut, BreakdownRequest, BreakdownResponse};
use crate::models::enums::LotState;
use crate::models::reference::PROFILE_NAME_BREAKDOWN;
use crate::services::{availability_service, lot_code_service};

type Conn = Client<Compat<tokio::net::TcpStream>>;

struct LockedLot {
    state: LotState,
    supplier_id: Option<i64>,
    received_at: chrono::DateTime<Utc>,
    aging_started_at: Option<chrono::DateTime<Utc>>,
    ready_at: Option<chrono::DateTime<Utc>>,
    released_at: Option<chrono::DateTime<Utc>>,
    expires_at: Option<chrono::DateTime<Utc>>,
    current_location_id: Option<i64>,
}

async fn lock_lot(conn: &mut Conn, lot_id: i64) -> AppResult<LockedLot> {
    let sql = r#"
        SELECT state, supplier_id, received_at, aging_started_at, ready_at, released_at,
               expires_at, current_location_id
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
        expires_at: row.get(6),
        current_location_id: row.get(7),
    })
}

async fn fetch_profile_id_by_name(conn: &mut Conn, name: &str) -> AppResult<i64> {
    let mut q = Query::new("SELECT id FROM ProcessProfile WHERE name = @P1");
    q.bind(name);
    let row = q
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Process profile '{}' is not configured",
                name
            ))
        })?;
    row.get(0)
        .ok_or_else(|| AppError::Database("ProcessProfile id column missing".to_string()))
}

async fn active_loss_type_exists(conn: &mut Conn, code: &str) -> AppResult<bool> {
    let mut q = Query::new("SELECT 1 FROM LossType WHERE code = @P1 AND active = 1");
    q.bind(code);
    Ok(q.query(&mut *conn).await?.into_row().await?.is_some())
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

/// Pure business logic against an already-open transaction, shared with the
/// offline reconciler's dispatcher.
pub async fn breakdown_txn(
    conn: &mut Conn,
    request: &BreakdownRequest,
) -> AppResult<BreakdownResponse> {
    if request.outputs.is_empty() {
        return Err(AppError::Validation("outputs must not be empty".to_string()));
    }

    let performed_at = request.performed_at.unwrap_or_else(Utc::now);
    let input_lot = lock_lot(conn, request.input_lot_id).await?;

    if input_lot.state.is_terminal() {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot be broken down",
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

    if !availability_service::within_tolerance(request.input_quantity_kg, availability.available_kg)
    {
        return Err(AppError::BusinessInvariant(format!(
            "Weight mismatch: input_quantity_kg {} does not match available {} for lot {}",
            request.input_quantity_kg, availability.available_kg, request.input_lot_id
        )));
    }

    let mut received_total_query = Query::new(
        "SELECT SUM(quantity_kg) FROM InventoryMovement WHERE lot_id = @P1 AND move_type = 'receiving'",
    );
    received_total_query.bind(request.input_lot_id);
    let received_total: Option<Decimal> = received_total_query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .and_then(|row| row.get(0));
    if let Some(total) = received_total {
        if request.input_quantity_kg > total {
            return Err(AppError::BusinessInvariant(format!(
                "input_quantity_kg {} exceeds historical receiving total {} for lot {}",
                request.input_quantity_kg, total, request.input_lot_id
            )));
        }
    }

    let outputs_sum: Decimal = request.outputs.iter().map(|o| o.quantity_kg).sum();
    let losses_sum: Decimal = request.losses.iter().map(|l| l.quantity_kg).sum();
    if !availability_service::within_tolerance(
        outputs_sum + losses_sum,
        request.input_quantity_kg,
    ) {
        return Err(AppError::BusinessInvariant(format!(
            "Weight mismatch: outputs ({}) + losses ({}) must equal input_quantity_kg ({})",
            outputs_sum, losses_sum, request.input_quantity_kg
        )));
    }

    for loss in &request.losses {
        if !active_loss_type_exists(conn, &loss.loss_type).await? {
            return Err(AppError::Validation(format!(
                "Invalid or inactive loss_type '{}'",
                loss.loss_type
            )));
        }
    }

    let profile_id = fetch_profile_id_by_name(conn, PROFILE_NAME_BREAKDOWN).await?;

    let mut insert_order = Query::new(
        "INSERT INTO ProductionOrder (process_profile_id, process_type, is_rework, started_at, completed_at) \
         OUTPUT INSERTED.id VALUES (@P1, 'breakdown', 0, @P2, @P2)",
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
    insert_input.bind(request.input_quantity_kg);
    insert_input.execute(&mut *conn).await?;

    let mut movement_ids = Vec::new();
    let mut lot_event_ids = Vec::new();
    let mut loss_ids = Vec::new();
    let mut output_refs = Vec::new();

    let input_movement_id = insert_movement(
        conn,
        request.input_lot_id,
        input_lot.current_location_id,
        None,
        request.input_quantity_kg,
        performed_at,
        "breakdown_input",
    )
    .await?;
    movement_ids.push(input_movement_id);

    for output in &request.outputs {
        let lot_code = lot_code_service::next_lot_code(conn, "BD", performed_at).await?;

        let mut insert_output_lot = Query::new(
            r#"
            INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, aging_started_at,
                              ready_at, released_at, expires_at, current_location_id)
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10)
            "#,
        );
        insert_output_lot.bind(lot_code.as_str());
        insert_output_lot.bind(output.item_id);
        insert_output_lot.bind(input_lot.supplier_id);
        insert_output_lot.bind(input_lot.state.as_str());
        insert_output_lot.bind(input_lot.received_at);
        insert_output_lot.bind(input_lot.aging_started_at);
        insert_output_lot.bind(input_lot.ready_at);
        insert_output_lot.bind(input_lot.released_at);
        insert_output_lot.bind(input_lot.expires_at);
        insert_output_lot.bind(output.to_location_id);

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
        insert_prod_output.bind(output.quantity_kg);
        insert_prod_output.execute(&mut *conn).await?;

        let output_movement_id = insert_movement(
            conn,
            output_lot_id,
            None,
            Some(output.to_location_id),
            output.quantity_kg,
            performed_at,
            "breakdown_output",
        )
        .await?;
        movement_ids.push(output_movement_id);

        let output_event_id = insert_event(
            conn,
            output_lot_id,
            "created_from_breakdown",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;
        lot_event_ids.push(output_event_id);

        output_refs.push(BreakdownOutputOut {
            id: output_lot_id,
            lot_code,
        });
    }

    for loss in &request.losses {
        let mut insert_loss = Query::new(
            "INSERT INTO BreakdownLoss (order_id, loss_type, quantity_kg, notes) \
             OUTPUT INSERTED.id VALUES (@P1, @P2, @P3, @P4)",
        );
        insert_loss.bind(production_order_id);
        insert_loss.bind(loss.loss_type.as_str());
        insert_loss.bind(loss.quantity_kg);
        insert_loss.bind(loss.notes.as_deref());
        let loss_id: i64 = insert_loss
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT BreakdownLoss did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("loss id column missing".to_string()))?;
        loss_ids.push(loss_id);

        let loss_move_type = format!("breakdown_loss:{}", loss.loss_type);
        let loss_movement_id = insert_movement(
            conn,
            request.input_lot_id,
            input_lot.current_location_id,
            None,
            loss.quantity_kg,
            performed_at,
            &loss_move_type,
        )
        .await?;
        movement_ids.push(loss_movement_id);

        let loss_event_id = insert_event(
            conn,
            request.input_lot_id,
            &loss_move_type,
            loss.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;
        lot_event_ids.push(loss_event_id);
    }

    // Event before UPDATE: the Audit Guard trigger fires AFTER UPDATE and
    // checks for a same-transaction LotEvent at that instant. Unlike
    // rework/QA-partial, a breakdown with no losses writes no prior event
    // on input_lot_id, so this ordering matters here even when losses are
    // empty.
    let disposed_event_id = insert_event(
        conn,
        request.input_lot_id,
        "disposed",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;
    lot_event_ids.push(disposed_event_id);

    let mut dispose_input = Query::new("UPDATE Lot SET state = 'disposed' WHERE id = @P1");
    dispose_input.bind(request.input_lot_id);
    dispose_input.execute(&mut *conn).await?;

    tracing::info!(
        production_order_id = %production_order_id,
        input_lot_id = %request.input_lot_id,
        outputs = %request.outputs.len(),
        losses = %request.losses.len(),
        "Breakdown recorded"
    );

    Ok(BreakdownResponse {
        production_order_id,
        outputs: output_refs,
        movement_ids,
        loss_ids,
        lot_event_ids,
    })
}

pub async fn breakdown(pool: &DbPool, request: BreakdownRequest) -> AppResult<BreakdownResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match breakdown_txn(&mut conn, &request).await {
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
