use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::{LotState, QaMode};
use crate::models::qa::{QaCheckRequest, QaCheckResponse};
use crate::models::reference::PROFILE_NAME_QA_SPLIT;
use crate::services::{availability_service, lot_code_service};

type Conn = Client<Compat<tokio::net::TcpStream>>;

struct LockedLot {
    state: LotState,
    supplier_id: Option<i64>,
    received_at: chrono::DateTime<Utc>,
    aging_started_at: Option<chrono::DateTime<Utc>>,
    ready_at: Option<chrono::DateTime<Utc>>,
    released_at: Option<chrono::DateTime<Utc>>,
    current_location_id: Option<i64>,
    item_id: i64,
}

async fn lock_lot(conn: &mut Conn, lot_id: i64) -> AppResult<LockedLot> {
    let sql = r#"
        SELECT state, supplier_id, received_at, aging_started_at, ready_at, released_at,
               current_location_id, item_id
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
        .ok_or_else(|| AppError::Validation(format!("Unknown lot_id {}", lot_id)))?;

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
        item_id: row
            .get(7)
            .ok_or_else(|| AppError::Database("item_id missing".to_string()))?,
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
        .ok_or_else(|| AppError::Validation(format!("Process profile '{}' is not configured", name)))?;
    row.get(0)
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

async fn insert_qa_check(
    conn: &mut Conn,
    lot_id: i64,
    check_type: &str,
    passed: bool,
    mode: &str,
    pass_qty_kg: Option<Decimal>,
    fail_qty_kg: Option<Decimal>,
    performed_at: chrono::DateTime<Utc>,
) -> AppResult<i64> {
    let sql = r#"
        INSERT INTO QACheck (lot_id, check_type, passed, mode, pass_qty_kg, fail_qty_kg, performed_at)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)
    "#;
    let mut q = Query::new(sql);
    q.bind(lot_id);
    q.bind(check_type);
    q.bind(passed);
    q.bind(mode);
    q.bind(pass_qty_kg);
    q.bind(fail_qty_kg);
    q.bind(performed_at);
    q.query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT QACheck did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("qa_check id column missing".to_string()))
}

async fn set_qa_check_lot_refs(
    conn: &mut Conn,
    qa_check_id: i64,
    pass_lot_id: Option<i64>,
    fail_lot_id: Option<i64>,
) -> AppResult<()> {
    let mut q = Query::new(
        "UPDATE QACheck SET pass_lot_id = @P2, fail_lot_id = @P3 WHERE id = @P1",
    );
    q.bind(qa_check_id);
    q.bind(pass_lot_id);
    q.bind(fail_lot_id);
    q.execute(&mut *conn).await?;
    Ok(())
}

async fn full_mode(
    conn: &mut Conn,
    request: &QaCheckRequest,
    performed_at: chrono::DateTime<Utc>,
) -> AppResult<QaCheckResponse> {
    let passed = request
        .passed
        .ok_or_else(|| AppError::Validation("passed is required in full mode".to_string()))?;

    let locked = lock_lot(conn, request.lot_id).await?;

    let qa_check_id = insert_qa_check(
        conn,
        request.lot_id,
        &request.check_type,
        passed,
        "full",
        None,
        None,
        performed_at,
    )
    .await?;

    let mut lot_event_id = None;
    let mut quarantined = false;

    if !passed && locked.state != LotState::Quarantined {
        // Event before UPDATE: the Audit Guard trigger fires AFTER UPDATE
        // and checks for a same-transaction LotEvent at that instant.
        let event_id = insert_event(
            conn,
            request.lot_id,
            "quarantined",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;

        let mut update_state =
            Query::new("UPDATE Lot SET state = 'quarantined' WHERE id = @P1");
        update_state.bind(request.lot_id);
        update_state.execute(&mut *conn).await?;

        lot_event_id = Some(event_id);
        quarantined = true;
    }

    Ok(QaCheckResponse {
        qa_check_id,
        quarantined,
        lot_event_id,
        pass_lot_id: None,
        fail_lot_id: None,
    })
}

async fn partial_mode(
    conn: &mut Conn,
    request: &QaCheckRequest,
    performed_at: chrono::DateTime<Utc>,
) -> AppResult<QaCheckResponse> {
    let pass_qty = request.pass_qty_kg.unwrap_or(Decimal::ZERO);
    let fail_qty = request.fail_qty_kg.unwrap_or(Decimal::ZERO);

    if pass_qty <= Decimal::ZERO && fail_qty <= Decimal::ZERO {
        return Err(AppError::Validation(
            "at least one of pass_qty_kg/fail_qty_kg must be positive in partial mode".to_string(),
        ));
    }

    let locked = lock_lot(conn, request.lot_id).await?;
    if locked.state.is_terminal() {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot be QA split",
            request.lot_id, locked.state
        )));
    }

    let availability = availability_service::compute(
        conn,
        request.lot_id,
        locked.state,
        locked.ready_at,
        performed_at,
    )
    .await?;

    if !availability_service::within_tolerance(pass_qty + fail_qty, availability.available_kg) {
        return Err(AppError::BusinessInvariant(format!(
            "Weight mismatch: pass_qty_kg {} + fail_qty_kg {} must equal available {} for lot {}",
            pass_qty, fail_qty, availability.available_kg, request.lot_id
        )));
    }

    let passed = fail_qty <= Decimal::ZERO;
    let qa_check_id = insert_qa_check(
        conn,
        request.lot_id,
        &request.check_type,
        passed,
        "partial",
        Some(pass_qty),
        Some(fail_qty),
        performed_at,
    )
    .await?;

    let profile_id = fetch_profile_id_by_name(conn, PROFILE_NAME_QA_SPLIT).await?;

    let mut insert_order = Query::new(
        "INSERT INTO ProductionOrder (process_profile_id, process_type, is_rework, started_at, completed_at) \
         OUTPUT INSERTED.id VALUES (@P1, 'qa_split', 0, @P2, @P2)",
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
    insert_input.bind(request.lot_id);
    insert_input.bind(availability.available_kg);
    insert_input.execute(&mut *conn).await?;

    insert_event(
        conn,
        request.lot_id,
        "qa_split",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;

    insert_movement(
        conn,
        request.lot_id,
        locked.current_location_id,
        None,
        availability.available_kg,
        performed_at,
        "qa_split_input",
    )
    .await?;

    let mut pass_lot_id = None;
    if pass_qty > Decimal::ZERO {
        let lot_code = lot_code_service::next_lot_code(conn, "QA", performed_at).await?;
        let id = allocate_split_output(
            conn,
            &lot_code,
            locked.item_id,
            locked.supplier_id,
            locked.state.as_str(),
            locked.received_at,
            locked.aging_started_at,
            locked.ready_at,
            locked.released_at,
            locked.current_location_id,
        )
        .await?;

        let mut insert_prod_output = Query::new(
            "INSERT INTO ProductionOutput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
        );
        insert_prod_output.bind(production_order_id);
        insert_prod_output.bind(id);
        insert_prod_output.bind(pass_qty);
        insert_prod_output.execute(&mut *conn).await?;

        insert_movement(
            conn,
            id,
            None,
            locked.current_location_id,
            pass_qty,
            performed_at,
            "qa_pass_output",
        )
        .await?;

        insert_event(
            conn,
            id,
            "qa_pass_output",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;

        pass_lot_id = Some(id);
    }

    let mut fail_lot_id = None;
    if fail_qty > Decimal::ZERO {
        let lot_code = lot_code_service::next_lot_code(conn, "QF", performed_at).await?;
        let id = allocate_split_output(
            conn,
            &lot_code,
            locked.item_id,
            locked.supplier_id,
            "quarantined",
            locked.received_at,
            locked.aging_started_at,
            locked.ready_at,
            locked.released_at,
            locked.current_location_id,
        )
        .await?;

        let mut insert_prod_output = Query::new(
            "INSERT INTO ProductionOutput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
        );
        insert_prod_output.bind(production_order_id);
        insert_prod_output.bind(id);
        insert_prod_output.bind(fail_qty);
        insert_prod_output.execute(&mut *conn).await?;

        insert_movement(
            conn,
            id,
            None,
            locked.current_location_id,
            fail_qty,
            performed_at,
            "qa_fail_output",
        )
        .await?;

        insert_event(
            conn,
            id,
            "qa_fail_output",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;

        fail_lot_id = Some(id);
    }

    set_qa_check_lot_refs(conn, qa_check_id, pass_lot_id, fail_lot_id).await?;

    let mut dispose_source = Query::new("UPDATE Lot SET state = 'disposed' WHERE id = @P1");
    dispose_source.bind(request.lot_id);
    dispose_source.execute(&mut *conn).await?;

    let disposed_event_id = insert_event(
        conn,
        request.lot_id,
        "disposed",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;

    Ok(QaCheckResponse {
        qa_check_id,
        quarantined: fail_qty > Decimal::ZERO,
        lot_event_id: Some(disposed_event_id),
        pass_lot_id,
        fail_lot_id,
    })
}

#[allow(clippy::too_many_arguments)]
async fn allocate_split_output(
    conn: &mut Conn,
    lot_code: &str,
    item_id: i64,
    supplier_id: Option<i64>,
    state: &str,
    received_at: chrono::DateTime<Utc>,
    aging_started_at: Option<chrono::DateTime<Utc>>,
    ready_at: Option<chrono::DateTime<Utc>>,
    released_at: Option<chrono::DateTime<Utc>>,
    current_location_id: Option<i64>,
) -> AppResult<i64> {
    let sql = r#"
        INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, aging_started_at,
                          ready_at, released_at, current_location_id)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)
    "#;
    let mut q = Query::new(sql);
    q.bind(lot_code);
    q.bind(item_id);
    q.bind(supplier_id);
    q.bind(state);
    q.bind(received_at);
    q.bind(aging_started_at);
    q.bind(ready_at);
    q.bind(released_at);
    q.bind(current_location_id);
    q.query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT split output Lot did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("split output lot id column missing".to_string()))
}

pub async fn qa_check_txn(
    conn: &mut Conn,
    request: &QaCheckRequest,
) -> AppResult<QaCheckResponse> {
    let performed_at = request.performed_at.unwrap_or_else(Utc::now);
    match request.mode {
        QaMode::Full => full_mode(conn, request, performed_at).await,
        QaMode::Partial => partial_mode(conn, request, performed_at).await,
    }
}

pub async fn qa_check(pool: &DbPool, request: QaCheckRequest) -> AppResult<QaCheckResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match qa_check_txn(&mut conn, &request).await {
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
