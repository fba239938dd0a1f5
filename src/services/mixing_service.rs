use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::LotState;
use crate::models::mixing::{MixRequest, MixResponse};
use crate::services::{availability_service, lot_code_service};

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

async fn profile_allows_mixing(conn: &mut Conn, profile_id: i64) -> AppResult<bool> {
    let mut q = Query::new("SELECT allows_lot_mixing FROM ProcessProfile WHERE id = @P1");
    q.bind(profile_id);
    let row = q
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown process_profile_id {}", profile_id)))?;
    Ok(row.get::<bool, _>(0).unwrap_or(false))
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

/// Mixing is treated as lossless per §9: Σinputs = output exactly, no
/// `BreakdownLoss` rows attached (the schema supports it for a future
/// mix-loss feature, but this contract does not populate it).
pub async fn mix_txn(conn: &mut Conn, request: &MixRequest) -> AppResult<MixResponse> {
    if request.inputs.is_empty() {
        return Err(AppError::Validation("inputs must not be empty".to_string()));
    }

    let performed_at = request.performed_at.unwrap_or_else(Utc::now);

    if !profile_allows_mixing(conn, request.process_profile_id).await? {
        return Err(AppError::BusinessInvariant(
            "Process profile does not allow lot mixing".to_string(),
        ));
    }

    let mut item_check = Query::new("SELECT id FROM Item WHERE id = @P1");
    item_check.bind(request.output_item_id);
    item_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!("Unknown output_item_id {}", request.output_item_id))
        })?;

    let mut location_check = Query::new("SELECT id FROM Location WHERE id = @P1");
    location_check.bind(request.output_location_id);
    location_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unknown output_location_id {}",
                request.output_location_id
            ))
        })?;

    let mut insert_order = Query::new(
        "INSERT INTO ProductionOrder (process_profile_id, process_type, is_rework, started_at, completed_at) \
         OUTPUT INSERTED.id VALUES (@P1, 'mix', 0, @P2, @P2)",
    );
    insert_order.bind(request.process_profile_id);
    insert_order.bind(performed_at);
    let production_order_id: i64 = insert_order
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT ProductionOrder did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("production order id column missing".to_string()))?;

    let mut movement_ids = Vec::new();
    let mut lot_event_ids = Vec::new();
    let mut total_input = Decimal::ZERO;

    for input in &request.inputs {
        let locked = lock_lot(conn, input.lot_id).await?;

        if locked.state != LotState::Released {
            return Err(AppError::BusinessInvariant(format!(
                "Lot {} is not released",
                input.lot_id
            )));
        }
        if locked.ready_at.map(|r| r > performed_at).unwrap_or(true) {
            return Err(AppError::BusinessInvariant(format!(
                "Lot {} is not ready",
                input.lot_id
            )));
        }

        let availability = availability_service::compute(
            conn,
            input.lot_id,
            locked.state,
            locked.ready_at,
            performed_at,
        )
        .await?;

        if input.quantity_kg > availability.available_kg
            && !availability_service::within_tolerance(input.quantity_kg, availability.available_kg)
        {
            return Err(AppError::BusinessInvariant(format!(
                "Insufficient available quantity on lot {}: requested {}, available {}",
                input.lot_id, input.quantity_kg, availability.available_kg
            )));
        }

        let mut insert_input = Query::new(
            "INSERT INTO ProductionInput (order_id, lot_id, quantity_kg) VALUES (@P1, @P2, @P3)",
        );
        insert_input.bind(production_order_id);
        insert_input.bind(input.lot_id);
        insert_input.bind(input.quantity_kg);
        insert_input.execute(&mut *conn).await?;

        let movement_id = insert_movement(
            conn,
            input.lot_id,
            locked.current_location_id,
            None,
            input.quantity_kg,
            performed_at,
            "mix_input",
        )
        .await?;
        movement_ids.push(movement_id);

        let event_id = insert_event(
            conn,
            input.lot_id,
            "mix_input",
            request.notes.as_deref(),
            request.performed_by,
            performed_at,
        )
        .await?;
        lot_event_ids.push(event_id);

        total_input += input.quantity_kg;
    }

    let output_lot_code = lot_code_service::next_lot_code(conn, "MIX", performed_at).await?;

    let mut insert_output_lot = Query::new(
        r#"
        INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, aging_started_at,
                          ready_at, released_at, current_location_id)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, NULL, 'released', @P3, @P3, @P3, @P3, @P4)
        "#,
    );
    insert_output_lot.bind(output_lot_code.as_str());
    insert_output_lot.bind(request.output_item_id);
    insert_output_lot.bind(performed_at);
    insert_output_lot.bind(request.output_location_id);

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
    insert_prod_output.bind(total_input);
    insert_prod_output.execute(&mut *conn).await?;

    let output_movement_id = insert_movement(
        conn,
        output_lot_id,
        None,
        Some(request.output_location_id),
        total_input,
        performed_at,
        "mix_output",
    )
    .await?;
    movement_ids.push(output_movement_id);

    let output_event_id = insert_event(
        conn,
        output_lot_id,
        "mix_output",
        request.notes.as_deref(),
        request.performed_by,
        performed_at,
    )
    .await?;
    lot_event_ids.push(output_event_id);

    tracing::info!(
        production_order_id = %production_order_id,
        output_lot_id = %output_lot_id,
        inputs = %request.inputs.len(),
        "Mix recorded"
    );

    Ok(MixResponse {
        production_order_id,
        output_lot_id,
        output_lot_code,
        movement_ids,
        lot_event_ids,
    })
}

pub async fn mix(pool: &DbPool, request: MixRequest) -> AppResult<MixResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match mix_txn(&mut conn, &request).await {
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
