use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::receiving::{ReceivingRequest, ReceivingResponse};
use crate::services::lot_code_service;

type Conn = Client<Compat<tokio::net::TcpStream>>;

/// Pure business logic against an already-open transaction/connection.
/// Shared by the online command path (`create_lot`, which owns the
/// transaction boundary) and the offline reconciler, which dispatches into
/// this same function from inside its own SAVEPOINT.
pub async fn create_lot_txn(
    conn: &mut Conn,
    request: &ReceivingRequest,
) -> AppResult<ReceivingResponse> {
    if request.quantity_kg <= Decimal::ZERO {
        return Err(AppError::Validation(
            "quantity_kg must be positive".to_string(),
        ));
    }

    let received_at = request.received_at.unwrap_or_else(Utc::now);

    let mut item_check = Query::new("SELECT id FROM Item WHERE id = @P1");
    item_check.bind(request.item_id);
    item_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown item_id {}", request.item_id)))?;

    let mut location_check = Query::new("SELECT id FROM Location WHERE id = @P1");
    location_check.bind(request.to_location_id);
    location_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!("Unknown to_location_id {}", request.to_location_id))
        })?;

    let lot_code = lot_code_service::next_lot_code(conn, "REC", received_at).await?;

    let insert_lot_sql = r#"
        INSERT INTO Lot (lot_code, item_id, supplier_id, state, received_at, current_location_id)
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, 'received', @P4, @P5)
    "#;
    let mut insert_lot = Query::new(insert_lot_sql);
    insert_lot.bind(lot_code.as_str());
    insert_lot.bind(request.item_id);
    insert_lot.bind(request.supplier_id);
    insert_lot.bind(received_at);
    insert_lot.bind(request.to_location_id);

    let lot_id: i64 = insert_lot
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT Lot did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("Lot id column missing".to_string()))?;

    let insert_movement_sql = r#"
        INSERT INTO InventoryMovement (lot_id, from_location_id, to_location_id, quantity_kg, moved_at, move_type)
        OUTPUT INSERTED.id
        VALUES (@P1, NULL, @P2, @P3, @P4, 'receiving')
    "#;
    let mut insert_movement = Query::new(insert_movement_sql);
    insert_movement.bind(lot_id);
    insert_movement.bind(request.to_location_id);
    insert_movement.bind(request.quantity_kg);
    insert_movement.bind(received_at);

    let movement_id: i64 = insert_movement
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT InventoryMovement did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("movement id column missing".to_string()))?;

    let insert_event_sql = r#"
        INSERT INTO LotEvent (lot_id, event_type, reason, performed_by, performed_at, txid)
        OUTPUT INSERTED.id
        VALUES (@P1, 'received', @P2, @P3, @P4, CAST(sys.dm_tran_current_transaction_id() AS BIGINT))
    "#;
    let mut insert_event = Query::new(insert_event_sql);
    insert_event.bind(lot_id);
    insert_event.bind(request.notes.as_deref());
    insert_event.bind(request.performed_by);
    insert_event.bind(received_at);

    let lot_event_id: i64 = insert_event
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT LotEvent did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("lot_event id column missing".to_string()))?;

    tracing::info!(
        lot_id = %lot_id,
        lot_code = %lot_code,
        item_id = %request.item_id,
        quantity_kg = %request.quantity_kg,
        "Lot received"
    );

    Ok(ReceivingResponse {
        lot_id,
        lot_code,
        movement_id,
        lot_event_id,
    })
}

/// Online wrapper that owns the transaction boundary, following the same
/// `BEGIN TRAN` / `ROLLBACK` / `COMMIT` shape used throughout this codebase's
/// write-path services.
pub async fn create_lot(pool: &DbPool, request: ReceivingRequest) -> AppResult<ReceivingResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match create_lot_txn(&mut conn, &request).await {
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
