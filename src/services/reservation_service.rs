use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::enums::LotState;
use crate::models::reservation::{
    ReservationCancelRequest, ReservationCancelResponse, ReservationCreateRequest,
    ReservationCreateResponse, ReservationListQuery, ReservationView,
};
use crate::services::availability_service;

type Conn = Client<Compat<tokio::net::TcpStream>>;

struct LockedLot {
    state: LotState,
    ready_at: Option<chrono::DateTime<Utc>>,
}

async fn lock_lot(conn: &mut Conn, lot_id: i64) -> AppResult<LockedLot> {
    let mut q = Query::new("SELECT state, ready_at FROM Lot WITH (UPDLOCK, ROWLOCK) WHERE id = @P1");
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
    })
}

pub async fn create_reservation(
    pool: &DbPool,
    request: ReservationCreateRequest,
) -> AppResult<ReservationCreateResponse> {
    if request.quantity_kg <= Decimal::ZERO {
        return Err(AppError::Validation(
            "quantity_kg must be positive".to_string(),
        ));
    }

    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match create_reservation_txn(&mut conn, &request).await {
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

async fn create_reservation_txn(
    conn: &mut Conn,
    request: &ReservationCreateRequest,
) -> AppResult<ReservationCreateResponse> {
    let reserved_at = request.reserved_at.unwrap_or_else(Utc::now);
    let locked = lock_lot(conn, request.lot_id).await?;

    if matches!(
        locked.state,
        LotState::Quarantined | LotState::Disposed | LotState::Sold
    ) {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot be reserved",
            request.lot_id, locked.state
        )));
    }

    let mut customer_check = Query::new("SELECT id FROM Customer WHERE id = @P1");
    customer_check.bind(request.customer_id);
    customer_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown customer_id {}", request.customer_id)))?;

    let availability =
        availability_service::compute(conn, request.lot_id, locked.state, locked.ready_at, reserved_at)
            .await?;

    let remaining = availability.on_hand_kg - availability.reserved_kg;
    if request.quantity_kg > remaining
        && !availability_service::within_tolerance(request.quantity_kg, remaining)
    {
        return Err(AppError::BusinessInvariant(
            "Insufficient reservable quantity".to_string(),
        ));
    }

    let mut insert = Query::new(
        "INSERT INTO Reservation (lot_id, customer_id, quantity_kg, reserved_at) \
         OUTPUT INSERTED.id VALUES (@P1, @P2, @P3, @P4)",
    );
    insert.bind(request.lot_id);
    insert.bind(request.customer_id);
    insert.bind(request.quantity_kg);
    insert.bind(reserved_at);

    let reservation_id: i64 = insert
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT Reservation did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("reservation id column missing".to_string()))?;

    Ok(ReservationCreateResponse { reservation_id })
}

pub async fn cancel_reservation(
    pool: &DbPool,
    reservation_id: i64,
    request: ReservationCancelRequest,
) -> AppResult<ReservationCancelResponse> {
    if request.notes.trim().chars().count() < 2 {
        return Err(AppError::Validation(
            "notes must be at least 2 characters".to_string(),
        ));
    }

    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match cancel_reservation_txn(&mut conn, reservation_id, &request).await {
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

async fn cancel_reservation_txn(
    conn: &mut Conn,
    reservation_id: i64,
    request: &ReservationCancelRequest,
) -> AppResult<ReservationCancelResponse> {
    let canceled_at = request.canceled_at.unwrap_or_else(Utc::now);

    let mut find = Query::new(
        "SELECT r.lot_id, l.lot_code FROM Reservation r JOIN Lot l ON l.id = r.lot_id WHERE r.id = @P1",
    );
    find.bind(reservation_id);
    let row = find
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reservation {}", reservation_id)))?;

    let lot_id: i64 = row
        .get(0)
        .ok_or_else(|| AppError::Database("lot_id column missing".to_string()))?;
    let lot_code: &str = row.get(1).unwrap_or("");
    let lot_code = lot_code.to_string();

    let mut delete = Query::new("DELETE FROM Reservation WHERE id = @P1");
    delete.bind(reservation_id);
    delete.execute(&mut *conn).await?;

    let insert_event_sql = r#"
        INSERT INTO LotEvent (lot_id, event_type, reason, performed_by, performed_at, txid)
        OUTPUT INSERTED.id
        VALUES (@P1, 'reservation_canceled', @P2, @P3, @P4, CAST(sys.dm_tran_current_transaction_id() AS BIGINT))
    "#;
    let mut insert_event = Query::new(insert_event_sql);
    insert_event.bind(lot_id);
    insert_event.bind(request.notes.as_str());
    insert_event.bind(request.performed_by);
    insert_event.bind(canceled_at);

    let lot_event_id: i64 = insert_event
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("INSERT LotEvent did not return an id".to_string()))?
        .get(0)
        .ok_or_else(|| AppError::Database("lot_event id column missing".to_string()))?;

    Ok(ReservationCancelResponse {
        lot_id,
        lot_code,
        lot_event_id,
    })
}

/// Thin read projection, grounded on the original's `list_reservations`:
/// the only way an operator sees what is currently reserved.
pub async fn list_reservations(
    pool: &DbPool,
    query: ReservationListQuery,
) -> AppResult<Vec<ReservationView>> {
    let mut conn = pool.get().await?;

    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let sql = r#"
        SELECT TOP (@P1) r.id, r.lot_id, l.lot_code, l.state, r.customer_id, c.name, r.quantity_kg, r.reserved_at
        FROM Reservation r
        JOIN Lot l ON l.id = r.lot_id
        JOIN Customer c ON c.id = r.customer_id
        WHERE (@P2 IS NULL OR r.lot_id = @P2)
          AND (@P3 IS NULL OR r.customer_id = @P3)
        ORDER BY r.reserved_at DESC
    "#;
    let mut q = Query::new(sql);
    q.bind(limit as i32);
    q.bind(query.lot_id);
    q.bind(query.customer_id);

    let rows = q.query(&mut *conn).await?.into_first_result().await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(ReservationView {
            id: row.get(0).unwrap_or(0),
            lot_id: row.get(1).unwrap_or(0),
            lot_code: row.get::<&str, _>(2).unwrap_or("").to_string(),
            lot_state: row.get::<&str, _>(3).unwrap_or("").to_string(),
            customer_id: row.get(4).unwrap_or(0),
            customer_name: row.get::<&str, _>(5).unwrap_or("").to_string(),
            quantity_kg: row.get(6).unwrap_or(Decimal::ZERO),
            reserved_at: row
                .get(7)
                .ok_or_else(|| AppError::Database("reserved_at column missing".to_string()))?,
        });
    }

    Ok(results)
}
