use chrono::{Duration, Utc};
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::aging::{AgingReleaseRequest, AgingReleaseResponse, AgingStartRequest, AgingStartResponse};
use crate::models::enums::LotState;

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

pub async fn start_aging_txn(
    conn: &mut Conn,
    request: &AgingStartRequest,
) -> AppResult<AgingStartResponse> {
    let started_at = request.started_at.unwrap_or_else(Utc::now);
    let locked = lock_lot(conn, request.lot_id).await?;

    if locked.state == LotState::Quarantined {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is quarantined and cannot start aging",
            request.lot_id
        )));
    }
    if locked.state != LotState::Received {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot start aging (must be received)",
            request.lot_id, locked.state
        )));
    }

    let mut profile_query =
        Query::new("SELECT default_aging_days FROM ProcessProfile WHERE id = @P1");
    profile_query.bind(request.process_profile_id);
    let profile_row = profile_query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unknown process_profile_id {}",
                request.process_profile_id
            ))
        })?;
    let default_aging_days: Option<i32> = profile_row.get(0);
    let days = default_aging_days.ok_or_else(|| {
        AppError::Validation(format!(
            "Process profile {} has no default_aging_days configured",
            request.process_profile_id
        ))
    })?;

    let ready_at = started_at + Duration::days(days as i64);

    let mut location_check = Query::new("SELECT id FROM Location WHERE id = @P1");
    location_check.bind(request.aging_location_id);
    location_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unknown aging_location_id {}",
                request.aging_location_id
            ))
        })?;

    // Event must be written before the state-changing UPDATE: the Audit
    // Guard trigger fires AFTER UPDATE and checks for a matching LotEvent
    // at that instant, not at commit time.
    let lot_event_id = insert_event(
        conn,
        request.lot_id,
        "aging_started",
        Some(request.reason.as_str()),
        request.performed_by,
        started_at,
    )
    .await?;

    let mut update_lot = Query::new(
        "UPDATE Lot SET state = 'aging', aging_started_at = @P2, ready_at = @P3, current_location_id = @P4 WHERE id = @P1",
    );
    update_lot.bind(request.lot_id);
    update_lot.bind(started_at);
    update_lot.bind(ready_at);
    update_lot.bind(request.aging_location_id);
    update_lot.execute(&mut *conn).await?;

    Ok(AgingStartResponse {
        lot_id: request.lot_id,
        state: LotState::Aging.as_str().to_string(),
        aging_started_at: started_at,
        ready_at,
        lot_event_id,
    })
}

pub async fn start_aging(pool: &DbPool, request: AgingStartRequest) -> AppResult<AgingStartResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match start_aging_txn(&mut conn, &request).await {
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

pub async fn release_aging_txn(
    conn: &mut Conn,
    request: &AgingReleaseRequest,
) -> AppResult<AgingReleaseResponse> {
    let released_at = request.released_at.unwrap_or_else(Utc::now);
    let locked = lock_lot(conn, request.lot_id).await?;

    if locked.state == LotState::Quarantined {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is quarantined and cannot be released",
            request.lot_id
        )));
    }
    if locked.state != LotState::Aging {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is {} and cannot be released (must be aging)",
            request.lot_id, locked.state
        )));
    }

    let ready_at = locked.ready_at.ok_or_else(|| {
        AppError::BusinessInvariant(format!("Lot {} has no ready_at set", request.lot_id))
    })?;
    if ready_at > released_at {
        return Err(AppError::BusinessInvariant(format!(
            "Lot {} is not ready (ready_at {} is after {})",
            request.lot_id, ready_at, released_at
        )));
    }

    let lot_event_id = insert_event(
        conn,
        request.lot_id,
        "released",
        Some(request.reason.as_str()),
        request.performed_by,
        released_at,
    )
    .await?;

    let mut update_lot = Query::new("UPDATE Lot SET state = 'released', released_at = @P2 WHERE id = @P1");
    update_lot.bind(request.lot_id);
    update_lot.bind(released_at);
    update_lot.execute(&mut *conn).await?;

    Ok(AgingReleaseResponse {
        lot_id: request.lot_id,
        state: LotState::Released.as_str().to_string(),
        released_at,
        lot_event_id,
    })
}

pub async fn release_aging(pool: &DbPool, request: AgingReleaseRequest) -> AppResult<AgingReleaseResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match release_aging_txn(&mut conn, &request).await {
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
