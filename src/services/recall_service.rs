use chrono::Utc;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::recall::{QuarantineForwardRequest, QuarantineForwardResponse, RecallReportResponse};
use crate::services::traceability_service;

type Conn = Client<Compat<tokio::net::TcpStream>>;

pub async fn recall_report(pool: &DbPool, lot_id: i64) -> AppResult<RecallReportResponse> {
    let mut conn = pool.get().await?;

    let mut lot_check = Query::new("SELECT id FROM Lot WHERE id = @P1");
    lot_check.bind(lot_id);
    lot_check
        .query(&mut conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lot {}", lot_id)))?;

    let backward_lot_ids = traceability_service::backward_closure(&mut conn, lot_id).await?;
    let forward_lot_ids = traceability_service::forward_closure(&mut conn, lot_id).await?;
    let affected_customers = traceability_service::affected_customers(&mut conn, lot_id).await?;

    Ok(RecallReportResponse {
        lot_id,
        backward_lot_ids,
        forward_lot_ids,
        affected_customers,
    })
}

pub async fn quarantine_forward(
    pool: &DbPool,
    lot_id: i64,
    request: QuarantineForwardRequest,
) -> AppResult<QuarantineForwardResponse> {
    let mut conn = pool.get().await?;

    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    let result = match quarantine_forward_txn(&mut conn, lot_id, &request).await {
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

async fn quarantine_forward_txn(
    conn: &mut Conn,
    lot_id: i64,
    request: &QuarantineForwardRequest,
) -> AppResult<QuarantineForwardResponse> {
    let performed_at = request.performed_at.unwrap_or_else(Utc::now);

    let mut lot_check = Query::new("SELECT id FROM Lot WHERE id = @P1");
    lot_check.bind(lot_id);
    lot_check
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lot {}", lot_id)))?;

    let forward_lot_ids = traceability_service::forward_closure(conn, lot_id).await?;

    let mut quarantined_count = 0i64;
    let mut already_quarantined_count = 0i64;
    let mut lot_event_ids = Vec::new();

    for descendant_id in &forward_lot_ids {
        let mut state_query =
            Query::new("SELECT state FROM Lot WITH (UPDLOCK, ROWLOCK) WHERE id = @P1");
        state_query.bind(*descendant_id);
        let row = state_query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database(format!("Lot {} vanished mid-closure", descendant_id)))?;
        let state: &str = row.get(0).unwrap_or("received");

        if state == "quarantined" {
            already_quarantined_count += 1;
            continue;
        }

        // Event before UPDATE: the Audit Guard trigger fires AFTER UPDATE
        // and checks for a same-transaction LotEvent at that instant.
        let insert_event_sql = r#"
            INSERT INTO LotEvent (lot_id, event_type, reason, performed_by, performed_at, txid)
            OUTPUT INSERTED.id
            VALUES (@P1, 'quarantined_bulk', @P2, @P3, @P4, CAST(sys.dm_tran_current_transaction_id() AS BIGINT))
        "#;
        let mut insert_event = Query::new(insert_event_sql);
        insert_event.bind(*descendant_id);
        insert_event.bind(request.reason.as_str());
        insert_event.bind(request.performed_by);
        insert_event.bind(performed_at);

        let lot_event_id: i64 = insert_event
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT LotEvent did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("lot_event id column missing".to_string()))?;

        let mut update_state = Query::new("UPDATE Lot SET state = 'quarantined' WHERE id = @P1");
        update_state.bind(*descendant_id);
        update_state.execute(&mut *conn).await?;

        lot_event_ids.push(lot_event_id);
        quarantined_count += 1;
    }

    tracing::warn!(
        root_lot_id = %lot_id,
        quarantined_count = %quarantined_count,
        already_quarantined_count = %already_quarantined_count,
        "Forward quarantine applied"
    );

    Ok(QuarantineForwardResponse {
        root_lot_id: lot_id,
        forward_lot_ids,
        quarantined_count,
        already_quarantined_count,
        lot_event_ids,
    })
}
