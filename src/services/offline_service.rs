use chrono::Utc;
use serde_json::json;
use tiberius::{Client, Query};
use tokio_util::compat::Compat;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::breakdown::BreakdownRequest;
use crate::models::enums::{ActionType, OfflineStatus};
use crate::models::offline::{
    OfflineApplyRequest, OfflineApplyResponse, OfflineApplyResultRow, OfflineConflictView,
    OfflineResolveRequest, OfflineSubmitRequest, OfflineSubmitResponse, OfflineSubmitResult,
};
use crate::models::receiving::ReceivingRequest;
use crate::models::sale::SaleCreateRequest;
use crate::services::{breakdown_service, receiving_service, sales_service};

type Conn = Client<Compat<tokio::net::TcpStream>>;

/// Submit: each action becomes a queued row. Duplicate (client_id,
/// client_txn_id) is caught by the unique constraint and reported as
/// `duplicate` without error — idempotency, not failure.
pub async fn submit(pool: &DbPool, request: OfflineSubmitRequest) -> AppResult<OfflineSubmitResponse> {
    let mut conn = pool.get().await?;
    let mut results = Vec::with_capacity(request.actions.len());

    for action in &request.actions {
        let mut exists_query = Query::new(
            "SELECT id FROM OfflineQueue WHERE client_id = @P1 AND client_txn_id = @P2",
        );
        exists_query.bind(request.client_id.as_str());
        exists_query.bind(action.client_txn_id.as_str());
        if exists_query.query(&mut conn).await?.into_row().await?.is_some() {
            results.push(OfflineSubmitResult {
                client_txn_id: action.client_txn_id.clone(),
                status: "duplicate".to_string(),
                offline_queue_id: None,
            });
            continue;
        }

        let insert_sql = r#"
            INSERT INTO OfflineQueue (client_id, client_txn_id, action_type, payload, status, submitted_by, created_at)
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, @P3, @P4, 'queued', @P5, @P6)
        "#;
        let mut insert = Query::new(insert_sql);
        insert.bind(request.client_id.as_str());
        insert.bind(action.client_txn_id.as_str());
        insert.bind(action_type_str(action.action_type));
        insert.bind(action.payload.to_string());
        insert.bind(request.submitted_by);
        insert.bind(Utc::now());

        let offline_queue_id: i64 = insert
            .query(&mut conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::Database("INSERT OfflineQueue did not return an id".to_string()))?
            .get(0)
            .ok_or_else(|| AppError::Database("offline_queue id column missing".to_string()))?;

        results.push(OfflineSubmitResult {
            client_txn_id: action.client_txn_id.clone(),
            status: "queued".to_string(),
            offline_queue_id: Some(offline_queue_id),
        });
    }

    Ok(OfflineSubmitResponse { results })
}

fn action_type_str(action_type: ActionType) -> &'static str {
    action_type.as_str()
}

struct QueuedRow {
    id: i64,
    client_txn_id: String,
    action_type: String,
    payload: String,
}

/// Apply one queued row against the already-open SAVEPOINT-scoped
/// connection, calling each service's `_txn` function directly instead of
/// the online wrapper (which would open its own nested transaction).
async fn apply_one(conn: &mut Conn, row: &QueuedRow) -> AppResult<serde_json::Value> {
    match row.action_type.as_str() {
        "receiving" => {
            let request: ReceivingRequest = serde_json::from_str(&row.payload)
                .map_err(|e| AppError::Validation(format!("Invalid receiving payload: {}", e)))?;
            let result = receiving_service::create_lot_txn(conn, &request).await?;
            Ok(json!({ "lot_id": result.lot_id, "lot_code": result.lot_code }))
        }
        "breakdown" => {
            let request: BreakdownRequest = serde_json::from_str(&row.payload)
                .map_err(|e| AppError::Validation(format!("Invalid breakdown payload: {}", e)))?;
            let result = breakdown_service::breakdown_txn(conn, &request).await?;
            Ok(json!({
                "production_order_id": result.production_order_id,
                "outputs": result.outputs.iter().map(|o| o.id).collect::<Vec<_>>(),
            }))
        }
        "sale" => {
            let request: SaleCreateRequest = serde_json::from_str(&row.payload)
                .map_err(|e| AppError::Validation(format!("Invalid sale payload: {}", e)))?;
            let result = sales_service::create_sale_txn(conn, &request).await?;
            Ok(json!({ "sale_id": result.sale_id }))
        }
        other => Err(AppError::Validation(format!(
            "Unsupported offline action_type '{}'",
            other
        ))),
    }
}

async fn mark_rows(
    conn: &mut Conn,
    ids: &[i64],
    status: OfflineStatus,
    applied_at: Option<chrono::DateTime<Utc>>,
    conflict_reason: Option<&str>,
    server_refs: Option<&serde_json::Value>,
) -> AppResult<()> {
    for id in ids {
        let mut q = Query::new(
            "UPDATE OfflineQueue SET status = @P2, applied_at = @P3, conflict_reason = @P4, server_refs = @P5 WHERE id = @P1",
        );
        q.bind(*id);
        q.bind(status.as_str());
        q.bind(applied_at);
        q.bind(conflict_reason);
        q.bind(server_refs.map(|v| v.to_string()));
        q.execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_conflict(
    conn: &mut Conn,
    queue_id: i64,
    conflict_type: &str,
    details: &serde_json::Value,
) -> AppResult<()> {
    let mut q = Query::new(
        "INSERT INTO OfflineConflict (queue_id, conflict_type, details) VALUES (@P1, @P2, @P3)",
    );
    q.bind(queue_id);
    q.bind(conflict_type);
    q.bind(details.to_string());
    q.execute(&mut *conn).await?;
    Ok(())
}

/// Apply up to `limit` queued rows for a client, grouped contiguously by
/// client_txn_id. Each group is wrapped in its own SAVEPOINT so a failing
/// action rolls back only that group's writes, never the whole batch.
pub async fn apply(pool: &DbPool, request: OfflineApplyRequest) -> AppResult<OfflineApplyResponse> {
    let limit = request.limit.unwrap_or(50).clamp(1, 500);
    let mut conn = pool.get().await?;

    let select_sql = r#"
        SELECT TOP (@P2) id, client_txn_id, action_type, payload
        FROM OfflineQueue
        WHERE client_id = @P1 AND status = 'queued'
        ORDER BY created_at, id
    "#;
    let mut select = Query::new(select_sql);
    select.bind(request.client_id.as_str());
    select.bind(limit as i32);

    let rows = select.query(&mut conn).await?.into_first_result().await?;
    let queued: Vec<QueuedRow> = rows
        .iter()
        .map(|row| QueuedRow {
            id: row.get(0).unwrap_or(0),
            client_txn_id: row.get::<&str, _>(1).unwrap_or("").to_string(),
            action_type: row.get::<&str, _>(2).unwrap_or("").to_string(),
            payload: row.get::<&str, _>(3).unwrap_or("").to_string(),
        })
        .collect();

    // Group contiguous rows sharing the same client_txn_id.
    let mut groups: Vec<Vec<QueuedRow>> = Vec::new();
    for row in queued {
        match groups.last_mut() {
            Some(group) if group.last().map(|r| r.client_txn_id == row.client_txn_id).unwrap_or(false) => {
                group.push(row);
            }
            _ => groups.push(vec![row]),
        }
    }

    let mut applied_count = 0i64;
    let mut conflicts_count = 0i64;
    let mut rejected_count = 0i64;
    let mut results = Vec::new();

    // SAVE TRANSACTION only makes sense inside an enclosing transaction, and
    // SQL Server has no real per-savepoint commit — only the outer
    // transaction is ever committed. One BEGIN TRAN wraps the whole batch;
    // a failing group rolls back to its savepoint and the batch continues.
    conn.simple_query("BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;

    for (group_index, group) in groups.iter().enumerate() {
        let savepoint = format!("offline_group_{}", group_index);
        conn.simple_query(format!("SAVE TRANSACTION {}", savepoint))
            .await
            .map_err(|e| AppError::TransactionFailed(format!("SAVE TRANSACTION failed: {}", e)))?;

        let mut group_refs = Vec::new();
        let mut group_failure: Option<(String, bool)> = None; // (message, is_conflict)

        for row in group {
            match apply_one(&mut conn, row).await {
                Ok(server_refs) => group_refs.push((row.id, server_refs)),
                Err(e) => {
                    let message = e.to_string();
                    let is_conflict = AppError::is_conflict_signal(&message);
                    group_failure = Some((message, is_conflict));
                    break;
                }
            }
        }

        if let Some((message, is_conflict)) = group_failure {
            conn.simple_query(format!("ROLLBACK TRANSACTION {}", savepoint))
                .await
                .map_err(|e| AppError::TransactionFailed(format!("ROLLBACK TO SAVEPOINT failed: {}", e)))?;

            let status = if is_conflict {
                OfflineStatus::Conflict
            } else {
                OfflineStatus::Rejected
            };
            let ids: Vec<i64> = group.iter().map(|r| r.id).collect();
            let client_txn_id = group[0].client_txn_id.clone();
            let details = json!({
                "client_txn_id": client_txn_id,
                "reason": message,
                "actions": group.iter().map(|r| r.action_type.clone()).collect::<Vec<_>>(),
            });

            mark_rows(&mut conn, &ids, status, None, Some(message.as_str()), None).await?;

            if is_conflict {
                for id in &ids {
                    insert_conflict(&mut conn, *id, "conflict", &details).await?;
                }
                conflicts_count += ids.len() as i64;
            } else {
                rejected_count += ids.len() as i64;
            }

            for row in group {
                results.push(OfflineApplyResultRow {
                    offline_queue_id: row.id,
                    client_txn_id: row.client_txn_id.clone(),
                    status: status.as_str().to_string(),
                    server_refs: None,
                    reason: Some(message.clone()),
                });
            }
        } else {
            let applied_at = Some(Utc::now());
            for (id, server_refs) in &group_refs {
                mark_rows(
                    &mut conn,
                    &[*id],
                    OfflineStatus::Applied,
                    applied_at,
                    None,
                    Some(server_refs),
                )
                .await?;
            }
            applied_count += group.len() as i64;

            for (row, (_, server_refs)) in group.iter().zip(group_refs.iter()) {
                results.push(OfflineApplyResultRow {
                    offline_queue_id: row.id,
                    client_txn_id: row.client_txn_id.clone(),
                    status: "applied".to_string(),
                    server_refs: Some(server_refs.clone()),
                    reason: None,
                });
            }
        }
    }

    conn.simple_query("COMMIT TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("COMMIT TRAN failed: {}", e)))?;

    Ok(OfflineApplyResponse {
        applied: applied_count,
        conflicts: conflicts_count,
        rejected: rejected_count,
        results,
    })
}

pub async fn resolve(
    pool: &DbPool,
    offline_queue_id: i64,
    request: OfflineResolveRequest,
) -> AppResult<()> {
    let mut conn = pool.get().await?;

    let mut find = Query::new("SELECT id FROM OfflineConflict WHERE queue_id = @P1");
    find.bind(offline_queue_id);
    let conflict_row = find
        .query(&mut conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("OfflineConflict for queue_id {}", offline_queue_id)))?;
    let conflict_id: i64 = conflict_row
        .get(0)
        .ok_or_else(|| AppError::Database("conflict id column missing".to_string()))?;

    let mut update_queue = Query::new("UPDATE OfflineQueue SET status = 'rejected' WHERE id = @P1");
    update_queue.bind(offline_queue_id);
    update_queue.execute(&mut conn).await?;

    let mut update_conflict = Query::new(
        "UPDATE OfflineConflict SET resolution = @P2, resolved_by = @P3, resolved_at = @P4 WHERE id = @P1",
    );
    update_conflict.bind(conflict_id);
    update_conflict.bind(request.reason.as_str());
    update_conflict.bind(request.resolved_by);
    update_conflict.bind(Utc::now());
    update_conflict.execute(&mut conn).await?;

    Ok(())
}

/// Companion read endpoint, grounded on the original's `list_conflicts`:
/// resolution without visibility is not workable.
pub async fn list_conflicts(pool: &DbPool, resolved: Option<bool>) -> AppResult<Vec<OfflineConflictView>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT queue_id, conflict_type, details, resolution
        FROM OfflineConflict
        WHERE (@P1 IS NULL OR (resolution IS NOT NULL) = @P1)
        ORDER BY id DESC
    "#;
    let mut q = Query::new(sql);
    q.bind(resolved);

    let rows = q.query(&mut conn).await?.into_first_result().await?;
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let details_str: &str = row.get(2).unwrap_or("{}");
        let details: serde_json::Value =
            serde_json::from_str(details_str).unwrap_or(serde_json::Value::Null);
        views.push(OfflineConflictView {
            offline_queue_id: row.get(0).unwrap_or(0),
            conflict_type: row.get::<&str, _>(1).unwrap_or("").to_string(),
            details,
            resolution: row.get::<&str, _>(3).map(|s| s.to_string()),
        });
    }

    Ok(views)
}
