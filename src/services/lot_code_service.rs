use chrono::{DateTime, Utc};
use tiberius::Query;

use crate::error::{AppError, AppResult};

/// Allocates the next sequential lot code for a (date, prefix) pair.
///
/// Mirrors `sequence_service::get_next_value`'s lock-then-read shape, but the
/// counter row is keyed by (code_date, prefix) instead of a single sequence
/// name, and the row is created on first use for that day rather than
/// pre-seeded.
///
/// `client` is any open connection or transaction handle already positioned
/// inside the caller's transaction — the allocator never owns the
/// transaction boundary itself, since every command that calls it is already
/// inside one (BEGIN TRAN already issued by the caller).
pub async fn next_lot_code(
    client: &mut tiberius::Client<tokio_util::compat::Compat<tokio::net::TcpStream>>,
    prefix: &str,
    at: DateTime<Utc>,
) -> AppResult<String> {
    let code_date = at.date_naive();

    // Upsert-if-absent: create the counter row for this (date, prefix) if it
    // doesn't exist yet. Two concurrent first-of-day requests can both reach
    // here; the unique constraint on (code_date, prefix) makes only one
    // INSERT succeed, which is fine since we re-select afterward regardless.
    let insert_sql = r#"
        IF NOT EXISTS (SELECT 1 FROM LotCodeCounter WHERE code_date = @P1 AND prefix = @P2)
        BEGIN
            INSERT INTO LotCodeCounter (code_date, prefix, last_seq) VALUES (@P1, @P2, 0)
        END
    "#;
    let mut insert_query = Query::new(insert_sql);
    insert_query.bind(code_date);
    insert_query.bind(prefix);
    insert_query.execute(&mut *client).await?;

    // Select-for-update, increment, return — locked for the lifetime of the
    // enclosing transaction so concurrent allocators for the same day/prefix
    // serialize instead of racing on the increment.
    let update_sql = r#"
        UPDATE LotCodeCounter WITH (UPDLOCK, ROWLOCK)
        SET last_seq = last_seq + 1
        WHERE code_date = @P1 AND prefix = @P2
    "#;
    let mut update_query = Query::new(update_sql);
    update_query.bind(code_date);
    update_query.bind(prefix);
    let rows_affected = update_query
        .execute(&mut *client)
        .await?
        .rows_affected()
        .first()
        .copied()
        .unwrap_or(0);

    if rows_affected == 0 {
        return Err(AppError::Database(format!(
            "LotCodeCounter row for {} / {} vanished between insert and update",
            code_date, prefix
        )));
    }

    let select_sql = "SELECT last_seq FROM LotCodeCounter WHERE code_date = @P1 AND prefix = @P2";
    let mut select_query = Query::new(select_sql);
    select_query.bind(code_date);
    select_query.bind(prefix);
    let row = select_query
        .query(&mut *client)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::Database("LotCodeCounter row missing after update".into()))?;

    let seq: i32 = row
        .get(0)
        .ok_or_else(|| AppError::Database("last_seq column missing".into()))?;

    let code = format!("{}-{}-{:04}", prefix, code_date.format("%Y%m%d"), seq);

    tracing::debug!(prefix = %prefix, code_date = %code_date, seq = %seq, "Allocated lot code");

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn code_format_matches_prefix_date_seq() {
        let at = Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap();
        let code = format!("{}-{}-{:04}", "REC", at.date_naive().format("%Y%m%d"), 7);
        assert_eq!(code, "REC-20260305-0007");
    }
}
