//! Fine maintenance procedures.

use sqlx::PgConnection;

use crate::DbError;

/// Recompute fines for every loan. The procedure returns nothing useful.
pub async fn update_fines(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query(r#"SELECT update_fines()"#).execute(conn).await?;
    Ok(())
}

/// Call `pay_fine(loan_id)` and relay its status message.
pub async fn pay_fine(conn: &mut PgConnection, loan_id: i32) -> Result<Option<String>, DbError> {
    let message = sqlx::query_scalar::<_, Option<String>>(r#"SELECT pay_fine($1)"#)
        .bind(loan_id)
        .fetch_one(conn)
        .await?;

    Ok(message)
}
