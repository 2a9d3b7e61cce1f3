//! Checkout and return, both delegated to stored procedures.

use sqlx::PgConnection;

use crate::DbError;

/// Call `checkout_book(isbn, card_id)` and relay its status message.
pub async fn checkout_book(
    conn: &mut PgConnection,
    isbn: &str,
    card_id: &str,
) -> Result<Option<String>, DbError> {
    let message = sqlx::query_scalar::<_, Option<String>>(
        r#"SELECT checkout_book($1::text, $2::text)"#,
    )
    .bind(isbn)
    .bind(card_id)
    .fetch_one(conn)
    .await?;

    Ok(message)
}

/// Call `return_book(loan_id)` and relay its status message.
pub async fn return_book(conn: &mut PgConnection, loan_id: i32) -> Result<Option<String>, DbError> {
    let message = sqlx::query_scalar::<_, Option<String>>(r#"SELECT return_book($1)"#)
        .bind(loan_id)
        .fetch_one(conn)
        .await?;

    Ok(message)
}
