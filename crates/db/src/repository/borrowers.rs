//! Borrower registration.

use sqlx::PgConnection;

use crate::{models::NewBorrower, DbError};

/// Insert a borrower and return the allocated card id.
///
/// Uniqueness of the SSN and allocation of the card id both happen inside
/// this one statement (unique index `borrower_ssn_key` and sequence
/// `borrower_card_id_seq`), so concurrent callers cannot race.  Returns
/// `None` when the SSN is already registered.
pub async fn insert_borrower(
    conn: &mut PgConnection,
    borrower: &NewBorrower,
) -> Result<Option<String>, DbError> {
    let card_id = sqlx::query_scalar::<_, String>(
        r#"
        INSERT INTO borrower (card_id, bname, ssn, address, phone)
        VALUES (nextval('borrower_card_id_seq')::text, $1, $2, $3, $4)
        ON CONFLICT (ssn) DO NOTHING
        RETURNING card_id
        "#,
    )
    .bind(&borrower.name)
    .bind(&borrower.ssn)
    .bind(&borrower.address)
    .bind(&borrower.phone)
    .fetch_optional(conn)
    .await?;

    Ok(card_id)
}
