//! Book search and catalogue seeding.

use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgConnection;

use crate::{models::SearchRow, DbError};

/// Run the `search_books` procedure and return every row it yields.
///
/// Rows are converted to JSON server-side so the procedure can evolve its
/// column list without breaking the client.
pub async fn search_books(conn: &mut PgConnection, text: &str) -> Result<Vec<SearchRow>, DbError> {
    let rows = sqlx::query_scalar::<_, Json<Map<String, Value>>>(
        r#"SELECT row_to_json(r) FROM search_books($1::text) AS r"#,
    )
    .bind(text)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|Json(columns)| SearchRow(columns)).collect())
}

/// Insert a book unless its ISBN is already present.
pub async fn insert_book(conn: &mut PgConnection, isbn: &str, title: &str) -> Result<u64, DbError> {
    let result = sqlx::query(
        r#"INSERT INTO book (isbn, title) VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
    )
    .bind(isbn)
    .bind(title)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Insert an author and return the generated `author_id`.
pub async fn insert_author(conn: &mut PgConnection, name: &str) -> Result<i32, DbError> {
    let author_id = sqlx::query_scalar::<_, i32>(
        r#"INSERT INTO authors (name) VALUES ($1) RETURNING author_id"#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(author_id)
}

/// Associate a book with an author; an existing pair is left untouched.
pub async fn link_book_author(
    conn: &mut PgConnection,
    isbn: &str,
    author_id: i32,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        r#"INSERT INTO book_authors (isbn, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
    )
    .bind(isbn)
    .bind(author_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}
