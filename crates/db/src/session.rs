//! The `Connector` and `Session` traits — the seam between the library
//! operations and the database driver.

use async_trait::async_trait;

use crate::models::{NewBorrower, SearchRow};
use crate::DbError;

/// Hands out one [`Session`] per operation.
///
/// The production implementation is [`crate::PgConnector`]; tests use
/// [`crate::mock::MockConnector`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Acquire a connection and open a transaction on it.
    ///
    /// Fails with [`DbError::ConnectionUnavailable`] when no connection can
    /// be established.
    async fn open(&self) -> Result<Self::Session, DbError>;

    /// Bring the client-owned schema objects (SSN index, card id sequence)
    /// up to date. Safe to run repeatedly.
    async fn migrate(&self) -> Result<(), DbError>;
}

/// One connection with an open transaction.
///
/// Procedure calls return `None` when the procedure yields SQL `NULL`
/// instead of a status message.
#[async_trait]
pub trait Session: Send {
    async fn search_books(&mut self, text: &str) -> Result<Vec<SearchRow>, DbError>;

    async fn checkout_book(&mut self, isbn: &str, card_id: &str)
        -> Result<Option<String>, DbError>;

    async fn return_book(&mut self, loan_id: i32) -> Result<Option<String>, DbError>;

    async fn update_fines(&mut self) -> Result<(), DbError>;

    async fn pay_fine(&mut self, loan_id: i32) -> Result<Option<String>, DbError>;

    /// Insert a borrower with a freshly allocated card id.
    ///
    /// Returns `None` when a borrower with the same SSN already exists, in
    /// which case nothing is written.
    async fn insert_borrower(&mut self, borrower: &NewBorrower) -> Result<Option<String>, DbError>;

    /// Returns the number of rows inserted (0 if the ISBN already exists).
    async fn insert_book(&mut self, isbn: &str, title: &str) -> Result<u64, DbError>;

    /// Returns the generated `author_id`.
    async fn insert_author(&mut self, name: &str) -> Result<i32, DbError>;

    /// Returns the number of rows inserted (0 if the pair already exists).
    async fn link_book_author(&mut self, isbn: &str, author_id: i32) -> Result<u64, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;

    /// Release the connection. Any transaction still open is discarded.
    async fn close(&mut self);
}
