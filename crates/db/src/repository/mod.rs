//! Repository functions — one function per SQL statement.
//!
//! Every function takes the `&mut PgConnection` of an open transaction and
//! returns a `Result<T, DbError>`.  No business logic — the stored
//! procedures own all of it.

pub mod books;
pub mod borrowers;
pub mod fines;
pub mod loans;
