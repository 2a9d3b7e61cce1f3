//! `library-db` crate — data access layer for the library-management database.
//!
//! Every operation acquires a connection from a [`Connector`], runs one
//! statement (usually a stored-procedure call) inside an explicit
//! transaction, and releases the connection before returning.  Fine
//! calculation, loan limits and checkout eligibility live in the database;
//! none of that logic is reproduced here.

pub mod config;
pub mod error;
pub mod library;
pub mod mock;
pub mod models;
pub mod pool;
pub mod repository;
pub mod session;

pub use config::DbConfig;
pub use error::DbError;
pub use library::{Library, Operation};
pub use pool::{DbPool, PgConnector};
pub use session::{Connector, Session};

#[cfg(test)]
mod library_tests;
