//! Postgres connection factory.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::models::{NewBorrower, SearchRow};
use crate::repository::{books, borrowers, fines, loans};
use crate::{Connector, DbConfig, DbError, Session};

/// Type alias for the Postgres pool backing [`PgConnector`].
pub type DbPool = PgPool;

/// Create the connection pool described by `config`.
///
/// The pool connects lazily: nothing touches the network until the first
/// operation checks a connection out.
pub fn create_pool(config: &DbConfig) -> Result<DbPool, DbError> {
    info!(
        "Configuring database pool (max_connections={}, connect_timeout={}s)",
        config.max_connections, config.connect_timeout_secs
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .connect_lazy_with(config.connect_options()?);
    Ok(pool)
}

/// Run embedded SQLx migrations located in `./migrations` (relative to the
/// workspace root at build time).
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| match e {
            sqlx::migrate::MigrateError::Execute(err) => DbError::from_execution(err),
            other => DbError::Migration(other),
        })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PgConnector
// ---------------------------------------------------------------------------

/// [`Connector`] that checks connections out of a [`DbPool`].
#[derive(Debug, Clone)]
pub struct PgConnector {
    pool: DbPool,
}

impl PgConnector {
    pub fn new(config: &DbConfig) -> Result<Self, DbError> {
        Ok(Self::from_pool(create_pool(config)?))
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn open(&self) -> Result<PgSession, DbError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(DbError::ConnectionUnavailable)?;
        debug!("connection acquired, transaction open");
        Ok(PgSession { tx: Some(tx) })
    }

    async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.pool).await
    }
}

// ---------------------------------------------------------------------------
// PgSession
// ---------------------------------------------------------------------------

/// A pooled connection with an open transaction.
///
/// Dropping the transaction without committing rolls it back and returns
/// the connection to the pool.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn conn(&mut self) -> Result<&mut PgConnection, DbError> {
        self.tx.as_deref_mut().ok_or_else(|| {
            DbError::ExecutionFailed(sqlx::Error::Protocol("transaction already finished".into()))
        })
    }

    fn finished(&mut self) -> Result<Transaction<'static, Postgres>, DbError> {
        self.tx.take().ok_or_else(|| {
            DbError::ExecutionFailed(sqlx::Error::Protocol("transaction already finished".into()))
        })
    }
}

#[async_trait]
impl Session for PgSession {
    async fn search_books(&mut self, text: &str) -> Result<Vec<SearchRow>, DbError> {
        books::search_books(self.conn()?, text).await
    }

    async fn checkout_book(&mut self, isbn: &str, card_id: &str) -> Result<Option<String>, DbError> {
        loans::checkout_book(self.conn()?, isbn, card_id).await
    }

    async fn return_book(&mut self, loan_id: i32) -> Result<Option<String>, DbError> {
        loans::return_book(self.conn()?, loan_id).await
    }

    async fn update_fines(&mut self) -> Result<(), DbError> {
        fines::update_fines(self.conn()?).await
    }

    async fn pay_fine(&mut self, loan_id: i32) -> Result<Option<String>, DbError> {
        fines::pay_fine(self.conn()?, loan_id).await
    }

    async fn insert_borrower(&mut self, borrower: &NewBorrower) -> Result<Option<String>, DbError> {
        borrowers::insert_borrower(self.conn()?, borrower).await
    }

    async fn insert_book(&mut self, isbn: &str, title: &str) -> Result<u64, DbError> {
        books::insert_book(self.conn()?, isbn, title).await
    }

    async fn insert_author(&mut self, name: &str) -> Result<i32, DbError> {
        books::insert_author(self.conn()?, name).await
    }

    async fn link_book_author(&mut self, isbn: &str, author_id: i32) -> Result<u64, DbError> {
        books::link_book_author(self.conn()?, isbn, author_id).await
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.finished()?.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.finished()?.rollback().await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("closing session with an unfinished transaction; it will be rolled back");
        }
    }
}
