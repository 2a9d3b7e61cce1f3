//! Library operations.
//!
//! `Library` is the public face of the crate.  Every operation follows the
//! same lifecycle:
//! 1. Open a session through the [`Connector`] (fail fast if unavailable).
//! 2. Run one statement inside the session's transaction.
//! 3. Commit on success, roll back on failure.
//! 4. Close the session exactly once, whatever happened.

use std::fmt;

use tracing::{error, info, instrument, warn};

use crate::models::{
    BorrowerCreated, NewBorrower, PopulateSummary, SearchRow, FINES_UPDATED, SAMPLE_AUTHORS,
    SAMPLE_BOOKS,
};
use crate::{Connector, DbError, Session};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The use cases exposed by [`Library`], used for logging and for picking
/// the user-facing failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    Search,
    Checkout,
    Return,
    UpdateFines,
    PayFine,
    CreateBorrower,
    Populate,
    Migrate,
}

impl Operation {
    /// Generic message shown when the operation fails for a reason other
    /// than connectivity.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Ping => "Database connection failed.",
            Self::Search => "Error executing search.",
            Self::Checkout => "Error processing checkout.",
            Self::Return => "Error processing return.",
            Self::UpdateFines => "Error updating fines.",
            Self::PayFine => "Error processing fine payment.",
            Self::CreateBorrower => "Error creating borrower.",
            Self::Populate => "Error populating database.",
            Self::Migrate => "Error migrating database schema.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping => write!(f, "ping"),
            Self::Search => write!(f, "search_books"),
            Self::Checkout => write!(f, "checkout_book"),
            Self::Return => write!(f, "return_book"),
            Self::UpdateFines => write!(f, "update_fines"),
            Self::PayFine => write!(f, "pay_fine"),
            Self::CreateBorrower => write!(f, "create_borrower"),
            Self::Populate => write!(f, "populate_sample_data"),
            Self::Migrate => write!(f, "migrate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// Data access layer for the library database.
///
/// Holds no state besides the connector; operations are independent of one
/// another.
pub struct Library<C> {
    connector: C,
}

impl<C: Connector> Library<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Apply the client-owned schema objects that `create_borrower` needs.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), DbError> {
        self.connector.migrate().await.map_err(|e| {
            error!("{} failed: {}", Operation::Migrate, e);
            e
        })?;
        info!("schema migrations applied");
        Ok(())
    }

    /// Check that a connection can be established and released.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<(), DbError> {
        let session = self.open(Operation::Ping).await?;
        self.finish(Operation::Ping, session, Ok(())).await
    }

    /// Free-text search over the catalogue.
    #[instrument(skip(self))]
    pub async fn search_books(&self, text: &str) -> Result<Vec<SearchRow>, DbError> {
        let mut session = self.open(Operation::Search).await?;
        let result = session.search_books(text).await;
        let rows = self.finish(Operation::Search, session, result).await?;
        info!("search for '{}' matched {} rows", text, rows.len());
        Ok(rows)
    }

    /// Check a book out to a borrower and return the server's status message.
    ///
    /// Availability is decided by the `checkout_book` procedure; an
    /// unavailable copy comes back as a message, not as an error.
    #[instrument(skip(self))]
    pub async fn checkout_book(&self, isbn: &str, card_id: &str) -> Result<String, DbError> {
        let mut session = self.open(Operation::Checkout).await?;
        let result = session
            .checkout_book(isbn, card_id)
            .await
            .and_then(|message| message.ok_or(DbError::NotFound));
        self.finish(Operation::Checkout, session, result).await
    }

    #[instrument(skip(self))]
    pub async fn return_book(&self, loan_id: i32) -> Result<String, DbError> {
        let mut session = self.open(Operation::Return).await?;
        let result = session
            .return_book(loan_id)
            .await
            .and_then(|message| message.ok_or(DbError::NotFound));
        self.finish(Operation::Return, session, result).await
    }

    /// Recompute all fines server-side.
    #[instrument(skip(self))]
    pub async fn update_fines(&self) -> Result<&'static str, DbError> {
        let mut session = self.open(Operation::UpdateFines).await?;
        let result = session.update_fines().await.map(|()| FINES_UPDATED);
        self.finish(Operation::UpdateFines, session, result).await
    }

    #[instrument(skip(self))]
    pub async fn pay_fine(&self, loan_id: i32) -> Result<String, DbError> {
        let mut session = self.open(Operation::PayFine).await?;
        let result = session
            .pay_fine(loan_id)
            .await
            .and_then(|message| message.ok_or(DbError::NotFound));
        self.finish(Operation::PayFine, session, result).await
    }

    /// Register a borrower and allocate the next card id.
    ///
    /// # Errors
    /// Returns [`DbError::ConstraintViolation`] (see
    /// [`DbError::is_duplicate_ssn`]) when the SSN is already registered;
    /// nothing is inserted in that case.
    #[instrument(skip(self, borrower), fields(name = %borrower.name))]
    pub async fn create_borrower(&self, borrower: &NewBorrower) -> Result<BorrowerCreated, DbError> {
        let mut session = self.open(Operation::CreateBorrower).await?;
        let result = session
            .insert_borrower(borrower)
            .await
            .and_then(|card_id| card_id.ok_or_else(DbError::duplicate_ssn))
            .map(|card_id| BorrowerCreated { card_id });
        let created = self.finish(Operation::CreateBorrower, session, result).await?;
        info!("borrower registered with card id {}", created.card_id);
        Ok(created)
    }

    /// Seed the sample books, authors and book/author links.
    ///
    /// Books and links that already exist are skipped; authors are always
    /// inserted.  Everything runs in one transaction.
    #[instrument(skip(self))]
    pub async fn populate_sample_data(&self) -> Result<PopulateSummary, DbError> {
        let mut session = self.open(Operation::Populate).await?;
        let result = seed_catalog(&mut session).await;
        let summary = self.finish(Operation::Populate, session, result).await?;
        info!(
            "sample data populated: {} books, {} authors, {} links",
            summary.books_inserted, summary.authors_inserted, summary.links_inserted
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Internal: session lifecycle.
    // -----------------------------------------------------------------------

    async fn open(&self, op: Operation) -> Result<C::Session, DbError> {
        self.connector.open().await.map_err(|e| {
            error!("{} could not acquire a connection: {}", op, e);
            e
        })
    }

    /// Commit or roll back depending on `result`, then close the session.
    async fn finish<T>(
        &self,
        op: Operation,
        mut session: C::Session,
        result: Result<T, DbError>,
    ) -> Result<T, DbError> {
        let outcome = match result {
            Ok(value) => session.commit().await.map(|()| value),
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!("{} rollback failed: {}", op, rollback_err);
                }
                Err(err)
            }
        };

        session.close().await;

        if let Err(e) = &outcome {
            error!("{} failed: {}", op, e);
        }
        outcome
    }
}

async fn seed_catalog<S: Session>(session: &mut S) -> Result<PopulateSummary, DbError> {
    let mut summary = PopulateSummary::default();

    for (isbn, title) in SAMPLE_BOOKS {
        summary.books_inserted += session.insert_book(isbn, title).await?;
    }

    let mut author_ids = Vec::with_capacity(SAMPLE_AUTHORS.len());
    for name in SAMPLE_AUTHORS {
        author_ids.push(session.insert_author(name).await?);
    }
    summary.authors_inserted = author_ids.len() as u64;

    for (i, (isbn, _)) in SAMPLE_BOOKS.iter().enumerate() {
        let author_id = author_ids[i % author_ids.len()];
        summary.links_inserted += session.link_book_author(isbn, author_id).await?;
    }

    Ok(summary)
}
