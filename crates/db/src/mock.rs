//! `MockConnector` — a test double for `Connector`.
//!
//! Stands in for a live database in unit tests.  It records every session
//! lifecycle call, stages writes until commit, and plays the part of the
//! stored procedures with deliberately simple rules.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Map, Value};

use crate::models::{NewBorrower, SearchRow};
use crate::{Connector, DbError, Session};

/// Loan period applied by the mock `checkout_book`.
pub const LOAN_DAYS: i64 = 14;
/// Fine accrued per overdue day by the mock `update_fines`, in cents.
pub const FINE_PER_DAY_CENTS: i64 = 25;
/// First card id handed out, matching `borrower_card_id_seq`.
pub const FIRST_CARD_ID: u32 = 1000;

/// Statements the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStatement {
    Search,
    Checkout,
    Return,
    UpdateFines,
    PayFine,
    InsertBorrower,
    InsertBook,
    InsertAuthor,
    LinkBookAuthor,
    Commit,
    Migrate,
}

/// How many times each lifecycle step has happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub opens: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
    pub migrations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockLoan {
    pub loan_id: i32,
    pub isbn: String,
    pub card_id: String,
    pub due_date: NaiveDate,
    pub returned_on: Option<NaiveDate>,
    pub fine_cents: i64,
    pub fine_paid: bool,
}

/// Committed contents of the mock database.
#[derive(Debug, Clone, Default)]
struct MockDatabase {
    /// Set while the card id sequence and SSN index are absent.
    schema_missing: bool,
    books: BTreeMap<String, String>,
    authors: Vec<String>,
    book_authors: BTreeSet<(String, i32)>,
    borrowers: BTreeMap<String, NewBorrower>,
    ssns: BTreeSet<String>,
    loans: Vec<MockLoan>,
    next_card_id: u32,
}

impl MockDatabase {
    fn allocate_card_id(&mut self) -> String {
        if self.next_card_id < FIRST_CARD_ID {
            self.next_card_id = FIRST_CARD_ID;
        }
        let id = self.next_card_id;
        self.next_card_id += 1;
        id.to_string()
    }

    fn authors_of(&self, isbn: &str) -> Vec<&str> {
        self.book_authors
            .iter()
            .filter(|(linked, _)| linked == isbn)
            .filter_map(|(_, author_id)| {
                let index = usize::try_from(*author_id - 1).ok()?;
                self.authors.get(index).map(String::as_str)
            })
            .collect()
    }

    fn on_loan(&self, isbn: &str) -> bool {
        self.loans.iter().any(|l| l.isbn == isbn && l.returned_on.is_none())
    }
}

/// A mock connector that records every call it receives and answers
/// procedure calls from an in-memory model.
#[derive(Clone)]
pub struct MockConnector {
    committed: Arc<Mutex<MockDatabase>>,
    calls: Arc<Mutex<CallCounts>>,
    today: Arc<Mutex<NaiveDate>>,
    refuse_connections: bool,
    fail_on: Option<MockStatement>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// An empty database whose calendar starts on 2024-01-01.
    pub fn new() -> Self {
        Self {
            committed: Arc::new(Mutex::new(MockDatabase::default())),
            calls: Arc::new(Mutex::new(CallCounts::default())),
            today: Arc::new(Mutex::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())),
            refuse_connections: false,
            fail_on: None,
        }
    }

    /// The card id sequence does not exist until `migrate` runs.
    pub fn unmigrated(self) -> Self {
        self.committed.lock().unwrap().schema_missing = true;
        self
    }

    /// Every `open` fails as if the server were down.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Every execution of `statement` fails.
    pub fn failing_on(mut self, statement: MockStatement) -> Self {
        self.fail_on = Some(statement);
        self
    }

    pub fn call_counts(&self) -> CallCounts {
        *self.calls.lock().unwrap()
    }

    /// Move the mock calendar forward.
    pub fn advance_days(&self, days: i64) {
        let mut today = self.today.lock().unwrap();
        *today += Duration::days(days);
    }

    pub fn borrower_count(&self) -> usize {
        self.committed.lock().unwrap().borrowers.len()
    }

    pub fn book_count(&self) -> usize {
        self.committed.lock().unwrap().books.len()
    }

    /// Snapshot of committed loans, in loan id order.
    pub fn loans(&self) -> Vec<MockLoan> {
        self.committed.lock().unwrap().loans.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, DbError> {
        if self.refuse_connections {
            return Err(DbError::ConnectionUnavailable(sqlx::Error::PoolTimedOut));
        }
        self.calls.lock().unwrap().opens += 1;

        let working = self.committed.lock().unwrap().clone();
        let today = *self.today.lock().unwrap();
        Ok(MockSession {
            working,
            committed: Arc::clone(&self.committed),
            calls: Arc::clone(&self.calls),
            today,
            fail_on: self.fail_on,
        })
    }

    async fn migrate(&self) -> Result<(), DbError> {
        if self.refuse_connections {
            return Err(DbError::ConnectionUnavailable(sqlx::Error::PoolTimedOut));
        }
        self.calls.lock().unwrap().migrations += 1;
        if self.fail_on == Some(MockStatement::Migrate) {
            return Err(DbError::Migration(sqlx::migrate::MigrateError::VersionMissing(1)));
        }
        self.committed.lock().unwrap().schema_missing = false;
        Ok(())
    }
}

/// Session handed out by [`MockConnector`]; writes stay in `working` until
/// commit.
pub struct MockSession {
    working: MockDatabase,
    committed: Arc<Mutex<MockDatabase>>,
    calls: Arc<Mutex<CallCounts>>,
    today: NaiveDate,
    fail_on: Option<MockStatement>,
}

impl MockSession {
    fn check(&self, statement: MockStatement) -> Result<(), DbError> {
        if self.fail_on == Some(statement) {
            return Err(DbError::ExecutionFailed(sqlx::Error::Protocol(format!(
                "injected failure in {statement:?}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MockSession {
    async fn search_books(&mut self, text: &str) -> Result<Vec<SearchRow>, DbError> {
        self.check(MockStatement::Search)?;
        let needle = text.to_lowercase();
        let db = &self.working;

        let rows = db
            .books
            .iter()
            .filter_map(|(isbn, title)| {
                let authors = db.authors_of(isbn);
                let matches = isbn.to_lowercase().contains(&needle)
                    || title.to_lowercase().contains(&needle)
                    || authors.iter().any(|a| a.to_lowercase().contains(&needle));
                if !matches {
                    return None;
                }
                let mut row = Map::new();
                row.insert("isbn".into(), json!(isbn));
                row.insert("title".into(), json!(title));
                row.insert("authors".into(), json!(authors.join(", ")));
                row.insert("available".into(), Value::Bool(!db.on_loan(isbn)));
                Some(SearchRow(row))
            })
            .collect();

        Ok(rows)
    }

    async fn checkout_book(&mut self, isbn: &str, card_id: &str) -> Result<Option<String>, DbError> {
        self.check(MockStatement::Checkout)?;
        let db = &mut self.working;

        if !db.books.contains_key(isbn) {
            return Ok(Some("Book not found.".into()));
        }
        if !db.borrowers.contains_key(card_id) {
            return Ok(Some("Borrower not found.".into()));
        }
        if db.on_loan(isbn) {
            return Ok(Some("Book is not available for checkout.".into()));
        }

        let loan_id = i32::try_from(db.loans.len() + 1).unwrap_or(i32::MAX);
        db.loans.push(MockLoan {
            loan_id,
            isbn: isbn.to_owned(),
            card_id: card_id.to_owned(),
            due_date: self.today + Duration::days(LOAN_DAYS),
            returned_on: None,
            fine_cents: 0,
            fine_paid: false,
        });
        Ok(Some(format!("Book checked out successfully. Loan ID: {loan_id}")))
    }

    async fn return_book(&mut self, loan_id: i32) -> Result<Option<String>, DbError> {
        self.check(MockStatement::Return)?;
        let today = self.today;
        let Some(loan) = self.working.loans.iter_mut().find(|l| l.loan_id == loan_id) else {
            return Ok(None);
        };
        if loan.returned_on.is_some() {
            return Ok(Some("Book already returned.".into()));
        }
        loan.returned_on = Some(today);
        Ok(Some("Book returned successfully.".into()))
    }

    async fn update_fines(&mut self) -> Result<(), DbError> {
        self.check(MockStatement::UpdateFines)?;
        let today = self.today;
        for loan in self.working.loans.iter_mut().filter(|l| !l.fine_paid) {
            let end = loan.returned_on.unwrap_or(today);
            let overdue_days = (end - loan.due_date).num_days();
            if overdue_days > 0 {
                loan.fine_cents = overdue_days * FINE_PER_DAY_CENTS;
            }
        }
        Ok(())
    }

    async fn pay_fine(&mut self, loan_id: i32) -> Result<Option<String>, DbError> {
        self.check(MockStatement::PayFine)?;
        let Some(loan) = self.working.loans.iter_mut().find(|l| l.loan_id == loan_id) else {
            return Ok(Some("No fine found for this loan.".into()));
        };
        if loan.fine_cents == 0 {
            return Ok(Some("No fine found for this loan.".into()));
        }
        if loan.fine_paid {
            return Ok(Some("Fine already paid.".into()));
        }
        if loan.returned_on.is_none() {
            return Ok(Some("Cannot pay fine before the book is returned.".into()));
        }
        loan.fine_paid = true;
        Ok(Some(format!(
            "Fine of ${}.{:02} paid.",
            loan.fine_cents / 100,
            loan.fine_cents % 100
        )))
    }

    async fn insert_borrower(&mut self, borrower: &NewBorrower) -> Result<Option<String>, DbError> {
        self.check(MockStatement::InsertBorrower)?;
        let db = &mut self.working;
        if db.schema_missing {
            return Err(DbError::SchemaNotMigrated(
                r#"relation "borrower_card_id_seq" does not exist"#.into(),
            ));
        }
        let card_id = db.allocate_card_id();
        if !db.ssns.insert(borrower.ssn.clone()) {
            return Ok(None);
        }
        db.borrowers.insert(card_id.clone(), borrower.clone());
        Ok(Some(card_id))
    }

    async fn insert_book(&mut self, isbn: &str, title: &str) -> Result<u64, DbError> {
        self.check(MockStatement::InsertBook)?;
        if self.working.books.contains_key(isbn) {
            return Ok(0);
        }
        self.working.books.insert(isbn.to_owned(), title.to_owned());
        Ok(1)
    }

    async fn insert_author(&mut self, name: &str) -> Result<i32, DbError> {
        self.check(MockStatement::InsertAuthor)?;
        self.working.authors.push(name.to_owned());
        Ok(i32::try_from(self.working.authors.len()).unwrap_or(i32::MAX))
    }

    async fn link_book_author(&mut self, isbn: &str, author_id: i32) -> Result<u64, DbError> {
        self.check(MockStatement::LinkBookAuthor)?;
        let inserted = self.working.book_authors.insert((isbn.to_owned(), author_id));
        Ok(u64::from(inserted))
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.calls.lock().unwrap().commits += 1;
        self.check(MockStatement::Commit)?;
        *self.committed.lock().unwrap() = self.working.clone();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.calls.lock().unwrap().rollbacks += 1;
        self.working = self.committed.lock().unwrap().clone();
        Ok(())
    }

    async fn close(&mut self) {
        self.calls.lock().unwrap().closes += 1;
    }
}
