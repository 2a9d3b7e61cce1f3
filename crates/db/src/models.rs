//! Row and value types exchanged with the library database.
//!
//! The schema itself is owned by the database; these types only describe
//! what the data access layer sends and receives.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Confirmation returned by `update_fines`, which yields no server message.
pub const FINES_UPDATED: &str = "Fines updated successfully.";

// ---------------------------------------------------------------------------
// search_books
// ---------------------------------------------------------------------------

/// One row produced by the `search_books` stored procedure.
///
/// The procedure's column set belongs to the database, so rows are kept as
/// column-name → value maps rather than a fixed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchRow(pub Map<String, Value>);

impl SearchRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Text value of `column`, if present and textual.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn isbn(&self) -> Option<&str> {
        self.text("isbn")
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }
}

impl fmt::Display for SearchRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (column, value) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match value {
                Value::String(s) => write!(f, "{column}={s}")?,
                other => write!(f, "{column}={other}")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// borrower
// ---------------------------------------------------------------------------

/// Input for `create_borrower`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBorrower {
    pub name: String,
    pub ssn: String,
    pub address: String,
    pub phone: String,
}

impl NewBorrower {
    pub fn new(
        name: impl Into<String>,
        ssn: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ssn: ssn.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }
}

/// A successfully inserted borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerCreated {
    /// Numeric card id, stored as text by the schema.
    pub card_id: String,
}

impl fmt::Display for BorrowerCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Borrower created with Card ID: {}", self.card_id)
    }
}

// ---------------------------------------------------------------------------
// sample data
// ---------------------------------------------------------------------------

/// `(isbn, title)` pairs seeded by `populate_sample_data`.
pub const SAMPLE_BOOKS: &[(&str, &str)] = &[
    ("0923398364", "Houses of Williamsburg"),
    ("ISBN2", "Book Two Title"),
    ("ISBN3", "Book Three Title"),
    ("ISBN4", "Book Four Title"),
    ("ISBN6", "Book Six Title"),
    ("ISBN7", "Book Seven Title"),
];

/// Author names seeded by `populate_sample_data`; book `i` is linked to
/// author `i % SAMPLE_AUTHORS.len()`.
pub const SAMPLE_AUTHORS: &[&str] = &[
    "William Jones",
    "Author Two",
    "Author Three",
    "Author Four",
    "Author Six",
    "Author Seven",
];

/// What a `populate_sample_data` run actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateSummary {
    pub books_inserted: u64,
    pub authors_inserted: u64,
    pub links_inserted: u64,
}
