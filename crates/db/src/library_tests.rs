//! Operation tests for `Library`.
//!
//! These run against `MockConnector`, so no Postgres instance is required.
//! The mock counts opens, commits, rollbacks and closes, which lets every
//! test check that the connection was released exactly once.

use crate::mock::{CallCounts, MockConnector, MockStatement, FIRST_CARD_ID};
use crate::models::{NewBorrower, FINES_UPDATED, SAMPLE_AUTHORS, SAMPLE_BOOKS};
use crate::{DbError, Library, Operation};

fn library() -> Library<MockConnector> {
    Library::new(MockConnector::new())
}

async fn populated_library() -> Library<MockConnector> {
    let library = library();
    library.populate_sample_data().await.expect("populate should succeed");
    library
}

fn john() -> NewBorrower {
    NewBorrower::new("John Doe", "123-45-6789", "123 Main St", "555-1234")
}

fn jane() -> NewBorrower {
    NewBorrower::new("Jane Smith", "987-65-4321", "456 Oak St", "555-5678")
}

/// Counts after `n` successful operations.
fn committed(n: usize) -> CallCounts {
    CallCounts { opens: n, commits: n, rollbacks: 0, closes: n, migrations: 0 }
}

// ============================================================
// Connection lifecycle
// ============================================================

#[tokio::test]
async fn ping_opens_and_releases_one_connection() {
    let library = library();
    library.ping().await.expect("ping should succeed");
    assert_eq!(library.connector().call_counts(), committed(1));
}

#[tokio::test]
async fn unavailable_database_fails_fast_without_a_session() {
    let library = Library::new(MockConnector::new().refusing_connections());

    let err = library.search_books("william").await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionUnavailable(_)));
    assert_eq!(err.user_message(Operation::Search), "Database connection failed.");

    let err = library.create_borrower(&john()).await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionUnavailable(_)));

    // Nothing was opened, so nothing needs closing.
    assert_eq!(library.connector().call_counts(), CallCounts::default());
}

#[tokio::test]
async fn every_operation_releases_its_connection_exactly_once() {
    let library = populated_library().await;
    let card_id = library.create_borrower(&john()).await.unwrap().card_id;

    library.search_books("william").await.unwrap();
    library.checkout_book("0923398364", &card_id).await.unwrap();
    library.return_book(1).await.unwrap();
    library.update_fines().await.unwrap();
    library.pay_fine(1).await.unwrap();
    library.ping().await.unwrap();

    assert_eq!(library.connector().call_counts(), committed(8));
}

#[tokio::test]
async fn failed_statement_rolls_back_and_still_releases() {
    let connector = MockConnector::new().failing_on(MockStatement::Checkout);
    let library = Library::new(connector);

    let err = library.checkout_book("0923398364", "1000").await.unwrap_err();
    assert!(matches!(err, DbError::ExecutionFailed(_)));
    assert_eq!(err.user_message(Operation::Checkout), "Error processing checkout.");

    let calls = library.connector().call_counts();
    assert_eq!(calls.opens, 1);
    assert_eq!(calls.commits, 0);
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, 1);
}

#[tokio::test]
async fn failed_commit_is_reported_and_releases() {
    let library = Library::new(MockConnector::new().failing_on(MockStatement::Commit));

    let err = library.create_borrower(&john()).await.unwrap_err();
    assert!(matches!(err, DbError::ExecutionFailed(_)));
    assert_eq!(library.connector().borrower_count(), 0);

    let calls = library.connector().call_counts();
    assert_eq!(calls.opens, 1);
    assert_eq!(calls.closes, 1);
}

// ============================================================
// search_books
// ============================================================

#[tokio::test]
async fn search_finds_houses_of_williamsburg() {
    let library = populated_library().await;

    let rows = library.search_books("william").await.expect("search should succeed");

    assert!(rows
        .iter()
        .any(|r| r.isbn() == Some("0923398364") && r.title() == Some("Houses of Williamsburg")));
}

#[tokio::test]
async fn search_without_matches_is_empty_not_an_error() {
    let library = populated_library().await;
    let rows = library.search_books("no such title").await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn search_failure_uses_search_message() {
    let library = Library::new(MockConnector::new().failing_on(MockStatement::Search));
    let err = library.search_books("william").await.unwrap_err();
    assert_eq!(err.user_message(Operation::Search), "Error executing search.");

    let calls = library.connector().call_counts();
    assert_eq!(calls.opens, 1);
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, calls.opens);
}

// ============================================================
// create_borrower
// ============================================================

#[tokio::test]
async fn card_ids_start_at_1000_and_increase() {
    let library = library();

    let first = library.create_borrower(&john()).await.unwrap();
    let second = library.create_borrower(&jane()).await.unwrap();
    let third = library
        .create_borrower(&NewBorrower::new("Ann Lee", "555-00-1111", "9 Elm St", "555-0000"))
        .await
        .unwrap();

    let ids: Vec<u32> = [&first, &second, &third]
        .iter()
        .map(|b| b.card_id.parse().expect("card ids are numeric"))
        .collect();

    assert_eq!(ids[0], FIRST_CARD_ID);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {ids:?}");
    assert_eq!(first.to_string(), "Borrower created with Card ID: 1000");
}

#[tokio::test]
async fn duplicate_ssn_is_rejected_without_insertion() {
    let library = library();
    library.create_borrower(&john()).await.unwrap();

    let twin = NewBorrower::new("Johnny Doe", "123-45-6789", "1 Other St", "555-9999");
    let err = library.create_borrower(&twin).await.unwrap_err();

    assert!(err.is_duplicate_ssn());
    assert_eq!(
        err.user_message(Operation::CreateBorrower),
        "Error: A borrower with this SSN already exists."
    );
    assert_eq!(library.connector().borrower_count(), 1);

    let calls = library.connector().call_counts();
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, 2);
}

#[tokio::test]
async fn borrower_creation_on_unmigrated_schema_asks_for_migration() {
    let library = Library::new(MockConnector::new().unmigrated());

    let err = library.create_borrower(&john()).await.unwrap_err();
    assert!(matches!(err, DbError::SchemaNotMigrated(_)));
    assert_eq!(
        err.user_message(Operation::CreateBorrower),
        "Error: database schema is out of date; run `library-client migrate` first."
    );
    assert_eq!(library.connector().borrower_count(), 0);

    library.migrate().await.expect("migrate should succeed");
    let created = library.create_borrower(&john()).await.unwrap();
    assert_eq!(created.card_id, FIRST_CARD_ID.to_string());

    let calls = library.connector().call_counts();
    assert_eq!(calls.migrations, 1);
    assert_eq!(calls.closes, calls.opens);
}

#[tokio::test]
async fn migrate_against_unavailable_database_fails_fast() {
    let library = Library::new(MockConnector::new().refusing_connections());
    let err = library.migrate().await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionUnavailable(_)));
    assert_eq!(library.connector().call_counts().migrations, 0);
}

#[tokio::test]
async fn card_ids_keep_increasing_after_a_rejected_ssn() {
    let library = library();
    let first = library.create_borrower(&john()).await.unwrap();
    library.create_borrower(&john()).await.unwrap_err();
    let next = library.create_borrower(&jane()).await.unwrap();

    let first: u32 = first.card_id.parse().unwrap();
    let next: u32 = next.card_id.parse().unwrap();
    assert!(next > first);
}

// ============================================================
// checkout_book / return_book
// ============================================================

#[tokio::test]
async fn duplicate_checkout_relays_unavailability() {
    let library = populated_library().await;
    let card_id1 = library.create_borrower(&john()).await.unwrap().card_id;
    let card_id2 = library.create_borrower(&jane()).await.unwrap().card_id;

    let first = library.checkout_book("0923398364", &card_id1).await.unwrap();
    assert!(first.contains("Loan ID: 1"), "unexpected message: {first}");

    let duplicate = library.checkout_book("0923398364", &card_id2).await.unwrap();
    assert!(!duplicate.contains("Loan ID"), "second checkout created a loan: {duplicate}");
    assert!(duplicate.contains("not available"));

    assert_eq!(library.connector().loans().len(), 1);
}

#[tokio::test]
async fn returned_copy_can_be_checked_out_again() {
    let library = populated_library().await;
    let card_id1 = library.create_borrower(&john()).await.unwrap().card_id;
    let card_id2 = library.create_borrower(&jane()).await.unwrap().card_id;

    library.checkout_book("ISBN2", &card_id1).await.unwrap();
    let returned = library.return_book(1).await.unwrap();
    assert_eq!(returned, "Book returned successfully.");

    let again = library.checkout_book("ISBN2", &card_id2).await.unwrap();
    assert!(again.contains("Loan ID: 2"));
}

#[tokio::test]
async fn null_procedure_result_is_not_found() {
    let library = populated_library().await;

    let err = library.return_book(42).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
    assert_eq!(err.user_message(Operation::Return), "Error processing return.");

    let calls = library.connector().call_counts();
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.opens, calls.closes);
}

// ============================================================
// update_fines / pay_fine
// ============================================================

#[tokio::test]
async fn update_fines_returns_fixed_confirmation() {
    let library = library();
    assert_eq!(library.update_fines().await.unwrap(), FINES_UPDATED);
    assert_eq!(library.connector().call_counts(), committed(1));
}

#[tokio::test]
async fn update_fines_is_idempotent() {
    let library = populated_library().await;
    let card_id = library.create_borrower(&john()).await.unwrap().card_id;
    library.checkout_book("ISBN3", &card_id).await.unwrap();
    library.connector().advance_days(20);

    library.update_fines().await.unwrap();
    let after_first = library.connector().loans();
    assert!(after_first[0].fine_cents > 0);

    library.update_fines().await.unwrap();
    assert_eq!(library.connector().loans(), after_first);
}

#[tokio::test]
async fn overdue_fine_is_paid_after_return() {
    let library = populated_library().await;
    let card_id = library.create_borrower(&john()).await.unwrap().card_id;
    library.checkout_book("0923398364", &card_id).await.unwrap();
    library.connector().advance_days(16);
    library.return_book(1).await.unwrap();
    library.update_fines().await.unwrap();

    let paid = library.pay_fine(1).await.unwrap();
    assert_eq!(paid, "Fine of $0.50 paid.");

    let again = library.pay_fine(1).await.unwrap();
    assert_eq!(again, "Fine already paid.");
}

#[tokio::test]
async fn pay_fine_failure_uses_payment_message() {
    let library = Library::new(MockConnector::new().failing_on(MockStatement::PayFine));
    let err = library.pay_fine(1).await.unwrap_err();
    assert_eq!(err.user_message(Operation::PayFine), "Error processing fine payment.");

    let calls = library.connector().call_counts();
    assert_eq!(calls.opens, 1);
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, calls.opens);
}

// ============================================================
// populate_sample_data
// ============================================================

#[tokio::test]
async fn populate_inserts_every_sample_book() {
    let library = library();
    let summary = library.populate_sample_data().await.unwrap();

    assert_eq!(summary.books_inserted as usize, SAMPLE_BOOKS.len());
    assert_eq!(summary.authors_inserted, SAMPLE_AUTHORS.len() as u64);
    assert_eq!(summary.links_inserted as usize, SAMPLE_BOOKS.len());
    assert_eq!(library.connector().book_count(), SAMPLE_BOOKS.len());
}

#[tokio::test]
async fn repopulating_skips_existing_books() {
    let library = populated_library().await;
    let summary = library.populate_sample_data().await.unwrap();

    assert_eq!(summary.books_inserted, 0);
    assert_eq!(library.connector().book_count(), SAMPLE_BOOKS.len());
}

#[tokio::test]
async fn populate_failure_rolls_back_everything() {
    let library = Library::new(MockConnector::new().failing_on(MockStatement::LinkBookAuthor));

    let err = library.populate_sample_data().await.unwrap_err();
    assert_eq!(err.user_message(Operation::Populate), "Error populating database.");

    // Books were inserted before the failing link, but never committed.
    assert_eq!(library.connector().book_count(), 0);
    let calls = library.connector().call_counts();
    assert_eq!(calls.rollbacks, 1);
    assert_eq!(calls.closes, 1);
}
