//! The smoke sequence: apply migrations, seed sample data, then exercise
//! every operation against the live database and print what comes back.
//!
//! Failures are printed, never propagated, so the sequence always runs to
//! the end.

use std::fmt::Display;

use library_db::models::NewBorrower;
use library_db::{Connector, DbError, Library, Operation};

/// Loan exercised by the return and pay-fine steps.
const SAMPLE_LOAN_ID: i32 = 1;
const SAMPLE_ISBN: &str = "0923398364";

pub async fn run<C: Connector>(library: &Library<C>) -> anyhow::Result<()> {
    if let Err(e) = library.migrate().await {
        println!("{}", e.user_message(Operation::Migrate));
    }

    match library.populate_sample_data().await {
        Ok(_) => println!("Database populated with sample tuples."),
        Err(e) => println!("{}", e.user_message(Operation::Populate)),
    }

    println!("=== Testing Database Connection ===");
    match library.ping().await {
        Ok(()) => println!("Database connection successful."),
        Err(e) => println!("{}", e.user_message(Operation::Ping)),
    }

    println!("=== Testing Book Search and Availability ===");
    match library.search_books("william").await {
        Ok(rows) => {
            println!("Search Results:");
            for row in rows {
                println!("  {row}");
            }
        }
        Err(e) => println!("Search Results: {}", e.user_message(Operation::Search)),
    }

    println!("=== Testing Book Loans (Checkout) ===");
    let borrowers = [
        NewBorrower::new("John Doe", "123-45-6789", "123 Main St", "555-1234"),
        NewBorrower::new("Jane Smith", "987-65-4321", "456 Oak St", "555-5678"),
    ];
    let mut card_ids = Vec::with_capacity(borrowers.len());
    for borrower in &borrowers {
        match library.create_borrower(borrower).await {
            Ok(created) => {
                println!("{created}");
                card_ids.push(created.card_id);
            }
            Err(e) => println!("{}", e.user_message(Operation::CreateBorrower)),
        }
    }

    if let [card_id1, card_id2] = card_ids.as_slice() {
        let result = library.checkout_book(SAMPLE_ISBN, card_id1).await;
        print_outcome("Checkout result (borrower1):", Operation::Checkout, result);

        let result = library.checkout_book(SAMPLE_ISBN, card_id2).await;
        print_outcome("Checkout result (borrower2, duplicate):", Operation::Checkout, result);
    } else {
        println!("Skipping checkout: borrowers could not be created.");
    }

    println!("=== Testing Return Book ===");
    let result = library.return_book(SAMPLE_LOAN_ID).await;
    print_outcome("Return result for loan_id 1:", Operation::Return, result);

    println!("=== Testing Update Fines ===");
    match library.update_fines().await {
        Ok(message) => println!("{message}"),
        Err(e) => println!("{}", e.user_message(Operation::UpdateFines)),
    }

    println!("=== Testing Pay Fine ===");
    let result = library.pay_fine(SAMPLE_LOAN_ID).await;
    print_outcome("Pay Fine result for loan_id 1:", Operation::PayFine, result);

    Ok(())
}

fn print_outcome<T: Display>(label: &str, op: Operation, result: Result<T, DbError>) {
    match result {
        Ok(value) => println!("{label} {value}"),
        Err(e) => println!("{label} {}", e.user_message(op)),
    }
}
