//! `library-client` CLI entry-point.
//!
//! Available sub-commands:
//! - `smoke`           — migrate, populate sample data and run every operation in order.
//! - `populate`        — insert the sample books, authors and links.
//! - `ping`            — check that the database is reachable.
//! - `search`          — free-text book search.
//! - `checkout`        — check a book out to a borrower.
//! - `return`          — return a loaned book.
//! - `update-fines`    — recompute all fines.
//! - `pay-fine`        — settle the fine on a loan.
//! - `create-borrower` — register a new borrower.
//! - `migrate`         — apply the bundled schema migrations.

mod smoke;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use library_db::models::NewBorrower;
use library_db::{DbConfig, DbError, Library, Operation, PgConnector};

#[derive(Parser)]
#[command(
    name = "library-client",
    about = "Client for the library-management database",
    version
)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection settings; `--database-url` wins over the individual fields.
#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[arg(long, env = "LIBRARY_DB_HOST", default_value = "localhost", global = true)]
    host: String,

    #[arg(long, env = "LIBRARY_DB_PORT", default_value_t = 5432, global = true)]
    port: u16,

    #[arg(long = "dbname", env = "LIBRARY_DB_NAME", default_value = "library_management", global = true)]
    database: String,

    #[arg(long = "user", env = "LIBRARY_DB_USER", default_value = "postgres", global = true)]
    username: String,

    #[arg(long, env = "LIBRARY_DB_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Upper bound on simultaneously open connections.
    #[arg(long, env = "LIBRARY_DB_MAX_CONNECTIONS", default_value_t = 2, global = true)]
    max_connections: u32,

    /// Seconds to wait for a connection before giving up.
    #[arg(long = "connect-timeout", env = "LIBRARY_DB_CONNECT_TIMEOUT", default_value_t = 5, global = true)]
    connect_timeout_secs: u64,
}

impl DbArgs {
    fn into_config(self) -> Result<DbConfig, DbError> {
        let config = DbConfig {
            url: self.database_url,
            host: self.host,
            port: self.port,
            database: self.database,
            username: self.username,
            password: self.password,
            max_connections: self.max_connections,
            connect_timeout_secs: self.connect_timeout_secs,
        };
        config.connect_options()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Migrate, populate sample data, then run every operation and print the results.
    Smoke,
    /// Insert the sample books, authors and book/author links.
    Populate,
    /// Check that a connection can be established.
    Ping,
    /// Search books by title, author or ISBN.
    Search {
        text: String,
    },
    /// Check a book out to a borrower.
    Checkout {
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        card_id: String,
    },
    /// Return a loaned book.
    Return {
        loan_id: i32,
    },
    /// Recompute fines for all loans.
    UpdateFines,
    /// Pay the fine attached to a loan.
    PayFine {
        loan_id: i32,
    },
    /// Register a new borrower.
    CreateBorrower {
        #[arg(long)]
        name: String,
        #[arg(long)]
        ssn: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        phone: String,
    },
    /// Apply the bundled schema migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.db.into_config()?;
    info!("Using database {:?}", config);
    let library = Library::new(PgConnector::new(&config)?);

    match cli.command {
        Command::Smoke => smoke::run(&library).await,
        Command::Populate => report(
            Operation::Populate,
            library.populate_sample_data().await.map(|s| {
                format!(
                    "Database populated with sample tuples ({} books, {} authors, {} links).",
                    s.books_inserted, s.authors_inserted, s.links_inserted
                )
            }),
        ),
        Command::Ping => report(
            Operation::Ping,
            library.ping().await.map(|()| "Database connection successful.".to_owned()),
        ),
        Command::Search { text } => match library.search_books(&text).await {
            Ok(rows) => {
                for row in &rows {
                    println!("{row}");
                }
                println!("{} result(s)", rows.len());
                Ok(())
            }
            Err(e) => fail(Operation::Search, &e),
        },
        Command::Checkout { isbn, card_id } => {
            report(Operation::Checkout, library.checkout_book(&isbn, &card_id).await)
        }
        Command::Return { loan_id } => report(Operation::Return, library.return_book(loan_id).await),
        Command::UpdateFines => report(
            Operation::UpdateFines,
            library.update_fines().await.map(str::to_owned),
        ),
        Command::PayFine { loan_id } => report(Operation::PayFine, library.pay_fine(loan_id).await),
        Command::CreateBorrower { name, ssn, address, phone } => {
            let borrower = NewBorrower::new(name, ssn, address, phone);
            report(
                Operation::CreateBorrower,
                library.create_borrower(&borrower).await.map(|b| b.to_string()),
            )
        }
        Command::Migrate => report(
            Operation::Migrate,
            library.migrate().await.map(|()| "Migrations applied successfully.".to_owned()),
        ),
    }
}

fn report(op: Operation, result: Result<String, DbError>) -> anyhow::Result<()> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(e) => fail(op, &e),
    }
}

fn fail(op: Operation, err: &DbError) -> ! {
    eprintln!("{}", err.user_message(op));
    std::process::exit(1);
}
