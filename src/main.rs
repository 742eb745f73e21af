use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use library_store::application::library::JsonLibrary;
use library_store::config::LibraryConfig;
use library_store::infra::argon2_scheme::Argon2Scheme;

const USAGE: &str = "usage: library-store [CONFIG] <check|stats|overdue>";

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.pop().context(USAGE)?;
    let config_path = match args.as_slice() {
        [] => None,
        [path] => Some(PathBuf::from(path)),
        _ => bail!(USAGE),
    };

    let config = LibraryConfig::load(config_path.as_deref()).context("loading configuration")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("library-store v{}", env!("CARGO_PKG_VERSION"));

    let library = JsonLibrary::open(&config, Arc::new(Argon2Scheme::new()))
        .context("opening library stores")?;

    match command.as_str() {
        "check" => {
            println!(
                "users: {} records ({})",
                library.users.len(),
                config.users_path().display()
            );
            println!(
                "books: {} records ({})",
                library.books.len(),
                config.books_path().display()
            );
        }
        "stats" => {
            println!("users: {}", library.users.len());
            println!("books: {}", library.books.len());
            println!("loaned: {}", library.books.loaned_books().len());
        }
        "overdue" => {
            for (book_id, loan) in library.books.overdue_loans(Utc::now()) {
                println!("{book_id}\t{}\tdue {}", loan.borrower(), loan.due_at());
            }
        }
        other => bail!("unknown command: {other}\n{USAGE}"),
    }

    library.close()?;
    Ok(())
}
