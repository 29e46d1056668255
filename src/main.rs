use clap::Parser;

mod cli;
mod config;
mod db;
mod error;
mod models;
mod remote;
mod sync;

use cli::Cli;
use error::OutcomeKind;

#[tokio::main]
async fn main() {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let kind = match cli::run(cli).await {
        Ok(message) => {
            println!("{}", message);
            OutcomeKind::Success
        }
        Err(e) => {
            eprintln!("{}", cli::report(&e, json));
            e.kind()
        }
    };

    std::process::exit(kind.exit_code());
}
