use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use viewcount::config::{Config, CounterBackend, CounterConfig};
use viewcount::storage;

#[derive(Parser)]
#[command(name = "viewcount-admin")]
#[command(about = "View count maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the durable record for a post
    Show {
        /// Post identifier (trailing URL segment)
        post: String,
    },
    /// Overwrite the durable total for a post
    Set {
        /// Post identifier (trailing URL segment)
        post: String,
        /// New total view count
        total: i64,
    },
    /// Show the fast counter value for a post
    Counter {
        /// Post identifier (trailing URL segment)
        post: String,
    },
    /// List durable records, most viewed first
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

/// The memory counter lives inside the server process, so a separate admin
/// process would only ever see an empty map.
fn ensure_persistent_counter(config: &CounterConfig) -> Result<()> {
    if config.backend == CounterBackend::Memory {
        bail!(
            "the counter command needs COUNTER_BACKEND=sqlite; \
             the memory counter is only visible inside the running server"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let records = storage::connect_view_store(&config.database).await?;

    match cli.command {
        Commands::Show { post } => match records.get_record(&post).await? {
            Some(record) => {
                println!("Post:         {}", record.post);
                println!("Total views:  {}", record.total_views);
                println!("Last updated: {}", record.last_updated);
            }
            None => println!("No record found for '{}'", post),
        },
        Commands::Set { post, total } => {
            if total < 0 {
                bail!("total must not be negative");
            }
            let today = Utc::now().date_naive();
            if records.upsert(&post, total, today).await {
                println!("✓ Set total views for '{}' to {}", post, total);
            } else {
                bail!("failed to update record for '{post}', see log output");
            }
        }
        Commands::Counter { post } => {
            ensure_persistent_counter(&config.counter)?;
            let counter = storage::connect_counter(&config.counter).await?;
            match counter.get(&post).await? {
                Some(count) => println!("Counter for '{}': {}", post, count),
                None => println!("No counter value for '{}'", post),
            }
        }
        Commands::List { limit, offset } => {
            let rows = records.list(limit, offset).await?;
            if rows.is_empty() {
                println!("No view records found.");
            } else {
                println!("{:<50} {:>12} {}", "Post", "Total views", "Last updated");
                println!("{}", "-".repeat(80));
                for record in rows {
                    println!(
                        "{:<50} {:>12} {}",
                        record.post, record.total_views, record.last_updated
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_command_rejects_memory_backend() {
        let memory = CounterConfig {
            backend: CounterBackend::Memory,
            url: String::new(),
        };
        let err = ensure_persistent_counter(&memory).unwrap_err();
        assert!(err.to_string().contains("COUNTER_BACKEND=sqlite"));

        let sqlite = CounterConfig {
            backend: CounterBackend::Sqlite,
            url: "sqlite::memory:".to_string(),
        };
        assert!(ensure_persistent_counter(&sqlite).is_ok());
    }
}
