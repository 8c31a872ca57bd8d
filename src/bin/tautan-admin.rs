use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use tautan::analytics::StatsAggregator;
use tautan::config::{Config, DatabaseBackend};
use tautan::keyword::{sanitize, KeywordAllocator};
use tautan::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};

#[derive(Parser)]
#[command(name = "tautan-admin")]
#[command(about = "Tautan link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a shortlink, bypassing the target reachability check
    Create {
        /// Target URL
        url: String,
        /// Explicit keyword; allocated from the sequence when omitted
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List shortlinks
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show click statistics for a shortlink
    Stats { keyword: String },
    /// Delete a shortlink and its recorded visits
    Delete { keyword: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    storage.init().await?;

    match cli.command {
        Commands::Create {
            url,
            keyword,
            title,
            owner,
        } => {
            let keyword = match keyword {
                Some(raw) => {
                    let keyword = sanitize(&raw);
                    if keyword.is_empty() {
                        anyhow::bail!("keyword is empty after removing invalid characters");
                    }
                    keyword
                }
                None => {
                    let allocator = KeywordAllocator::new(Arc::clone(&storage));
                    allocator.allocate_random().await?
                }
            };

            match storage
                .create_link(&keyword, &url, &title, owner.as_deref())
                .await
            {
                Ok(link) => println!("✓ Created /{} -> {}", link.keyword, link.target),
                Err(StorageError::Conflict) => {
                    anyhow::bail!("keyword '{}' is already taken", keyword)
                }
                Err(StorageError::Other(e)) => return Err(e),
            }
        }
        Commands::List {
            limit,
            offset,
            owner,
        } => {
            let links = storage.list_links(limit, offset, owner.as_deref()).await?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<20} {:<50} {}", "Keyword", "Target", "Owner");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!(
                        "{:<20} {:<50} {}",
                        link.keyword,
                        link.target,
                        link.owner.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Stats { keyword } => {
            let Some(link) = storage.get_link(&keyword).await? else {
                anyhow::bail!("no link with keyword '{}'", keyword);
            };

            let stats = StatsAggregator::new(Arc::clone(&storage))
                .stats_for(&link)
                .await?;

            println!("/{} -> {}", link.keyword, link.target);
            println!("  total clicks:  {}", stats.total_clicks);
            println!("  unique clicks: {}", stats.unique_clicks);
            println!("  by month:      {:?}", stats.monthly_clicks);
        }
        Commands::Delete { keyword } => {
            if storage.delete_link(&keyword).await? {
                println!("✓ Deleted '{}'", keyword);
            } else {
                println!("⚠ No link with keyword '{}'", keyword);
            }
        }
    }

    Ok(())
}
