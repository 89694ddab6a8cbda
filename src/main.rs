use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use uuid::Uuid;

use curator::config::Config;
use curator::feed::FeedFetcher;
use curator::poller::start_polling;
use curator::storage::Database;

/// Get the config directory path (~/.config/curator/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("curator"))
}

#[derive(Parser, Debug)]
#[command(name = "curator", about = "Polls RSS feeds and records new posts")]
struct Args {
    /// Config file (default: ~/.config/curator/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the config file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll feeds until interrupted (Ctrl-C)
    Run {
        /// Seconds between ticks
        #[arg(long)]
        interval: Option<u64>,

        /// Feeds polled per tick
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Create a user to own feeds
    AddUser { name: String },
    /// Register a feed
    AddFeed {
        /// Owning user id
        #[arg(long)]
        user: Uuid,
        name: String,
        url: String,
    },
    /// List feeds in registration order
    Feeds,
    /// List posts recorded for a feed
    Posts { feed_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            config_dir.join("curator.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Command::Run {
            interval,
            concurrency,
        } => {
            if let Some(secs) = interval {
                config.poll_interval_secs = secs;
            }
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            config.validate().context("Invalid polling options")?;
            run(db, &config).await?;
        }
        Command::AddUser { name } => {
            let user = db.create_user(&name).await.context("Failed to create user")?;
            println!("{}\t{}", user.id, user.name);
        }
        Command::AddFeed { user, name, url } => {
            let parsed = url::Url::parse(&url).with_context(|| format!("Invalid URL: {url}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Unsupported scheme: {} (only http/https allowed)", parsed.scheme());
            }
            if db.get_user(user).await?.is_none() {
                anyhow::bail!("User {user} not found");
            }
            let feed = db
                .create_feed(&name, parsed.as_str(), user)
                .await
                .context("Failed to create feed")?;
            println!("{}\t{}\t{}", feed.id, feed.name, feed.url);
        }
        Command::Feeds => {
            for feed in db.list_feeds().await.context("Failed to list feeds")? {
                let fetched = feed
                    .last_fetched_at
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}\t{}\t{}\t{}", feed.id, feed.name, feed.url, fetched);
            }
        }
        Command::Posts { feed_id } => {
            for post in db
                .posts_for_feed(feed_id)
                .await
                .context("Failed to list posts")?
            {
                let published = chrono::DateTime::from_timestamp(post.published_at, 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", published, post.title, post.url);
            }
        }
    }

    Ok(())
}

/// Run the poller until Ctrl-C, letting the in-flight batch finish.
async fn run(db: Database, config: &Config) -> Result<()> {
    let client = FeedFetcher::build_client(config.request_timeout())
        .context("Failed to build HTTP client")?;
    let fetcher =
        FeedFetcher::new(client, config.request_timeout()).with_max_bytes(config.max_feed_bytes);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep the sender alive: dropping it would stop the poller
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested, finishing current batch");
        let _ = shutdown_tx.send(true);
    });

    start_polling(
        db,
        fetcher,
        config.concurrency,
        config.poll_interval(),
        shutdown_rx,
    )
    .await;
    Ok(())
}
