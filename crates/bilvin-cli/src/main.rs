//! Bilvin CLI
//!
//! Thin wrapper around bilvin-core for using the wishlist from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Every command needs the secret code and who you are
//! export BILVIN_SECRET_CODE=...
//!
//! # Show session and backend
//! bilvin --user kevin status
//!
//! # Add a wish
//! bilvin --user bilqis add "Trip to Bali" --category travel --budget "Rp 15.000.000"
//!
//! # List wishes, optionally by category
//! bilvin --user kevin list --category travel
//!
//! # Mark done / undo
//! bilvin --user kevin toggle <id>
//!
//! # Follow the other person's changes live
//! bilvin --user kevin watch
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bilvin_core::{
    parse_budget, Backend, Category, CategoryFilter, ImageUpload, ItemId, ItemPatch, LocalBackend,
    NewItem, RemoteConfig, Session, Storage, StoreEvent, User, WishlistItem, WishlistStore,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Bilvin - our shared wishlist
#[derive(Parser)]
#[command(name = "bilvin")]
#[command(version = "0.1.0")]
#[command(about = "Bilvin - our shared wishlist")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (default: ~/.bilvin/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Who is using the wishlist (bilqis or kevin)
    #[arg(short, long, global = true, env = "BILVIN_USER")]
    user: Option<User>,

    /// Secret code that unlocks the wishlist
    #[arg(long, global = true, env = "BILVIN_SECRET_CODE", hide_env_values = true)]
    code: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session, backend and progress
    Status,

    /// List wishes
    List {
        /// Only this category (travel, couple, life, all)
        #[arg(short, long, default_value = "all")]
        category: CategoryFilter,
    },

    /// Add a wish
    Add {
        /// What we wish for
        title: String,
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Edit a wish
    Edit {
        /// Wish ID
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Toggle a wish between done and not done
    Toggle {
        /// Wish ID
        id: String,
    },

    /// Delete a wish you created
    Delete {
        /// Wish ID
        id: String,
    },

    /// Print changes as they happen until Ctrl-C
    Watch,
}

/// Optional wish fields shared by `add` and `edit`
#[derive(Args)]
struct ItemFields {
    #[arg(long)]
    emoji: Option<String>,

    /// Description (empty to clear)
    #[arg(long)]
    description: Option<String>,

    #[arg(short, long)]
    category: Option<Category>,

    /// Budget, any formatting ("Rp 1.500.000"); empty to clear
    #[arg(long)]
    budget: Option<String>,

    /// Where (empty to clear)
    #[arg(long)]
    location: Option<String>,

    /// Target date (YYYY-MM-DD)
    #[arg(long)]
    target_date: Option<NaiveDate>,

    /// Image file to attach (max 5MB)
    #[arg(long)]
    image: Option<PathBuf>,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory (~/.bilvin/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bilvin")
        .join("data")
}

fn print_item(item: &WishlistItem) {
    let check = if item.completed { "✓" } else { "○" };
    println!(
        "{} {} {} {}  (by {})",
        check,
        item.category.icon(),
        item.emoji,
        item.title,
        item.created_by.display_name()
    );
    println!("  ID: {}", item.id);
    if let Some(description) = &item.description {
        println!("  {}", description);
    }
    if let Some(location) = &item.location {
        println!("  Location: {}", location);
    }
    if let Some(budget) = item.budget {
        println!("  Budget: {}", budget);
    }
    if let Some(date) = item.target_date {
        println!("  Target: {}", date);
    }
    if let Some(url) = &item.image_url {
        println!("  Image: {}", url);
    }
}

/// Upload an image file; `None` when the session has no blob store or the upload fails
async fn attach_image(store: &mut WishlistStore, path: &Path) -> Result<Option<String>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let user = store.session().user();
    let url = store
        .upload_image(ImageUpload::new(file_name, bytes), user)
        .await?;
    if url.is_none() {
        eprintln!("Image not attached (no image storage available)");
    }
    Ok(url)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let code = cli
        .code
        .context("Secret code required (--code or BILVIN_SECRET_CODE)")?;
    let user = cli
        .user
        .context("User required (--user bilqis|kevin or BILVIN_USER)")?;
    let session = Session::unlock(&code, user)?;

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let storage = Storage::new(data_dir.join("bilvin.redb"))
        .with_context(|| format!("Failed to open storage in {}", data_dir.display()))?;
    let local = LocalBackend::new(Arc::new(storage));
    let backend = Backend::select(RemoteConfig::from_env(), local);

    let mut store = WishlistStore::new(session, backend);
    store.load().await;

    match cli.command {
        Commands::Status => {
            println!("Bilvin wishlist");
            println!("  {}", store.session().greeting());
            println!("  Backend: {}", store.mode());
            println!("  Progress: {}", store.progress());
            println!("  Data directory: {}", data_dir.display());
        }

        Commands::List { category } => {
            let items = store.filtered(category);
            if items.is_empty() {
                println!("No wishes yet.");
            }
            for item in items {
                print_item(item);
            }
            println!();
            println!("{}", store.progress());
        }

        Commands::Add { title, fields } => {
            let budget = match fields.budget.as_deref() {
                Some(budget) => parse_budget(budget)?,
                None => None,
            };
            let image_url = match &fields.image {
                Some(path) => attach_image(&mut store, path).await?,
                None => None,
            };

            let mut draft = NewItem::new(title, user);
            if let Some(emoji) = fields.emoji {
                draft.emoji = emoji;
            }
            if let Some(category) = fields.category {
                draft.category = category;
            }
            draft.description = fields.description;
            draft.location = fields.location;
            draft.budget = budget;
            draft.target_date = fields.target_date;
            draft.image_url = image_url;

            let item = store.add(draft).await?;
            println!("Wish added: {}", item.title);
            println!("  ID: {}", item.id);
        }

        Commands::Edit { id, title, fields } => {
            let budget = match fields.budget.as_deref() {
                Some(budget) => Some(parse_budget(budget)?),
                None => None,
            };
            let image_url = match &fields.image {
                Some(path) => attach_image(&mut store, path).await?,
                None => None,
            };

            let patch = ItemPatch {
                emoji: fields.emoji,
                title,
                description: fields.description.map(Some),
                category: fields.category,
                image_url: image_url.map(Some),
                budget,
                location: fields.location.map(Some),
                target_date: fields.target_date.map(Some),
                completed: None,
            };
            if patch.is_empty() {
                bail!("Nothing to change");
            }

            let item = store.update(&ItemId::from(id), patch, user).await?;
            println!("Wish updated: {}", item.title);
            print_item(&item);
        }

        Commands::Toggle { id } => {
            let item = store.toggle_complete(&ItemId::from(id), user).await?;
            if item.completed {
                println!("Done: {} 🎉", item.title);
            } else {
                println!("Not done yet: {}", item.title);
            }
        }

        Commands::Delete { id } => {
            let id = ItemId::from(id);
            store.delete(&id, user).await?;
            println!("Wish deleted: {}", id);
        }

        Commands::Watch => {
            let handle = store.spawn();
            if !handle.start_feed().await? {
                println!("Live updates need the remote backend; running offline.");
                handle.shutdown().await;
                return Ok(());
            }

            let mut events = handle.subscribe_events();
            println!("Watching for changes (Ctrl-C to stop)...");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(StoreEvent::Notice(notice)) => println!("{}", notice),
                        Ok(StoreEvent::ItemsChanged { count }) => {
                            let progress = handle.progress().await?;
                            println!("  {} wishes, {}", count, progress);
                        }
                        Ok(StoreEvent::FeedClosed) => {
                            println!("Live updates stopped.");
                            break;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            handle.shutdown().await;
        }
    }

    Ok(())
}
