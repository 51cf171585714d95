use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use watchlist::{
    Backend, Config, CreateRequest, FileKv, FilterCriteria, Item, ItemId, ItemStore, KvStore, Renderer, Selector,
    SqliteKv, Status, Tracker, UiEvent, View,
};

#[derive(Parser)]
#[command(name = "watchlist")]
#[command(about = "Watchlist CLI - Track games, shows and movies, rate them when done")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: <config dir>/watchlist/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show items, optionally filtered
    List {
        /// Case-insensitive title search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Type to show, or ALL
        #[arg(short = 't', long = "type", default_value = "ALL")]
        kind: String,

        /// pending, done, or ALL
        #[arg(long, default_value = "ALL")]
        status: String,
    },

    /// Add an item
    Add {
        title: String,

        /// Item type (default: first configured type)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// pending or done
        #[arg(long, default_value = "pending")]
        status: Status,

        /// Rating 0-10, only kept for done items
        #[arg(short, long)]
        rating: Option<String>,

        /// Review text, only kept for done items
        #[arg(long)]
        review: Option<String>,
    },

    /// Flip an item between pending and done
    Toggle {
        /// Item id or a unique part of it
        id: String,

        /// Rating when marking done (asked for if omitted)
        #[arg(short, long)]
        rating: Option<String>,

        /// Review when marking done (asked for if omitted)
        #[arg(long, conflicts_with = "no_review")]
        review: Option<String>,

        /// Mark done without a review
        #[arg(long)]
        no_review: bool,
    },

    /// Delete an item after confirmation
    Delete {
        /// Item id or a unique part of it
        id: String,

        /// Skip the confirmation question
        #[arg(short, long)]
        yes: bool,
    },

    /// List the configured item types
    Categories,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.storage.dir = Some(dir);
    }
    let data_dir = config.data_dir()?;

    match config.storage.backend {
        Backend::File => run(FileKv::open(&data_dir)?, &config, cli.command),
        Backend::Sqlite => run(SqliteKv::open(data_dir.join("watchlist.db"))?, &config, cli.command),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run<K: KvStore>(kv: K, config: &Config, command: Commands) -> Result<()> {
    let store = ItemStore::open(kv, config)?;
    let mut tracker = Tracker::new(store, Terminal::default());

    match command {
        Commands::List { search, kind, status } => {
            let type_filter = Selector::parse_with(&kind, |s| {
                config.category(s).ok_or_else(|| eyre!("unknown type: {}", s))
            })?;
            let status_filter = status.parse::<Selector<Status>>().map_err(|e| eyre!(e))?;
            tracker.handle(UiEvent::FilterChanged(FilterCriteria {
                search_text: search,
                type_filter,
                status_filter,
            }))?;
        }
        Commands::Add {
            title,
            kind,
            status,
            rating,
            review,
        } => {
            let category = kind
                .or_else(|| config.categories.first().cloned())
                .unwrap_or_default();
            tracker.handle(UiEvent::Add(CreateRequest {
                title,
                category,
                status,
                rating: rating.unwrap_or_default(),
                review: review.unwrap_or_default(),
            }))?;
        }
        Commands::Toggle {
            id,
            rating,
            review,
            no_review,
        } => {
            let id = resolve_id(tracker.store().items(), &id)?;
            tracker.handle(UiEvent::Toggle(id))?;

            if tracker.store().toggle_state().is_some() {
                let rating = match rating {
                    Some(r) => Some(r),
                    None => ask(&tracker)?.filter(|r| !r.is_empty()),
                };
                let Some(rating) = rating else {
                    tracker.handle(UiEvent::AbortToggle)?;
                    println!("{}", "Cancelled, nothing changed".yellow());
                    return Ok(());
                };

                tracker.handle(UiEvent::SupplyRating(rating))?;
                if tracker.store().toggle_state().is_none() {
                    println!("{}", "Rating must be a number, nothing changed".yellow());
                    return Ok(());
                }

                let review = if no_review {
                    Some(None)
                } else if let Some(r) = review {
                    Some(Some(r))
                } else {
                    // Empty line skips the review, end of input cancels
                    ask(&tracker)?.map(|r| Some(r).filter(|r| !r.is_empty()))
                };
                match review {
                    Some(review) => tracker.handle(UiEvent::SupplyReview(review))?,
                    None => {
                        tracker.handle(UiEvent::AbortToggle)?;
                        println!("{}", "Cancelled, nothing changed".yellow());
                        return Ok(());
                    }
                }
            }
        }
        Commands::Delete { id, yes } => {
            let id = resolve_id(tracker.store().items(), &id)?;
            tracker.handle(UiEvent::RequestDelete(id))?;

            let confirmed = yes || ask(&tracker)?.is_some_and(|a| matches!(a.to_lowercase().as_str(), "y" | "yes"));
            if confirmed {
                tracker.handle(UiEvent::ConfirmDelete)?;
            } else {
                tracker.handle(UiEvent::CancelDelete)?;
                println!("{}", "Kept".yellow());
                return Ok(());
            }
        }
        Commands::Categories => {
            for category in config.categories() {
                println!("{}", category);
            }
            return Ok(());
        }
    }

    print!("{}", tracker.renderer().frame);
    Ok(())
}

/// Print the renderer's pending question and read one trimmed line.
/// `None` at end of input.
fn ask<K: KvStore>(tracker: &Tracker<K, Terminal>) -> Result<Option<String>> {
    if let Some(prompt) = &tracker.renderer().prompt {
        print!("{} ", prompt.bold());
        io::stdout().flush()?;
    }

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Match an exact id, or a unique prefix or suffix of one
fn resolve_id(items: &[Item], input: &str) -> Result<ItemId> {
    let input = input.trim();
    if input.is_empty() {
        return Err(eyre!("Item id cannot be empty"));
    }
    if let Some(item) = items.iter().find(|i| i.id().as_str() == input) {
        return Ok(item.id().clone());
    }

    let matches: Vec<&Item> = items
        .iter()
        .filter(|i| i.id().as_str().starts_with(input) || i.id().as_str().ends_with(input))
        .collect();

    match matches.as_slice() {
        [item] => Ok(item.id().clone()),
        [] => Err(eyre!("No item matches id {}", input)),
        _ => Err(eyre!("Id {} is ambiguous ({} items match)", input, matches.len())),
    }
}

fn short_id(id: &ItemId) -> &str {
    let s = id.as_str();
    s.char_indices().rev().nth(7).map_or(s, |(i, _)| &s[i..])
}

/// Terminal presentation: renders into a buffer, queues questions
#[derive(Default)]
struct Terminal {
    frame: String,
    prompt: Option<String>,
}

impl Renderer for Terminal {
    fn render(&mut self, view: &View<'_>) {
        let mut out = String::new();

        if view.is_collection_empty() {
            out.push_str(&format!("{}\n", "Nothing here yet. Add the first one with `watchlist add`".dimmed()));
        } else if view.is_filtered_out() {
            out.push_str(&format!("{}\n", "No items match those filters".dimmed()));
        }

        for item in &view.items {
            let status = match item.status() {
                Status::Pending => item.status().as_str().yellow(),
                Status::Done => item.status().as_str().green(),
            };
            out.push_str(&format!(
                "{}  {}  [{}] [{}]",
                short_id(item.id()).dimmed(),
                item.title().bold(),
                item.category(),
                status
            ));
            if let Some(rating) = item.rating() {
                out.push_str(&format!("  {}", rating.to_string().cyan()));
            }
            if let Some(review) = item.review() {
                out.push_str(&format!("  \"{}\"", review.italic()));
            }
            out.push('\n');
        }

        out.push_str(&format!("{}\n", view.summary().dimmed()));
        self.frame = out;
    }

    fn ask_rating(&mut self, item: &Item) {
        self.prompt = Some(format!("Rating for \"{}\" (0-10, empty to cancel):", item.title()));
    }

    fn ask_review(&mut self, item: &Item) {
        self.prompt = Some(format!("Review for \"{}\" (empty to skip):", item.title()));
    }

    fn ask_delete_confirmation(&mut self, title: &str) {
        self.prompt = Some(format!("Delete \"{}\"? [y/N]", title));
    }
}
