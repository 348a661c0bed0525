//! # Mac Free Apps CLI (`mfa`)
//!
//! Manage the catalog, fetch App Store metadata, talk to the assistant, and
//! run the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! mfa --config ./config/mfa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mfa seed` | Write the starter catalog when it is empty |
//! | `mfa list [--category <c>]` | List apps |
//! | `mfa get <id>` | Print one app as JSON |
//! | `mfa search <term>` | Search name, description and category |
//! | `mfa add --name … --description … --icon …` | Add an app |
//! | `mfa update <id> [--field …]` | Update fields of an app |
//! | `mfa delete <id>` | Delete an app |
//! | `mfa view <id>` | Count one download |
//! | `mfa stats` | Catalog counters |
//! | `mfa fetch <url> [--save]` | Fetch and normalize listing metadata |
//! | `mfa chat [message]` | Talk to the assistant |
//! | `mfa serve` | Start the HTTP server |
//! | `mfa completions <shell>` | Print shell completions |

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use macfreeapps::commands;
use macfreeapps::config;
use macfreeapps::logging;
use macfreeapps::server;
use macfreeapps_core::models::{CatalogDraft, RecordPatch};

/// Mac Free Apps: a catalog of free macOS applications.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "mfa",
    about = "Mac Free Apps: manage a catalog of free macOS applications",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mfa.toml")]
    config: PathBuf,

    /// Log at debug level regardless of RUST_LOG and config.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the six starter apps when the catalog is empty.
    Seed,

    /// List apps in insertion order.
    List {
        /// Only apps in this category (id or Turkish name).
        #[arg(long)]
        category: Option<String>,

        /// Print JSON instead of one line per app.
        #[arg(long)]
        json: bool,
    },

    /// Print one app as JSON.
    Get {
        /// App id.
        id: String,
    },

    /// Case-insensitive search over name, description and category.
    Search {
        term: String,
    },

    /// Add an app.
    Add(AddArgs),

    /// Update fields of an app; omitted fields keep their value.
    Update {
        /// App id.
        id: String,

        #[command(flatten)]
        fields: UpdateArgs,
    },

    /// Delete an app.
    Delete {
        /// App id.
        id: String,
    },

    /// Count one download of an app.
    View {
        /// App id.
        id: String,
    },

    /// Show catalog counters.
    Stats,

    /// Fetch metadata for an App Store listing URL.
    ///
    /// Tries the configured strategies in order and prints the normalized
    /// record.
    Fetch {
        url: String,

        /// Add the fetched app to the catalog.
        #[arg(long)]
        save: bool,
    },

    /// Talk to the catalog assistant.
    ///
    /// With a message, answers once. Without, reads one message per line
    /// from stdin until `exit`.
    Chat {
        message: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: String,
    #[arg(long, default_value = macfreeapps_core::models::DEFAULT_ICON)]
    icon: String,
    #[arg(long)]
    url: Option<String>,
    /// Category id or Turkish name.
    #[arg(long, default_value = "utilities")]
    category: String,
    /// Release version of the app.
    #[arg(long = "app-version", id = "app_version")]
    version: Option<String>,
    #[arg(long)]
    developer: Option<String>,
}

#[derive(Args)]
struct UpdateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Release version of the app.
    #[arg(long = "app-version", id = "app_version")]
    version: Option<String>,
    #[arg(long)]
    developer: Option<String>,
    #[arg(long)]
    rating: Option<f64>,
}

fn draft_from_args(args: AddArgs) -> anyhow::Result<CatalogDraft> {
    Ok(CatalogDraft {
        name: args.name,
        description: args.description,
        icon: args.icon,
        download_url: args.url,
        category: commands::parse_category(&args.category)?,
        version: args.version.unwrap_or_default(),
        developer: args.developer.unwrap_or_default(),
        ..Default::default()
    })
}

fn patch_from_args(args: UpdateArgs) -> anyhow::Result<RecordPatch> {
    Ok(RecordPatch {
        name: args.name,
        description: args.description,
        icon: args.icon,
        download_url: args.url,
        category: args
            .category
            .as_deref()
            .map(commands::parse_category)
            .transpose()?,
        version: args.version,
        developer: args.developer,
        rating: args.rating,
        ..Default::default()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "mfa", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging, cli.verbose);

    match cli.command {
        Commands::Seed => commands::run_seed(&cfg)?,
        Commands::List { category, json } => commands::run_list(&cfg, category.as_deref(), json)?,
        Commands::Get { id } => commands::run_get(&cfg, &id)?,
        Commands::Search { term } => commands::run_search(&cfg, &term)?,
        Commands::Add(args) => commands::run_add(&cfg, draft_from_args(args)?)?,
        Commands::Update { id, fields } => {
            commands::run_update(&cfg, &id, patch_from_args(fields)?)?
        }
        Commands::Delete { id } => commands::run_delete(&cfg, &id)?,
        Commands::View { id } => commands::run_view(&cfg, &id)?,
        Commands::Stats => commands::run_stats(&cfg)?,
        Commands::Fetch { url, save } => commands::run_fetch(&cfg, &url, save).await?,
        Commands::Chat { message } => commands::run_chat(&cfg, message).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
