//! Implementations of the `mfa` subcommands.
//!
//! Each `run_*` function opens the catalog named by `[store].path`, performs
//! one operation, and prints the result to stdout. Failures propagate as
//! `anyhow` errors so the binary exits non-zero.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;

use macfreeapps_core::catalog::Catalog;
use macfreeapps_core::models::{CatalogDraft, CatalogRecord, Category, RecordPatch};

use crate::assistant::{Assistant, DeepSeekModel};
use crate::config::Config;
use crate::store_json::JsonFileStore;
use crate::transport::lookup::LookupTransport;
use crate::transport::FetchChain;

pub fn open_catalog(config: &Config) -> Catalog<JsonFileStore> {
    Catalog::new(JsonFileStore::new(&config.store.path))
}

/// Parse a `--category` value (canonical id or display name).
pub fn parse_category(raw: &str) -> Result<Category> {
    Category::parse(raw).with_context(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown category '{}' (expected one of: {})", raw, known.join(", "))
    })
}

fn print_row(app: &CatalogRecord) {
    println!(
        "{}  {} {}  [{}]  {} views",
        app.id,
        app.icon,
        app.name,
        app.category.display_name(),
        app.views
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_seed(config: &Config) -> Result<()> {
    let written = open_catalog(config).seed_defaults()?;
    if written == 0 {
        println!("Catalog already has apps; nothing seeded.");
    } else {
        println!("Seeded {} default apps.", written);
    }
    Ok(())
}

pub fn run_list(config: &Config, category: Option<&str>, json: bool) -> Result<()> {
    let filter = category.map(parse_category).transpose()?;
    let apps = open_catalog(config).list(filter);
    if json {
        return print_json(&apps);
    }
    if apps.is_empty() {
        println!("No apps.");
    }
    for app in &apps {
        print_row(app);
    }
    Ok(())
}

pub fn run_get(config: &Config, id: &str) -> Result<()> {
    match open_catalog(config).get(id) {
        Some(app) => print_json(&app),
        None => bail!("app not found: {}", id),
    }
}

pub fn run_search(config: &Config, term: &str) -> Result<()> {
    let hits = open_catalog(config).search(term);
    if hits.is_empty() {
        println!("No apps match '{}'.", term);
    }
    for app in &hits {
        print_row(app);
    }
    Ok(())
}

pub fn run_add(config: &Config, draft: CatalogDraft) -> Result<()> {
    let record = open_catalog(config).add(draft)?;
    println!("Added {} ({})", record.name, record.id);
    Ok(())
}

pub fn run_update(config: &Config, id: &str, patch: RecordPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("nothing to update: pass at least one field");
    }
    let record = open_catalog(config).update(id, patch)?;
    println!("Updated {} ({})", record.name, record.id);
    Ok(())
}

pub fn run_delete(config: &Config, id: &str) -> Result<()> {
    let removed = open_catalog(config).delete(id)?;
    println!("Deleted {} ({})", removed.name, removed.id);
    Ok(())
}

pub fn run_view(config: &Config, id: &str) -> Result<()> {
    let catalog = open_catalog(config);
    if !catalog.increment_views(id) {
        bail!("no view recorded for {}", id);
    }
    let views = catalog.get(id).map(|a| a.views).unwrap_or_default();
    println!("{} views", views);
    Ok(())
}

pub fn run_stats(config: &Config) -> Result<()> {
    let stats = open_catalog(config).stats();
    println!("Mac Free Apps — Catalog Stats");
    println!("=============================");
    println!();
    println!("  Store:       {}", config.store.path.display());
    println!("  Apps:        {}", stats.total_apps);
    println!("  Downloads:   {}", stats.total_views);
    Ok(())
}

/// Fetch metadata for a listing URL, print the normalized draft, and
/// optionally add it to the catalog.
pub async fn run_fetch(config: &Config, url: &str, save: bool) -> Result<()> {
    let chain = FetchChain::from_config(&config.fetch)?;
    let (raw, strategy) = chain.fetch(url).await?;
    let draft = macfreeapps_core::normalize::normalize(raw, url);
    eprintln!("fetched via {}", strategy);
    print_json(&draft)?;

    if save {
        let record = open_catalog(config).add(draft)?;
        println!("Added {} ({})", record.name, record.id);
    }
    Ok(())
}

/// Build the assistant described by `[assistant]` and `[fetch]`.
pub fn build_assistant(config: &Config) -> Result<Assistant<JsonFileStore>> {
    let catalog = Arc::new(open_catalog(config));
    let mut assistant = Assistant::new(catalog)
        .with_finder(Box::new(LookupTransport::from_config(&config.fetch)?));

    if config.assistant.is_enabled() {
        match DeepSeekModel::from_config(&config.assistant) {
            Ok(model) => assistant = assistant.with_model(Box::new(model)),
            Err(e) => tracing::warn!("assistant model disabled: {}", e),
        }
    }
    Ok(assistant)
}

/// Answer one message, or run an interactive loop when `message` is `None`.
pub async fn run_chat(config: &Config, message: Option<String>) -> Result<()> {
    let assistant = build_assistant(config)?;

    if let Some(message) = message {
        println!("{}", assistant.respond(&message).await);
        return Ok(());
    }

    let interactive = atty::is(atty::Stream::Stdin);
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "çıkış") {
            break;
        }
        println!("{}\n", assistant.respond(line).await);
    }
    Ok(())
}
