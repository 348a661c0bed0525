//! # Mac Free Apps
//!
//! A catalog of free desktop applications for macOS: a JSON-file backed
//! catalog, metadata fetchers for App Store listings, a conversational
//! assistant that turns Turkish or English requests into catalog
//! operations, and an HTTP server with a public listing page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────────┐
//! │  Transports  │──▶│ Normalizer │──▶│    Catalog    │──▶ JSON file
//! │lookup/scrape/│   │   (core)   │   │ (core, locked)│
//! │    jsonp     │   └────────────┘   └──────┬────────┘
//! └──────────────┘                           │
//!                      ┌─────────────────────┼──────────────┐
//!                      ▼                     ▼              ▼
//!                 ┌─────────┐         ┌───────────┐   ┌──────────┐
//!                 │   CLI   │         │ Assistant │   │   HTTP   │
//!                 │  (mfa)  │         │ model+rule│   │  (axum)  │
//!                 └─────────┘         └───────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mfa seed                                   # write the starter catalog
//! mfa list --category design
//! mfa fetch https://apps.apple.com/tr/app/canva/id897446215 --save
//! mfa chat "Tüm uygulamaları listele"
//! mfa serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`store_json`] | JSON file catalog store |
//! | [`transport`] | Lookup, scrape, and JSONP fetchers plus the fallback chain |
//! | [`assistant`] | Conversational assistant |
//! | [`render`] | HTML listing page |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI subcommand implementations |

pub mod assistant;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;
pub mod server;
pub mod store_json;
pub mod transport;
