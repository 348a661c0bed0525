//! # Mac Free Apps Core
//!
//! Runtime-free logic for the Mac Free Apps catalog: data models, the
//! catalog service, the storage abstraction, metadata normalization, and
//! intent routing.
//!
//! This crate performs no network or filesystem I/O. Transports, the JSON
//! file store, the conversational assistant, and the HTTP surface live in
//! the `macfreeapps` crate.

pub mod catalog;
pub mod error;
pub mod intent;
pub mod models;
pub mod normalize;
pub mod store;
