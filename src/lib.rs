//! # vkv
//!
//! Export, import, snapshot and search secrets stored in a namespaced,
//! versioned key/value store (KV v2 engines).
//!
//! ## Architecture
//!
//! ```text
//! CLI → Walker → Projection → Renderer → stdout / GET /export
//!  ↓       ↓
//! Import  StoreClient (HTTP facade | in-memory store)
//! Snapshot
//! Search
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use vkv::render::{OutputFormat, RenderOptions, Renderer};
//! use vkv::store::{InMemoryStore, SecretLeaf};
//! use vkv::walker::walk_subtree;
//!
//! #[tokio::main]
//! async fn main() -> vkv::Result<()> {
//!     let store = InMemoryStore::new();
//!     store.put("", "kv", "app/db", SecretLeaf::from_pairs([("user", "admin")]))?;
//!
//!     let tree = walk_subtree(&store, "", "kv", "", false).await?;
//!     let renderer = Renderer::new(RenderOptions::with_format(OutputFormat::Yaml))?;
//!     print!("{}", renderer.render("kv", "", &tree)?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod import;
pub mod observability;
pub mod projection;
pub mod render;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod utils;
pub mod walker;

// Re-export commonly used types and traits
pub use config::{RenewalConfig, StoreConfig};
pub use errors::{Result, VkvError};
pub use store::{InMemoryStore, SecretLeaf, SecretValue, StoreClient, Tree};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
