//! Remote store access.
//!
//! The [`StoreClient`] trait exposes the handful of list/read/write and
//! administrative calls vkv needs. [`HttpStoreClient`] implements it over
//! the store's HTTP API, [`InMemoryStore`] in process.

pub mod client;
pub mod http;
pub mod memory;
pub mod token;
pub mod types;

pub use client::StoreClient;
pub use http::HttpStoreClient;
pub use memory::InMemoryStore;
pub use token::{needs_renewal, start_refresher, TokenRefresher};
pub use types::{
    Capability, EngineMap, FlatSecrets, NamespaceMap, Node, SecretLeaf, SecretValue, Tree,
};
