#![warn(missing_docs)]

//! Typed client for the Consul KV store.
//!
//! [KvClient] wraps the HTTP endpoints (`get`, prefix listing, key listing,
//! writes, check-and-set and session locks) and decodes responses into
//! [KeyValueEntry] values. [build_tree] turns a flat prefix listing back into
//! the directory hierarchy its keys describe.
//!
//! ```rust,no_run
//! use consul_api::{Config, HttpTransport};
//! use consul_kv::{KeyValueEntry, KvClient};
//!
//! # async fn example() -> Result<(), consul_api::ApiError> {
//! let kv = KvClient::new(HttpTransport::new(Config::from_env()?)?);
//!
//! kv.put(&KeyValueEntry::new("service/web/port", "8080")).await?;
//! let (tree, _) = kv.tree("service/").await?;
//! assert!(tree.find_directory("service/web/").is_some());
//! # Ok(())
//! # }
//! ```

mod client;
pub use client::*;

mod entry;
pub use entry::*;

mod tree;
pub use tree::*;
