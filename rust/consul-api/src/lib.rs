#![warn(missing_docs)]

//! Shared plumbing for typed Consul HTTP API clients.
//!
//! Higher level clients (KV, prepared queries) are generic over a
//! [Transport]. A [Transport] takes a [Request] built by the client and
//! returns the raw [Response]; everything the clients know about status codes
//! and JSON shapes lives on top of that seam.
//!
//! ```rust
//! use consul_api::{Config, HttpTransport};
//!
//! let config = Config::new("127.0.0.1:8500")
//!     .with_datacenter("dc1")
//!     .with_token("secret");
//!
//! let transport = HttpTransport::new(config).unwrap();
//! # drop(transport);
//! ```
//!
//! Tests use the in-memory agent emulation behind the `helpers` feature
//! instead of a live agent.

mod config;
pub use config::*;

mod error;
pub use error::*;

mod meta;
pub use meta::*;

mod options;
pub use options::*;

mod request;
pub use request::*;

mod transport;
pub use transport::*;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;
