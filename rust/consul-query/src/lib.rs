#![warn(missing_docs)]

//! Typed client for Consul prepared queries.
//!
//! A prepared query is a stored service lookup (service name, tag filters,
//! datacenter failover) that can later be executed by id or by name.
//! [PreparedQueryClient] manages definitions and executes them, decoding the
//! results into the types in this crate.

mod client;
pub use client::*;

mod types;
pub use types::*;
