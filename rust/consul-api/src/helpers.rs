//! Test doubles for code written against a [crate::Transport].
//!
//! [MemoryAgent] emulates the KV and prepared-query endpoints of an agent in
//! memory, including index bookkeeping, check-and-set and session locks.
//! [MemoryTransport] calls it in-process; [TestServer] exposes it over real
//! HTTP so that [crate::HttpTransport] can be exercised end to end.

mod agent;
pub use agent::*;

mod memory;
pub use memory::*;

#[cfg(not(target_arch = "wasm32"))]
mod server;
#[cfg(not(target_arch = "wasm32"))]
pub use server::*;
