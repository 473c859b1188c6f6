//! Routing client for the wiki replica databases: resolves which slice hosts
//! a database from the published dblists and hands out per-slice connections.

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod dblist;
pub mod errors;
pub mod metrics_defs;
pub mod registry;
pub mod types;

#[cfg(test)]
mod testutils;

pub use client::ReplicasClient;
pub use errors::ReplicasError;
pub use types::{DbList, SliceId};
