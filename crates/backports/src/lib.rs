//! Backports - keep a document store in sync with tracker issues.
//!
//! For every issue matched by a tracker query, the crate resolves the chain
//! of issues cloned from it and stores the result as one nested snapshot.
//! Snapshots of issues the query no longer matches are removed at the end of
//! each run.
//!
//! The pieces, leaf first:
//!
//! - [`transport`]: HTTP transport that retries rate-limited requests
//! - [`tracker`]: issue tracker interface and its REST client
//! - [`resolver`]: depth-bounded clone-chain resolution
//! - [`sync`]: paginated sync with stale-document reconciliation
//! - [`storage`]: document store trait with memory and JSONL backends

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod app;
pub mod config;
pub mod custom_field;
pub mod domain;
pub mod error;
pub mod output;
pub mod resolver;
pub mod storage;
pub mod sync;
pub mod tracker;
pub mod transport;

// Public CLI module (needed by binary)
pub mod cli;
