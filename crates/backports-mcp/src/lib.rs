//! MCP server for synced backport snapshots.
//!
//! Exposes the document store written by `backports sync` to MCP clients
//! over stdio. The sync job owns every field except the completed flag,
//! which is the only thing these tools change.
//!
//! # Tools
//!
//! - `list_documents` - Every stored snapshot with its clone chain
//! - `mark_completed` - Set or clear the completed flag of one snapshot

pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::BackportsMcpServer;
pub use tools::Tools;
