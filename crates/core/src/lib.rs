//! Domain types and pure rules for the PO management client.
//!
//! Nothing in this crate performs I/O. The async session, query and
//! upload machinery lives in `pomgmt-client` and builds on these types.

pub mod endpoints;
pub mod error;
pub mod pagination;
pub mod query;
pub mod session;
pub mod types;
pub mod upload;
