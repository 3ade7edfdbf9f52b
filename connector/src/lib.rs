//! Firebird connector for a plugin host.
//!
//! Exposes schema discovery, sampled and streaming reads, replication into golden and
//! version tables, and stored-procedure writes. Every database access goes through the
//! executor traits in [`firebird::executor`]; the host-facing entry point is
//! [`service::Connector`].

pub mod connection;
pub mod conversions;
pub mod discovery;
pub mod error;
mod macros;
pub mod read;
pub mod replication;
pub mod schema;
pub mod service;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod write;
