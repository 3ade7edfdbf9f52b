//! Configuration for the Firebird connector.
//!
//! Holds the connection settings the host hands to the connector, the replication form
//! settings, and a hierarchical loader for file and environment based configuration.

mod environment;
pub mod load;
mod secret;
pub mod shared;

pub use environment::Environment;
pub use secret::SerializableSecretString;
