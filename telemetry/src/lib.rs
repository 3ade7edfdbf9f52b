//! Tracing setup shared by the connector binaries and tests.

pub mod tracing;
