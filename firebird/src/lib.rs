//! Firebird building blocks shared by the connector.
//!
//! This crate knows about the Firebird catalog and its type system but never talks to a
//! server itself: connections are obtained through the [`executor`] traits, which a driver
//! integration implements.

pub mod catalog;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod types;

pub use error::{DriverError, DriverErrorKind};
