mod base;
mod connection;
mod connector;
mod replication;

pub use base::*;
pub use connection::*;
pub use connector::*;
pub use replication::*;
