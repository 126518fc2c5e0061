//! MySQL connector for the load engine.

pub mod connector;
pub mod error;
pub mod insert;

pub use connector::{MySQLConnection, MySQLConnector};
pub use error::MySQLLoaderError;
