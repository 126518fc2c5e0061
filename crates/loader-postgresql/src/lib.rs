//! PostgreSQL connector for the load engine.
//!
//! Rows are written with multi-row `INSERT` statements using `$n`
//! placeholders, one transaction per batch.

pub mod connector;
pub mod error;
pub mod insert;

pub use connector::{PostgreSQLConnection, PostgreSQLConnector};
pub use error::PostgreSQLLoaderError;
