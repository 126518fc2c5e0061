//! Error types for the PostgreSQL connector.

use loader_framework::ConnectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgreSQLLoaderError {
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    #[error("Invalid connection string: {0}")]
    Config(String),
}

impl From<PostgreSQLLoaderError> for ConnectionError {
    fn from(err: PostgreSQLLoaderError) -> Self {
        match &err {
            PostgreSQLLoaderError::PostgreSQL(e) if e.is_closed() => {
                ConnectionError::Disconnected(err.to_string())
            }
            PostgreSQLLoaderError::PostgreSQL(_) => ConnectionError::Statement(err.to_string()),
            PostgreSQLLoaderError::Config(_) => ConnectionError::Connect(err.to_string()),
        }
    }
}
