//! Error types for the MySQL connector.

use loader_framework::ConnectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MySQLLoaderError {
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    #[error("Invalid connection URL: {0}")]
    Url(#[from] mysql_async::UrlError),
}

impl From<MySQLLoaderError> for ConnectionError {
    fn from(err: MySQLLoaderError) -> Self {
        match &err {
            MySQLLoaderError::MySQL(mysql_async::Error::Io(_)) => {
                ConnectionError::Disconnected(err.to_string())
            }
            MySQLLoaderError::MySQL(_) => ConnectionError::Statement(err.to_string()),
            MySQLLoaderError::Url(_) => ConnectionError::Connect(err.to_string()),
        }
    }
}
