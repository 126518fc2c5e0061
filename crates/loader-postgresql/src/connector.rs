//! Connector opening PostgreSQL connections for loader workers.

use async_trait::async_trait;
use loader_framework::{Connection, ConnectionError, Connector, InsertRow, PostLoadStep};
use tokio::task::JoinHandle;
use tokio_postgres::config::Host;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

use crate::error::PostgreSQLLoaderError;
use crate::insert::{insert_rows, truncate_sql};

/// Opens connections to one PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgreSQLConnector {
    config: Config,
    target: String,
}

impl PostgreSQLConnector {
    /// Parse `connection_string`, either a `postgresql://` URL or
    /// `host=... user=...` key/value pairs.
    pub fn new(connection_string: &str) -> Result<Self, PostgreSQLLoaderError> {
        let config: Config = connection_string
            .parse()
            .map_err(|e: tokio_postgres::Error| PostgreSQLLoaderError::Config(e.to_string()))?;
        let target = describe_config(&config);
        Ok(Self { config, target })
    }
}

fn describe_config(config: &Config) -> String {
    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        #[cfg(unix)]
        Some(Host::Unix(path)) => path.display().to_string(),
        None => "localhost".to_string(),
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);
    let dbname = config.get_dbname().unwrap_or("postgres");
    format!("postgresql://{host}:{port}/{dbname}")
}

#[async_trait]
impl Connector for PostgreSQLConnector {
    type Connection = PostgreSQLConnection;

    async fn connect(&self) -> Result<PostgreSQLConnection, ConnectionError> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        Ok(PostgreSQLConnection { client, task })
    }

    fn describe(&self) -> String {
        self.target.clone()
    }
}

/// One PostgreSQL session plus the task driving its socket.
pub struct PostgreSQLConnection {
    client: Client,
    task: JoinHandle<()>,
}

impl PostgreSQLConnection {
    async fn insert(&mut self, rows: &[InsertRow]) -> Result<u64, PostgreSQLLoaderError> {
        let tx = self.client.transaction().await?;
        let written = insert_rows(&tx, rows).await?;
        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl Connection for PostgreSQLConnection {
    async fn truncate(&mut self, table: &str) -> Result<(), ConnectionError> {
        self.client
            .batch_execute(&truncate_sql(table))
            .await
            .map_err(PostgreSQLLoaderError::from)?;
        debug!("Truncated PostgreSQL table {}", table);
        Ok(())
    }

    async fn write_batch(&mut self, rows: &[InsertRow]) -> Result<u64, ConnectionError> {
        Ok(self.insert(rows).await?)
    }

    async fn post_load(&mut self, step: &PostLoadStep) -> Result<u64, ConnectionError> {
        let sql = step.to_sql();
        let affected = self
            .client
            .execute(sql.as_str(), &[])
            .await
            .map_err(PostgreSQLLoaderError::from)?;
        Ok(affected)
    }

    async fn query_text(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, ConnectionError> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(PostgreSQLLoaderError::from)?;

        let rows = messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect();
        Ok(rows)
    }

    async fn close(self) -> Result<(), ConnectionError> {
        drop(self.client);
        self.task
            .await
            .map_err(|e| ConnectionError::Disconnected(e.to_string()))
    }
}
