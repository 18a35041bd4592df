//! DatabaseSink - parameterized inserts, one transaction per batch
//!
//! Each record runs inside its own savepoint: a bad record rolls back and
//! is skipped, the rest of the batch still commits. A connection-level
//! failure aborts the whole batch and is recorded as a sink failure.

use async_trait::async_trait;
use tokio_postgres::NoTls;
use tracing::{error, info, instrument, warn};

use contracts::{ContractError, DatabaseSinkConfig, Message, OutputSink};

/// Sink that writes each message through a configured insert statement
///
/// The statement receives `$1` = symbol, `$2` = timestamp, `$3` = the full
/// record as JSON text. The connection is opened at startup and owned for
/// the process lifetime.
pub struct DatabaseSink {
    client: tokio_postgres::Client,
    insert_sql: String,
    _connection_task: tokio::task::JoinHandle<()>,
}

impl DatabaseSink {
    /// Open the connection and spawn its driver task
    ///
    /// # Errors
    /// Returns [`ContractError::SinkConnection`] when the database is
    /// unreachable.
    #[instrument(name = "database_sink_connect", skip(config))]
    pub async fn connect(config: &DatabaseSinkConfig) -> Result<Self, ContractError> {
        let (client, connection) = tokio_postgres::connect(&config.connection_string, NoTls)
            .await
            .map_err(|e| ContractError::sink_connection("database", e.to_string()))?;

        // the connection future drives the socket until the client drops
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "database connection terminated");
            }
        });

        info!("database sink connected");
        Ok(Self {
            client,
            insert_sql: config.insert_sql.clone(),
            _connection_task: connection_task,
        })
    }
}

#[async_trait]
impl OutputSink for DatabaseSink {
    fn name(&self) -> &str {
        "database"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        let mut transaction = self
            .client
            .transaction()
            .await
            .map_err(|e| ContractError::sink_write("database", format!("begin failed: {e}")))?;

        let mut inserted = 0usize;
        let mut skipped = 0usize;

        for message in batch {
            let symbol = message.symbol().unwrap_or_default();
            let timestamp = message.timestamp().unwrap_or_default();
            let payload = serde_json::to_string(message.fields())
                .map_err(|e| ContractError::sink_write("database", e.to_string()))?;

            // savepoint per record: a bad insert must not poison the batch
            let savepoint = transaction
                .transaction()
                .await
                .map_err(|e| ContractError::sink_write("database", format!("savepoint failed: {e}")))?;

            match savepoint
                .execute(self.insert_sql.as_str(), &[&symbol, &timestamp, &payload])
                .await
            {
                Ok(_) => {
                    savepoint.commit().await.map_err(|e| {
                        ContractError::sink_write("database", format!("savepoint commit failed: {e}"))
                    })?;
                    inserted += 1;
                }
                Err(e) => {
                    warn!(symbol, error = %e, "record insert failed, skipping");
                    savepoint.rollback().await.map_err(|e| {
                        ContractError::sink_write("database", format!("savepoint rollback failed: {e}"))
                    })?;
                    skipped += 1;
                }
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| ContractError::sink_write("database", format!("commit failed: {e}")))?;

        info!(inserted, skipped, "batch written to database");
        Ok(())
    }
}
