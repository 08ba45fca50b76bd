/// Connection Management Module
///
/// This module provides the `Database` context object: it owns the single
/// physical SQLite connection, applies connection pragmas, executes literal
/// SQL and tracks the transaction lifecycle. Every mapper, writer and reader
/// receives a `&Database` explicitly instead of reaching for global state.

use crate::config::Config;
use crate::core::{OrmError, Result};
use rusqlite::Connection;
use tracing::{debug, error, info};

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Autocommit,
    /// Transaction in progress
    Transaction,
    /// A transaction statement failed; only ROLLBACK is accepted
    Failed,
}

/// Owner of the physical connection.
#[derive(Debug, Default)]
pub struct Database {
    /// Active database connection (None if disconnected)
    connection: Option<Connection>,
    /// Path to the current database file (None for in-memory databases)
    current_path: Option<String>,
    /// Current transaction state
    transaction_state: TransactionState,
    config: Config,
}

impl Database {
    /// Creates a disconnected database context
    pub fn new() -> Self {
        Database::default()
    }

    /// Creates a disconnected context that applies `config`'s pragmas on connect
    pub fn with_config(config: Config) -> Self {
        Database {
            config,
            ..Database::default()
        }
    }

    /// Connects to the database named in `config`
    pub fn open(config: Config) -> Result<Self> {
        let path = config.database.path.clone();
        let mut db = Database::with_config(config);
        db.connect(&path)?;
        Ok(db)
    }

    /// Connects to a SQLite database at the specified path
    ///
    /// # Arguments
    ///
    /// * `conn_str` - Path to the SQLite database file, or ":memory:" for an in-memory database
    ///
    /// Foreign key enforcement is always switched on; the cascading child
    /// tables depend on it.
    pub fn connect(&mut self, conn_str: &str) -> Result<()> {
        let pragmas = self.config.pragmas()?;
        if self.connection.is_some() {
            self.close()?;
        }

        let conn = Connection::open(conn_str).map_err(|e| {
            error!("Failed to open database {}: {}", conn_str, e);
            OrmError::Database(e)
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for pragma in pragmas {
            debug!("Applying {}", pragma);
            conn.execute_batch(&pragma)?;
        }

        info!("Connected to {}", conn_str);
        self.connection = Some(conn);
        self.current_path = if conn_str != ":memory:" {
            Some(conn_str.to_string())
        } else {
            None
        };
        self.transaction_state = TransactionState::Autocommit;
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Cached statements are finalized first. Writers and readers borrow the
    /// `Database`, so none of their statements can still be open here.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            conn.flush_prepared_statement_cache();
            if let Err((conn, e)) = conn.close() {
                error!("Failed to close database: {}", e);
                self.connection = Some(conn);
                return Err(OrmError::Database(e));
            }
            debug!("Closed database connection");
        }
        self.current_path = None;
        self.transaction_state = TransactionState::Autocommit;
        Ok(())
    }

    /// Checks if there's an active database connection
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Gets the current database path (if any)
    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    /// Borrow the live connection, or fail with `NotConnected`
    pub fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or_else(|| {
            error!("Operation attempted without an open connection");
            OrmError::NotConnected
        })
    }

    /// Executes literal SQL text (one or more statements, no parameters)
    pub fn exec(&self, sql: &str) -> Result<()> {
        let conn = self.connection()?;
        debug!("exec: {}", sql);
        conn.execute_batch(sql).map_err(|e| {
            error!("Failed to execute `{}`: {}", sql, e);
            OrmError::Database(e)
        })
    }

    /// Rows modified by the most recent INSERT, UPDATE or DELETE
    pub fn changes(&self) -> Result<u64> {
        Ok(self.connection()?.changes() as u64)
    }

    /// Gets the current transaction state
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }

    /// Issues `BEGIN TRANSACTION`
    pub fn begin(&mut self) -> Result<()> {
        if self.transaction_state != TransactionState::Autocommit {
            return Err(OrmError::Transaction("Transaction already in progress".to_string()));
        }
        self.exec("BEGIN TRANSACTION;")?;
        self.transaction_state = TransactionState::Transaction;
        Ok(())
    }

    /// Issues `COMMIT TRANSACTION`
    pub fn commit(&mut self) -> Result<()> {
        match self.transaction_state {
            TransactionState::Transaction => {}
            TransactionState::Failed => {
                return Err(OrmError::Transaction(
                    "Transaction failed; roll back instead of committing".to_string(),
                ))
            }
            TransactionState::Autocommit => {
                return Err(OrmError::Transaction("No transaction in progress".to_string()))
            }
        }
        if let Err(e) = self.exec("COMMIT TRANSACTION;") {
            self.transaction_state = TransactionState::Failed;
            return Err(e);
        }
        self.transaction_state = TransactionState::Autocommit;
        Ok(())
    }

    /// Issues `ROLLBACK TRANSACTION`
    pub fn rollback(&mut self) -> Result<()> {
        if self.transaction_state == TransactionState::Autocommit {
            return Err(OrmError::Transaction("No transaction in progress".to_string()));
        }
        self.exec("ROLLBACK TRANSACTION;")?;
        self.transaction_state = TransactionState::Autocommit;
        Ok(())
    }
}
