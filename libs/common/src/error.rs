//! Storage errors shared by the repositories and the infrastructure helpers

use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not reach PostgreSQL
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A column held a value the domain type rejects
    #[error("Invalid {column} value in row: {reason}")]
    Decode {
        column: &'static str,
        reason: String,
    },

    /// A row that an earlier statement reported as present was not returned
    #[error("Expected {0} row is missing")]
    MissingRow(&'static str),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        DatabaseError::Query(err)
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
