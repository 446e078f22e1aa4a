use thiserror::Error;

use crate::traits::RepositoryError;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Document {0} could not be parsed. {1}")]
    CorruptDocument(String, String),
    #[error("Document {0} could not be serialized. {1}")]
    SerializationError(String, String),
}

impl From<SqliteDatabaseError> for RepositoryError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::CorruptDocument(id, msg) => RepositoryError::CorruptDocument(id, msg),
            SqliteDatabaseError::SerializationError(id, msg) => RepositoryError::SerializationError(id, msg),
            e => RepositoryError::DatabaseError(e.to_string()),
        }
    }
}
