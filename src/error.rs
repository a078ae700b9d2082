use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Text sent to a client on an `ERROR:` line before its link is closed.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Protocol(_) => "Bad join".to_string(),
            AppError::Database(_) => "Could not create game".to_string(),
            _ => "Server error".to_string(),
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::QueryError(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Connection(err.into())
    }
}

/// Malformed input from a client. Scoped to a single connection or message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("expected JOIN handshake")]
    MissingJoinPrefix,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Connection closed")]
    Closed,
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::Io(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Connection(ConnectionError::Io(_))));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::Database(DatabaseError::NotFound)));

        let app_err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(
            app_err,
            AppError::Database(DatabaseError::ConnectionError(_))
        ));
    }

    #[test]
    fn test_client_messages() {
        let err = AppError::Protocol(ProtocolError::EmptyUsername);
        assert_eq!(err.client_message(), "Bad join");

        let err = AppError::Database(DatabaseError::QueryError("boom".into()));
        assert_eq!(err.client_message(), "Could not create game");
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Protocol(ProtocolError::MissingField("username"));
        assert_eq!(err.to_string(), "Protocol error: missing field: username");

        let err = AppError::Database(DatabaseError::NotFound);
        assert_eq!(err.to_string(), "Database error: Record not found");

        let err = ProtocolError::UnknownCommand("DANCE".into());
        assert_eq!(err.to_string(), "unknown command: DANCE");
    }
}
