use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    /// The server could not parse the statement.
    #[error("{0}")]
    Syntax(String),

    /// The server rejected or failed the statement for any other reason.
    #[error("{0}")]
    Execution(String),

    #[error("table {0} does not exist")]
    UnknownTable(String),

    #[error("could not connect to database: {0}")]
    Connect(String),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

/// SQLSTATE codes that mean the statement text itself is malformed.
/// `42601` is `PostgreSQL`'s `syntax_error`; `MySQL` reports its parse error (1064) as `42000`.
const SYNTAX_SQLSTATES: &[&str] = &["42601", "42000"];

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code() {
                    Some(code) if SYNTAX_SQLSTATES.iter().any(|s| code == *s) => {
                        DbError::Syntax(message)
                    }
                    _ => DbError::Execution(message),
                }
            }
            sqlx::Error::PoolTimedOut => {
                DbError::Execution("timed out waiting for a database connection".to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                DbError::Connect(err.to_string())
            }
            _ => DbError::Execution(err.to_string()),
        }
    }
}
