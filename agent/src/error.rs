use db::DbError;
use db::guard::GuardError;
use thiserror::Error;

/// Failure of a single tool call. These never end a run: the loop hands them back to the
/// model as the tool's result so it can correct itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Bad arguments, unknown tool or table, or a statement that is not read-only.
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("QuerySyntaxError: {0}")]
    QuerySyntax(String),

    /// The database rejected the query or did not answer in time.
    #[error("ExecutionError: {0}")]
    Execution(String),
}

impl From<GuardError> for ToolError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Syntax(message) => ToolError::QuerySyntax(message),
            other => ToolError::Validation(other.to_string()),
        }
    }
}

impl From<DbError> for ToolError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Syntax(message) => ToolError::QuerySyntax(message),
            DbError::UnknownTable(_) => ToolError::Validation(err.to_string()),
            other => ToolError::Execution(other.to_string()),
        }
    }
}

/// Failures that end a run or reject a request outright.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("transcript invariant violated: {0}")]
    InvariantViolation(String),

    #[error("session {0} is already answering a question")]
    Busy(String),

    #[error("no session with id {0}")]
    UnknownSession(String),
}
