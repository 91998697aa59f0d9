//! Read-only statement guard.
//!
//! Every statement that reaches the database from the agent passes through
//! [`ensure_read_only`] first. The check fails closed: anything that is not a single plain
//! query is refused before a connection is touched.

use sqlparser::ast::Statement;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use thiserror::Error;

use crate::Dialect;

/// Unquoted keywords that may write, lock, or change schema or privileges.
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "MERGE", "INTO", "CALL", "COPY", "RENAME",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("the query is empty")]
    Empty,

    #[error("{0} statements are not allowed, only read-only queries may be run")]
    Mutating(String),

    #[error("only one statement may be run at a time, found {0}")]
    MultipleStatements(usize),

    #[error("only SELECT queries may be run, got: {0}")]
    NotAQuery(String),

    #[error("MySQL executable comments and optimizer hints (`/*!` or `/*+`) are not allowed")]
    ExecutableComment,

    #[error("{0}")]
    Syntax(String),
}

/// Checks that `sql` is exactly one read-only query and returns it normalised by the parser.
pub fn ensure_read_only(dialect: Dialect, sql: &str) -> Result<String, GuardError> {
    let sql = sql.trim();
    if sql.trim_end_matches(';').trim().is_empty() {
        return Err(GuardError::Empty);
    }

    let parser_dialect = dialect.parser_dialect();

    let tokens = Tokenizer::new(&*parser_dialect, sql)
        .tokenize()
        .map_err(|e| GuardError::Syntax(e.to_string()))?;

    for token in &tokens {
        match token {
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_ascii_uppercase();
                if MUTATING_KEYWORDS.contains(&upper.as_str()) {
                    return Err(GuardError::Mutating(upper));
                }
            }
            // MySQL runs the body of `/*! ... */` and reads `/*+ ... */` as hints.
            Token::Whitespace(Whitespace::MultiLineComment(body))
                if dialect == Dialect::MySql && body.starts_with(['!', '+']) =>
            {
                return Err(GuardError::ExecutableComment);
            }
            _ => {}
        }
    }

    let statements =
        Parser::parse_sql(&*parser_dialect, sql).map_err(|e| GuardError::Syntax(e.to_string()))?;

    match statements.as_slice() {
        [] => Err(GuardError::Empty),
        [Statement::Query(query)] => Ok(query.to_string()),
        [other] => Err(GuardError::NotAQuery(truncate(&other.to_string(), 80))),
        many => Err(GuardError::MultipleStatements(many.len())),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_queries() {
        let normalised =
            ensure_read_only(Dialect::Postgres, "select count(*) from orders;").unwrap();
        assert!(normalised.starts_with("SELECT"));
        assert!(normalised.ends_with("FROM orders"));

        assert!(
            ensure_read_only(
                Dialect::MySql,
                "WITH big AS (SELECT id FROM orders WHERE total > 100) SELECT COUNT(*) FROM big"
            )
            .is_ok()
        );
        assert!(ensure_read_only(Dialect::Postgres, "SELECT 1 UNION SELECT 2").is_ok());
    }

    #[test]
    fn rejects_mutating_statements() {
        for sql in [
            "INSERT INTO orders (id) VALUES (1)",
            "UPDATE orders SET total = 0",
            "DELETE FROM orders",
            "DROP TABLE orders",
            "truncate orders",
        ] {
            let err = ensure_read_only(Dialect::Postgres, sql).unwrap_err();
            assert!(matches!(err, GuardError::Mutating(_)), "{sql}: {err:?}");
        }
    }

    #[test]
    fn rejects_mutation_hidden_after_a_query() {
        let err =
            ensure_read_only(Dialect::MySql, "SELECT * FROM orders; DROP TABLE orders").unwrap_err();
        assert_eq!(err, GuardError::Mutating("DROP".to_string()));
    }

    #[test]
    fn rejects_select_into() {
        let err = ensure_read_only(Dialect::Postgres, "SELECT * INTO backup FROM orders")
            .unwrap_err();
        assert_eq!(err, GuardError::Mutating("INTO".to_string()));
    }

    #[test]
    fn ignores_keywords_in_literals_and_quoted_names() {
        assert!(
            ensure_read_only(
                Dialect::Postgres,
                r#"SELECT "update" FROM audit WHERE note = 'please delete me'"#
            )
            .is_ok()
        );
        assert!(ensure_read_only(Dialect::MySql, "SELECT `drop` FROM t").is_ok());
    }

    #[test]
    fn rejects_mysql_executable_comments() {
        for sql in [
            "SELECT 1 /*! INTO OUTFILE '/tmp/x' */",
            "SELECT 1 /*!; DELETE FROM orders */",
            "SELECT /*+ MAX_EXECUTION_TIME(1) */ id FROM orders",
        ] {
            assert_eq!(
                ensure_read_only(Dialect::MySql, sql),
                Err(GuardError::ExecutableComment),
                "{sql}"
            );
        }
        assert!(ensure_read_only(Dialect::MySql, "SELECT 1 /* plain note */").is_ok());
    }

    #[test]
    fn normalised_query_drops_comments() {
        let normalised =
            ensure_read_only(Dialect::Postgres, "SELECT id /* note */ FROM orders -- trailing")
                .unwrap();
        assert_eq!(normalised, "SELECT id FROM orders");
    }

    #[test]
    fn rejects_multiple_queries() {
        let err = ensure_read_only(Dialect::Postgres, "SELECT 1; SELECT 2").unwrap_err();
        assert_eq!(err, GuardError::MultipleStatements(2));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = ensure_read_only(Dialect::Postgres, "SELEC * FROM orders").unwrap_err();
        assert!(matches!(err, GuardError::Syntax(_)));
    }

    #[test]
    fn rejects_empty_and_non_queries() {
        assert_eq!(ensure_read_only(Dialect::MySql, "  ; "), Err(GuardError::Empty));
        assert!(matches!(
            ensure_read_only(Dialect::MySql, "SHOW TABLES"),
            Err(GuardError::NotAQuery(_))
        ));
    }
}
