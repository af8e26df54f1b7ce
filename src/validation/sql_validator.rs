use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{EtlError, Result};

/// Checks that extraction statements are a single read-only SELECT
pub struct SqlValidator;

impl SqlValidator {
    /// Validate SQL query and ensure it's one plain SELECT statement
    pub fn validate_select_only(sql: &str) -> Result<()> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, sql)
            .map_err(|e| EtlError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        let stmt = match ast.as_slice() {
            [] => return Err(EtlError::InvalidSql("Empty SQL query".to_string())),
            [stmt] => stmt,
            _ => {
                return Err(EtlError::InvalidSql(format!(
                    "Expected a single statement, found {}",
                    ast.len()
                )))
            }
        };

        match stmt {
            Statement::Query(query) => match query.body.as_ref() {
                SetExpr::Select(_) => Ok(()),
                other => Err(EtlError::InvalidSql(format!(
                    "Only SELECT queries are permitted. Found: {}",
                    other
                ))),
            },
            other => Err(EtlError::InvalidSql(format!(
                "Only SELECT queries are permitted. Found: {}",
                other
            ))),
        }
    }
}
