//! SQL statement validation for read-only enforcement.
//!
//! Raw statements passed to `execute_query` must be read-only. Validation is
//! done on the [sqlparser](https://docs.rs/sqlparser/) AST with the T-SQL
//! dialect, so formatting tricks (comments, casing, batching) cannot smuggle
//! a write through.

use crate::error::{DbError, DbResult};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

/// Type of SQL statement detected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT and other read-only queries
    Select,
    /// INSERT, UPDATE, DELETE, MERGE, SELECT ... INTO
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// EXEC / EXECUTE (stored procedures)
    ProcedureCall,
    /// GRANT, REVOKE, DENY, SET, USE, KILL
    Administrative,
    /// Unknown or unparseable statement
    Unknown,
}

/// Error messages for each statement type category.
mod error_messages {
    pub const DML_WRITE: &str = "The browser is read-only; data modification is not supported.";
    pub const DDL: &str = "The browser is read-only; schema modification is not supported.";
    pub const TRANSACTION: &str = "Transaction control is not supported.";
    pub const PROCEDURE: &str =
        "Stored procedure calls are not supported because their effects cannot be verified.";
    pub const ADMINISTRATIVE: &str = "Administrative statements are not supported.";
    pub const UNKNOWN: &str = "Unrecognized SQL statement. Only SELECT queries are allowed.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
}

/// Validate that `sql` only reads data.
///
/// Returns `Ok(())` if every statement in the batch is a query, or
/// `Err(DbError::ReadOnly)` naming the first offending statement.
///
/// # Examples
///
/// ```
/// use db_browser::db::sql_validator::validate_readonly;
///
/// assert!(validate_readonly("SELECT TOP 10 * FROM [sales].[orders]").is_ok());
/// assert!(validate_readonly("DELETE FROM [sales].[orders]").is_err());
/// ```
pub fn validate_readonly(sql: &str) -> DbResult<()> {
    let statements = Parser::parse_sql(&MsSqlDialect {}, sql).map_err(|e| {
        DbError::validation(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    if statements.is_empty() {
        return Err(DbError::validation("Empty SQL statement"));
    }

    for stmt in statements {
        validate_statement(&stmt)?;
    }

    Ok(())
}

/// Validate a single parsed statement.
fn validate_statement(stmt: &Statement) -> DbResult<()> {
    let (stmt_type, operation_name) = classify_statement(stmt);

    let reason = match stmt_type {
        SqlStatementType::Select => return Ok(()),
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::ProcedureCall => error_messages::PROCEDURE,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(DbError::read_only(operation_name, reason))
}

/// True if the query body materialises a new table (`SELECT ... INTO`).
fn query_writes(query: &Query) -> bool {
    set_expr_writes(&query.body)
}

fn set_expr_writes(expr: &SetExpr) -> bool {
    match expr {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::Query(query) => query_writes(query),
        SetExpr::SetOperation { left, right, .. } => set_expr_writes(left) || set_expr_writes(right),
        _ => false,
    }
}

/// Classify a parsed statement into a statement type.
fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(query) if query_writes(query) => {
            (SqlStatementType::DmlWrite, "SELECT INTO")
        }
        Statement::Query(_) => (SqlStatementType::Select, "SELECT"),

        Statement::Insert(_) => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),

        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex(_) => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (SqlStatementType::Ddl, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (SqlStatementType::Ddl, "CREATE DATABASE"),
        Statement::CreateFunction { .. } => (SqlStatementType::Ddl, "CREATE FUNCTION"),
        Statement::CreateProcedure { .. } => (SqlStatementType::Ddl, "CREATE PROCEDURE"),
        Statement::CreateTrigger { .. } => (SqlStatementType::Ddl, "CREATE TRIGGER"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (SqlStatementType::Ddl, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (SqlStatementType::Ddl, "ALTER INDEX"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::DropFunction { .. } => (SqlStatementType::Ddl, "DROP FUNCTION"),
        Statement::DropProcedure { .. } => (SqlStatementType::Ddl, "DROP PROCEDURE"),
        Statement::DropTrigger { .. } => (SqlStatementType::Ddl, "DROP TRIGGER"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),

        Statement::Call { .. } => (SqlStatementType::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (SqlStatementType::ProcedureCall, "EXECUTE"),

        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Deny { .. } => (SqlStatementType::Administrative, "DENY"),
        Statement::Set(_) => (SqlStatementType::Administrative, "SET"),
        Statement::Use(_) => (SqlStatementType::Administrative, "USE"),
        Statement::Kill { .. } => (SqlStatementType::Administrative, "KILL"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}
