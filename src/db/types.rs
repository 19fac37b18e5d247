//! SQL Server type mappings.
//!
//! This module maps TDS column values onto the engine-agnostic [`RowValue`]
//! union and normalises catalog default expressions.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies catalog type names into logical categories
//! 2. `decode_value` handles the actual value extraction from the wire format
//!
//! Catalog type names only matter for defaults; row decoding is driven by
//! the value variant the server sends.

use crate::error::{DbError, DbResult};
use crate::models::{Row, RowValue};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use tiberius::{ColumnData, FromSql};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for SQL Server column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a SQL Server type name (as in `sys.types.name`) into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_lowercase().as_str() {
        "tinyint" | "smallint" | "int" | "bigint" => TypeCategory::Integer,
        "real" | "float" => TypeCategory::Float,
        "decimal" | "numeric" | "money" | "smallmoney" => TypeCategory::Decimal,
        "bit" => TypeCategory::Boolean,
        "char" | "varchar" | "nchar" | "nvarchar" | "text" | "ntext" | "xml" | "sysname" => {
            TypeCategory::Text
        }
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => TypeCategory::Binary,
        "uniqueidentifier" => TypeCategory::Uuid,
        "date" | "time" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" => {
            TypeCategory::Temporal
        }
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Decode one TDS value.
pub fn decode_value(data: &ColumnData<'static>) -> DbResult<RowValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| RowValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| RowValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| RowValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(RowValue::Int),
        ColumnData::F32(v) => v.map(|v| RowValue::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(RowValue::Float),
        ColumnData::Bit(v) => v.map(RowValue::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| RowValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(RowValue::Uuid),
        ColumnData::Binary(v) => v.as_ref().map(|b| RowValue::Binary(b.to_vec())),
        // Display keeps the declared scale, e.g. 12.50
        ColumnData::Numeric(v) => v.as_ref().map(|n| RowValue::Decimal(n.to_string())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| RowValue::Text(x.clone().into_owned().into_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .map_err(decode_error)?
                .map(RowValue::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(decode_error)?
            .map(RowValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .map_err(decode_error)?
            .map(RowValue::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .map_err(decode_error)?
            .map(RowValue::DateTimeOffset),
    };
    Ok(value.unwrap_or(RowValue::Null))
}

fn decode_error(err: tiberius::error::Error) -> DbError {
    DbError::internal(format!("Failed to decode column value: {}", err))
}

/// Convert a TDS row into a [`Row`], keeping the statement's column order.
pub fn decode_row(row: tiberius::Row) -> DbResult<Row> {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut out = Row::with_capacity(names.len());
    for (name, data) in names.into_iter().zip(row) {
        out.push(name, decode_value(&data)?);
    }
    Ok(out)
}

// =============================================================================
// Default Values
// =============================================================================

/// Strip the parentheses SQL Server wraps around stored defaults: `((0))` → `0`.
fn strip_parens(mut s: &str) -> &str {
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') && balanced(&s[1..s.len() - 1]) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// True if the parentheses in `s` never close more than they open.
fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    let mut in_quote = false;
    for c in s.chars() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Unquote `'abc'` or `N'abc'`, un-doubling embedded quotes.
fn unquote(s: &str) -> Option<String> {
    let body = s.strip_prefix('N').unwrap_or(s);
    if body.len() >= 2 && body.starts_with('\'') && body.ends_with('\'') {
        Some(body[1..body.len() - 1].replace("''", "'"))
    } else {
        None
    }
}

/// Parse a catalog default expression into a typed JSON value.
///
/// Type conversion rules:
/// - Integer types → JSON Number
/// - Float types → JSON Number
/// - `bit` → JSON Boolean
/// - Quoted literals → JSON String (unquoted)
/// - Decimal/money → JSON String (preserve precision)
/// - Expressions (`getdate()`, `newid()`, etc.) → JSON String
pub fn parse_default_value(default_str: &str, data_type: &str) -> JsonValue {
    let inner = strip_parens(default_str.trim());

    if let Some(text) = unquote(inner) {
        return match categorize_type(data_type) {
            TypeCategory::Integer => text
                .parse::<i64>()
                .map(JsonValue::from)
                .unwrap_or(JsonValue::String(text)),
            _ => JsonValue::String(text),
        };
    }

    match categorize_type(data_type) {
        TypeCategory::Integer => {
            if let Ok(n) = inner.parse::<i64>() {
                return JsonValue::from(n);
            }
        }
        TypeCategory::Float => {
            if let Some(num) = inner
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                return JsonValue::Number(num);
            }
        }
        TypeCategory::Boolean => match inner {
            "1" => return JsonValue::Bool(true),
            "0" => return JsonValue::Bool(false),
            _ => {}
        },
        _ => {}
    }

    if inner.eq_ignore_ascii_case("null") {
        return JsonValue::Null;
    }

    JsonValue::String(inner.to_string())
}
