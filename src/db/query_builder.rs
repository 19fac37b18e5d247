//! Query options translation.
//!
//! Turns a [`QueryOptions`] descriptor into a windowed T-SQL `SELECT` plus a
//! `COUNT_BIG` query sharing the same `WHERE` clause and parameters. Pure: no
//! I/O happens here, so the translation is unit tested without a server.
//!
//! Identifiers are bracket-quoted and every filter value is bound as a named
//! parameter (`@filter0`, `@filter1_0`, ...). User text never reaches the
//! statement.

use crate::error::{DbError, DbResult};
use crate::models::{Filter, FilterOperator, NamedParam, Pagination, QueryOptions, QueryParam, Sort};
use serde_json::Value as JsonValue;

/// Statements for one table read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    /// Windowed row query
    pub select_sql: String,
    /// `SELECT COUNT_BIG(*) AS total ...` with the same filters
    pub count_sql: String,
    pub params: Vec<NamedParam>,
}

/// Quote an identifier with brackets, doubling any `]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[table]` or `[table]`.
pub fn qualified_table(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

/// Escape LIKE metacharacters so the text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '[' => out.push_str("[[]"),
            '%' => out.push_str("[%]"),
            '_' => out.push_str("[_]"),
            _ => out.push(c),
        }
    }
    out
}

fn require_name(kind: &str, name: &str) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(DbError::validation(format!("{} name must not be empty", kind)));
    }
    Ok(())
}

fn like_param(filter: &Filter, pattern: impl Fn(&str) -> String) -> DbResult<QueryParam> {
    let value = QueryParam::from_json(&filter.value)?;
    if value.is_null() {
        return Err(DbError::validation(format!(
            "Filter on '{}' needs a value for {:?}",
            filter.column, filter.operator
        )));
    }
    Ok(QueryParam::String(pattern(&escape_like(&value.to_text()))))
}

fn list_values<'v>(filter: &'v Filter) -> DbResult<&'v [JsonValue]> {
    filter.value.as_array().map(Vec::as_slice).ok_or_else(|| {
        DbError::validation(format!(
            "Filter on '{}' with {:?} needs an array value",
            filter.column, filter.operator
        ))
    })
}

/// Translate one filter into a clause, pushing its parameters.
fn filter_clause(index: usize, filter: &Filter, params: &mut Vec<NamedParam>) -> DbResult<String> {
    require_name("Filter column", &filter.column)?;
    let column = quote_ident(&filter.column);
    let name = format!("filter{}", index);

    let clause = match filter.operator {
        FilterOperator::Equals => {
            let value = QueryParam::from_json(&filter.value)?;
            if value.is_null() {
                return Ok(format!("{} IS NULL", column));
            }
            params.push(NamedParam::new(&name, value));
            format!("{} = @{}", column, name)
        }
        FilterOperator::Contains => {
            params.push(NamedParam::new(&name, like_param(filter, |v| format!("%{}%", v))?));
            format!("{} LIKE @{}", column, name)
        }
        FilterOperator::StartsWith => {
            params.push(NamedParam::new(&name, like_param(filter, |v| format!("{}%", v))?));
            format!("{} LIKE @{}", column, name)
        }
        FilterOperator::EndsWith => {
            params.push(NamedParam::new(&name, like_param(filter, |v| format!("%{}", v))?));
            format!("{} LIKE @{}", column, name)
        }
        FilterOperator::GreaterThan | FilterOperator::LessThan => {
            let value = QueryParam::from_json(&filter.value)?;
            if value.is_null() {
                return Err(DbError::validation(format!(
                    "Filter on '{}' cannot compare against null",
                    filter.column
                )));
            }
            let op = if filter.operator == FilterOperator::GreaterThan { ">" } else { "<" };
            params.push(NamedParam::new(&name, value));
            format!("{} {} @{}", column, op, name)
        }
        FilterOperator::Between => {
            let values = list_values(filter)?;
            let [low, high] = values else {
                return Err(DbError::validation(format!(
                    "Filter on '{}' with between needs exactly two values, got {}",
                    filter.column,
                    values.len()
                )));
            };
            let low_name = format!("{}_0", name);
            let high_name = format!("{}_1", name);
            params.push(NamedParam::new(&low_name, QueryParam::from_json(low)?));
            params.push(NamedParam::new(&high_name, QueryParam::from_json(high)?));
            format!("{} BETWEEN @{} AND @{}", column, low_name, high_name)
        }
        FilterOperator::In => {
            let values = list_values(filter)?;
            if values.is_empty() {
                return Ok("1 = 0".to_string());
            }
            let mut names = Vec::with_capacity(values.len());
            for (k, value) in values.iter().enumerate() {
                let item = format!("{}_{}", name, k);
                params.push(NamedParam::new(&item, QueryParam::from_json(value)?));
                names.push(format!("@{}", item));
            }
            format!("{} IN ({})", column, names.join(", "))
        }
    };
    Ok(clause)
}

/// Build the `WHERE` clause (without the keyword) and its parameters.
///
/// Returns `None` when there are no filters. Clauses are joined with AND.
pub fn build_where(filters: &[Filter]) -> DbResult<(Option<String>, Vec<NamedParam>)> {
    let mut params = Vec::new();
    let mut clauses = Vec::with_capacity(filters.len());
    for (index, filter) in filters.iter().enumerate() {
        clauses.push(filter_clause(index, filter, &mut params)?);
    }
    if clauses.is_empty() {
        Ok((None, params))
    } else {
        Ok((Some(clauses.join(" AND ")), params))
    }
}

/// Build the `ORDER BY` clause (without the keyword).
///
/// Paginated reads need an ordering; without explicit sorts a neutral
/// `(SELECT NULL)` is used, which gives no stable order across pages.
pub fn build_order_by(sorts: &[Sort], pagination: Option<&Pagination>) -> DbResult<Option<String>> {
    if !sorts.is_empty() {
        let mut parts = Vec::with_capacity(sorts.len());
        for sort in sorts {
            require_name("Sort column", &sort.column)?;
            parts.push(format!("{} {}", quote_ident(&sort.column), sort.direction.as_sql()));
        }
        return Ok(Some(parts.join(", ")));
    }
    Ok(pagination.map(|_| "(SELECT NULL)".to_string()))
}

/// Build the row query and count query for one table read.
pub fn build_table_query(
    table: &str,
    schema: Option<&str>,
    options: &QueryOptions,
) -> DbResult<TableQuery> {
    require_name("Table", table)?;
    if let Some(schema) = schema {
        require_name("Schema", schema)?;
    }
    if let Some(pagination) = &options.pagination {
        pagination.validate()?;
    }

    let target = qualified_table(table, schema);
    let (where_clause, params) = build_where(&options.filters)?;
    let order_by = build_order_by(&options.sorts, options.pagination.as_ref())?;

    let mut select_sql = format!("SELECT * FROM {}", target);
    let mut count_sql = format!("SELECT COUNT_BIG(*) AS total FROM {}", target);
    if let Some(where_clause) = &where_clause {
        select_sql.push_str(" WHERE ");
        select_sql.push_str(where_clause);
        count_sql.push_str(" WHERE ");
        count_sql.push_str(where_clause);
    }
    if let Some(order_by) = &order_by {
        select_sql.push_str(" ORDER BY ");
        select_sql.push_str(order_by);
    }
    if let Some(pagination) = &options.pagination {
        select_sql.push_str(&format!(
            " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            pagination.offset(),
            pagination.page_size
        ));
    }

    Ok(TableQuery {
        select_sql,
        count_sql,
        params,
    })
}
