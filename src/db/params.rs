//! Parameter binding utilities for database queries.
//!
//! Statements refer to parameters by name (`@status`). The TDS driver binds
//! positionally (`@P1`, `@P2`, ...), so statement text is rewritten before
//! binding. Values are always bound, never interpolated into the text.

use crate::error::{DbError, DbResult};
use crate::models::{NamedParam, QueryParam};
use tiberius::Query;

/// Statement text rewritten to positional placeholders, with the values in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalStatement<'a> {
    pub sql: String,
    pub values: Vec<&'a QueryParam>,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '#' | '$')
}

fn normalized_name(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

/// Rewrite `@name` references to `@P<n>`.
///
/// References inside string literals, bracketed or quoted identifiers and
/// comments are left alone, as are `@@` globals and names with no matching
/// parameter. A name used twice maps to the same placeholder.
pub fn rewrite_named<'a>(sql: &str, params: &'a [NamedParam]) -> DbResult<PositionalStatement<'a>> {
    for (i, p) in params.iter().enumerate() {
        let name = normalized_name(&p.name);
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err(DbError::validation(format!("Invalid parameter name: '{}'", p.name)));
        }
        if params[..i]
            .iter()
            .any(|q| normalized_name(&q.name).eq_ignore_ascii_case(name))
        {
            return Err(DbError::validation(format!("Duplicate parameter name: '{}'", p.name)));
        }
    }

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut slots: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' | '[' => {
                let close = if c == '[' { ']' } else { c };
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == close {
                        // doubled delimiter is an escape
                        if chars.get(i + 1) == Some(&close) {
                            out.push(close);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                // T-SQL block comments nest
                let mut depth = 0usize;
                while i < chars.len() {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        out.push_str("/*");
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        out.push_str("*/");
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                    } else {
                        out.push(chars[i]);
                        i += 1;
                    }
                }
            }
            '@' if next == Some('@') => {
                out.push_str("@@");
                i += 2;
                while i < chars.len() && is_ident_char(chars[i]) {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            '@' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                match params
                    .iter()
                    .position(|p| normalized_name(&p.name).eq_ignore_ascii_case(&name))
                {
                    Some(idx) => {
                        let slot = match slots.iter().position(|&s| s == idx) {
                            Some(slot) => slot,
                            None => {
                                slots.push(idx);
                                slots.len() - 1
                            }
                        };
                        out.push_str(&format!("@P{}", slot + 1));
                    }
                    None => {
                        out.push('@');
                        out.push_str(&name);
                    }
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(PositionalStatement {
        sql: out,
        values: slots.into_iter().map(|idx| &params[idx].value).collect(),
    })
}

/// Bind a parameter to a TDS query.
pub(crate) fn bind_param<'a>(query: &mut Query<'a>, param: &'a QueryParam) {
    match param {
        QueryParam::Null => query.bind(Option::<&str>::None),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Rewrite and bind in one step.
pub(crate) fn prepare<'a>(sql: &str, params: &'a [NamedParam]) -> DbResult<Query<'a>> {
    let statement = rewrite_named(sql, params)?;
    let mut query = Query::new(statement.sql);
    for value in statement.values {
        bind_param(&mut query, value);
    }
    Ok(query)
}
