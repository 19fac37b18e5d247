//! Randomized tests for the query translator.
//!
//! Hostile identifiers and filter values are fed through the translator to
//! check that values only ever travel as parameters and identifiers stay
//! inside their brackets.

use db_browser::db::build_table_query;
use db_browser::db::query_builder::{escape_like, quote_ident};
use db_browser::error::DbError;
use db_browser::models::{Filter, FilterOperator, QueryOptions, QueryParam, Sort};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use serde_json::{Value as JsonValue, json};

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random text drawn from characters that matter to T-SQL.
fn random_hostile(len: usize) -> String {
    const ALPHABET: &[char] = &[
        '[', ']', '%', '_', '\'', '"', ';', '-', '*', '/', '@', ' ', '\n', 'a', 'Z', '0', 'é',
    ];
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| *ALPHABET.choose(&mut rng).unwrap_or(&'a'))
        .collect()
}

fn edge_case_strings() -> Vec<String> {
    vec![
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "'OR 1=1--".to_string(),
        "'; DROP TABLE users--".to_string(),
        "]; DROP TABLE users--".to_string(),
        "a]]b".to_string(),
        "[dbo]".to_string(),
        "@filter0".to_string(),
        "100%_done[x]".to_string(),
        "1' UNION SELECT NULL, NULL--".to_string(),
        "a".repeat(10000),
        random_string(100),
        random_hostile(50),
    ]
}

const SCALAR_OPERATORS: [FilterOperator; 6] = [
    FilterOperator::Equals,
    FilterOperator::Contains,
    FilterOperator::StartsWith,
    FilterOperator::EndsWith,
    FilterOperator::GreaterThan,
    FilterOperator::LessThan,
];

/// Undo `quote_ident`, failing if a lone `]` appears inside the brackets.
fn unquote_ident(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('[')?.strip_suffix(']')?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == ']' {
            if chars.next() != Some(']') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Undo `escape_like`, failing if an unescaped metacharacter is present.
fn unescape_like(escaped: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let inner = chars.next()?;
                if chars.next() != Some(']') {
                    return None;
                }
                out.push(inner);
            }
            '%' | '_' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

#[test]
fn test_fuzz_values_never_reach_the_statement() {
    for value in edge_case_strings() {
        for operator in SCALAR_OPERATORS {
            let hostile = QueryOptions::new().with_filter(Filter::new("name", operator, value.clone()));
            let plain = QueryOptions::new().with_filter(Filter::new("name", operator, "x"));

            let hostile = build_table_query("t", Some("dbo"), &hostile).unwrap();
            let plain = build_table_query("t", Some("dbo"), &plain).unwrap();

            assert_eq!(hostile.select_sql, plain.select_sql, "value {:?} changed the SQL", value);
            assert_eq!(hostile.count_sql, plain.count_sql);
            assert_eq!(hostile.params.len(), 1);
        }
    }
}

#[test]
fn test_fuzz_list_values_never_reach_the_statement() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let len = rng.gen_range(1..20);
        let values: Vec<JsonValue> = (0..len)
            .map(|_| json!(random_hostile(rng.gen_range(0..30))))
            .collect();
        let placeholders: Vec<JsonValue> = (0..len).map(|i| json!(i)).collect();

        let hostile = QueryOptions::new().with_filter(Filter::new("id", FilterOperator::In, values));
        let plain =
            QueryOptions::new().with_filter(Filter::new("id", FilterOperator::In, placeholders));

        let hostile = build_table_query("t", None, &hostile).unwrap();
        let plain = build_table_query("t", None, &plain).unwrap();
        assert_eq!(hostile.select_sql, plain.select_sql);
        assert_eq!(hostile.params.len(), len);
    }
}

#[test]
fn test_fuzz_identifiers_stay_quoted() {
    let mut rng = rand::thread_rng();
    let mut names = edge_case_strings();
    names.extend((0..300).map(|_| random_hostile(rng.gen_range(1..40))));

    for name in names {
        let quoted = quote_ident(&name);
        assert_eq!(unquote_ident(&quoted).as_deref(), Some(name.as_str()));

        if name.trim().is_empty() {
            continue;
        }
        let options = QueryOptions::new()
            .with_filter(Filter::new(name.clone(), FilterOperator::Equals, 1))
            .with_sort(Sort::desc(name.clone()));
        let query = build_table_query(&name, Some(&name), &options).unwrap();
        let target = format!("{}.{}", quoted, quoted);
        assert!(query.select_sql.starts_with(&format!("SELECT * FROM {} WHERE {} = @filter0", target, quoted)));
        assert!(query.select_sql.ends_with(&format!("ORDER BY {} DESC", quoted)));
        assert_eq!(
            query.count_sql,
            format!("SELECT COUNT_BIG(*) AS total FROM {} WHERE {} = @filter0", target, quoted)
        );
    }
}

#[test]
fn test_fuzz_like_patterns_match_literally() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let text = random_hostile(rng.gen_range(0..40));
        let escaped = escape_like(&text);
        assert_eq!(unescape_like(&escaped).as_deref(), Some(text.as_str()));

        if text.is_empty() {
            continue;
        }
        let options =
            QueryOptions::new().with_filter(Filter::new("c", FilterOperator::Contains, text.clone()));
        let query = build_table_query("t", None, &options).unwrap();
        assert_eq!(
            query.params[0].value,
            QueryParam::String(format!("%{}%", escaped))
        );
    }
}

#[test]
fn test_fuzz_random_options_never_panic() {
    let mut rng = rand::thread_rng();
    let operators = [
        FilterOperator::Equals,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::Between,
        FilterOperator::In,
    ];
    let values = [
        JsonValue::Null,
        json!(true),
        json!(42),
        json!(-1.5),
        json!("text"),
        json!([]),
        json!([1]),
        json!([1, 2]),
        json!(["a", null, 3]),
        json!({"nested": 1}),
    ];

    for _ in 0..1000 {
        let mut options = QueryOptions::new();
        for _ in 0..rng.gen_range(0..4) {
            let column = if rng.gen_bool(0.1) { String::new() } else { random_hostile(8) };
            let operator = *operators.choose(&mut rng).unwrap();
            let value = values.choose(&mut rng).unwrap().clone();
            options = options.with_filter(Filter::new(column, operator, value));
        }
        if rng.gen_bool(0.5) {
            options = options.with_sort(Sort::asc(random_string(5)));
        }
        if rng.gen_bool(0.7) {
            options = options.with_pagination(rng.gen_range(0..5), rng.gen_range(0..200));
        }

        match build_table_query("orders", Some("sales"), &options) {
            Ok(query) => {
                assert!(query.select_sql.starts_with("SELECT * FROM [sales].[orders]"));
                assert!(query.count_sql.starts_with("SELECT COUNT_BIG(*) AS total FROM [sales].[orders]"));
                for param in &query.params {
                    assert!(query.select_sql.contains(&format!("@{}", param.name)));
                }
            }
            Err(err) => assert!(matches!(err, DbError::Validation { .. }), "unexpected {:?}", err),
        }
    }
}

#[test]
fn test_fuzz_pagination_bounds() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let page = rng.gen_range(1..=u32::MAX);
        let size = rng.gen_range(1..=u32::MAX);
        let options = QueryOptions::new().with_pagination(page, size);
        let query = build_table_query("t", None, &options).unwrap();
        let offset = (u64::from(page - 1) * u64::from(size)).min(i64::MAX as u64);
        assert!(query.select_sql.ends_with(&format!(
            "ORDER BY (SELECT NULL) OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            offset, size
        )));
    }
}
