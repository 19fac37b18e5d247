//! Relationship resolution over an already-built relationship list.
//!
//! Nothing here performs I/O.

use crate::models::{Relationship, RelationshipType, Table};
use serde::Serialize;
use std::collections::HashMap;

/// Which side of the relationship the queried table sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The queried table owns the foreign key.
    Outbound,
    /// The queried table is referenced by the foreign key.
    Inbound,
}

/// The table on the other end of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTable<'a> {
    pub table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<&'a str>,
    pub relationship: &'a Relationship,
    pub direction: Direction,
}

/// Every relationship touching `table`, normalized to the other table.
///
/// A self-referencing foreign key is reported once, as outbound.
pub fn related_tables<'a>(
    table: &str,
    schema: Option<&str>,
    relationships: &'a [Relationship],
) -> Vec<RelatedTable<'a>> {
    relationships
        .iter()
        .filter_map(|rel| {
            if rel.is_from(table, schema) {
                Some(RelatedTable {
                    table: &rel.to_table,
                    schema: rel.to_schema.as_deref(),
                    relationship: rel,
                    direction: Direction::Outbound,
                })
            } else if rel.is_to(table, schema) {
                Some(RelatedTable {
                    table: &rel.from_table,
                    schema: rel.from_schema.as_deref(),
                    relationship: rel,
                    direction: Direction::Inbound,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Map each table key to the relationships touching that table.
///
/// Every table gets an entry, possibly empty.
pub fn analyze_relationships<'a>(
    tables: &[Table],
    relationships: &'a [Relationship],
) -> HashMap<String, Vec<&'a Relationship>> {
    tables
        .iter()
        .map(|t| {
            let related = relationships
                .iter()
                .filter(|r| r.touches(&t.name, t.schema.as_deref()))
                .collect();
            (t.key(), related)
        })
        .collect()
}

/// Cardinality of a relationship. Unique constraints are not inspected, so
/// this is always one-to-many.
pub fn determine_relationship_type(_relationship: &Relationship) -> RelationshipType {
    RelationshipType::OneToMany
}

/// One foreign-key constraint with all of its column pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintGroup {
    pub constraint_name: String,
    pub from_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_schema: Option<String>,
    pub to_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_schema: Option<String>,
    /// `(from_column, to_column)` in constraint column order.
    pub column_pairs: Vec<(String, String)>,
}

impl ConstraintGroup {
    pub fn is_composite(&self) -> bool {
        self.column_pairs.len() > 1
    }
}

/// Rebuild composite constraints from the flat one-row-per-column list.
///
/// Groups keep first-appearance order. Constraint names are only unique per
/// schema, so the owning table is part of the grouping key.
pub fn group_by_constraint(relationships: &[Relationship]) -> Vec<ConstraintGroup> {
    let mut index: HashMap<(String, &str), usize> = HashMap::new();
    let mut groups: Vec<ConstraintGroup> = Vec::new();

    for rel in relationships {
        let key = (rel.from_key(), rel.constraint_name.as_str());
        let pair = (rel.from_column.clone(), rel.to_column.clone());
        match index.get(&key) {
            Some(&i) => groups[i].column_pairs.push(pair),
            None => {
                index.insert(key, groups.len());
                groups.push(ConstraintGroup {
                    constraint_name: rel.constraint_name.clone(),
                    from_table: rel.from_table.clone(),
                    from_schema: rel.from_schema.clone(),
                    to_table: rel.to_table.clone(),
                    to_schema: rel.to_schema.clone(),
                    column_pairs: vec![pair],
                });
            }
        }
    }
    groups
}

/// Keep only relationships whose endpoints both have a key in `keys`.
pub(crate) fn retain_within(
    relationships: Vec<Relationship>,
    keys: impl Fn(&str) -> bool,
) -> Vec<Relationship> {
    relationships
        .into_iter()
        .filter(|r| keys(&r.from_key()) && keys(&r.to_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(from: &str, from_col: &str, to: &str, to_col: &str, name: &str) -> Relationship {
        Relationship {
            from_table: from.to_string(),
            from_schema: Some("sales".to_string()),
            from_column: from_col.to_string(),
            to_table: to.to_string(),
            to_schema: Some("sales".to_string()),
            to_column: to_col.to_string(),
            constraint_name: name.to_string(),
            relationship_type: RelationshipType::OneToMany,
        }
    }

    fn sample() -> Vec<Relationship> {
        vec![
            rel("orders", "customer_id", "customers", "id", "FK_orders_customers"),
            rel("order_lines", "order_id", "orders", "id", "FK_lines_orders"),
            rel("employees", "manager_id", "employees", "id", "FK_employees_manager"),
        ]
    }

    #[test]
    fn test_related_tables_both_directions() {
        let rels = sample();
        let related = related_tables("orders", Some("sales"), &rels);
        assert_eq!(related.len(), 2);

        assert_eq!(related[0].table, "customers");
        assert_eq!(related[0].direction, Direction::Outbound);
        assert_eq!(related[1].table, "order_lines");
        assert_eq!(related[1].direction, Direction::Inbound);
        assert_eq!(related[1].schema, Some("sales"));
    }

    #[test]
    fn test_related_tables_schema_must_match() {
        let rels = sample();
        assert!(related_tables("orders", None, &rels).is_empty());
        assert!(related_tables("orders", Some("dbo"), &rels).is_empty());
    }

    #[test]
    fn test_self_reference_reported_once() {
        let rels = sample();
        let related = related_tables("employees", Some("sales"), &rels);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].table, "employees");
        assert_eq!(related[0].direction, Direction::Outbound);
    }

    #[test]
    fn test_analyze_relationships_lookup() {
        let rels = sample();
        let tables = vec![
            Table::new("orders").with_schema("sales"),
            Table::new("customers").with_schema("sales"),
            Table::new("audit_log").with_schema("sales"),
        ];
        let map = analyze_relationships(&tables, &rels);
        assert_eq!(map.len(), 3);
        assert_eq!(map["sales.orders"].len(), 2);
        assert_eq!(map["sales.customers"].len(), 1);
        assert!(map["sales.audit_log"].is_empty());
    }

    #[test]
    fn test_relationship_type_is_one_to_many() {
        let rels = sample();
        assert_eq!(determine_relationship_type(&rels[0]), RelationshipType::OneToMany);
    }

    #[test]
    fn test_group_by_constraint_composite() {
        let rels = vec![
            rel("shipments", "order_id", "order_lines", "order_id", "FK_ship_line"),
            rel("shipments", "line_no", "order_lines", "line_no", "FK_ship_line"),
            rel("orders", "customer_id", "customers", "id", "FK_orders_customers"),
        ];
        let groups = group_by_constraint(&rels);
        assert_eq!(groups.len(), 2);
        assert!(groups[0].is_composite());
        assert_eq!(
            groups[0].column_pairs,
            vec![
                ("order_id".to_string(), "order_id".to_string()),
                ("line_no".to_string(), "line_no".to_string()),
            ]
        );
        assert!(!groups[1].is_composite());
    }

    #[test]
    fn test_group_by_constraint_same_name_other_table() {
        let mut other = rel("orders", "customer_id", "customers", "id", "FK_x");
        other.from_schema = Some("archive".to_string());
        let rels = vec![rel("orders", "customer_id", "customers", "id", "FK_x"), other];
        assert_eq!(group_by_constraint(&rels).len(), 2);
    }

    #[test]
    fn test_retain_within_requires_both_ends() {
        let keys = ["sales.orders".to_string(), "sales.customers".to_string()];
        let kept = retain_within(sample(), |k| keys.iter().any(|x| x == k));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].constraint_name, "FK_orders_customers");
    }
}
