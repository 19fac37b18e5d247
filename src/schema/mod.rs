//! Schema analysis.
//!
//! - `analyzer`: full and selective introspection through an adapter
//! - `relations`: pure relationship lookups over a built relationship list

pub mod analyzer;
pub mod relations;

pub use analyzer::SchemaAnalyzer;
pub use relations::{
    ConstraintGroup, Direction, RelatedTable, analyze_relationships, determine_relationship_type,
    group_by_constraint, related_tables,
};
