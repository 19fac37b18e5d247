//! Annotation (labeling service) data models.
//!
//! The labeling service receives a [`SchemaDigest`] and answers with display
//! metadata. Nothing here influences introspection; annotations are layered on
//! top of an already complete [`SchemaMetadata`].

use crate::models::schema::{ForeignKey, Relationship, SchemaMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column shape sent to the labeling service. No row data, no defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub columns: Vec<DigestColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDigest {
    pub schemas: Vec<String>,
    pub tables: Vec<DigestTable>,
    pub relationships: Vec<Relationship>,
}

impl SchemaDigest {
    /// Strip a schema graph down to what the labeling service may see.
    pub fn from_metadata(metadata: &SchemaMetadata) -> Self {
        let tables = metadata
            .tables
            .iter()
            .map(|table| DigestTable {
                name: table.name.clone(),
                schema: table.schema.clone(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| DigestColumn {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                        nullable: c.nullable,
                        primary_key: c.primary_key,
                        foreign_key: c.foreign_key.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            schemas: metadata.schemas.clone(),
            tables,
            relationships: metadata.relationships.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    Text,
    Number,
    Currency,
    Date,
    Datetime,
    Boolean,
    Email,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Display hints for one `table.column`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_format: Option<DisplayFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_display_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProfileCard {
    #[serde(rename_all = "camelCase")]
    Fields {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        #[serde(default)]
        columns: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    RelatedTable {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relationship: Option<Relationship>,
    },
    #[serde(rename_all = "camelCase")]
    Aggregate {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        aggregate_type: AggregateKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aggregate_column: Option<String>,
    },
}

impl ProfileCard {
    pub fn title(&self) -> &str {
        match self {
            Self::Fields { title, .. }
            | Self::RelatedTable { title, .. }
            | Self::Aggregate { title, .. } => title,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileLayout {
    #[serde(default)]
    pub cards: Vec<ProfileCard>,
}

/// Labeling service answer. Every map is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaAnnotations {
    /// Table key or `table.column` key to display name
    pub friendly_names: HashMap<String, String>,
    pub column_configs: HashMap<String, ColumnConfig>,
    /// Always the detected relationships, never the service's
    pub relationships: Vec<Relationship>,
    pub profile_layouts: HashMap<String, ProfileLayout>,
    /// Table key to ordered column names
    pub important_columns: HashMap<String, Vec<String>>,
}

impl SchemaAnnotations {
    /// Replace whatever relationships the service sent with the detected ones.
    pub fn with_detected_relationships(mut self, metadata: &SchemaMetadata) -> Self {
        self.relationships = metadata.relationships.clone();
        self
    }

    pub fn friendly_name(&self, key: &str) -> Option<&str> {
        self.friendly_names.get(key).map(String::as_str)
    }
}
