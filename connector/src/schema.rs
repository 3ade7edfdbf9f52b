//! Portable schema model exchanged with the host.
//!
//! Field names serialize in Pascal case, matching the payloads the host sends and the
//! request snapshots persisted in replication metadata.

use firebird::identifier::quote_identifier;
use firebird::types::{PropertyType, map_portable_type_to_ddl};
use serde::{Deserialize, Serialize};

/// A record keyed by property id (reads) or column name (replication rows).
pub type RecordMap = serde_json::Map<String, serde_json::Value>;

/// Whether a schema is read from or written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Read,
    Write,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PortableProperty {
    /// Quoted column name, unique within its schema.
    pub id: String,
    /// Raw column name as reported by the catalog.
    pub name: String,
    pub description: String,
    #[serde(rename = "Type")]
    pub property_type: PropertyType,
    /// DDL fragment that recreates the column, empty when unknown.
    pub type_at_source: String,
    pub is_key: bool,
    pub is_nullable: bool,
}

impl PortableProperty {
    /// Creates a property for the raw column `name`.
    pub fn new(name: &str, property_type: PropertyType, type_at_source: impl Into<String>) -> Self {
        Self {
            id: quote_identifier(name),
            name: name.trim().to_string(),
            property_type,
            type_at_source: type_at_source.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    /// DDL for recreating this column, falling back to the portable type's default.
    pub fn ddl_type(&self) -> String {
        if self.type_at_source.trim().is_empty() {
            map_portable_type_to_ddl(self.property_type).to_string()
        } else {
            self.type_at_source.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PortableSchema {
    /// Quoted table or procedure name, unique within a discovery batch.
    pub id: String,
    pub name: String,
    pub description: String,
    pub direction: Direction,
    /// Ad hoc query text. Empty for table schemas.
    pub query: String,
    pub properties: Vec<PortableProperty>,
    pub sample: Vec<RecordMap>,
    pub count: i64,
}

impl PortableSchema {
    /// Creates an empty read schema for the raw table `name`.
    pub fn for_table(name: &str) -> Self {
        Self {
            id: quote_identifier(name),
            name: name.trim().to_string(),
            ..Default::default()
        }
    }

    /// Creates an empty read schema backed by a query.
    pub fn for_query(id: impl Into<String>, query: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }

    pub fn property(&self, id: &str) -> Option<&PortableProperty> {
        self.properties.iter().find(|property| property.id == id)
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &PortableProperty> {
        self.properties.iter().filter(|property| property.is_key)
    }
}
