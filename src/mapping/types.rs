//! Property mapping types
//!
//! A mapping binds abstract property names to physical columns, together with
//! the join path that reaches each column's table from the root table.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::errors::{MappingError, MappingResult};
use super::loader::validate_document;
use crate::errors::{QueryError, QueryResult};

/// Declared type of a mapped column
///
/// Text literals are coerced to this type before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "int", alias = "long")]
    Integer,
    #[serde(alias = "double", alias = "decimal")]
    Float,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "date", alias = "datetime")]
    Timestamp,
    Geometry,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Timestamp => "timestamp",
            ValueType::Geometry => "geometry",
        }
    }
}

/// One step of a join path: `from_table.from_column = to_table.to_column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl Join {
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}

/// Where a property is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedProperty {
    pub table: String,
    pub column: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    /// Path from the root table to `table`; empty for root columns
    #[serde(default)]
    pub joins: Vec<Join>,
}

impl MappedProperty {
    /// A column of the root table
    pub fn root(table: impl Into<String>, column: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value_type,
            joins: Vec::new(),
        }
    }

    /// A column of a secondary table reached through `joins`
    pub fn joined(
        table: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
        joins: Vec<Join>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value_type,
            joins,
        }
    }

    pub fn is_joined(&self) -> bool {
        !self.joins.is_empty()
    }
}

/// The table every query starts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootTable {
    pub table: String,
    /// Unique row identifier, also the final sort key
    pub id_column: String,
}

/// Serialized form of a mapping, as found in deployment descriptors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    pub root: RootTable,
    /// Property used by temporal filters
    #[serde(default)]
    pub time_property: Option<String>,
    /// Property compared by procedure filters
    #[serde(default)]
    pub procedure_property: Option<String>,
    pub properties: BTreeMap<String, MappedProperty>,
}

/// Validated, read-only property mapping owned by a store
#[derive(Debug, Clone)]
pub struct PropertyMapping {
    root: RootTable,
    time_property: Option<String>,
    procedure_property: Option<String>,
    properties: HashMap<String, MappedProperty>,
}

impl PropertyMapping {
    pub fn builder(root_table: impl Into<String>, id_column: impl Into<String>) -> MappingBuilder {
        MappingBuilder {
            root: RootTable {
                table: root_table.into(),
                id_column: id_column.into(),
            },
            time_property: None,
            procedure_property: None,
            properties: Vec::new(),
        }
    }

    /// Validates a parsed document and freezes it
    pub fn from_document(document: MappingDocument) -> MappingResult<Self> {
        validate_document(&document)?;
        Ok(Self {
            root: document.root,
            time_property: document.time_property,
            procedure_property: document.procedure_property,
            properties: document.properties.into_iter().collect(),
        })
    }

    pub fn root(&self) -> &RootTable {
        &self.root
    }

    /// Looks up a property by exact name
    pub fn resolve(&self, name: &str) -> QueryResult<&MappedProperty> {
        self.properties
            .get(name)
            .ok_or_else(|| QueryError::unknown_property(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn time_property(&self) -> Option<&str> {
        self.time_property.as_deref()
    }

    pub fn procedure_property(&self) -> Option<&str> {
        self.procedure_property.as_deref()
    }

    /// Property names in sorted order
    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Serializable form of this mapping
    pub fn to_document(&self) -> MappingDocument {
        MappingDocument {
            root: self.root.clone(),
            time_property: self.time_property.clone(),
            procedure_property: self.procedure_property.clone(),
            properties: self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Programmatic construction of a [`PropertyMapping`]
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    root: RootTable,
    time_property: Option<String>,
    procedure_property: Option<String>,
    properties: Vec<(String, MappedProperty)>,
}

impl MappingBuilder {
    pub fn property(mut self, name: impl Into<String>, property: MappedProperty) -> Self {
        self.properties.push((name.into(), property));
        self
    }

    /// Adds a root-table column
    pub fn column(self, name: impl Into<String>, column: impl Into<String>, value_type: ValueType) -> Self {
        let table = self.root.table.clone();
        self.property(name, MappedProperty::root(table, column, value_type))
    }

    /// Adds a column of a table one join away from the root
    pub fn joined_column(
        self,
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
        foreign_key: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let join = Join::new(
            self.root.table.clone(),
            self.root.id_column.clone(),
            table.clone(),
            foreign_key,
        );
        self.property(name, MappedProperty::joined(table, column, value_type, vec![join]))
    }

    pub fn time_property(mut self, name: impl Into<String>) -> Self {
        self.time_property = Some(name.into());
        self
    }

    pub fn procedure_property(mut self, name: impl Into<String>) -> Self {
        self.procedure_property = Some(name.into());
        self
    }

    pub fn build(self) -> MappingResult<PropertyMapping> {
        let mut properties = BTreeMap::new();
        for (name, property) in self.properties {
            if properties.insert(name.clone(), property).is_some() {
                return Err(MappingError::DuplicateProperty(name));
            }
        }

        PropertyMapping::from_document(MappingDocument {
            root: self.root,
            time_property: self.time_property,
            procedure_property: self.procedure_property,
            properties,
        })
    }
}
