//! Loading and validation of mapping documents
//!
//! A mapping is rejected at load time when:
//! - a table or column name is not a plain SQL identifier
//! - a join path does not start at the root table, has a gap, or ends
//!   somewhere other than the property's table
//! - a role property (time, procedure) is not declared

use std::fs;
use std::path::Path;

use regex::Regex;

use super::errors::{MappingError, MappingResult};
use super::types::{MappedProperty, MappingDocument, PropertyMapping};
use crate::observability::{log_event, Event};

/// Identifiers are rendered into SQL text, so only plain names are accepted
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

impl PropertyMapping {
    /// Loads a mapping from a JSON file
    pub fn load(path: &Path) -> MappingResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| MappingError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mapping = Self::from_json(&content)?;

        log_event(
            Event::MappingLoaded,
            &[
                ("path", &path.display().to_string()),
                ("properties", &mapping.len().to_string()),
            ],
        );

        Ok(mapping)
    }

    /// Parses and validates a mapping from a JSON string
    pub fn from_json(content: &str) -> MappingResult<Self> {
        let document: MappingDocument = serde_json::from_str(content)?;
        Self::from_document(document)
    }
}

struct IdentifierCheck {
    pattern: Regex,
}

impl IdentifierCheck {
    fn new() -> MappingResult<Self> {
        Ok(Self {
            pattern: Regex::new(IDENTIFIER_PATTERN)?,
        })
    }

    fn check(&self, identifier: &str, context: impl FnOnce() -> String) -> MappingResult<()> {
        if self.pattern.is_match(identifier) {
            Ok(())
        } else {
            Err(MappingError::invalid_identifier(identifier, context()))
        }
    }
}

/// Checks one identifier that will be rendered into SQL text
pub(crate) fn check_identifier(identifier: &str, context: &str) -> MappingResult<()> {
    IdentifierCheck::new()?.check(identifier, || context.to_string())
}

/// Checks a document before it becomes a [`PropertyMapping`]
pub(crate) fn validate_document(document: &MappingDocument) -> MappingResult<()> {
    let ident = IdentifierCheck::new()?;

    ident.check(&document.root.table, || "root table".to_string())?;
    ident.check(&document.root.id_column, || "root id column".to_string())?;

    for (name, property) in &document.properties {
        if name.trim().is_empty() {
            return Err(MappingError::invalid_identifier(name, "property name"));
        }
        validate_property(&ident, &document.root.table, name, property)?;
    }

    if let Some(time) = &document.time_property {
        if !document.properties.contains_key(time) {
            return Err(MappingError::UndeclaredRoleProperty {
                role: "time",
                property: time.clone(),
            });
        }
    }

    if let Some(procedure) = &document.procedure_property {
        if !document.properties.contains_key(procedure) {
            return Err(MappingError::UndeclaredRoleProperty {
                role: "procedure",
                property: procedure.clone(),
            });
        }
    }

    Ok(())
}

fn validate_property(
    ident: &IdentifierCheck,
    root_table: &str,
    name: &str,
    property: &MappedProperty,
) -> MappingResult<()> {
    ident.check(&property.table, || format!("table of property '{}'", name))?;
    ident.check(&property.column, || format!("column of property '{}'", name))?;

    if property.joins.is_empty() {
        if property.table != root_table {
            return Err(MappingError::broken_join_path(
                name,
                format!(
                    "table '{}' is not the root table and no joins are declared",
                    property.table
                ),
            ));
        }
        return Ok(());
    }

    let mut current = root_table;
    for (step, join) in property.joins.iter().enumerate() {
        for identifier in [&join.from_table, &join.from_column, &join.to_table, &join.to_column] {
            ident.check(identifier, || format!("join {} of property '{}'", step, name))?;
        }
        if join.from_table != current {
            return Err(MappingError::broken_join_path(
                name,
                format!(
                    "join {} starts at '{}' but the path is at '{}'",
                    step, join.from_table, current
                ),
            ));
        }
        current = join.to_table.as_str();
    }

    if current != property.table {
        return Err(MappingError::broken_join_path(
            name,
            format!("path ends at '{}' instead of '{}'", current, property.table),
        ));
    }

    Ok(())
}
