//! Table aliases and join de-duplication for one compilation
//!
//! The root table keeps its own name as alias. Each distinct join path gets
//! the name of the table it ends at; a second distinct path to an already
//! aliased table gets `<table>_<n>` from a sequential counter. Requesting the
//! same path again returns the alias it already has, so the join is emitted once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::mapping::{Join, ValueType};

/// A qualified column reference `alias.column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
    pub value_type: ValueType,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
            value_type,
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

/// `LEFT OUTER JOIN <table> <alias> ON <parent_alias>.<parent_column> = <alias>.<column>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub table: String,
    pub alias: String,
    pub parent_alias: String,
    pub parent_column: String,
    pub column: String,
}

impl JoinClause {
    pub fn to_sql(&self) -> String {
        format!(
            "LEFT OUTER JOIN {} {} ON {}.{} = {}.{}",
            self.table, self.alias, self.parent_alias, self.parent_column, self.alias, self.column
        )
    }
}

/// Per-compilation alias state. Never shared between compilations.
#[derive(Debug)]
pub struct AliasManager {
    root_alias: String,
    paths: HashMap<Vec<Join>, String>,
    joins: Vec<JoinClause>,
    used: HashSet<String>,
    counter: usize,
}

impl AliasManager {
    pub fn new(root_table: &str) -> Self {
        let mut used = HashSet::new();
        used.insert(root_table.to_string());
        Self {
            root_alias: root_table.to_string(),
            paths: HashMap::new(),
            joins: Vec::new(),
            used,
            counter: 0,
        }
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// Alias of the table at the end of `path`, registering every join on
    /// the way the first time a path (or prefix) is seen.
    pub fn alias_for(&mut self, path: &[Join]) -> String {
        let Some((last, prefix)) = path.split_last() else {
            return self.root_alias.clone();
        };

        if let Some(alias) = self.paths.get(path) {
            return alias.clone();
        }

        let parent_alias = self.alias_for(prefix);
        let alias = self.fresh_alias(&last.to_table);

        self.joins.push(JoinClause {
            table: last.to_table.clone(),
            alias: alias.clone(),
            parent_alias,
            parent_column: last.from_column.clone(),
            column: last.to_column.clone(),
        });
        self.paths.insert(path.to_vec(), alias.clone());

        alias
    }

    fn fresh_alias(&mut self, table: &str) -> String {
        if self.used.insert(table.to_string()) {
            return table.to_string();
        }
        loop {
            self.counter += 1;
            let candidate = format!("{}_{}", table, self.counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Joins in first-seen order
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn into_joins(self) -> Vec<JoinClause> {
        self.joins
    }
}
