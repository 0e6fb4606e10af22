//! dbt models and their cube projections

use crate::column::{Column, DimensionType};
use crate::data_test::{DataTest, Join};
use crate::error::{EntityKind, GraphError};
use crate::manifest::{JsonMap, ManifestNode};
use crate::measure::Measure;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Cube header: name, description and table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeSummary {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub sql_table: String,
}

/// One Cube dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub sql: String,

    #[serde(rename = "type")]
    pub dimension_type: DimensionType,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
}

/// A dbt model with its columns, measures and attached tests
#[derive(Debug, Clone)]
pub struct Model {
    unique_id: String,
    name: String,
    description: String,
    path: String,
    tags: Vec<String>,
    sql_table: String,
    meta: JsonMap,
    columns: Vec<Column>,
    measures: Vec<Measure>,
    tests: Vec<DataTest>,
    /// Index into `columns`, resolved on first column access
    primary_key: OnceCell<Option<usize>>,
}

impl Model {
    pub fn new(unique_id: impl Into<String>, node: &ManifestNode) -> Self {
        let columns = node
            .columns
            .values()
            .map(|definition| Column::new(&node.name, definition))
            .collect();

        Self {
            unique_id: unique_id.into(),
            name: node.name.clone(),
            description: node.description.clone(),
            path: node.path.clone(),
            tags: node.config.tags.clone(),
            sql_table: sql_table(node),
            meta: node.meta.extra.clone(),
            columns,
            measures: node.meta.measures.iter().map(Measure::new).collect(),
            tests: Vec::new(),
            primary_key: OnceCell::new(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, `None` when empty
    pub fn description(&self) -> Option<&str> {
        Some(self.description.as_str()).filter(|d| !d.is_empty())
    }

    /// Path of the model file inside the dbt project
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Model meta, without `measures`
    pub fn meta(&self) -> &JsonMap {
        &self.meta
    }

    /// Physical table: `relation_name`, or a quoted three-part name
    pub fn sql_table(&self) -> &str {
        &self.sql_table
    }

    /// Columns in manifest order
    ///
    /// Fails when more than one column is flagged as primary key.
    pub fn columns(&self) -> Result<&[Column], GraphError> {
        self.detect_primary_key()?;
        Ok(&self.columns)
    }

    pub fn column(&self, name: &str) -> Result<&Column, GraphError> {
        self.columns()?
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| GraphError::not_found(EntityKind::Column, name))
    }

    pub fn primary_key(&self) -> Result<Option<&Column>, GraphError> {
        let index = self.detect_primary_key()?;
        Ok(index.map(|i| &self.columns[i]))
    }

    fn detect_primary_key(&self) -> Result<Option<usize>, GraphError> {
        self.primary_key
            .get_or_try_init(|| {
                let candidates: Vec<usize> = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_primary_key())
                    .map(|(i, _)| i)
                    .collect();

                match candidates.as_slice() {
                    [] => Ok(None),
                    [single] => Ok(Some(*single)),
                    _ => Err(GraphError::InvariantViolation {
                        model: self.name.clone(),
                        columns: candidates
                            .iter()
                            .map(|&i| self.columns[i].name().to_string())
                            .collect(),
                    }),
                }
            })
            .copied()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn measure(&self, name: &str) -> Result<&Measure, GraphError> {
        self.measures
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| GraphError::not_found(EntityKind::Measure, name))
    }

    /// Attached tests, in attachment order
    pub fn tests(&self) -> &[DataTest] {
        &self.tests
    }

    pub fn test(&self, name: &str) -> Result<&DataTest, GraphError> {
        self.tests
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| GraphError::not_found(EntityKind::Test, name))
    }

    /// Attach a test; duplicates are kept
    pub fn add_test(&mut self, test: DataTest) {
        self.tests.push(test);
    }

    pub fn to_cube_summary(&self) -> CubeSummary {
        CubeSummary {
            name: self.name.clone(),
            description: self.description().map(str::to_string),
            sql_table: self.sql_table.clone(),
        }
    }

    /// One dimension per column whose name is not in `skip`
    pub fn to_dimension_list<S: AsRef<str>>(&self, skip: &[S]) -> Result<Vec<Dimension>, GraphError> {
        let primary_key = self.detect_primary_key()?;

        Ok(self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !skip.iter().any(|s| s.as_ref() == c.name()))
            .map(|(i, c)| Dimension {
                name: c.name().to_string(),
                description: c.description().map(str::to_string),
                sql: c.sql().to_string(),
                dimension_type: c.dimension_type(),
                primary_key: primary_key == Some(i),
            })
            .collect())
    }

    /// Joins inferred from attached tests, in attachment order
    ///
    /// Tests whose inference fails are left out; see [`Model::join_errors`].
    pub fn to_join_list(&self) -> Vec<Join> {
        self.tests
            .iter()
            .filter_map(|t| t.infer_join().ok().flatten())
            .collect()
    }

    /// Join inference failures of attached tests
    pub fn join_errors(&self) -> Vec<GraphError> {
        self.tests
            .iter()
            .filter_map(|t| t.infer_join().err())
            .collect()
    }

    pub fn to_measure_list(&self) -> Vec<Measure> {
        self.measures.clone()
    }
}

fn sql_table(node: &ManifestNode) -> String {
    if let Some(relation) = &node.relation_name {
        return relation.clone();
    }

    let database = node.database.as_deref().unwrap_or_default();
    let schema = node.schema.as_deref().unwrap_or_default();
    let table = node.alias.as_deref().unwrap_or(&node.name);
    format!("`{}`.`{}`.`{}`", database, schema, table)
}
