//! Measures declared in a model's `meta.measures`

use crate::manifest::MeasureDefinition;
use serde::{Deserialize, Serialize};

/// A Cube measure
///
/// Serializes in the field order Cube expects: name, description, sql, type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    #[serde(rename = "type")]
    pub measure_type: String,
}

impl Measure {
    /// Empty description / sql strings are dropped
    pub fn new(definition: &MeasureDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            description: definition.description.clone().filter(|d| !d.is_empty()),
            sql: definition.sql.clone().filter(|s| !s.is_empty()),
            measure_type: definition.measure_type.clone(),
        }
    }
}
