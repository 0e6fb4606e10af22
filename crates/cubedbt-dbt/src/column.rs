//! Model columns and their Cube dimension types

use crate::manifest::{ColumnDefinition, JsonMap};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tag / meta key marking a column as the model's primary key
pub const PRIMARY_KEY_TAG: &str = "primary_key";

/// Base type name: everything before a `(`, `<` or `[` parameter list
static BASE_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([a-z][a-z0-9_ ]*?)\s*(?:[(<\[].*)?$").expect("valid regex"));

/// Cube dimension type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    String,
    Number,
    Time,
    Boolean,
    Geo,
}

impl DimensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Time => "time",
            Self::Boolean => "boolean",
            Self::Geo => "geo",
        }
    }

    /// Map a warehouse data type to a dimension type
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        let lower = data_type.to_lowercase();
        let base = BASE_TYPE
            .captures(&lower)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())?;

        match base {
            // Integers, floats and fixed point
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" | "hugeint"
            | "int2" | "int4" | "int8" | "int64" | "serial" | "bigserial" | "smallserial"
            | "float" | "float4" | "float8" | "float64" | "double" | "double precision"
            | "real" | "decimal" | "numeric" | "bignumeric" | "bigdecimal" | "number"
            | "money" => Some(Self::Number),

            // Dates and timestamps
            "date" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" => Some(Self::Time),
            s if s.starts_with("timestamp") || s.starts_with("time") => Some(Self::Time),

            "bool" | "boolean" => Some(Self::Boolean),

            "geography" | "geometry" => Some(Self::Geo),

            // Text-like
            "string" | "text" | "varchar" | "char" | "character" | "character varying"
            | "nvarchar" | "nchar" | "bpchar" | "uuid" | "citext" | "json" | "jsonb"
            | "variant" | "object" | "super" => Some(Self::String),

            _ => None,
        }
    }
}

impl std::str::FromStr for DimensionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "time" => Ok(Self::Time),
            "boolean" => Ok(Self::Boolean),
            "geo" => Ok(Self::Geo),
            other => Err(format!("unknown dimension type '{}'", other)),
        }
    }
}

impl std::fmt::Display for DimensionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a model
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    model_name: String,
    name: String,
    description: String,
    data_type: Option<String>,
    meta: JsonMap,
    tags: Vec<String>,
    /// Resolved once; `None` means the `string` fallback applies
    declared_type: Option<DimensionType>,
}

impl Column {
    /// Resolves the dimension type, warning once when it falls back to `string`
    pub fn new(model_name: impl Into<String>, definition: &ColumnDefinition) -> Self {
        let declared_type = resolve_type(&definition.meta, definition.data_type.as_deref());
        let model_name = model_name.into();

        if declared_type.is_none() {
            tracing::warn!(
                model = %model_name,
                column = %definition.name,
                data_type = ?definition.data_type,
                "no dimension type for column, using string"
            );
        }

        Self {
            model_name,
            name: definition.name.clone(),
            description: definition.description.clone(),
            data_type: definition.data_type.clone(),
            meta: definition.meta.clone(),
            tags: definition.tags.clone(),
            declared_type,
        }
    }

    /// Name of the model this column belongs to
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, `None` when empty
    pub fn description(&self) -> Option<&str> {
        Some(self.description.as_str()).filter(|d| !d.is_empty())
    }

    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    pub fn meta(&self) -> &JsonMap {
        &self.meta
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// `meta.primary_key: true` or a `primary_key` column tag
    pub fn is_primary_key(&self) -> bool {
        self.meta
            .get(PRIMARY_KEY_TAG)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
            || self.tags.iter().any(|t| t == PRIMARY_KEY_TAG)
    }

    /// SQL expression of the dimension; `meta.sql` overrides the column name
    pub fn sql(&self) -> &str {
        self.meta
            .get("sql")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.name)
    }

    /// Dimension type declared or inferred for this column, if any
    ///
    /// `meta.type` wins over `data_type`.
    pub fn declared_type(&self) -> Option<DimensionType> {
        self.declared_type
    }

    /// Dimension type, falling back to `string`
    pub fn dimension_type(&self) -> DimensionType {
        self.declared_type.unwrap_or(DimensionType::String)
    }
}

fn resolve_type(meta: &JsonMap, data_type: Option<&str>) -> Option<DimensionType> {
    if let Some(explicit) = meta.get("type").and_then(|v| v.as_str()) {
        return explicit.parse().ok();
    }
    data_type.and_then(DimensionType::from_data_type)
}
