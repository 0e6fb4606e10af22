//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json into typed nodes. Only the fields the
//! cube graph reads are modelled; everything else is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Free-form `meta` / `kwargs` mapping
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Model, test, seed, ... nodes in document order
    pub nodes: IndexMap<String, ManifestNode>,
}

impl Manifest {
    /// Load manifest from file
    ///
    /// `encoding` defaults to UTF-8; `latin-1` is also accepted.
    pub fn from_file(path: &Path, encoding: Option<&str>) -> Result<Self, ManifestError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        let contents = decode(&bytes, encoding)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read manifest");

        Self::from_str(&contents)
    }

    /// Download manifest from an HTTP(S) URL (blocking)
    #[cfg(feature = "remote")]
    pub fn from_url(url: &str) -> Result<Self, ManifestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ManifestError::HttpError(url.to_string(), e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| ManifestError::HttpError(url.to_string(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(ManifestError::HttpError(
                url.to_string(),
                format!("HTTP status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .map_err(|e| ManifestError::HttpError(url.to_string(), e.to_string()))?;
        tracing::debug!(url, bytes = body.len(), "downloaded manifest");

        Self::from_str(&body)
    }

    #[cfg(not(feature = "remote"))]
    pub fn from_url(url: &str) -> Result<Self, ManifestError> {
        Err(ManifestError::HttpError(
            url.to_string(),
            "remote manifests require the 'remote' feature".to_string(),
        ))
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Parse manifest from an already decoded JSON tree
    pub fn from_value(value: serde_json::Value) -> Result<Self, ManifestError> {
        serde_json::from_value(value)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Model nodes in document order
    pub fn models(&self) -> impl Iterator<Item = (&str, &ManifestNode)> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.is_model())
            .map(|(id, node)| (id.as_str(), node))
    }

    /// Test nodes in document order
    pub fn tests(&self) -> impl Iterator<Item = (&str, &ManifestNode)> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.is_test())
            .map(|(id, node)| (id.as_str(), node))
    }
}

fn decode(bytes: &[u8], encoding: Option<&str>) -> Result<String, ManifestError> {
    let label = encoding.unwrap_or("utf-8").trim().to_lowercase().replace('_', "-");

    match label.as_str() {
        "utf-8" | "utf8" | "utf-8-sig" => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8(bytes.to_vec())
                .map_err(|e| ManifestError::DecodeError(label.clone(), e.to_string()))
        }
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        _ => Err(ManifestError::UnsupportedEncoding(label.clone())),
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.jaffle_shop.orders")
    #[serde(default)]
    pub unique_id: Option<String>,

    /// Node name (e.g., "orders")
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    pub resource_type: String,

    /// Relative path to the SQL file
    #[serde(default)]
    pub path: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    #[serde(default)]
    pub schema: Option<String>,

    /// Alias (output table name)
    #[serde(default)]
    pub alias: Option<String>,

    /// Precomputed relation name, preferred over database/schema/alias
    #[serde(default)]
    pub relation_name: Option<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Column definitions, in declaration order
    #[serde(default)]
    pub columns: IndexMap<String, ColumnDefinition>,

    /// Node meta block
    #[serde(default)]
    pub meta: NodeMeta,

    /// Node-level tags (tests carry their relationship tags here)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Models referenced through ref()
    #[serde(default)]
    pub refs: Vec<NodeRef>,

    /// Raw SQL / Jinja source
    #[serde(default, alias = "raw_sql")]
    pub raw_code: Option<String>,

    /// Generic test metadata (tests only)
    #[serde(default)]
    pub test_metadata: Option<TestMetadata>,
}

impl ManifestNode {
    pub fn is_model(&self) -> bool {
        self.resource_type == "model"
    }

    pub fn is_test(&self) -> bool {
        self.resource_type == "test"
    }

    pub fn is_ephemeral(&self) -> bool {
        self.config.materialized.as_deref() == Some("ephemeral")
    }
}

/// Node configuration (from dbt_project.yml or model config)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,

    /// Configured tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Test severity (tests only)
    #[serde(default)]
    pub severity: Option<String>,
}

/// `meta` block; `measures` is lifted out, everything else kept as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Measures declared for the cube
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<MeasureDefinition>,

    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Measure declared under `meta.measures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub measure_type: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub sql: Option<String>,
}

/// Column definition from manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Declared data type
    #[serde(default)]
    pub data_type: Option<String>,

    /// Column meta block
    #[serde(default)]
    pub meta: JsonMap,

    /// Column tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// A ref() target
///
/// dbt >= 1.5 writes objects, older manifests write `[package?, name]` lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Named {
        name: String,
        #[serde(default)]
        package: Option<String>,
    },
    Legacy(Vec<String>),
}

impl NodeRef {
    /// Referenced model name
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            Self::Legacy(parts) => parts.last().map(String::as_str),
        }
    }
}

/// Generic test metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    /// Test type (e.g. "relationships", "unique")
    pub name: String,

    /// Test keyword arguments
    #[serde(default)]
    pub kwargs: JsonMap,

    #[serde(default)]
    pub namespace: Option<String>,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to download manifest from {0}: {1}")]
    HttpError(String, String),

    #[error("Manifest is not valid {0}: {1}")]
    DecodeError(String, String),

    #[error("Unsupported manifest encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
