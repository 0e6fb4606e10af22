//! dbt manifest resolution for Cube
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts) from disk or HTTP
//! - Selecting models by path, tag and name
//! - Attaching tests to the models they depend on
//! - Inferring joins from relationship-tagged tests
//! - Primary key detection and cube projections

pub mod manifest;
pub mod error;
pub mod column;
pub mod measure;
pub mod model;
pub mod graph;

pub use manifest::{
    ColumnDefinition, DependsOn, JsonMap, Manifest, ManifestError, ManifestMetadata, ManifestNode,
    MeasureDefinition, NodeConfig, NodeMeta, NodeRef, TestMetadata,
};
pub use error::{EntityKind, GraphError};
pub use column::{Column, DimensionType, PRIMARY_KEY_TAG};
pub use measure::Measure;
pub use data_test::{DataTest, Join, Relationship};
pub use model::{CubeSummary, Dimension, Model};
pub use graph::{matches_filter, ManifestGraph, ModelFilter};
