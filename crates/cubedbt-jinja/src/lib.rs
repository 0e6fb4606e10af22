//! Cube schema templating over a dbt manifest graph
//!
//! This crate handles:
//! - Dumping graph projections as indented YAML fragments
//! - The `dbt_model()` Jinja function and its model object
//! - Generating per-model `.yml.jinja` cube templates

pub mod dump;
pub mod error;
pub mod renderer;
pub mod generator;

pub use dump::{dump, dump_list};
pub use error::RenderError;
pub use renderer::{CubeRenderer, CUBE_INDENT, LIST_INDENT};
pub use generator::{CubeGenerator, CubeYaml};
