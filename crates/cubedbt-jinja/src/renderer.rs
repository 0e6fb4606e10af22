//! Renders cube templates against a manifest graph
//!
//! Templates look up models with `dbt_model('name')` and splice YAML
//! fragments produced by the model object's methods:
//!
//! ```jinja
//! {% set model = dbt_model('orders') %}
//! cubes:
//!   - {{ model.as_cube() }}
//!     dimensions:
//!       {{ model.as_dimensions(skip=['_loaded_at']) }}
//! ```

use crate::dump::{dump, dump_list};
use crate::error::RenderError;
use cubedbt_dbt::{ManifestGraph, Model};
use minijinja::value::{from_args, Kwargs, Object, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, State};
use std::path::Path;
use std::sync::Arc;

/// Indentation of the cube header inside `cubes:`
pub const CUBE_INDENT: usize = 4;

/// Indentation of dimension / join / measure list items
pub const LIST_INDENT: usize = 6;

/// Template-side view of one model
#[derive(Debug)]
struct ModelObject {
    graph: Arc<ManifestGraph>,
    index: usize,
}

impl ModelObject {
    fn model(&self) -> &Model {
        &self.graph.models()[self.index]
    }
}

fn to_template_error(err: RenderError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn fragment(result: Result<String, RenderError>) -> Result<Value, Error> {
    result
        .map(Value::from_safe_string)
        .map_err(to_template_error)
}

impl Object for ModelObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let model = self.model();
        let value = match key.as_str()? {
            "name" => Value::from(model.name()),
            "unique_id" => Value::from(model.unique_id()),
            "description" => model.description().map(Value::from).unwrap_or_default(),
            "sql_table" => Value::from(model.sql_table()),
            "primary_key" => match model.primary_key() {
                Ok(Some(column)) => Value::from(column.name()),
                _ => Value::from(()),
            },
            _ => return None,
        };
        Some(value)
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        let model = self.model();

        match method {
            "as_cube" => {
                let () = from_args(args)?;
                fragment(dump(&model.to_cube_summary(), CUBE_INDENT))
            }
            "as_dimensions" => {
                let (positional, kwargs): (Option<Vec<String>>, Kwargs) = from_args(args)?;
                let keyword: Option<Vec<String>> = kwargs.get("skip")?;
                kwargs.assert_all_used()?;

                let skip = keyword.or(positional).unwrap_or_default();
                let dimensions = model
                    .to_dimension_list(skip.as_slice())
                    .map_err(|e| to_template_error(e.into()))?;
                fragment(dump_list(&dimensions, LIST_INDENT))
            }
            "as_joins" => {
                let () = from_args(args)?;
                fragment(dump_list(&model.to_join_list(), LIST_INDENT))
            }
            "as_measures" => {
                let () = from_args(args)?;
                fragment(dump_list(&model.to_measure_list(), LIST_INDENT))
            }
            _ => Err(Error::from(ErrorKind::UnknownMethod)),
        }
    }
}

/// Jinja environment exposing `dbt_model()`
pub struct CubeRenderer {
    env: Environment<'static>,
}

impl CubeRenderer {
    /// Create a renderer over a built (or buildable) graph
    pub fn new(graph: Arc<ManifestGraph>) -> Self {
        let mut env = Environment::new();

        // Fragments are YAML, never HTML/JSON escaped
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_function("dbt_model", move |name: String| -> Result<Value, Error> {
            let model = graph
                .model(&name)
                .map_err(|e| to_template_error(e.into()))?;
            let index = graph
                .models()
                .iter()
                .position(|m| std::ptr::eq(m, model))
                .unwrap_or_default();

            Ok(Value::from_object(ModelObject {
                graph: Arc::clone(&graph),
                index,
            }))
        });

        Self { env }
    }

    /// Render a template source to cube YAML
    pub fn render_str(&self, source: &str) -> Result<String, RenderError> {
        Ok(self.env.render_str(source, minijinja::context! {})?)
    }

    /// Render a template file to cube YAML
    pub fn render_file(&self, path: &Path) -> Result<String, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|e| RenderError::io(path, e))?;
        tracing::debug!(path = %path.display(), "rendering template");
        self.render_str(&source)
    }
}
