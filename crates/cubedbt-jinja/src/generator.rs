//! Cube template generation
//!
//! Writes one `<schema_path>/cubes/<model>.yml.jinja` template per model.
//! Templates are rendered later by [`crate::CubeRenderer`] (or by Cube
//! itself), so they only reference the model by name.

use crate::error::RenderError;
use cubedbt_core::{Diagnostic, DiagnosticCode, GenerationReport, Location, Severity};
use cubedbt_dbt::{GraphError, ManifestGraph, Model};
use std::path::{Path, PathBuf};

/// Cube YAML template for one model
pub struct CubeYaml<'a> {
    model: &'a Model,
}

impl<'a> CubeYaml<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    fn model_template(&self) -> String {
        format!("{{% set model = dbt_model({}) %}}\n", quote(self.model.name()))
    }

    fn cubes_template(&self) -> String {
        "cubes:\n  - {{ model.as_cube() }}\n".to_string()
    }

    /// Dimension names containing any of the `dimension_skips` substrings
    pub fn skipped_dimensions<S: AsRef<str>>(&self, dimension_skips: &[S]) -> Result<Vec<String>, GraphError> {
        Ok(self
            .model
            .columns()?
            .iter()
            .map(|c| c.name())
            .filter(|name| dimension_skips.iter().any(|s| name.contains(s.as_ref())))
            .map(str::to_string)
            .collect())
    }

    fn dimensions_template(&self, skip: &[String]) -> Result<String, GraphError> {
        if self.model.to_dimension_list(skip)?.is_empty() {
            return Ok(String::new());
        }

        let list = skip.iter().map(|s| quote(s)).collect::<Vec<_>>().join(", ");
        Ok(format!(
            "    dimensions:\n      {{{{ model.as_dimensions(skip=[{}]) }}}}\n",
            list
        ))
    }

    fn joins_template(&self) -> String {
        if self.model.to_join_list().is_empty() {
            return String::new();
        }
        "    joins:\n      {{ model.as_joins() }}\n".to_string()
    }

    fn measures_template(&self) -> String {
        if self.model.to_measure_list().is_empty() {
            return String::new();
        }
        "    measures:\n      {{ model.as_measures() }}\n".to_string()
    }

    /// Complete template; sections with nothing to show are omitted
    pub fn generate_template<S: AsRef<str>>(&self, dimension_skips: &[S]) -> Result<String, GraphError> {
        let skip = self.skipped_dimensions(dimension_skips)?;
        if !skip.is_empty() {
            tracing::debug!(model = self.model.name(), skipped = ?skip, "skipping dimensions");
        }

        Ok([
            self.model_template(),
            self.cubes_template(),
            self.dimensions_template(&skip)?,
            self.joins_template(),
            self.measures_template(),
        ]
        .concat())
    }
}

/// Jinja single-quoted string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Writes cube templates for every model of a graph
pub struct CubeGenerator<'a> {
    graph: &'a ManifestGraph,
    schema_path: PathBuf,
}

impl<'a> CubeGenerator<'a> {
    /// `schema_path` is the directory Cube loads its schema from
    pub fn new(graph: &'a ManifestGraph, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            schema_path: schema_path.into(),
        }
    }

    /// Directory templates are written to
    pub fn cubes_dir(&self) -> PathBuf {
        self.schema_path.join("cubes")
    }

    /// Generate one template per model
    ///
    /// A model whose template cannot be built (conflicting primary keys) is
    /// skipped and reported; I/O failures abort the run.
    pub fn generate_cubes<S: AsRef<str>>(&self, dimension_skips: &[S]) -> Result<GenerationReport, RenderError> {
        let mut report = GenerationReport::from_diagnostics(self.graph.diagnostics().to_vec());

        let dir = self.cubes_dir();
        std::fs::create_dir_all(&dir).map_err(|e| RenderError::io(&dir, e))?;

        for model in self.graph.models() {
            let template = match CubeYaml::new(model).generate_template(dimension_skips) {
                Ok(template) => template,
                Err(err) => {
                    tracing::error!(model = model.name(), "{}", err);
                    report.add_diagnostic(
                        model_diagnostic(model, DiagnosticCode::PrimaryKeyConflict, Severity::Error, err.to_string()),
                    );
                    continue;
                }
            };

            for column in model.columns().unwrap_or_default() {
                if column.declared_type().is_none() {
                    report.add_diagnostic(
                        model_diagnostic(
                            model,
                            DiagnosticCode::ColumnTypeFallback,
                            Severity::Warn,
                            format!(
                                "Column '{}' has unrecognized type '{}', using string",
                                column.name(),
                                column.data_type().unwrap_or_default()
                            ),
                        ),
                    );
                }
            }

            if matches!(model.primary_key(), Ok(None)) && !model.to_join_list().is_empty() {
                report.add_diagnostic(model_diagnostic(
                    model,
                    DiagnosticCode::PrimaryKeyMissing,
                    Severity::Warn,
                    format!("Model '{}' has joins but no primary key column", model.name()),
                ));
            }

            let path = dir.join(format!("{}.yml.jinja", model.name()));
            write_template(&path, &template)?;
            tracing::info!(model = model.name(), path = %path.display(), "generated cube");

            report.add_diagnostic(model_diagnostic(
                model,
                DiagnosticCode::TemplateWritten,
                Severity::Info,
                format!("Generated cube for {}", model.name()),
            ));
            report.add_file(path);
        }

        Ok(report)
    }
}

fn model_diagnostic(model: &Model, code: DiagnosticCode, severity: Severity, message: String) -> Diagnostic {
    let diagnostic = Diagnostic::new(code, severity, message).with_model(model.name());
    if model.path().is_empty() {
        diagnostic
    } else {
        diagnostic.with_location(Location::new(model.path()))
    }
}

fn write_template(path: &Path, template: &str) -> Result<(), RenderError> {
    std::fs::write(path, template).map_err(|e| RenderError::io(path, e))
}
