//! Manifest graph: model selection and test attachment
//!
//! The graph is used in two phases. Filters are set with
//! [`ManifestGraph::configure`]; the first call to [`ManifestGraph::build`]
//! (or any accessor) resolves the models once and freezes the filters.

use crate::data_test::DataTest;
use crate::error::{EntityKind, GraphError};
use crate::manifest::{Manifest, ManifestNode};
use crate::model::Model;
use cubedbt_core::{Diagnostic, DiagnosticCode, FilterConfig, Location, Severity};
use once_cell::sync::OnceCell;
use std::collections::HashMap;

/// Model selection predicates
pub type ModelFilter = FilterConfig;

/// Returns true if a model node passes the filter
///
/// Paths and names match if any value matches; tags must all be present.
pub fn matches_filter(filter: &ModelFilter, node: &ManifestNode) -> bool {
    let path_ok = filter.paths.is_empty()
        || filter.paths.iter().any(|prefix| node.path.starts_with(prefix.as_str()));
    let tags_ok = filter.tags.iter().all(|tag| node.config.tags.contains(tag));
    let name_ok = filter.names.is_empty() || filter.names.contains(&node.name);

    path_ok && tags_ok && name_ok
}

#[derive(Debug)]
struct BuiltGraph {
    models: Vec<Model>,
    diagnostics: Vec<Diagnostic>,
}

/// Resolved view over a dbt manifest
#[derive(Debug)]
pub struct ManifestGraph {
    manifest: Manifest,
    filter: ModelFilter,
    built: OnceCell<BuiltGraph>,
}

impl ManifestGraph {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            filter: ModelFilter::default(),
            built: OnceCell::new(),
        }
    }

    /// Replace the filter; rejected once the graph is built
    pub fn configure(&mut self, filter: ModelFilter) -> Result<&mut Self, GraphError> {
        if self.is_built() {
            return Err(GraphError::AlreadyBuilt);
        }
        self.filter = filter;
        Ok(self)
    }

    /// Shorthand for [`ManifestGraph::configure`] with separate lists
    pub fn filter<P, T, N>(&mut self, paths: P, tags: T, names: N) -> Result<&mut Self, GraphError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        self.configure(ModelFilter {
            paths: paths.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn active_filter(&self) -> &ModelFilter {
        &self.filter
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    /// Resolve models; later calls return the same models without rescanning
    pub fn build(&self) -> &[Model] {
        &self.built.get_or_init(|| self.resolve()).models
    }

    /// Models in manifest order
    pub fn models(&self) -> &[Model] {
        self.build()
    }

    /// First model with the given name
    pub fn model(&self, name: &str) -> Result<&Model, GraphError> {
        self.build()
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| GraphError::not_found(EntityKind::Model, name))
    }

    /// Findings collected while building (isolated join failures)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.build();
        self.built
            .get()
            .map(|b| b.diagnostics.as_slice())
            .unwrap_or_default()
    }

    fn resolve(&self) -> BuiltGraph {
        let mut models: Vec<Model> = self
            .manifest
            .models()
            .filter(|(_, node)| !node.is_ephemeral() && matches_filter(&self.filter, node))
            .map(|(id, node)| Model::new(id, node))
            .collect();

        // unique_id -> index into `models`, only needed while attaching tests
        let index: HashMap<String, usize> = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.unique_id().to_string(), i))
            .collect();

        let mut attached = 0usize;
        for (id, node) in self.manifest.tests() {
            let test = DataTest::new(id, node);
            for dependency in test.depends_on() {
                if let Some(&i) = index.get(dependency) {
                    models[i].add_test(test.clone());
                    attached += 1;
                }
            }
        }

        let diagnostics = join_diagnostics(&models);

        tracing::debug!(
            models = models.len(),
            attached_tests = attached,
            join_errors = diagnostics.len(),
            "built manifest graph"
        );

        BuiltGraph { models, diagnostics }
    }
}

fn join_diagnostics(models: &[Model]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for model in models {
        for test in model.tests() {
            if let Err(err) = test.infer_join() {
                tracing::warn!(model = model.name(), test = test.name(), "{}", err);

                let code = match err {
                    GraphError::InvalidArgument { .. } => DiagnosticCode::JoinInvalidArgument,
                    _ => DiagnosticCode::JoinMissingArgument,
                };

                let mut diagnostic = Diagnostic::new(
                    code,
                    Severity::Warn,
                    err.to_string(),
                )
                .with_model(model.name())
                .with_test(test.name());

                if !model.path().is_empty() {
                    diagnostic = diagnostic.with_location(Location::new(model.path()));
                }
                diagnostics.push(diagnostic);
            }
        }
    }

    diagnostics
}
