//! Errors raised while resolving the cube graph

/// Kind of entity a lookup was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Model,
    Column,
    Measure,
    Test,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "Model"),
            Self::Column => write!(f, "Column"),
            Self::Measure => write!(f, "Measure"),
            Self::Test => write!(f, "Test"),
        }
    }
}

/// Graph resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("More than one primary key column found in {model}: {}", .columns.join(", "))]
    InvariantViolation { model: String, columns: Vec<String> },

    #[error("Test '{test}' is tagged with a relationship but has no '{argument}' argument")]
    MissingArgument { test: String, argument: String },

    #[error("Test '{test}' has a {found} '{argument}' argument, expected a string")]
    InvalidArgument { test: String, argument: String, found: String },

    #[error("Filters cannot change once the graph has been built")]
    AlreadyBuilt,
}

impl GraphError {
    pub(crate) fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}
