//! cubedbt Core
//!
//! Shared types used across the workspace: stable diagnostic codes,
//! the generation report and the `cubedbt.toml` configuration.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{GenerationReport, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, FilterConfig};
