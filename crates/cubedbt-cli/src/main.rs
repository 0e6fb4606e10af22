use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use cubedbt_core::{Config, GenerationReport, Severity};
use cubedbt_dbt::{Manifest, ManifestGraph, Model};
use cubedbt_jinja::{CubeGenerator, CubeRenderer};

const DEFAULT_CONFIG: &str = "cubedbt.toml";

/// cubedbt - Cube schema generation from dbt manifests
#[derive(Parser)]
#[command(name = "cubedbt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: cubedbt.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the manifest comes from
#[derive(Args, Debug, Default)]
struct ManifestArgs {
    /// Path to dbt manifest.json
    #[arg(short = 'f', long, conflicts_with = "url")]
    manifest: Option<PathBuf>,

    /// URL of a published manifest.json
    #[arg(short, long)]
    url: Option<String>,

    /// Manifest text encoding (utf-8, latin-1)
    #[arg(long)]
    encoding: Option<String>,
}

impl ManifestArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(manifest) = &self.manifest {
            config.manifest = from_cwd(manifest);
            config.manifest_url = None;
        }
        if let Some(url) = &self.url {
            config.manifest_url = Some(url.clone());
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = Some(encoding.clone());
        }
    }
}

/// Command-line paths are relative to the working directory, not the config file
fn from_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Model selection and dimension skips
#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Only models whose path starts with this prefix (repeatable)
    #[arg(long = "path")]
    paths: Vec<String>,

    /// Only models carrying this tag (repeatable, all must match)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Only models with this name (repeatable)
    #[arg(long = "name")]
    names: Vec<String>,

    /// Skip dimensions whose name contains this substring (repeatable)
    #[arg(long = "skip")]
    skips: Vec<String>,
}

impl SelectionArgs {
    /// Flags replace the matching config lists; skips are added
    fn apply(&self, config: &mut Config) {
        if !self.paths.is_empty() {
            config.filter.paths = self.paths.clone();
        }
        if !self.tags.is_empty() {
            config.filter.tags = self.tags.clone();
        }
        if !self.names.is_empty() {
            config.filter.names = self.names.clone();
        }
        for skip in &self.skips {
            if !config.dimension_skips.contains(skip) {
                config.dimension_skips.push(skip.clone());
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a cube template for every selected model
    Generate {
        #[command(flatten)]
        source: ManifestArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Cube schema directory (templates go to <schema-path>/cubes)
        #[arg(short, long)]
        schema_path: Option<PathBuf>,

        /// Output file for the JSON generation report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Render a cube template (or a directory of them) to YAML
    Render {
        /// Template file or directory containing *.jinja templates
        template: PathBuf,

        #[command(flatten)]
        source: ManifestArgs,

        /// Output file (or directory when rendering a directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show primary keys, joins and measures of models
    Inspect {
        /// Model name to inspect (all models if not specified)
        model: Option<String>,

        #[command(flatten)]
        source: ManifestArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            source,
            selection,
            schema_path,
            report,
        } => {
            source.apply(&mut config);
            selection.apply(&mut config);
            if let Some(schema_path) = schema_path {
                config.schema_path = from_cwd(&schema_path);
            }
            generate_command(&config, report.as_deref(), cli.verbose)
        }
        Commands::Render {
            template,
            source,
            output,
        } => {
            source.apply(&mut config);
            render_command(&config, &template, output.as_deref())
        }
        Commands::Inspect { model, source } => {
            source.apply(&mut config);
            inspect_command(&config, model.as_deref())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        Config::from_file(default_path).with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))
    } else {
        tracing::debug!("No config file found, using defaults");
        Ok(Config::default())
    }
}

fn load_manifest(config: &Config) -> Result<Manifest> {
    if let Some(url) = &config.manifest_url {
        tracing::info!(url = %url, "downloading manifest");
        return Manifest::from_url(url).with_context(|| format!("Failed to load manifest from {}", url));
    }

    let path = config.manifest_path();
    if !path.exists() {
        anyhow::bail!(
            "Manifest not found at {}. Run 'dbt compile' or 'dbt build' first.",
            path.display()
        );
    }

    tracing::debug!(path = %path.display(), "loading manifest");
    Manifest::from_file(&path, config.encoding.as_deref())
        .with_context(|| format!("Failed to load manifest from {}", path.display()))
}

fn load_graph(config: &Config) -> Result<ManifestGraph> {
    let mut graph = ManifestGraph::new(load_manifest(config)?);
    graph.configure(config.filter.clone())?;
    Ok(graph)
}

/// Generate command - write one template per model
fn generate_command(config: &Config, report_path: Option<&Path>, verbose: bool) -> Result<()> {
    let graph = load_graph(config)?;
    let schema_dir = config.schema_dir();

    if verbose {
        eprintln!(
            "{} {} models into {}",
            "Generating".cyan(),
            graph.models().len(),
            schema_dir.display()
        );
    }

    let report = CubeGenerator::new(&graph, &schema_dir).generate_cubes(&config.dimension_skips)?;

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    print_report_summary(&report, verbose);

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Render command - render templates through `dbt_model()`
fn render_command(config: &Config, template: &Path, output: Option<&Path>) -> Result<()> {
    let renderer = CubeRenderer::new(Arc::new(load_graph(config)?));

    if template.is_dir() {
        let written = render_directory(&renderer, template, output.unwrap_or(template))?;
        println!("{} {} templates", "Rendered".green(), written.len());
        for path in written {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    let yaml = renderer
        .render_file(template)
        .with_context(|| format!("Failed to render {}", template.display()))?;

    match output {
        Some(path) => {
            std::fs::write(path, yaml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Rendered".green(), path.display());
        }
        None => println!("{}", yaml),
    }

    Ok(())
}

/// Render every `*.jinja` file under `dir`, writing `out_dir/<relative path>` minus the suffix
fn render_directory(renderer: &CubeRenderer, dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(stem) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".jinja"))
        else {
            continue;
        };

        let target = out_dir.join(path.strip_prefix(dir)?).with_file_name(stem);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = renderer
            .render_file(path)
            .with_context(|| format!("Failed to render {}", path.display()))?;
        std::fs::write(&target, yaml).with_context(|| format!("Failed to write {}", target.display()))?;

        tracing::info!(path = %target.display(), "rendered cube");
        written.push(target);
    }

    Ok(written)
}

/// Inspect command - exits non-zero when a model violates the primary key invariant
fn inspect_command(config: &Config, model: Option<&str>) -> Result<()> {
    let graph = load_graph(config)?;

    let models: Vec<&Model> = match model {
        Some(name) => vec![graph.model(name)?],
        None => graph.models().iter().collect(),
    };

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Cube Graph".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());

    let violations: usize = models.into_iter().map(print_model).sum();

    println!();
    if violations > 0 {
        eprintln!("{} {} invariant violations", "✗".red().bold(), violations);
        std::process::exit(1);
    }

    println!("{}", "✓ No invariant violations".green().bold());
    Ok(())
}

/// Print one model, returning the number of invariant violations
fn print_model(model: &Model) -> usize {
    let mut violations = 0;

    println!();
    println!("{} {}", "Model:".bold(), model.name().green());
    println!("  Table:       {}", model.sql_table());

    match model.primary_key() {
        Ok(Some(column)) => println!("  Primary key: {}", column.name()),
        Ok(None) => println!("  Primary key: {}", "none".yellow()),
        Err(err) => {
            println!("  Primary key: {}", err.to_string().red());
            violations += 1;
        }
    }

    if let Ok(columns) = model.columns() {
        println!("  Dimensions:  {}", columns.len());
    }

    let joins = model.to_join_list();
    let join_errors = model.join_errors();
    if !joins.is_empty() || !join_errors.is_empty() {
        println!("  {}", "Joins:".bold());
        for join in &joins {
            println!("    → {} ({}) {}", join.name, join.relationship.as_str(), join.sql);
        }
        for err in &join_errors {
            println!("    {} {}", "✗".yellow(), err);
        }
    }

    let measures = model.measures();
    if !measures.is_empty() {
        println!("  {}", "Measures:".bold());
        for measure in measures {
            println!("    {} ({})", measure.name, measure.measure_type);
        }
    }

    violations
}

fn print_report_summary(report: &GenerationReport, verbose: bool) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Cube Generation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Cubes generated: {}", report.summary.models_generated);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }
    println!();

    // Info diagnostics only repeat the generated file list
    let shown: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();

    if shown.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
        return;
    }

    println!("{}", "Diagnostics:".bold());
    for diag in shown {
        let severity_str = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };

        println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

        if let Some(loc) = &diag.location {
            println!("    at {}", loc.file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_flags_override_config() {
        let cli = Cli::try_parse_from([
            "cubedbt", "generate", "-f", "dbt/manifest.json", "--tag", "finance", "--skip", "_fivetran",
        ])
        .unwrap();

        let mut config = Config::from_toml("dimension_skips = [\"_airbyte\"]\n[filter]\nnames = [\"orders\"]").unwrap();
        let Commands::Generate { source, selection, .. } = cli.command else {
            panic!("expected generate");
        };
        source.apply(&mut config);
        selection.apply(&mut config);

        assert_eq!(config.manifest, std::env::current_dir().unwrap().join("dbt/manifest.json"));
        assert_eq!(config.filter.tags, vec!["finance".to_string()]);
        assert_eq!(config.filter.names, vec!["orders".to_string()]);
        assert_eq!(config.dimension_skips, vec!["_airbyte".to_string(), "_fivetran".to_string()]);
    }

    #[test]
    fn manifest_and_url_conflict() {
        let result = Cli::try_parse_from(["cubedbt", "inspect", "-f", "m.json", "-u", "https://example.com/m.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn render_directory_strips_jinja_suffix() {
        let manifest = Manifest::from_str(
            r#"{"nodes": {"model.shop.orders": {"name": "orders", "resource_type": "model", "relation_name": "public.orders"}}}"#,
        )
        .unwrap();
        let renderer = CubeRenderer::new(Arc::new(ManifestGraph::new(manifest)));

        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("cubes")).unwrap();
        std::fs::write(
            src.path().join("cubes/orders.yml.jinja"),
            "cubes:\n  - {{ dbt_model('orders').as_cube() }}\n",
        )
        .unwrap();
        std::fs::write(src.path().join("README.md"), "not a template").unwrap();

        let out = tempfile::tempdir().unwrap();
        let written = render_directory(&renderer, src.path(), out.path()).unwrap();

        let expected = out.path().join("cubes").join("orders.yml");
        assert_eq!(written, vec![expected.clone()]);
        assert_eq!(
            std::fs::read_to_string(expected).unwrap(),
            "cubes:\n  - name: orders\n    sql_table: public.orders"
        );
    }

    #[test]
    fn manifest_flag_ignores_config_directory() {
        let cli = Cli::try_parse_from(["cubedbt", "inspect", "-f", "x.json"]).unwrap();
        let Commands::Inspect { source, .. } = cli.command else {
            panic!("expected inspect");
        };

        let mut config = Config::default();
        config.project_root = PathBuf::from("sub");
        assert_eq!(config.manifest_path(), PathBuf::from("sub/target/manifest.json"));

        source.apply(&mut config);
        assert_eq!(config.manifest_path(), std::env::current_dir().unwrap().join("x.json"));
    }
}
