//! Emission Pipeline - Single Entry Point
//!
//! plan -> destination check -> render -> consistency check -> write -> manifest.
//!
//! Nothing is written until every obligation has been rendered and the
//! consistency check has passed, so a fatal error never touches existing output.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

use crate::artifact::{ArtifactId, ArtifactPlan, DestinationCollision, Obligation, RenderedSet};
use crate::binder::{TemplateBinder, TemplateError};
use crate::catalog;
use crate::config::GeneratorConfig;
use crate::functions::Registries;
use crate::hashing::{canonical_json, compute_manifest_hash, content_hash};
use crate::schema::{SchemaDocument, SchemaError};
use crate::templates::{TemplateSet, TemplateSetError};
use crate::validation::{BuildMode, ConsistencyFinding, ConsistencyReport, Validator};
use crate::GENERATOR_VERSION;

pub const MANIFEST_FILE: &str = "mathgen-manifest.json";

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Template set error: {0}")]
    TemplateSet(#[from] TemplateSetError),

    #[error("Destination collision: {}", describe_collisions(.0))]
    DestinationCollision(Vec<DestinationCollision>),

    #[error("{} artifact(s) failed to render: {}", .0.len(), describe_failures(.0))]
    Render(Vec<TemplateError>),

    #[error("Consistency check blocked emission with {} finding(s)", .0.len())]
    Inconsistent(Vec<ConsistencyFinding>),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start render pool: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_collisions(collisions: &[DestinationCollision]) -> String {
    collisions.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
}

fn describe_failures(failures: &[TemplateError]) -> String {
    failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Stop scheduling on the first render failure and write nothing.
    #[default]
    FailFast,
    /// Write everything renderable, report failures at the end.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub output_dir: PathBuf,
    pub mode: BuildMode,
    pub failure_policy: FailurePolicy,
    pub jobs: usize,
    pub dry_run: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        GeneratorConfig::default().emit_options()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Written,
    /// Destination already held identical bytes.
    Unchanged,
    /// Dry run: rendered, not written.
    Planned,
    Failed,
    /// Not rendered because fail-fast cancelled the batch.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactOutcome {
    pub artifact: ArtifactId,
    pub destination: PathBuf,
    pub status: ArtifactStatus,
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub artifact: ArtifactId,
    /// `/`-separated, relative to the output root.
    pub destination: String,
    pub hash: String,
}

/// Written next to the artifacts. Contains no timestamps or run ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmissionManifest {
    pub generator_version: String,
    pub template_version: String,
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionReport {
    pub run_id: String,
    pub generator_version: String,
    pub template_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub mode: BuildMode,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    pub outcomes: Vec<ArtifactOutcome>,
    pub failures: Vec<TemplateError>,
    pub consistency: ConsistencyReport,
    pub manifest_hash: String,
}

impl EmissionReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty() && !self.consistency.blocking
    }

    pub fn count(&self, status: ArtifactStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

enum Rendered {
    Text(String),
    Failed(TemplateError),
    Skipped,
}

/// The emission pipeline - single entry point for generating artifacts
pub struct EmissionPipeline {
    registries: Registries,
    templates: TemplateSet,
    binder: TemplateBinder,
    validator: Validator,
}

impl EmissionPipeline {
    pub fn new(registries: Registries, templates: TemplateSet) -> Self {
        let binder = TemplateBinder::new(&templates);
        Self {
            registries,
            templates,
            binder,
            validator: Validator::new(),
        }
    }

    /// Built-in schema and templates unless the config points elsewhere.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, EmitError> {
        let registries = match &config.schema_path {
            Some(path) => Registries::from_document(&SchemaDocument::load(path)?)?,
            None => catalog::builtin_registries()?,
        };
        let templates = match &config.templates_dir {
            Some(dir) => TemplateSet::load_from_dir(dir)?,
            None => TemplateSet::builtin()?,
        };
        Ok(Self::new(registries, templates))
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn plan(&self) -> ArtifactPlan {
        ArtifactPlan::compute(&self.registries, &self.templates)
    }

    /// Plan, check destinations, render, validate, then write.
    pub fn emit(&self, options: &EmitOptions) -> Result<EmissionReport, EmitError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let plan = self.plan();

        tracing::info!(
            run_id = %run_id,
            artifacts = plan.len(),
            output_dir = %options.output_dir.display(),
            dry_run = options.dry_run,
            "starting emission"
        );

        // MANDATORY: destinations are checked before anything is rendered.
        let collisions = plan.collisions();
        if !collisions.is_empty() {
            return Err(EmitError::DestinationCollision(collisions));
        }

        // One pool sized by `jobs` serves both render and write.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
            .map_err(|e| EmitError::Pool(e.to_string()))?;
        let rendered = self.render_all(&pool, &plan, options);

        let mut failures = vec![];
        let mut texts = RenderedSet::new();
        for (obligation, result) in plan.obligations.iter().zip(&rendered) {
            match result {
                Rendered::Text(text) => texts.insert(obligation.id.clone(), text.clone()),
                Rendered::Failed(err) => failures.push(err.clone()),
                Rendered::Skipped => {}
            }
        }
        for failure in &failures {
            tracing::warn!(artifact = %failure.artifact, "{failure}");
        }
        if options.failure_policy == FailurePolicy::FailFast && !failures.is_empty() {
            let skipped = rendered.iter().filter(|r| matches!(r, Rendered::Skipped)).count();
            tracing::warn!(failed = failures.len(), skipped, "render failed, emission cancelled");
            return Err(EmitError::Render(failures));
        }

        let consistency = self.validator.check(&self.registries, &texts, options.mode);
        if consistency.blocking {
            return Err(EmitError::Inconsistent(consistency.findings));
        }

        let outcomes = pool.install(|| self.write_all(&plan, &rendered, options))?;
        let manifest = self.manifest(&plan, &rendered);
        let manifest_hash = compute_manifest_hash(&manifest)?;
        if !options.dry_run {
            let mut json = canonical_json(&manifest)?;
            json.push('\n');
            let path = options.output_dir.join(MANIFEST_FILE);
            write_if_changed(&path, &json).map_err(|source| EmitError::Write { path, source })?;
        }

        let report = EmissionReport {
            run_id,
            generator_version: GENERATOR_VERSION.to_string(),
            template_version: self.templates.manifest().template_version.clone(),
            started_at,
            finished_at: Utc::now(),
            output_dir: options.output_dir.clone(),
            mode: options.mode,
            failure_policy: options.failure_policy,
            dry_run: options.dry_run,
            outcomes,
            failures,
            consistency,
            manifest_hash,
        };

        tracing::info!(
            written = report.count(ArtifactStatus::Written),
            unchanged = report.count(ArtifactStatus::Unchanged),
            failed = report.count(ArtifactStatus::Failed),
            findings = report.consistency.findings.len(),
            manifest_hash = %report.manifest_hash,
            "emission finished"
        );
        Ok(report)
    }

    /// Re-check artifacts already on disk against the registries.
    pub fn validate_output(&self, output_dir: &Path, mode: BuildMode) -> Result<ConsistencyReport, EmitError> {
        let plan = self.plan();
        let rendered = RenderedSet::read_from(&plan, output_dir).map_err(|source| EmitError::Read {
            path: output_dir.to_path_buf(),
            source,
        })?;
        tracing::info!(output_dir = %output_dir.display(), artifacts = rendered.len(), "validating output");
        Ok(self.validator.check(&self.registries, &rendered, mode))
    }

    fn render_all(&self, pool: &rayon::ThreadPool, plan: &ArtifactPlan, options: &EmitOptions) -> Vec<Rendered> {
        let cancelled = AtomicBool::new(false);
        let fail_fast = options.failure_policy == FailurePolicy::FailFast;

        pool.install(|| {
            plan.obligations
                .par_iter()
                .map(|obligation| {
                    if cancelled.load(Ordering::SeqCst) {
                        return Rendered::Skipped;
                    }
                    match self.binder.render(obligation, &self.registries) {
                        Ok(text) => Rendered::Text(text),
                        Err(err) => {
                            if fail_fast {
                                cancelled.store(true, Ordering::SeqCst);
                            }
                            Rendered::Failed(err)
                        }
                    }
                })
                .collect()
        })
    }

    fn write_all(
        &self,
        plan: &ArtifactPlan,
        rendered: &[Rendered],
        options: &EmitOptions,
    ) -> Result<Vec<ArtifactOutcome>, EmitError> {
        // Destinations are unique, so each file has exactly one writer.
        plan.obligations
            .par_iter()
            .zip(rendered)
            .map(|(obligation, result)| {
                let outcome = |status, hash| ArtifactOutcome {
                    artifact: obligation.id.clone(),
                    destination: obligation.destination.clone(),
                    status,
                    hash,
                };
                Ok(match result {
                    Rendered::Text(text) if options.dry_run => {
                        outcome(ArtifactStatus::Planned, Some(content_hash(text)))
                    }
                    Rendered::Text(text) => {
                        let status = write_artifact(&options.output_dir, obligation, text)?;
                        outcome(status, Some(content_hash(text)))
                    }
                    Rendered::Failed(_) => outcome(ArtifactStatus::Failed, None),
                    Rendered::Skipped => outcome(ArtifactStatus::Skipped, None),
                })
            })
            .collect()
    }

    fn manifest(&self, plan: &ArtifactPlan, rendered: &[Rendered]) -> EmissionManifest {
        let artifacts = plan
            .obligations
            .iter()
            .zip(rendered)
            .filter_map(|(obligation, result)| match result {
                Rendered::Text(text) => Some(ManifestEntry {
                    artifact: obligation.id.clone(),
                    destination: slash_path(&obligation.destination),
                    hash: content_hash(text),
                }),
                _ => None,
            })
            .collect();
        EmissionManifest {
            generator_version: GENERATOR_VERSION.to_string(),
            template_version: self.templates.manifest().template_version.clone(),
            artifacts,
        }
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_artifact(root: &Path, obligation: &Obligation, text: &str) -> Result<ArtifactStatus, EmitError> {
    let path = root.join(&obligation.destination);
    let status = write_if_changed(&path, text).map_err(|source| EmitError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(artifact = %obligation.id, path = %path.display(), status = ?status, "artifact emitted");
    Ok(status)
}

fn write_if_changed(path: &Path, text: &str) -> io::Result<ArtifactStatus> {
    if let Ok(existing) = fs::read(path) {
        if existing == text.as_bytes() {
            return Ok(ArtifactStatus::Unchanged);
        }
    }
    write_atomic(path, text.as_bytes())?;
    Ok(ArtifactStatus::Written)
}

/// Write to a sibling temporary file, sync, rename over `path`, then sync the
/// directory so the rename itself survives a crash.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}", std::process::id()));
    let tmp_path = PathBuf::from(tmp);

    let write_result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.flush()?;
        file.sync_all()
    })();
    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })?;

    sync_parent(path)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

// Directories cannot be opened as files on every platform.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> EmissionPipeline {
        EmissionPipeline::new(catalog::builtin_registries().unwrap(), TemplateSet::builtin().unwrap())
    }

    fn options(dir: &Path) -> EmitOptions {
        EmitOptions {
            output_dir: dir.to_path_buf(),
            ..EmitOptions::default()
        }
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.h");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let names: Vec<_> = fs::read_dir(dir.path().join("nested")).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_write_atomic_syncs_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.h");
        write_atomic(&path, b"text").unwrap();
        sync_parent(&path).unwrap();
        // A bare file name has no directory to sync
        sync_parent(Path::new("out.h")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"text");
    }

    #[test]
    fn test_writes_run_on_the_emission_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline();
        let plan = pipeline.plan();
        let options = EmitOptions { jobs: 2, ..options(dir.path()) };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(options.jobs).build().unwrap();
        let rendered = pipeline.render_all(&pool, &plan, &options);

        let threads = pool.install(|| {
            assert_eq!(rayon::current_num_threads(), options.jobs);
            pipeline.write_all(&plan, &rendered, &options).unwrap();
            rayon::current_num_threads()
        });
        assert_eq!(threads, 2);
        assert!(dir.path().join("types/vec3f.h").exists());
    }

    #[test]
    fn test_emit_builtin_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline();
        let report = pipeline.emit(&options(dir.path())).unwrap();

        assert!(report.success());
        assert!(report.consistency.is_clean(), "{:?}", report.consistency.findings);
        assert_eq!(report.count(ArtifactStatus::Written), pipeline.plan().len());
        assert!(dir.path().join("types/vec3f.h").exists());
        assert!(dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline()
            .emit(&EmitOptions {
                dry_run: true,
                ..options(dir.path())
            })
            .unwrap();
        assert_eq!(report.count(ArtifactStatus::Planned), report.outcomes.len());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rerun_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline();
        let first = pipeline.emit(&options(dir.path())).unwrap();
        let second = pipeline.emit(&options(dir.path())).unwrap();
        assert_eq!(second.count(ArtifactStatus::Unchanged), second.outcomes.len());
        assert_eq!(first.manifest_hash, second.manifest_hash);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(slash_path(Path::new("python/types/bindVec3f.cpp")), "python/types/bindVec3f.cpp");
    }
}
