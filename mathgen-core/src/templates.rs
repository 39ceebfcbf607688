//! Template Set - Named Template Sources
//!
//! Templates are keyed by their path relative to the template root, using `/`
//! separators (`types/vectorType.h`). An optional `templates.json` manifest pins
//! the minimum generator version the set was written for.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::GENERATOR_VERSION;

pub const MANIFEST_FILE: &str = "templates.json";

#[derive(Debug, Error)]
pub enum TemplateSetError {
    #[error("Template directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Invalid version '{0}' in template manifest")]
    InvalidVersion(String),

    #[error("Template set {0} requires generator >= {1}, current is {2}")]
    GeneratorVersionMismatch(String, String, String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateManifest {
    pub template_version: String,
    pub generator_min_version: String,
}

impl Default for TemplateManifest {
    fn default() -> Self {
        Self {
            template_version: "1.0.0".to_string(),
            generator_min_version: "0.1.0".to_string(),
        }
    }
}

macro_rules! builtin {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../templates/", $name)))),*]
    };
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = builtin![
    "types/scalarType.h",
    "types/vectorType.h",
    "types/rangeType.h",
    "types/compositeType.h",
    "types/tests/testScalarType.cpp",
    "types/tests/testVectorType.cpp",
    "types/tests/testRangeType.cpp",
    "types/tests/testCompositeType.cpp",
    "python/types/bindVectorType.cpp",
    "python/types/bindRangeType.cpp",
    "python/types/bindCompositeType.cpp",
    "python/types/tests/testVectorType.py",
    "python/types/tests/testRangeType.py",
    "python/types/tests/testCompositeType.py",
    "functions/functionBase.h",
    "functions/lengthSquared.h",
    "functions/length.h",
    "functions/dotProduct.h",
    "functions/crossProduct.h",
    "functions/normalize.h",
    "functions/min.h",
    "functions/max.h",
    "functions/floor.h",
    "functions/abs.h",
    "functions/radians.h",
    "functions/linearInterpolation.h",
    "functions/rayPosition.h",
    "functions/quadraticRoots.h",
    "functions/raySphereIntersection.h",
    "functions/tests/testLengthSquared.cpp",
    "functions/tests/testLength.cpp",
    "functions/tests/testDotProduct.cpp",
    "functions/tests/testRadians.cpp",
    "python/functions/bindFunction.cpp",
    "python/module.cpp",
];

const BUILTIN_MANIFEST: &str = include_str!("../templates/templates.json");

/// Template sources, in load order.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    manifest: TemplateManifest,
    sources: IndexMap<String, String>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The templates compiled into the generator.
    pub fn builtin() -> Result<Self, TemplateSetError> {
        let set = Self {
            manifest: parse_manifest(BUILTIN_MANIFEST)?,
            sources: BUILTIN_TEMPLATES
                .iter()
                .map(|(name, source)| (name.to_string(), source.to_string()))
                .collect(),
        };
        set.check_generator_version()?;
        Ok(set)
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, TemplateSetError> {
        if !dir.is_dir() {
            return Err(TemplateSetError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut set = Self::new();
        let mut files = vec![];
        collect_files(dir, &mut files)?;
        files.sort();

        for path in files {
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let source = fs::read_to_string(&path).map_err(|source| TemplateSetError::Read {
                path: path.clone(),
                source,
            })?;
            if name == MANIFEST_FILE {
                set.manifest = parse_manifest(&source)?;
            } else {
                set.sources.insert(name, source);
            }
        }

        set.check_generator_version()?;
        tracing::info!(dir = %dir.display(), templates = set.len(), "loaded template set");
        Ok(set)
    }

    pub fn check_generator_version(&self) -> Result<(), TemplateSetError> {
        let current = semver::Version::parse(GENERATOR_VERSION)
            .map_err(|_| TemplateSetError::InvalidVersion(GENERATOR_VERSION.to_string()))?;
        let required = semver::Version::parse(&self.manifest.generator_min_version)
            .map_err(|_| TemplateSetError::InvalidVersion(self.manifest.generator_min_version.clone()))?;

        if current < required {
            return Err(TemplateSetError::GeneratorVersionMismatch(
                self.manifest.template_version.clone(),
                self.manifest.generator_min_version.clone(),
                GENERATOR_VERSION.to_string(),
            ));
        }
        Ok(())
    }

    pub fn manifest(&self) -> &TemplateManifest {
        &self.manifest
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// `(name, source)` pairs in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().map(|(name, source)| (name.as_str(), source.as_str()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: &str, source: &str) {
        self.sources.insert(name.to_string(), source.to_string());
    }
}

fn parse_manifest(source: &str) -> Result<TemplateManifest, TemplateSetError> {
    Ok(serde_json::from_str(source)?)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), TemplateSetError> {
    let read_err = |source| TemplateSetError::Read {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
