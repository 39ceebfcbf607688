//! MathGen Core - Schema-Driven Code Generator
//!
//! Turns a schema of value types and math functions into C++ headers,
//! C++ tests, Python binding sources with their Python tests and a binding
//! module registration file.
//!
//! # Guarantees
//! 1. Registries Are Truth: every artifact is derived from registered schemas
//! 2. Overloads Are Complete: each interface gets a definition, a binding and a signature
//! 3. Destinations Are Unique: collisions abort before anything is rendered
//! 4. Deterministic Output: identical inputs produce byte-identical files
//! 5. Writes Are Atomic: a failed run leaves existing output untouched
//! 6. Release Builds Block: any consistency finding stops emission in release mode

pub mod schema;
pub mod types;
pub mod functions;
pub mod catalog;
pub mod context;
pub mod templates;
pub mod binder;
pub mod artifact;
pub mod shape;
pub mod validation;
pub mod hashing;
pub mod config;
pub mod pipeline;

pub use schema::{FunctionSchema, Interface, Parameter, Primitive, SchemaDocument, SchemaError, TypeCategory, TypeSchema};
pub use types::TypeRegistry;
pub use functions::{FunctionRegistry, Registries};
pub use context::ContextBuilder;
pub use templates::{TemplateManifest, TemplateSet, TemplateSetError};
pub use binder::{TemplateBinder, TemplateError, TemplateFault};
pub use artifact::{ArtifactId, ArtifactKind, ArtifactPlan, DestinationCollision, EntityKind, RenderedSet};
pub use validation::{BuildMode, ConsistencyFinding, ConsistencyReport, ConsistencyRule, FindingSeverity, Validator};
pub use hashing::{canonical_json, compute_manifest_hash, content_hash};
pub use config::{ConfigError, GeneratorConfig};
pub use pipeline::{
    ArtifactOutcome, ArtifactStatus, EmissionManifest, EmissionPipeline, EmissionReport, EmitError, EmitOptions,
    FailurePolicy,
};

pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
