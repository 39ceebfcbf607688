//! Render-count tests. Run with `--features test-hooks`.
//!
//! Kept in one test function because the counter is process-wide.

#![cfg(feature = "test-hooks")]

use mathgen_core::binder::{get_render_call_count, reset_render_call_count};
use mathgen_core::{catalog, EmissionPipeline, EmitError, EmitOptions, TemplateSet, TypeSchema};

#[test]
fn invariant_render_counts() {
    let dir = tempfile::tempdir().unwrap();
    let options = EmitOptions {
        output_dir: dir.path().to_path_buf(),
        jobs: 1,
        ..EmitOptions::default()
    };

    // Collisions are detected before a single template is rendered
    let mut registries = catalog::builtin_registries().unwrap();
    registries.types.register(TypeSchema::vector("vec3f", "float", 3)).unwrap();
    let colliding = EmissionPipeline::new(registries, TemplateSet::builtin().unwrap());
    reset_render_call_count();
    assert!(matches!(colliding.emit(&options), Err(EmitError::DestinationCollision(_))));
    assert_eq!(get_render_call_count(), 0);

    // Every obligation renders exactly once
    let pipeline = EmissionPipeline::new(catalog::builtin_registries().unwrap(), TemplateSet::builtin().unwrap());
    reset_render_call_count();
    pipeline.emit(&options).unwrap();
    assert_eq!(get_render_call_count() as usize, pipeline.plan().len());

    // Fail-fast stops scheduling after the first failure
    let mut templates = TemplateSet::builtin().unwrap();
    templates.insert("types/scalarType.h", "{% if %}");
    let broken = EmissionPipeline::new(catalog::builtin_registries().unwrap(), templates);
    reset_render_call_count();
    assert!(matches!(broken.emit(&options), Err(EmitError::Render(_))));
    assert!((get_render_call_count() as usize) < broken.plan().len());
}
