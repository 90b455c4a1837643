//! The compile driver.
//!
//! Orchestrates the pipeline as a small state machine:
//! `Fresh -> Flattened -> Resolved -> Consolidated -> Packed -> Finalized`,
//! with any failure moving to `Failed`. Each run works on a clone of the
//! spec, so a failed or repeated compile never corrupts the author's data:
//! re-compiling an unchanged spec reproduces the same model.
//!
//! Engine subcalls (the post-pack test step and the length-range solver)
//! return `Result`s; an engine failure becomes a structured `Engine` error
//! and every partially built structure is dropped before the driver returns.

pub(crate) mod address;
pub(crate) mod bvh;
pub(crate) mod entity;
pub(crate) mod flatten;
pub(crate) mod fuse;
pub(crate) mod inertia;
pub(crate) mod pack;
pub(crate) mod prepare;
pub(crate) mod resolve;

use sim_model::{DISABLE_CONTACT, Model};

use crate::engine::{Engine, SweepEngine};
use crate::error::{CompileError, Result};
use crate::lengthrange;
use crate::plugin::{NullHost, PluginHost};
use crate::resources::{DirResources, Resources};
use crate::spec::{CompileMaps, ModelSpec};

/// Driver states. Forward progress only; any error moves to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Flattened,
    Resolved,
    Consolidated,
    Packed,
    Finalized,
    Failed,
}

impl ModelSpec {
    /// Compile with the default collaborators: filesystem resources, the
    /// bundled sweep engine, and a plugin host that knows no plugins.
    ///
    /// Returns the packed model, or `None` with [`ModelSpec::last_error`]
    /// populated. Compiling again after a success reproduces the same model.
    pub fn compile(&mut self) -> Option<Model> {
        self.compile_with(&DirResources, &SweepEngine, &NullHost)
    }

    /// Compile against caller-supplied collaborators.
    pub fn compile_with(
        &mut self,
        resources: &dyn Resources,
        engine: &dyn Engine,
        host: &dyn PluginHost,
    ) -> Option<Model> {
        // Reset derived state; the spec itself is never consumed.
        self.error = None;
        self.warnings.clear();
        self.compile_maps = None;
        self.compiled = false;

        let mut warnings = Vec::new();
        match run_pipeline(self, resources, engine, host, &mut warnings) {
            Ok((model, maps, stat_auto)) => {
                self.warnings = warnings;
                self.compile_maps = maps;
                self.stat_auto = Some(stat_auto);
                self.compiled = true;
                Some(model)
            }
            Err(err) => {
                // Partially built structures were dropped inside the
                // pipeline; keep only the error record.
                tracing::debug!(phase = ?Phase::Failed, error = %err, "compile failed");
                self.error = Some(err);
                None
            }
        }
    }
}

fn run_pipeline(
    spec: &ModelSpec,
    resources: &dyn Resources,
    engine: &dyn Engine,
    host: &dyn PluginHost,
    warnings: &mut Vec<CompileError>,
) -> Result<(Model, Option<CompileMaps>, sim_model::Statistics)> {
    let mut phase = Phase::Fresh;
    tracing::debug!(?phase, "compile started");
    let mut work = spec.clone();

    // Defaults, orientations, frames.
    prepare::apply_defaults(&mut work)?;
    prepare::resolve_orientations(&mut work)?;
    prepare::fold_frames(&mut work)?;

    // Tree flattening and id assignment.
    let maps = flatten::flatten(&mut work)?;
    phase = Phase::Flattened;
    tracing::debug!(?phase, "tree flattened");

    // Visual discard runs before anything takes ids. Copy-back also needs
    // untouched poses, so folded frames disqualify the id maps.
    let mut structure_changed = !work.frames.is_empty();
    if work.options.discardvisual {
        let before = (work.geoms.len(), work.meshes.len(), work.materials.len(), work.textures.len());
        resolve::apply_discard_visual(&mut work);
        let after = (work.geoms.len(), work.meshes.len(), work.materials.len(), work.textures.len());
        structure_changed |= before != after;
    }

    // Assets, then per-entity compilation.
    crate::assets::compile_all(&mut work, resources)?;
    let mut geoms = entity::compile_geoms(&work)?;
    let joints = entity::compile_joints(&work)?;
    let mut sites = entity::compile_sites(&work)?;
    entity::check_cameras_and_lights(&mut work)?;

    // References and the signature sort.
    let refs = resolve::resolve(&mut work, &mut geoms, &mut sites)?;
    phase = Phase::Resolved;
    tracing::debug!(?phase, "references resolved");

    // Inertia consolidation and the structural mass passes.
    let mut inertia = inertia::consolidate(&work, &geoms)?;
    if work.options.fusestatic {
        structure_changed |= fuse::fuse_static(&mut work, &mut geoms, &mut sites, &mut inertia)?;
    }
    inertia::check_moving_masses(&work, &inertia)?;
    phase = Phase::Consolidated;
    tracing::debug!(?phase, "inertia consolidated");

    // Addresses, trees, BVH, packing.
    let layout = address::assign(&work, &joints, &geoms, &inertia)?;
    let body_trees = bvh::build_body_trees(&work, &geoms, &inertia);
    let mesh_trees = bvh::build_mesh_trees(&work);
    let flex_trees = bvh::build_flex_trees(&work);
    let parts = pack::Packed {
        geoms: &geoms,
        sites: &sites,
        joints: &joints,
        inertia: &inertia,
        layout: &layout,
        refs: &refs,
        body_trees: &body_trees,
        mesh_trees: &mesh_trees,
        flex_trees: &flex_trees,
    };
    let (mut model, stat_auto) = pack::pack(&work, &parts, host)?;
    phase = Phase::Packed;
    tracing::debug!(?phase, "model packed");

    // Length ranges, then one engine test step with contacts disabled.
    lengthrange::compute(&mut model, engine, &work.options.lengthrange)?;
    let saved_flags = model.opt.disableflags;
    model.opt.disableflags |= DISABLE_CONTACT;
    let mut state = engine.make_state(&model);
    let step = engine.step(&model, &mut state);
    model.opt.disableflags = saved_flags;
    match step {
        Ok(None) => {}
        Ok(Some(message)) => warnings.push(CompileError::engine(message).into_warning()),
        Err(e) => return Err(CompileError::engine(e.message)),
    }
    phase = Phase::Finalized;
    tracing::debug!(?phase, "compile finalized");

    let maps = if structure_changed {
        None
    } else {
        Some(CompileMaps {
            bodies: maps.body_order,
            joints: invert(&maps.joints),
            geoms: invert(&maps.geoms),
            sites: invert(&maps.sites),
            cameras: invert(&maps.cameras),
            lights: invert(&maps.lights),
            pairs: refs.pair_order.clone(),
            excludes: refs.exclude_order.clone(),
        })
    };
    Ok((model, maps, stat_auto))
}

/// Invert an old-to-new permutation into new-to-old.
fn invert(map: &[usize]) -> Vec<usize> {
    let mut out = vec![0; map.len()];
    for (old, &new) in map.iter().enumerate() {
        out[new] = old;
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use nalgebra::Vector3;
    use sim_model::{JointType, ObjectType};

    fn pendulum() -> ModelSpec {
        let mut spec = ModelSpec::new();
        spec.options.angle = crate::options::AngleUnit::Radian;
        let b = spec.add_body(0);
        spec.bodies[b].name = "pole".to_string();
        let j = spec.add_joint(b);
        spec.joints[j].name = "swing".to_string();
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        spec.joints[j].params.range = Some((-1.0, 1.0));
        let g = spec.add_geom(b);
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        spec
    }

    #[test]
    fn pendulum_compiles() {
        let mut spec = pendulum();
        let model = spec.compile().expect("compile should succeed");
        assert_eq!(model.nbody, 2);
        assert_eq!((model.nq, model.nv), (1, 1));
        assert!(spec.last_error().is_none());
        assert_eq!(model.name2id(ObjectType::Joint, "swing"), Some(0));
    }

    #[test]
    fn failure_preserves_spec_and_records_error() {
        let mut spec = pendulum();
        let g2 = spec.add_geom(1);
        spec.geoms[g2].name = "foo".to_string();
        spec.geoms[g2].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        let g3 = spec.add_geom(1);
        spec.geoms[g3].name = "foo".to_string();
        spec.geoms[g3].params.size = Some(Vector3::new(0.1, 0.0, 0.0));

        assert!(spec.compile().is_none());
        let err = spec.last_error().expect("error stored");
        assert_eq!(err.kind, ErrorKind::ParseOrSpec);
        assert!(err.to_string().contains("repeated name 'foo' in geom"));
        // The spec is intact and mutable: rename and recompile.
        spec.geoms[g3].name = "bar".to_string();
        assert!(spec.compile().is_some());
        assert!(spec.last_error().is_none());
    }

    #[test]
    fn recompile_reproduces_the_model() {
        let mut spec = pendulum();
        let first = spec.compile().unwrap();
        let second = spec.compile().unwrap();
        assert_eq!(first.nq, second.nq);
        assert_eq!(first.qpos0, second.qpos0);
        assert_eq!(first.body_mass, second.body_mass);
        assert_eq!(first.names, second.names);
        assert_eq!(first.narena, second.narena);
    }

    #[test]
    fn compile_maps_absent_after_fusion() {
        let mut spec = pendulum();
        spec.options.fusestatic = true;
        let stat = spec.add_body(1);
        spec.bodies[stat].inertial = Some(crate::spec::body::Inertial {
            mass: 1.0,
            diaginertia: Some(Vector3::new(0.1, 0.1, 0.1)),
            ..crate::spec::body::Inertial::default()
        });
        let model = spec.compile().unwrap();
        assert_eq!(model.nbody, 2, "static child fused away");
        assert!(spec.compile_maps.is_none());
    }
}
