//! Model compiler for a rigid/soft-body physics simulator.
//!
//! This crate turns an author-level [`ModelSpec`] — a tree of bodies with
//! joints, geoms, sites, cameras and lights, plus flat lists of assets,
//! constraints, tendons, actuators, sensors and custom data — into the
//! packed, validated [`sim_model::Model`] the stepping engine consumes.
//!
//! # Pipeline
//!
//! ```text
//! ModelSpec ──clone──► defaults / orientations / frames
//!                      │
//!                      ▼
//!              flatten (ids, duplicate names, free-joint rules)
//!                      ▼
//!              discard visual ─► compile assets ─► compile entities
//!                      ▼
//!              consolidate inertia ─► resolve references ─► sort pairs
//!                      ▼
//!              fuse statics ─► assign dof addresses ─► build BVH
//!                      ▼
//!              pack model ─► resolve plugins ─► keyframes
//!                      ▼
//!              length ranges (worker pool) ─► engine test step
//! ```
//!
//! The spec stays mutable and untouched across compiles: a failed run
//! records its first error ([`ModelSpec::last_error`]) and returns nothing;
//! a successful recompile of an unchanged spec reproduces the same model.
//!
//! # Collaborators
//!
//! Three seams keep external concerns out of the compile core:
//!
//! - [`Resources`]: file and virtual-file access plus image decoding;
//! - [`Engine`]: the physics stepper used for the post-pack test step and
//!   the actuator length-range solver;
//! - [`PluginHost`]: capability and state-size queries for plugin
//!   instances.
//!
//! Defaults ([`DirResources`], [`SweepEngine`], [`NullHost`]) are bundled so
//! `spec.compile()` works out of the box.
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use sim_compile::{AngleUnit, ModelSpec};
//! use sim_model::JointType;
//!
//! let mut spec = ModelSpec::new();
//! spec.options.angle = AngleUnit::Radian;
//! let body = spec.add_body(0);
//! spec.bodies[body].name = "pendulum".to_string();
//! let joint = spec.add_joint(body);
//! spec.joints[joint].params.jtype = Some(JointType::Hinge);
//! let geom = spec.add_geom(body);
//! spec.geoms[geom].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
//!
//! let model = spec.compile().expect("compile failed");
//! assert_eq!((model.nq, model.nv, model.nbody), (1, 1, 2));
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]

pub mod assets;
mod compile;
mod decompile;
pub mod defaults;
pub mod engine;
pub mod error;
mod lengthrange;
pub mod options;
pub mod orientation;
pub mod plugin;
pub mod resources;
pub mod spec;

pub use defaults::{DefaultClass, DefaultTable};
pub use engine::{Engine, EngineError, EngineState, SweepEngine};
pub use error::{CompileError, ErrorKind, ObjectRef, OrientationError, Result};
pub use options::{
    AngleUnit, CompilerOptions, InertiaFromGeom, LengthRangeMode, LengthRangeOptions,
};
pub use orientation::{AltOrientation, Orientation};
pub use plugin::{NullHost, PluginHost, StaticHost};
pub use resources::{DirResources, MemResources, PngImage, Resources};
pub use spec::ModelSpec;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use sim_model::{JointType, ObjectType};

    /// A compile drives every phase; spot-check the cross-phase outputs.
    #[test]
    fn end_to_end_double_pendulum() {
        let mut spec = ModelSpec::new();
        spec.options.angle = AngleUnit::Radian;
        let upper = spec.add_body(0);
        spec.bodies[upper].name = "upper".to_string();
        spec.bodies[upper].pos = Vector3::new(0.0, 0.0, 1.0);
        let j1 = spec.add_joint(upper);
        spec.joints[j1].name = "shoulder".to_string();
        spec.joints[j1].params.jtype = Some(JointType::Hinge);
        spec.joints[j1].params.axis = Some(Vector3::y());
        let g1 = spec.add_geom(upper);
        spec.geoms[g1].params.size = Some(Vector3::new(0.05, 0.0, 0.0));

        let lower = spec.add_body(upper);
        spec.bodies[lower].name = "lower".to_string();
        spec.bodies[lower].pos = Vector3::new(0.0, 0.0, -0.5);
        let j2 = spec.add_joint(lower);
        spec.joints[j2].name = "elbow".to_string();
        spec.joints[j2].params.jtype = Some(JointType::Hinge);
        spec.joints[j2].params.axis = Some(Vector3::y());
        let g2 = spec.add_geom(lower);
        spec.geoms[g2].params.size = Some(Vector3::new(0.05, 0.0, 0.0));

        let model = spec.compile().expect("should compile");
        assert_eq!(model.nbody, 3);
        assert_eq!((model.nq, model.nv), (2, 2));
        assert_eq!(model.body_parentid, vec![0, 0, 1]);
        assert_eq!(model.name2id(ObjectType::Body, "lower"), Some(2));
        assert_eq!(model.dof_parentid, vec![-1, 0]);
        assert!(model.narena > 0);
    }

    /// The spec surface holds errors instead of panicking.
    #[test]
    fn compile_failure_is_recoverable() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let g = spec.add_geom(b);
        spec.geoms[g].params.size = Some(Vector3::new(-1.0, 0.0, 0.0));
        assert!(spec.compile().is_none());
        assert_eq!(spec.last_error().unwrap().kind, ErrorKind::Geometry);
    }
}
