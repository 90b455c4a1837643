//! Packed runtime model for a rigid/soft-body physics simulator.
//!
//! This crate defines [`Model`]: the fixed-layout, array-of-struct-of-arrays
//! output of the `sim-compile` model compiler. A `Model` is produced once by
//! compilation and then treated as immutable by the stepping engine:
//!
//! - size fields (`nq`, `nv`, `nbody`, ...) come first and fix every array
//!   length;
//! - each entity kind stores flat arrays indexed by compile-time ids, with
//!   `*_adr`/`*_num` pairs for variable-length attributes;
//! - names and asset paths live in NUL-separated byte buffers, with an
//!   open-addressed djb2 hash map for O(1) expected [`Model::name2id`].
//!
//! The compiler lives in `sim-compile`; this crate has no compilation logic
//! beyond the lookup helpers the packed tables require.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::doc_markdown
)]

pub mod enums;
pub mod model;
pub mod names;

pub use enums::{
    BiasType, DynType, EqualityType, GainType, GeomType, JointType, ObjectType, PluginCapability,
    SensorDataType, SensorStage, SensorType, TextureType, TransmissionType, WrapType,
};
pub use model::{
    DISABLE_ACTUATION, DISABLE_CONTACT, DISABLE_FRICTIONLOSS, DISABLE_GRAVITY, DISABLE_PASSIVE,
    Model, ModelOptions, NPOS, NVEL, Statistics,
};
pub use names::LOAD_MULTIPLE;
