//! Custom data entities: numerics, texts, tuples, keyframes and plugin
//! instances.

use serde::{Deserialize, Serialize};
use sim_model::ObjectType;

/// A named numeric array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Numeric {
    /// Field name; unique among numerics.
    pub name: String,
    /// Declared size; when larger than `data`, the tail is zero-filled.
    pub size: Option<usize>,
    /// Values.
    pub data: Vec<f64>,
}

/// A named text blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Text {
    /// Field name; unique among texts.
    pub name: String,
    /// Content; must be non-empty.
    pub data: String,
}

/// One element of a tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TupleEntry {
    /// Referenced object kind.
    pub objtype: ObjectType,
    /// Referenced object name.
    pub objname: String,
    /// Free parameter attached to the entry.
    pub prm: f64,
}

/// A named list of object references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tuple {
    /// Field name; unique among tuples.
    pub name: String,
    /// Entries; an object may appear at most once.
    pub elements: Vec<TupleEntry>,
}

/// A keyframe: a named snapshot of the generalized state.
///
/// Missing components default at compile time: `qpos` from `qpos0`, mocap
/// poses from the mocap bodies' spec poses, everything else zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Keyframe {
    /// Keyframe name.
    pub name: String,
    /// Simulation time.
    pub time: f64,
    /// Generalized positions, length `nq`.
    pub qpos: Option<Vec<f64>>,
    /// Generalized velocities, length `nv`.
    pub qvel: Option<Vec<f64>>,
    /// Activation states, length `na`.
    pub act: Option<Vec<f64>>,
    /// Controls, length `nu`.
    pub ctrl: Option<Vec<f64>>,
    /// Mocap positions, length `3 * nmocap`.
    pub mpos: Option<Vec<f64>>,
    /// Mocap orientations, length `4 * nmocap`.
    pub mquat: Option<Vec<f64>>,
}

/// An instance of an engine-loaded plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginInstance {
    /// Instance name; unique among plugin instances.
    pub name: String,
    /// Registered plugin (capability provider) name.
    pub plugin_name: String,
    /// Flat attribute map, insertion order preserved for packing.
    pub attributes: Vec<(String, String)>,
}
