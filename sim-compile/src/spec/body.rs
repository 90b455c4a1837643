//! Kinematic-tree elements: bodies, joints, geoms, sites, cameras, lights
//! and frames.
//!
//! Bodies live in an arena on [`crate::spec::ModelSpec`] and reference their
//! children and attached elements by integer id, in declaration order.
//! Defaultable parameters are `Option`s grouped into `*Params` structs; the
//! default-class table holds the same structs and fills unset fields before
//! per-entity compilation.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_model::{GeomType, JointType};

use crate::orientation::Orientation;

/// Explicit inertial specification of a body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inertial {
    /// Inertial frame origin in the body frame.
    pub pos: Vector3<f64>,
    /// Inertial frame orientation.
    pub orient: Orientation,
    /// Mass.
    pub mass: f64,
    /// Principal diagonal inertia, if given directly.
    pub diaginertia: Option<Vector3<f64>>,
    /// Full symmetric inertia `[Ixx, Iyy, Izz, Ixy, Ixz, Iyz]`; diagonalized
    /// at compile time.
    pub fullinertia: Option<[f64; 6]>,
}

/// A rigid body in the kinematic tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    /// Body name; must be unique among bodies when non-empty.
    pub name: String,
    /// Default class applied to child elements without an explicit class.
    pub childclass: Option<String>,
    /// Parent body id (the world is its own parent).
    pub parent: usize,
    /// Child body ids, declaration order.
    pub children: Vec<usize>,
    /// Joint ids attached to this body, declaration order.
    pub joints: Vec<usize>,
    /// Geom ids attached to this body, declaration order.
    pub geoms: Vec<usize>,
    /// Site ids attached to this body, declaration order.
    pub sites: Vec<usize>,
    /// Camera ids attached to this body, declaration order.
    pub cameras: Vec<usize>,
    /// Light ids attached to this body, declaration order.
    pub lights: Vec<usize>,
    /// Frame the body frame itself composes through, if declared in one.
    pub frame: Option<usize>,
    /// Frame offset from the parent body.
    pub pos: Vector3<f64>,
    /// Frame orientation relative to the parent body.
    pub orient: Orientation,
    /// Explicit inertial data; `None` lets the compiler derive from geoms.
    pub inertial: Option<Inertial>,
    /// Mocap body: driven externally, must be a jointless child of world.
    pub mocap: bool,
}

/// Defaultable joint parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JointParams {
    /// Joint type.
    pub jtype: Option<JointType>,
    /// Rotation/translation axis in the body frame.
    pub axis: Option<Vector3<f64>>,
    /// Visualization group.
    pub group: Option<i32>,
    /// Whether position limits apply.
    pub limited: Option<bool>,
    /// Position limits.
    pub range: Option<(f64, f64)>,
    /// Whether total actuator-force limits apply.
    pub actfrclimited: Option<bool>,
    /// Total actuator-force limits.
    pub actfrcrange: Option<(f64, f64)>,
    /// Spring stiffness.
    pub stiffness: Option<f64>,
    /// Spring equilibrium position.
    pub springref: Option<f64>,
    /// Reference position subtracted at `qpos0`.
    pub refpos: Option<f64>,
    /// Damping coefficient.
    pub damping: Option<f64>,
    /// Reflected rotor inertia.
    pub armature: Option<f64>,
    /// Dry friction.
    pub frictionloss: Option<f64>,
    /// Limit activation distance.
    pub margin: Option<f64>,
    /// Limit solver reference.
    pub solref_limit: Option<[f64; 2]>,
    /// Limit solver impedance.
    pub solimp_limit: Option<[f64; 5]>,
    /// Friction solver reference.
    pub solref_friction: Option<[f64; 2]>,
    /// Friction solver impedance.
    pub solimp_friction: Option<[f64; 5]>,
}

impl JointParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.jtype = self.jtype.or(def.jtype);
        self.axis = self.axis.or(def.axis);
        self.group = self.group.or(def.group);
        self.limited = self.limited.or(def.limited);
        self.range = self.range.or(def.range);
        self.actfrclimited = self.actfrclimited.or(def.actfrclimited);
        self.actfrcrange = self.actfrcrange.or(def.actfrcrange);
        self.stiffness = self.stiffness.or(def.stiffness);
        self.springref = self.springref.or(def.springref);
        self.refpos = self.refpos.or(def.refpos);
        self.damping = self.damping.or(def.damping);
        self.armature = self.armature.or(def.armature);
        self.frictionloss = self.frictionloss.or(def.frictionloss);
        self.margin = self.margin.or(def.margin);
        self.solref_limit = self.solref_limit.or(def.solref_limit);
        self.solimp_limit = self.solimp_limit.or(def.solimp_limit);
        self.solref_friction = self.solref_friction.or(def.solref_friction);
        self.solimp_friction = self.solimp_friction.or(def.solimp_friction);
    }
}

/// A joint connecting a body to its parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Joint {
    /// Joint name; unique among joints when non-empty.
    pub name: String,
    /// Default class; `None` uses the body's childclass chain.
    pub class: Option<String>,
    /// Owning body id.
    pub body: usize,
    /// Frame this joint composes through.
    pub frame: Option<usize>,
    /// Anchor position in the body frame.
    pub pos: Vector3<f64>,
    /// Defaultable parameters.
    pub params: JointParams,
}

/// Defaultable geom parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeomParams {
    /// Primitive type.
    pub gtype: Option<GeomType>,
    /// Type-specific size.
    pub size: Option<Vector3<f64>>,
    /// Collision category bits.
    pub contype: Option<u32>,
    /// Collision mask bits.
    pub conaffinity: Option<u32>,
    /// Contact dimensionality.
    pub condim: Option<i32>,
    /// Visualization / inertia group.
    pub group: Option<i32>,
    /// Contact parameter priority.
    pub priority: Option<i32>,
    /// Material name.
    pub material: Option<String>,
    /// Slide, spin, roll friction.
    pub friction: Option<Vector3<f64>>,
    /// Material density used when no explicit mass is given.
    pub density: Option<f64>,
    /// Explicit mass overriding density.
    pub mass: Option<f64>,
    /// Contact parameter mixing weight.
    pub solmix: Option<f64>,
    /// Contact solver reference.
    pub solref: Option<[f64; 2]>,
    /// Contact solver impedance.
    pub solimp: Option<[f64; 5]>,
    /// Contact activation distance.
    pub margin: Option<f64>,
    /// Inactive buffer inside the margin.
    pub gap: Option<f64>,
    /// Ellipsoid fluid-interaction model enabled.
    pub fluidshape: Option<bool>,
    /// Fluid interaction coefficients (blunt, slender, angular, kutta,
    /// magnus).
    pub fluidcoef: Option<[f64; 5]>,
    /// Display color.
    pub rgba: Option<[f32; 4]>,
}

impl GeomParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.gtype = self.gtype.or(def.gtype);
        self.size = self.size.or(def.size);
        self.contype = self.contype.or(def.contype);
        self.conaffinity = self.conaffinity.or(def.conaffinity);
        self.condim = self.condim.or(def.condim);
        self.group = self.group.or(def.group);
        self.priority = self.priority.or(def.priority);
        if self.material.is_none() {
            self.material.clone_from(&def.material);
        }
        self.friction = self.friction.or(def.friction);
        self.density = self.density.or(def.density);
        self.mass = self.mass.or(def.mass);
        self.solmix = self.solmix.or(def.solmix);
        self.solref = self.solref.or(def.solref);
        self.solimp = self.solimp.or(def.solimp);
        self.margin = self.margin.or(def.margin);
        self.gap = self.gap.or(def.gap);
        self.fluidshape = self.fluidshape.or(def.fluidshape);
        self.fluidcoef = self.fluidcoef.or(def.fluidcoef);
        self.rgba = self.rgba.or(def.rgba);
    }
}

/// A geom attached to a body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geom {
    /// Geom name; unique among geoms when non-empty.
    pub name: String,
    /// Default class.
    pub class: Option<String>,
    /// Owning body id.
    pub body: usize,
    /// Frame this geom composes through.
    pub frame: Option<usize>,
    /// Position in the body frame.
    pub pos: Vector3<f64>,
    /// Orientation in the body frame.
    pub orient: Orientation,
    /// Segment endpoints for capsule/cylinder/box/ellipsoid shorthand;
    /// overrides pos/orientation along the segment.
    pub fromto: Option<[f64; 6]>,
    /// Mesh asset name, for mesh geoms.
    pub mesh: Option<String>,
    /// Height-field asset name, for hfield geoms.
    pub hfield: Option<String>,
    /// Defaultable parameters.
    pub params: GeomParams,
}

/// Defaultable site parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteParams {
    /// Display primitive.
    pub stype: Option<GeomType>,
    /// Display size.
    pub size: Option<Vector3<f64>>,
    /// Visualization group.
    pub group: Option<i32>,
    /// Material name.
    pub material: Option<String>,
    /// Display color.
    pub rgba: Option<[f32; 4]>,
}

impl SiteParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.stype = self.stype.or(def.stype);
        self.size = self.size.or(def.size);
        self.group = self.group.or(def.group);
        if self.material.is_none() {
            self.material.clone_from(&def.material);
        }
        self.rgba = self.rgba.or(def.rgba);
    }
}

/// A site: a massless named frame on a body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    /// Site name; unique among sites when non-empty.
    pub name: String,
    /// Default class.
    pub class: Option<String>,
    /// Owning body id.
    pub body: usize,
    /// Frame this site composes through.
    pub frame: Option<usize>,
    /// Position in the body frame.
    pub pos: Vector3<f64>,
    /// Orientation in the body frame.
    pub orient: Orientation,
    /// Defaultable parameters.
    pub params: SiteParams,
}

/// A camera attached to a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Camera name.
    pub name: String,
    /// Owning body id.
    pub body: usize,
    /// Frame this camera composes through.
    pub frame: Option<usize>,
    /// Position in the body frame.
    pub pos: Vector3<f64>,
    /// Orientation in the body frame.
    pub orient: Orientation,
    /// Vertical field of view in degrees; ignored when intrinsics are set.
    pub fovy: f64,
    /// Body tracked by the camera.
    pub targetbody: Option<String>,
    /// Pixel resolution hint.
    pub resolution: [i32; 2],
    /// Physical sensor size; non-zero switches to the pinhole model.
    pub sensorsize: [f64; 2],
    /// Pinhole focal lengths and principal point.
    pub intrinsic: [f64; 4],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: String::new(),
            body: 0,
            frame: None,
            pos: Vector3::zeros(),
            orient: Orientation::default(),
            fovy: 45.0,
            targetbody: None,
            resolution: [1, 1],
            sensorsize: [0.0, 0.0],
            intrinsic: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// A light attached to a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    /// Light name.
    pub name: String,
    /// Owning body id.
    pub body: usize,
    /// Frame this light composes through.
    pub frame: Option<usize>,
    /// Position in the body frame.
    pub pos: Vector3<f64>,
    /// Direction in the body frame.
    pub dir: Vector3<f64>,
    /// Directional light instead of a spot.
    pub directional: bool,
    /// Shadow casting.
    pub castshadow: bool,
    /// Body tracked by the light.
    pub targetbody: Option<String>,
    /// OpenGL attenuation terms.
    pub attenuation: [f32; 3],
    /// Spot cutoff angle, degrees.
    pub cutoff: f32,
    /// Spot exponent.
    pub exponent: f32,
    /// Ambient color.
    pub ambient: [f32; 3],
    /// Diffuse color.
    pub diffuse: [f32; 3],
    /// Specular color.
    pub specular: [f32; 3],
}

impl Default for Light {
    fn default() -> Self {
        Self {
            name: String::new(),
            body: 0,
            frame: None,
            pos: Vector3::zeros(),
            dir: Vector3::new(0.0, 0.0, -1.0),
            directional: false,
            castshadow: true,
            targetbody: None,
            attenuation: [1.0, 0.0, 0.0],
            cutoff: 45.0,
            exponent: 10.0,
            ambient: [0.0, 0.0, 0.0],
            diffuse: [0.7, 0.7, 0.7],
            specular: [0.3, 0.3, 0.3],
        }
    }
}

/// An intermediate transform between a body and elements declared inside it.
///
/// Frames nest; the chain composes parent-first during compilation and is
/// then dissolved into the element poses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Frame name.
    pub name: String,
    /// Enclosing frame, composing before this one.
    pub parent: Option<usize>,
    /// Offset in the parent frame.
    pub pos: Vector3<f64>,
    /// Orientation in the parent frame.
    pub orient: Orientation,
}
