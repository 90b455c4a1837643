//! The packed runtime model.
//!
//! [`Model`] is the fixed-layout output of the compiler: size fields first,
//! then flat per-entity arrays. Variable-length attributes are stored as one
//! contiguous data array plus per-entity `*_adr`/`*_num` pairs. Integer id
//! arrays use `i32` with `-1` as the "none" sentinel, so the layout can be
//! walked without `Option` indirection. The model is immutable by convention
//! once the compiler finalizes it.

use nalgebra::{UnitQuaternion, Vector3};

use crate::enums::{
    BiasType, DynType, EqualityType, GainType, GeomType, JointType, ObjectType, PluginCapability,
    SensorDataType, SensorStage, SensorType, TextureType, TransmissionType, WrapType,
};
use crate::names;

/// Generalized-coordinate widths per joint type, ordered (free, ball, hinge, slide).
pub const NPOS: [usize; 4] = [7, 4, 1, 1];
/// Degree-of-freedom widths per joint type, ordered (free, ball, hinge, slide).
pub const NVEL: [usize; 4] = [6, 3, 1, 1];

/// Engine option block carried by the model.
///
/// Only the fields the compiler reads or writes are represented; the engine
/// owns the full option surface.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Integration timestep in seconds.
    pub timestep: f64,
    /// Gravity vector.
    pub gravity: Vector3<f64>,
    /// Bitmask of disabled engine features.
    pub disableflags: u32,
    /// Bitmask of enabled optional features.
    pub enableflags: u32,
    /// Contact capacity hint; `-1` = engine default.
    pub nconmax: i32,
    /// Constraint-row capacity hint; `-1` = engine default.
    pub njmax: i32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            timestep: 0.002,
            gravity: Vector3::new(0.0, 0.0, -9.81),
            disableflags: 0,
            enableflags: 0,
            nconmax: -1,
            njmax: -1,
        }
    }
}

/// Disable bit: gravity.
pub const DISABLE_GRAVITY: u32 = 1 << 0;
/// Disable bit: contact constraints.
pub const DISABLE_CONTACT: u32 = 1 << 1;
/// Disable bit: friction loss.
pub const DISABLE_FRICTIONLOSS: u32 = 1 << 2;
/// Disable bit: all passive forces.
pub const DISABLE_PASSIVE: u32 = 1 << 3;
/// Disable bit: actuation forces.
pub const DISABLE_ACTUATION: u32 = 1 << 4;

/// Model-level summary statistics, auto-computed during compile.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Mean diagonal inertia of the mass matrix at `qpos0`.
    pub meaninertia: f64,
    /// Mean body mass.
    pub meanmass: f64,
    /// Mean geom size.
    pub meansize: f64,
    /// Spatial extent of the model's geometry.
    pub extent: f64,
    /// Center of the model's bounding box.
    pub center: Vector3<f64>,
}

/// The packed, validated runtime model.
///
/// All arrays are indexed by the entity ids assigned during tree flattening;
/// cross-references are integer ids into sibling arrays.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)] // every field carries an inline layout comment instead
pub struct Model {
    // ------------------------------ sizes ------------------------------
    pub nq: usize,         // generalized position coordinates
    pub nv: usize,         // degrees of freedom
    pub nu: usize,         // actuators
    pub na: usize,         // activation states
    pub nbody: usize,      // bodies (world included)
    pub nbvh: usize,       // total BVH nodes
    pub nbvhstatic: usize, // BVH nodes owned by mesh assets
    pub nbvhdynamic: usize, // BVH nodes owned by bodies
    pub njnt: usize,       // joints
    pub ngeom: usize,      // geoms
    pub nsite: usize,      // sites
    pub ncam: usize,       // cameras
    pub nlight: usize,     // lights
    pub nmesh: usize,      // mesh assets
    pub nmeshvert: usize,  // mesh vertices
    pub nmeshnormal: usize, // mesh normals
    pub nmeshtexcoord: usize, // mesh texture coordinates
    pub nmeshface: usize,  // mesh faces
    pub nmeshgraph: usize, // ints in mesh convex graphs
    pub nskin: usize,      // skin assets
    pub nskinvert: usize,  // skin vertices
    pub nskinface: usize,  // skin faces
    pub nskinbone: usize,  // skin bones
    pub nskinbonevert: usize, // skin bone-vertex weights
    pub nhfield: usize,    // height field assets
    pub nhfielddata: usize, // elevation samples
    pub ntex: usize,       // texture assets
    pub ntexdata: usize,   // texture bytes
    pub nmat: usize,       // materials
    pub nflex: usize,      // flexes
    pub nflexvert: usize,  // flex vertices
    pub nflexedge: usize,  // flex edges
    pub nflexelem: usize,  // flex elements
    pub nflexelemdata: usize, // ints in flex element data
    pub nflexshelldata: usize, // ints in flex shell fragments
    pub nflexevpair: usize, // flex element-vertex pairs
    pub npair: usize,      // contact pairs
    pub nexclude: usize,   // contact excludes
    pub neq: usize,        // equality constraints
    pub ntendon: usize,    // tendons
    pub nwrap: usize,      // tendon path elements
    pub nsensor: usize,    // sensors
    pub nsensordata: usize, // sensor output slots
    pub nnumeric: usize,   // numeric custom fields
    pub nnumericdata: usize, // numeric values
    pub ntext: usize,      // text custom fields
    pub ntextdata: usize,  // text bytes
    pub ntuple: usize,     // tuple custom fields
    pub ntupledata: usize, // tuple entries
    pub nkey: usize,       // keyframes
    pub nmocap: usize,     // mocap bodies
    pub nplugin: usize,    // plugin instances
    pub npluginattr: usize, // plugin attribute bytes
    pub npluginstate: usize, // plugin state slots
    pub nnames: usize,     // bytes in the names buffer
    pub nnames_map: usize, // slots in the names hash map
    pub npaths: usize,     // bytes in the paths buffer
    pub nm: usize,         // non-zeros in the lower-triangular mass matrix
    pub nd: usize,         // non-zeros in the full dof-dof matrix: 2*nm - nv
    pub nb: usize,         // non-zeros in the body-dof jacobian sparsity
    pub ntree: usize,      // kinematic trees
    pub narena: usize,     // bytes reserved for per-step allocations

    // ------------------------------ options & stats ------------------------------
    pub opt: ModelOptions,  // engine options
    pub stat: Statistics,   // auto-computed summary statistics

    // ------------------------------ default state ------------------------------
    pub qpos0: Vec<f64>,       // reference configuration         (nq)
    pub qpos_spring: Vec<f64>, // spring reference configuration  (nq)

    // ------------------------------ bodies ------------------------------
    pub body_parentid: Vec<i32>,    // parent body id
    pub body_rootid: Vec<i32>,      // id of the root above this body
    pub body_weldid: Vec<i32>,      // id of the body this one welds to
    pub body_mocapid: Vec<i32>,     // mocap slot or -1
    pub body_jntnum: Vec<i32>,      // joints owned
    pub body_jntadr: Vec<i32>,      // first joint id or -1
    pub body_dofnum: Vec<i32>,      // dofs owned
    pub body_dofadr: Vec<i32>,      // first dof address or -1
    pub body_treeid: Vec<i32>,      // kinematic tree id or -1 for static
    pub body_geomnum: Vec<i32>,     // geoms owned
    pub body_geomadr: Vec<i32>,     // first geom id or -1
    pub body_simple: Vec<i32>,      // simplicity class 0/1/2
    pub body_sameframe: Vec<i32>,   // 1 if inertial frame equals body frame
    pub body_pos: Vec<Vector3<f64>>,          // frame offset from parent
    pub body_quat: Vec<UnitQuaternion<f64>>,  // frame orientation in parent
    pub body_ipos: Vec<Vector3<f64>>,         // inertial frame offset
    pub body_iquat: Vec<UnitQuaternion<f64>>, // inertial frame orientation
    pub body_mass: Vec<f64>,        // mass
    pub body_subtreemass: Vec<f64>, // mass of subtree rooted here
    pub body_inertia: Vec<Vector3<f64>>, // principal diagonal inertia
    pub body_bvhadr: Vec<i32>,      // first BVH node or -1
    pub body_bvhnum: Vec<i32>,      // BVH node count

    // ------------------------------ joints ------------------------------
    pub jnt_type: Vec<JointType>,  // joint type
    pub jnt_qposadr: Vec<i32>,     // first position coordinate
    pub jnt_dofadr: Vec<i32>,      // first dof
    pub jnt_bodyid: Vec<i32>,      // owning body
    pub jnt_limited: Vec<bool>,    // position limits active
    pub jnt_actfrclimited: Vec<bool>, // actuator-force limits active
    pub jnt_pos: Vec<Vector3<f64>>,   // anchor in body frame
    pub jnt_axis: Vec<Vector3<f64>>,  // axis in body frame
    pub jnt_stiffness: Vec<f64>,   // spring stiffness
    pub jnt_range: Vec<(f64, f64)>,        // position limits
    pub jnt_actfrcrange: Vec<(f64, f64)>,  // total actuator-force limits
    pub jnt_margin: Vec<f64>,      // limit activation distance
    pub jnt_ref: Vec<f64>,         // reference position at qpos0
    pub jnt_springref: Vec<f64>,   // spring equilibrium position
    pub jnt_solref: Vec<[f64; 2]>, // limit solver reference
    pub jnt_solimp: Vec<[f64; 5]>, // limit solver impedance

    // ------------------------------ dofs ------------------------------
    pub dof_bodyid: Vec<i32>,      // owning body
    pub dof_jntid: Vec<i32>,       // owning joint
    pub dof_parentid: Vec<i32>,    // parent dof or -1
    pub dof_treeid: Vec<i32>,      // kinematic tree id
    pub dof_madr: Vec<i32>,        // address in the sparse mass matrix
    pub dof_simplenum: Vec<i32>,   // consecutive simple dofs from here
    pub dof_armature: Vec<f64>,    // reflected rotor inertia
    pub dof_damping: Vec<f64>,     // damping coefficient
    pub dof_frictionloss: Vec<f64>, // dry friction
    pub dof_solref: Vec<[f64; 2]>, // friction solver reference
    pub dof_solimp: Vec<[f64; 5]>, // friction solver impedance

    // ------------------------------ geoms ------------------------------
    pub geom_type: Vec<GeomType>,  // primitive type
    pub geom_contype: Vec<u32>,    // collision category bits
    pub geom_conaffinity: Vec<u32>, // collision mask bits
    pub geom_condim: Vec<i32>,     // contact dimensionality
    pub geom_bodyid: Vec<i32>,     // owning body
    pub geom_dataid: Vec<i32>,     // mesh/hfield asset id or -1
    pub geom_matid: Vec<i32>,      // material id or -1
    pub geom_group: Vec<i32>,      // visualization / inertia group
    pub geom_priority: Vec<i32>,   // contact parameter priority
    pub geom_size: Vec<Vector3<f64>>,        // type-specific size
    pub geom_aabb: Vec<[f64; 6]>,  // local AABB (center, half-size)
    pub geom_rbound: Vec<f64>,     // bounding sphere radius, 0 = unbounded
    pub geom_pos: Vec<Vector3<f64>>,         // offset in body frame
    pub geom_quat: Vec<UnitQuaternion<f64>>, // orientation in body frame
    pub geom_friction: Vec<Vector3<f64>>,    // slide, spin, roll friction
    pub geom_solmix: Vec<f64>,     // contact parameter mixing weight
    pub geom_solref: Vec<[f64; 2]>, // contact solver reference
    pub geom_solimp: Vec<[f64; 5]>, // contact solver impedance
    pub geom_margin: Vec<f64>,     // contact activation distance
    pub geom_gap: Vec<f64>,        // inactive buffer inside the margin
    pub geom_fluid: Vec<[f64; 12]>, // ellipsoid fluid-interaction coefficients
    pub geom_rgba: Vec<[f32; 4]>,  // display color

    // ------------------------------ sites ------------------------------
    pub site_type: Vec<GeomType>,  // display primitive
    pub site_bodyid: Vec<i32>,     // owning body
    pub site_matid: Vec<i32>,      // material id or -1
    pub site_group: Vec<i32>,      // visualization group
    pub site_size: Vec<Vector3<f64>>,        // display size
    pub site_pos: Vec<Vector3<f64>>,         // offset in body frame
    pub site_quat: Vec<UnitQuaternion<f64>>, // orientation in body frame
    pub site_rgba: Vec<[f32; 4]>,  // display color

    // ------------------------------ cameras ------------------------------
    pub cam_bodyid: Vec<i32>,      // owning body
    pub cam_targetbodyid: Vec<i32>, // tracked body or -1
    pub cam_pos: Vec<Vector3<f64>>,          // offset in body frame
    pub cam_quat: Vec<UnitQuaternion<f64>>,  // orientation in body frame
    pub cam_fovy: Vec<f64>,        // vertical field of view, degrees
    pub cam_resolution: Vec<[i32; 2]>, // pixel resolution hint
    pub cam_sensorsize: Vec<[f64; 2]>, // physical sensor size, 0 = use fovy
    pub cam_intrinsic: Vec<[f64; 4]>,  // pinhole focal lengths and center

    // ------------------------------ lights ------------------------------
    pub light_bodyid: Vec<i32>,    // owning body
    pub light_targetbodyid: Vec<i32>, // tracked body or -1
    pub light_directional: Vec<bool>, // directional instead of spot
    pub light_castshadow: Vec<bool>,  // shadow casting
    pub light_pos: Vec<Vector3<f64>>, // offset in body frame
    pub light_dir: Vec<Vector3<f64>>, // direction in body frame
    pub light_attenuation: Vec<[f32; 3]>, // OpenGL attenuation terms
    pub light_cutoff: Vec<f32>,    // spot cutoff angle
    pub light_exponent: Vec<f32>,  // spot exponent
    pub light_ambient: Vec<[f32; 3]>,  // ambient color
    pub light_diffuse: Vec<[f32; 3]>,  // diffuse color
    pub light_specular: Vec<[f32; 3]>, // specular color

    // ------------------------------ meshes ------------------------------
    pub mesh_vertadr: Vec<i32>,    // first vertex
    pub mesh_vertnum: Vec<i32>,    // vertex count
    pub mesh_normaladr: Vec<i32>,  // first normal
    pub mesh_normalnum: Vec<i32>,  // normal count
    pub mesh_texcoordadr: Vec<i32>, // first texcoord or -1
    pub mesh_texcoordnum: Vec<i32>, // texcoord count
    pub mesh_faceadr: Vec<i32>,    // first face
    pub mesh_facenum: Vec<i32>,    // face count
    pub mesh_graphadr: Vec<i32>,   // convex graph address or -1
    pub mesh_bvhadr: Vec<i32>,     // first BVH node
    pub mesh_bvhnum: Vec<i32>,     // BVH node count
    pub mesh_pos: Vec<Vector3<f64>>,         // re-centering translation
    pub mesh_quat: Vec<UnitQuaternion<f64>>, // re-orientation rotation
    pub mesh_vert: Vec<f64>,       // vertex coordinates      (3 * nmeshvert)
    pub mesh_normal: Vec<f64>,     // normal directions       (3 * nmeshnormal)
    pub mesh_texcoord: Vec<f64>,   // texture coordinates     (2 * nmeshtexcoord)
    pub mesh_face: Vec<i32>,       // vertex indices per face (3 * nmeshface)
    pub mesh_facenormal: Vec<i32>, // normal indices per face (3 * nmeshface)
    pub mesh_graph: Vec<i32>,      // convex graph data

    // ------------------------------ skins ------------------------------
    pub skin_matid: Vec<i32>,      // material id or -1
    pub skin_group: Vec<i32>,      // visualization group
    pub skin_rgba: Vec<[f32; 4]>,  // display color
    pub skin_inflate: Vec<f64>,    // face offset along normals
    pub skin_vertadr: Vec<i32>,    // first vertex
    pub skin_vertnum: Vec<i32>,    // vertex count
    pub skin_texcoordadr: Vec<i32>, // first texcoord or -1
    pub skin_faceadr: Vec<i32>,    // first face
    pub skin_facenum: Vec<i32>,    // face count
    pub skin_boneadr: Vec<i32>,    // first bone
    pub skin_bonenum: Vec<i32>,    // bone count
    pub skin_vert: Vec<f64>,       // bind-pose vertices   (3 * nskinvert)
    pub skin_texcoord: Vec<f64>,   // texture coordinates  (2 * nskinvert)
    pub skin_face: Vec<i32>,       // faces                (3 * nskinface)
    pub skin_bonevertadr: Vec<i32>, // first bone-vertex weight
    pub skin_bonevertnum: Vec<i32>, // bone-vertex weight count
    pub skin_bonebindpos: Vec<Vector3<f64>>,         // bone bind position
    pub skin_bonebindquat: Vec<UnitQuaternion<f64>>, // bone bind orientation
    pub skin_bonebodyid: Vec<i32>,  // body driving the bone
    pub skin_bonevertid: Vec<i32>,  // vertex index per weight
    pub skin_bonevertweight: Vec<f64>, // weight per vertex

    // ------------------------------ flexes ------------------------------
    pub flex_dim: Vec<i32>,        // 1=cable, 2=shell, 3=solid
    pub flex_matid: Vec<i32>,      // material id or -1
    pub flex_group: Vec<i32>,      // visualization group
    pub flex_vertadr: Vec<i32>,    // first vertex
    pub flex_vertnum: Vec<i32>,    // vertex count
    pub flex_edgeadr: Vec<i32>,    // first edge
    pub flex_edgenum: Vec<i32>,    // edge count
    pub flex_elemadr: Vec<i32>,    // first element
    pub flex_elemnum: Vec<i32>,    // element count
    pub flex_elemdataadr: Vec<i32>, // first int of element data
    pub flex_shelldataadr: Vec<i32>, // first int of shell data or -1
    pub flex_shellnum: Vec<i32>,   // shell fragment count
    pub flex_evpairadr: Vec<i32>,  // first element-vertex pair
    pub flex_evpairnum: Vec<i32>,  // element-vertex pair count
    pub flex_bvhadr: Vec<i32>,     // first BVH node or -1
    pub flex_bvhnum: Vec<i32>,     // BVH node count
    pub flex_radius: Vec<f64>,     // collision radius around primitives
    pub flex_rgba: Vec<[f32; 4]>,  // display color
    pub flex_vert: Vec<f64>,       // vertex positions      (3 * nflexvert)
    pub flex_vertbodyid: Vec<i32>, // body carrying each vertex
    pub flex_edge: Vec<[i32; 2]>,  // vertex pairs per edge
    pub flex_elem: Vec<i32>,       // element vertex ids (dim+1 each)
    pub flex_shell: Vec<i32>,      // boundary fragment vertex ids
    pub flex_evpair: Vec<[i32; 2]>, // element-vertex collision pairs
    pub flex_texcoord: Vec<f64>,   // texture coordinates (2 * nflexvert), empty if none

    // ------------------------------ height fields ------------------------------
    pub hfield_size: Vec<[f64; 4]>, // x, y, z_top, z_bottom half-sizes
    pub hfield_nrow: Vec<i32>,     // grid rows
    pub hfield_ncol: Vec<i32>,     // grid columns
    pub hfield_adr: Vec<i32>,      // first elevation sample
    pub hfield_data: Vec<f64>,     // normalized elevations in [0, 1]

    // ------------------------------ textures ------------------------------
    pub tex_type: Vec<TextureType>, // texture kind
    pub tex_height: Vec<i32>,      // bitmap rows (6 * width for cubes)
    pub tex_width: Vec<i32>,       // bitmap columns
    pub tex_adr: Vec<i32>,         // first byte
    pub tex_rgb: Vec<u8>,          // packed RGB bytes

    // ------------------------------ materials ------------------------------
    pub mat_texid: Vec<i32>,       // texture id or -1
    pub mat_texuniform: Vec<bool>, // uniform texture scaling
    pub mat_texrepeat: Vec<[f64; 2]>, // 2D texture repeat
    pub mat_emission: Vec<f64>,    // emission strength
    pub mat_specular: Vec<f64>,    // specular strength
    pub mat_shininess: Vec<f64>,   // specular exponent scale
    pub mat_reflectance: Vec<f64>, // reflectance strength
    pub mat_rgba: Vec<[f32; 4]>,   // base color

    // ------------------------------ contact overrides ------------------------------
    pub pair_dim: Vec<i32>,        // override contact dimensionality
    pub pair_geom1: Vec<i32>,      // first geom
    pub pair_geom2: Vec<i32>,      // second geom
    pub pair_signature: Vec<u32>,  // (body1 << 16) | body2, body1 <= body2
    pub pair_solref: Vec<[f64; 2]>, // normal solver reference
    pub pair_solreffriction: Vec<[f64; 2]>, // friction solver reference
    pub pair_solimp: Vec<[f64; 5]>, // solver impedance
    pub pair_margin: Vec<f64>,     // activation distance
    pub pair_gap: Vec<f64>,        // inactive buffer
    pub pair_friction: Vec<[f64; 5]>, // 5-dof friction coefficients
    pub exclude_signature: Vec<u32>, // (body1 << 16) | body2, body1 <= body2

    // ------------------------------ equality constraints ------------------------------
    pub eq_type: Vec<EqualityType>, // constraint kind
    pub eq_obj1id: Vec<i32>,       // first operand id
    pub eq_obj2id: Vec<i32>,       // second operand id or -1
    pub eq_objtype: Vec<ObjectType>, // operand kind
    pub eq_active0: Vec<bool>,     // initially active
    pub eq_solref: Vec<[f64; 2]>,  // solver reference
    pub eq_solimp: Vec<[f64; 5]>,  // solver impedance
    pub eq_data: Vec<[f64; 11]>,   // kind-specific parameters

    // ------------------------------ tendons ------------------------------
    pub tendon_adr: Vec<i32>,      // first path element
    pub tendon_num: Vec<i32>,      // path element count
    pub tendon_matid: Vec<i32>,    // material id or -1
    pub tendon_group: Vec<i32>,    // visualization group
    pub tendon_limited: Vec<bool>, // length limits active
    pub tendon_width: Vec<f64>,    // display width
    pub tendon_solref_lim: Vec<[f64; 2]>, // limit solver reference
    pub tendon_solimp_lim: Vec<[f64; 5]>, // limit solver impedance
    pub tendon_solref_fri: Vec<[f64; 2]>, // friction solver reference
    pub tendon_solimp_fri: Vec<[f64; 5]>, // friction solver impedance
    pub tendon_range: Vec<(f64, f64)>,    // length limits
    pub tendon_margin: Vec<f64>,   // limit activation distance
    pub tendon_stiffness: Vec<f64>, // spring stiffness
    pub tendon_damping: Vec<f64>,  // damping coefficient
    pub tendon_frictionloss: Vec<f64>, // dry friction
    pub tendon_lengthspring: Vec<[f64; 2]>, // spring rest-length band
    pub tendon_length0: Vec<f64>,  // length at qpos0
    pub tendon_rgba: Vec<[f32; 4]>, // display color
    pub wrap_type: Vec<WrapType>,  // path element kind
    pub wrap_objid: Vec<i32>,      // referenced object id or -1
    pub wrap_prm: Vec<f64>,        // joint coefficient or pulley divisor

    // ------------------------------ actuators ------------------------------
    pub actuator_trntype: Vec<TransmissionType>, // transmission kind
    pub actuator_dyntype: Vec<DynType>,          // activation dynamics
    pub actuator_gaintype: Vec<GainType>,        // force gain model
    pub actuator_biastype: Vec<BiasType>,        // bias force model
    pub actuator_trnid: Vec<[i32; 2]>, // transmission targets
    pub actuator_actadr: Vec<i32>,     // first activation slot or -1
    pub actuator_actnum: Vec<i32>,     // activation slot count
    pub actuator_ctrllimited: Vec<bool>, // control clamping active
    pub actuator_forcelimited: Vec<bool>, // force clamping active
    pub actuator_actlimited: Vec<bool>,   // activation clamping active
    pub actuator_dynprm: Vec<[f64; 3]>,   // dynamics parameters
    pub actuator_gainprm: Vec<[f64; 9]>,  // gain parameters
    pub actuator_biasprm: Vec<[f64; 9]>,  // bias parameters
    pub actuator_ctrlrange: Vec<(f64, f64)>,  // control limits
    pub actuator_forcerange: Vec<(f64, f64)>, // force limits
    pub actuator_actrange: Vec<(f64, f64)>,   // activation limits
    pub actuator_gear: Vec<[f64; 6]>,  // transmission scaling
    pub actuator_cranklength: Vec<f64>, // slider-crank rod length
    pub actuator_lengthrange: Vec<(f64, f64)>, // feasible transmission lengths
    pub actuator_plugin: Vec<i32>,     // plugin instance or -1

    // ------------------------------ sensors ------------------------------
    pub sensor_type: Vec<SensorType>,         // sensor kind
    pub sensor_datatype: Vec<SensorDataType>, // output value class
    pub sensor_needstage: Vec<SensorStage>,   // earliest valid pipeline stage
    pub sensor_objtype: Vec<ObjectType>,      // attached object kind
    pub sensor_objid: Vec<i32>,               // attached object id
    pub sensor_reftype: Vec<ObjectType>,      // reference object kind
    pub sensor_refid: Vec<i32>,               // reference object id or -1
    pub sensor_dim: Vec<i32>,                 // output width
    pub sensor_adr: Vec<i32>,                 // first output slot
    pub sensor_cutoff: Vec<f64>,              // clamping cutoff, 0 = none
    pub sensor_noise: Vec<f64>,               // noise standard deviation
    pub sensor_plugin: Vec<i32>,              // plugin instance or -1

    // ------------------------------ plugins ------------------------------
    pub plugin_capability: Vec<PluginCapability>, // declared capability
    pub plugin_stateadr: Vec<i32>, // first plugin state slot
    pub plugin_statenum: Vec<i32>, // plugin state slot count
    pub plugin_attradr: Vec<i32>,  // first attribute byte
    pub plugin_attr: Vec<u8>,      // packed "key=value" NUL-separated attributes

    // ------------------------------ custom fields ------------------------------
    pub numeric_adr: Vec<i32>,     // first value
    pub numeric_size: Vec<i32>,    // value count
    pub numeric_data: Vec<f64>,    // packed values
    pub text_adr: Vec<i32>,        // first byte
    pub text_size: Vec<i32>,       // byte count including NUL
    pub text_data: Vec<u8>,        // packed NUL-terminated strings
    pub tuple_adr: Vec<i32>,       // first entry
    pub tuple_size: Vec<i32>,      // entry count
    pub tuple_objtype: Vec<ObjectType>, // entry object kind
    pub tuple_objid: Vec<i32>,     // entry object id
    pub tuple_objprm: Vec<f64>,    // entry parameter

    // ------------------------------ keyframes ------------------------------
    pub key_time: Vec<f64>,        // time                    (nkey)
    pub key_qpos: Vec<f64>,        // positions               (nkey * nq)
    pub key_qvel: Vec<f64>,        // velocities              (nkey * nv)
    pub key_act: Vec<f64>,         // activations             (nkey * na)
    pub key_ctrl: Vec<f64>,        // controls                (nkey * nu)
    pub key_mpos: Vec<f64>,        // mocap positions         (nkey * 3 * nmocap)
    pub key_mquat: Vec<f64>,       // mocap orientations      (nkey * 4 * nmocap)

    // ------------------------------ BVH nodes ------------------------------
    pub bvh_depth: Vec<i32>,       // node depth from its root
    pub bvh_child: Vec<[i32; 2]>,  // children or -1 for leaves
    pub bvh_nodeid: Vec<i32>,      // source entity id at leaves, -1 inside
    pub bvh_aabb: Vec<[f64; 6]>,   // node AABB (center, half-size)

    // ------------------------------ names & paths ------------------------------
    pub names: Vec<u8>,            // model name + entity names, NUL-separated
    pub names_map: Vec<i32>,       // open-addressed name lookup, -1 empty
    pub name_bodyadr: Vec<i32>,    // body name addresses
    pub name_jntadr: Vec<i32>,     // joint name addresses
    pub name_geomadr: Vec<i32>,    // geom name addresses
    pub name_siteadr: Vec<i32>,    // site name addresses
    pub name_camadr: Vec<i32>,     // camera name addresses
    pub name_lightadr: Vec<i32>,   // light name addresses
    pub name_flexadr: Vec<i32>,    // flex name addresses
    pub name_meshadr: Vec<i32>,    // mesh name addresses
    pub name_skinadr: Vec<i32>,    // skin name addresses
    pub name_hfieldadr: Vec<i32>,  // hfield name addresses
    pub name_texadr: Vec<i32>,     // texture name addresses
    pub name_matadr: Vec<i32>,     // material name addresses
    pub name_pairadr: Vec<i32>,    // pair name addresses
    pub name_excludeadr: Vec<i32>, // exclude name addresses
    pub name_eqadr: Vec<i32>,      // equality name addresses
    pub name_tendonadr: Vec<i32>,  // tendon name addresses
    pub name_actuatoradr: Vec<i32>, // actuator name addresses
    pub name_sensoradr: Vec<i32>,  // sensor name addresses
    pub name_numericadr: Vec<i32>, // numeric name addresses
    pub name_textadr: Vec<i32>,    // text name addresses
    pub name_tupleadr: Vec<i32>,   // tuple name addresses
    pub name_keyadr: Vec<i32>,     // keyframe name addresses
    pub name_pluginadr: Vec<i32>,  // plugin instance name addresses
    pub paths: Vec<u8>,            // asset file origins, NUL-separated
    pub mesh_pathadr: Vec<i32>,    // mesh path addresses or -1
    pub skin_pathadr: Vec<i32>,    // skin path addresses or -1
    pub hfield_pathadr: Vec<i32>,  // hfield path addresses or -1
    pub tex_pathadr: Vec<i32>,     // texture path addresses or -1
}

/// Order of name-map segments inside `names_map`. Lookup and packing must
/// agree on this sequence.
const MAP_KINDS: [ObjectType; 24] = [
    ObjectType::Body,
    ObjectType::Joint,
    ObjectType::Geom,
    ObjectType::Site,
    ObjectType::Camera,
    ObjectType::Light,
    ObjectType::Flex,
    ObjectType::Mesh,
    ObjectType::Skin,
    ObjectType::HField,
    ObjectType::Texture,
    ObjectType::Material,
    ObjectType::Pair,
    ObjectType::Exclude,
    ObjectType::Equality,
    ObjectType::Tendon,
    ObjectType::Actuator,
    ObjectType::Sensor,
    ObjectType::Numeric,
    ObjectType::Text,
    ObjectType::Tuple,
    ObjectType::Key,
    ObjectType::Plugin,
    ObjectType::None,
];

impl Model {
    /// Entity count for a kind.
    #[must_use]
    pub fn count(&self, kind: ObjectType) -> usize {
        match kind {
            ObjectType::Body | ObjectType::XBody => self.nbody,
            ObjectType::Joint => self.njnt,
            ObjectType::Dof => self.nv,
            ObjectType::Geom => self.ngeom,
            ObjectType::Site => self.nsite,
            ObjectType::Camera => self.ncam,
            ObjectType::Light => self.nlight,
            ObjectType::Flex => self.nflex,
            ObjectType::Mesh => self.nmesh,
            ObjectType::Skin => self.nskin,
            ObjectType::HField => self.nhfield,
            ObjectType::Texture => self.ntex,
            ObjectType::Material => self.nmat,
            ObjectType::Pair => self.npair,
            ObjectType::Exclude => self.nexclude,
            ObjectType::Equality => self.neq,
            ObjectType::Tendon => self.ntendon,
            ObjectType::Actuator => self.nu,
            ObjectType::Sensor => self.nsensor,
            ObjectType::Numeric => self.nnumeric,
            ObjectType::Text => self.ntext,
            ObjectType::Tuple => self.ntuple,
            ObjectType::Key => self.nkey,
            ObjectType::Plugin => self.nplugin,
            ObjectType::None => 0,
        }
    }

    /// Per-kind name address array, if the kind has one.
    #[must_use]
    pub fn name_adr(&self, kind: ObjectType) -> Option<&[i32]> {
        match kind {
            ObjectType::Body => Some(&self.name_bodyadr),
            ObjectType::Joint => Some(&self.name_jntadr),
            ObjectType::Geom => Some(&self.name_geomadr),
            ObjectType::Site => Some(&self.name_siteadr),
            ObjectType::Camera => Some(&self.name_camadr),
            ObjectType::Light => Some(&self.name_lightadr),
            ObjectType::Flex => Some(&self.name_flexadr),
            ObjectType::Mesh => Some(&self.name_meshadr),
            ObjectType::Skin => Some(&self.name_skinadr),
            ObjectType::HField => Some(&self.name_hfieldadr),
            ObjectType::Texture => Some(&self.name_texadr),
            ObjectType::Material => Some(&self.name_matadr),
            ObjectType::Pair => Some(&self.name_pairadr),
            ObjectType::Exclude => Some(&self.name_excludeadr),
            ObjectType::Equality => Some(&self.name_eqadr),
            ObjectType::Tendon => Some(&self.name_tendonadr),
            ObjectType::Actuator => Some(&self.name_actuatoradr),
            ObjectType::Sensor => Some(&self.name_sensoradr),
            ObjectType::Numeric => Some(&self.name_numericadr),
            ObjectType::Text => Some(&self.name_textadr),
            ObjectType::Tuple => Some(&self.name_tupleadr),
            ObjectType::Key => Some(&self.name_keyadr),
            ObjectType::Plugin => Some(&self.name_pluginadr),
            _ => None,
        }
    }

    /// Byte offset of a kind's segment inside `names_map`.
    fn map_segment(&self, kind: ObjectType) -> Option<(usize, usize)> {
        let mut offset = 0;
        for k in MAP_KINDS {
            if k == ObjectType::None {
                break;
            }
            let len = names::LOAD_MULTIPLE * self.count(k);
            if k == kind {
                return Some((offset, len));
            }
            offset += len;
        }
        None
    }

    /// Resolve a name to an entity id using the packed hash map.
    #[must_use]
    pub fn name2id(&self, kind: ObjectType, name: &str) -> Option<usize> {
        let (offset, len) = self.map_segment(kind)?;
        let adr = self.name_adr(kind)?;
        names::lookup(&self.names, adr, &self.names_map[offset..offset + len], name)
    }

    /// Read an entity's name from the packed buffer. Empty for unnamed.
    #[must_use]
    pub fn id2name(&self, kind: ObjectType, id: usize) -> &str {
        match self.name_adr(kind) {
            Some(adr) if id < adr.len() => names::read_str(&self.names, adr[id]),
            _ => "",
        }
    }

    /// The model's own name (first entry of the names buffer).
    #[must_use]
    pub fn model_name(&self) -> &str {
        names::read_str(&self.names, 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_lookup_misses() {
        let m = Model::default();
        assert_eq!(m.name2id(ObjectType::Body, "anything"), None);
        assert_eq!(m.id2name(ObjectType::Geom, 3), "");
    }

    #[test]
    fn npos_nvel_tables() {
        assert_eq!(NPOS.iter().sum::<usize>(), 13);
        assert_eq!(NVEL.iter().sum::<usize>(), 11);
        for (i, t) in [
            JointType::Free,
            JointType::Ball,
            JointType::Hinge,
            JointType::Slide,
        ]
        .into_iter()
        .enumerate()
        {
            assert_eq!(NPOS[i], t.nq());
            assert_eq!(NVEL[i], t.nv());
        }
    }
}
