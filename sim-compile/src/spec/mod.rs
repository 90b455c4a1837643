//! The author-level model specification.
//!
//! [`ModelSpec`] owns every entity in per-kind arenas; ids are insertion
//! indices and stay stable until compilation re-densifies them (discard and
//! fuse passes). Cross-references between kinds are names until the compile
//! pipeline resolves them into packed integer ids.

pub mod actuator;
pub mod asset;
pub mod body;
pub mod constraint;
pub mod custom;
pub mod sensor;
pub mod tendon;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_model::ObjectType;

use crate::defaults::DefaultTable;
use crate::error::CompileError;
use crate::options::CompilerOptions;

use self::actuator::Actuator;
use self::asset::{Flex, HField, Material, Mesh, Skin, Texture};
use self::body::{Body, Camera, Frame, Geom, Joint, Light, Site};
use self::constraint::{Equality, Exclude, Pair};
use self::custom::{Keyframe, Numeric, PluginInstance, Text, Tuple};
use self::sensor::Sensor;
use self::tendon::Tendon;

/// User overrides of the auto-computed model statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatOverride {
    /// Mean mass override.
    pub meanmass: Option<f64>,
    /// Mean inertia override.
    pub meaninertia: Option<f64>,
    /// Mean size override.
    pub meansize: Option<f64>,
    /// Extent override.
    pub extent: Option<f64>,
    /// Center override.
    pub center: Option<Vector3<f64>>,
}

/// Packed-id-to-spec-id mappings recorded by a successful compile, used by
/// the decompiler to write runtime values back into the authoring arenas.
/// Absent when a structural pass (discard, fuse) dropped entities.
#[derive(Debug, Clone)]
pub(crate) struct CompileMaps {
    /// Packed body id to spec arena id.
    pub bodies: Vec<usize>,
    /// Packed joint id to spec arena id.
    pub joints: Vec<usize>,
    /// Packed geom id to spec arena id.
    pub geoms: Vec<usize>,
    /// Packed site id to spec arena id.
    pub sites: Vec<usize>,
    /// Packed camera id to spec arena id.
    pub cameras: Vec<usize>,
    /// Packed light id to spec arena id.
    pub lights: Vec<usize>,
    /// Packed pair slot to spec arena id.
    pub pairs: Vec<usize>,
    /// Packed exclude slot to spec arena id.
    pub excludes: Vec<usize>,
}

/// The mutable model specification: everything the compiler consumes.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Model name, stored first in the packed names buffer.
    pub modelname: String,
    /// Compiler options.
    pub options: CompilerOptions,
    /// Engine option block copied into the packed model.
    pub model_options: sim_model::ModelOptions,
    /// Directory of the file the spec came from; prefixes asset paths.
    pub modelfiledir: String,
    /// Statistics overrides.
    pub stat: StatOverride,
    /// Default-class table.
    pub defaults: DefaultTable,

    /// Bodies; index 0 is the world.
    pub bodies: Vec<Body>,
    /// Joints.
    pub joints: Vec<Joint>,
    /// Geoms.
    pub geoms: Vec<Geom>,
    /// Sites.
    pub sites: Vec<Site>,
    /// Cameras.
    pub cameras: Vec<Camera>,
    /// Lights.
    pub lights: Vec<Light>,
    /// Frames.
    pub frames: Vec<Frame>,

    /// Mesh assets.
    pub meshes: Vec<Mesh>,
    /// Height-field assets.
    pub hfields: Vec<HField>,
    /// Texture assets.
    pub textures: Vec<Texture>,
    /// Materials.
    pub materials: Vec<Material>,
    /// Skins.
    pub skins: Vec<Skin>,
    /// Flexes.
    pub flexes: Vec<Flex>,

    /// Contact pairs.
    pub pairs: Vec<Pair>,
    /// Contact excludes.
    pub excludes: Vec<Exclude>,
    /// Equality constraints.
    pub equalities: Vec<Equality>,
    /// Tendons.
    pub tendons: Vec<Tendon>,
    /// Actuators.
    pub actuators: Vec<Actuator>,
    /// Sensors.
    pub sensors: Vec<Sensor>,

    /// Numeric custom fields.
    pub numerics: Vec<Numeric>,
    /// Text custom fields.
    pub texts: Vec<Text>,
    /// Tuple custom fields.
    pub tuples: Vec<Tuple>,
    /// Keyframes.
    pub keys: Vec<Keyframe>,
    /// Plugin instances.
    pub plugins: Vec<PluginInstance>,

    /// First error of the last failed compile.
    pub(crate) error: Option<CompileError>,
    /// Warnings stored alongside the last successful compile.
    pub(crate) warnings: Vec<CompileError>,
    /// Whether the last compile finished.
    pub(crate) compiled: bool,
    /// Id mappings of the last successful compile, for copy-back.
    pub(crate) compile_maps: Option<CompileMaps>,
    /// Auto-computed statistics of the last successful compile; copy-back
    /// records a statistic as a user override only when it differs.
    pub(crate) stat_auto: Option<sim_model::Statistics>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSpec {
    /// Create an empty spec containing only the world body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modelname: "model".to_string(),
            options: CompilerOptions::default(),
            model_options: sim_model::ModelOptions::default(),
            modelfiledir: String::new(),
            stat: StatOverride::default(),
            defaults: DefaultTable::default(),
            bodies: vec![Body {
                name: "world".to_string(),
                ..Body::default()
            }],
            joints: Vec::new(),
            geoms: Vec::new(),
            sites: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            frames: Vec::new(),
            meshes: Vec::new(),
            hfields: Vec::new(),
            textures: Vec::new(),
            materials: Vec::new(),
            skins: Vec::new(),
            flexes: Vec::new(),
            pairs: Vec::new(),
            excludes: Vec::new(),
            equalities: Vec::new(),
            tendons: Vec::new(),
            actuators: Vec::new(),
            sensors: Vec::new(),
            numerics: Vec::new(),
            texts: Vec::new(),
            tuples: Vec::new(),
            keys: Vec::new(),
            plugins: Vec::new(),
            error: None,
            warnings: Vec::new(),
            compiled: false,
            compile_maps: None,
            stat_auto: None,
        }
    }

    /// The world body.
    #[must_use]
    pub fn world(&self) -> &Body {
        &self.bodies[0]
    }

    /// Add a child body under `parent` and return its id.
    pub fn add_body(&mut self, parent: usize) -> usize {
        let id = self.bodies.len();
        self.bodies.push(Body {
            parent,
            ..Body::default()
        });
        self.bodies[parent].children.push(id);
        id
    }

    /// Add a joint to a body and return its id.
    pub fn add_joint(&mut self, body: usize) -> usize {
        let id = self.joints.len();
        self.joints.push(Joint {
            body,
            ..Joint::default()
        });
        self.bodies[body].joints.push(id);
        id
    }

    /// Add a geom to a body and return its id.
    pub fn add_geom(&mut self, body: usize) -> usize {
        let id = self.geoms.len();
        self.geoms.push(Geom {
            body,
            ..Geom::default()
        });
        self.bodies[body].geoms.push(id);
        id
    }

    /// Add a site to a body and return its id.
    pub fn add_site(&mut self, body: usize) -> usize {
        let id = self.sites.len();
        self.sites.push(Site {
            body,
            ..Site::default()
        });
        self.bodies[body].sites.push(id);
        id
    }

    /// Add a camera to a body and return its id.
    pub fn add_camera(&mut self, body: usize) -> usize {
        let id = self.cameras.len();
        self.cameras.push(Camera {
            body,
            ..Camera::default()
        });
        self.bodies[body].cameras.push(id);
        id
    }

    /// Add a light to a body and return its id.
    pub fn add_light(&mut self, body: usize) -> usize {
        let id = self.lights.len();
        self.lights.push(Light {
            body,
            ..Light::default()
        });
        self.bodies[body].lights.push(id);
        id
    }

    /// Add a frame and return its id.
    pub fn add_frame(&mut self, parent: Option<usize>) -> usize {
        let id = self.frames.len();
        self.frames.push(Frame {
            parent,
            ..Frame::default()
        });
        id
    }

    /// Add a mesh asset and return its id.
    pub fn add_mesh(&mut self) -> usize {
        self.meshes.push(Mesh::default());
        self.meshes.len() - 1
    }

    /// Add a height-field asset and return its id.
    pub fn add_hfield(&mut self) -> usize {
        self.hfields.push(HField::default());
        self.hfields.len() - 1
    }

    /// Add a texture asset and return its id.
    pub fn add_texture(&mut self) -> usize {
        self.textures.push(Texture::default());
        self.textures.len() - 1
    }

    /// Add a material and return its id.
    pub fn add_material(&mut self) -> usize {
        self.materials.push(Material::default());
        self.materials.len() - 1
    }

    /// Add a skin and return its id.
    pub fn add_skin(&mut self) -> usize {
        self.skins.push(Skin::default());
        self.skins.len() - 1
    }

    /// Add a flex and return its id.
    pub fn add_flex(&mut self) -> usize {
        self.flexes.push(Flex::default());
        self.flexes.len() - 1
    }

    /// Add a contact pair and return its id.
    pub fn add_pair(&mut self) -> usize {
        self.pairs.push(Pair::default());
        self.pairs.len() - 1
    }

    /// Add a contact exclude and return its id.
    pub fn add_exclude(&mut self) -> usize {
        self.excludes.push(Exclude::default());
        self.excludes.len() - 1
    }

    /// Add an equality constraint and return its id.
    pub fn add_equality(&mut self) -> usize {
        self.equalities.push(Equality::default());
        self.equalities.len() - 1
    }

    /// Add a tendon and return its id.
    pub fn add_tendon(&mut self) -> usize {
        self.tendons.push(Tendon::default());
        self.tendons.len() - 1
    }

    /// Add an actuator and return its id.
    pub fn add_actuator(&mut self) -> usize {
        self.actuators.push(Actuator::default());
        self.actuators.len() - 1
    }

    /// Add a sensor and return its id.
    pub fn add_sensor(&mut self) -> usize {
        self.sensors.push(Sensor::default());
        self.sensors.len() - 1
    }

    /// Add a numeric custom field and return its id.
    pub fn add_numeric(&mut self) -> usize {
        self.numerics.push(Numeric::default());
        self.numerics.len() - 1
    }

    /// Add a text custom field and return its id.
    pub fn add_text(&mut self) -> usize {
        self.texts.push(Text::default());
        self.texts.len() - 1
    }

    /// Add a tuple custom field and return its id.
    pub fn add_tuple(&mut self) -> usize {
        self.tuples.push(Tuple::default());
        self.tuples.len() - 1
    }

    /// Add a keyframe and return its id.
    pub fn add_key(&mut self) -> usize {
        self.keys.push(Keyframe::default());
        self.keys.len() - 1
    }

    /// Add a plugin instance and return its id.
    pub fn add_plugin(&mut self) -> usize {
        self.plugins.push(PluginInstance::default());
        self.plugins.len() - 1
    }

    /// Pre-compile name lookup: linear scan of the kind's arena. Post-compile
    /// lookups should go through the packed model's hash map instead.
    #[must_use]
    pub fn find_object(&self, kind: ObjectType, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        fn scan<T>(items: &[T], name: &str, get: impl Fn(&T) -> &str) -> Option<usize> {
            items.iter().position(|x| get(x) == name)
        }
        match kind {
            ObjectType::Body | ObjectType::XBody => scan(&self.bodies, name, |b| &b.name),
            ObjectType::Joint => scan(&self.joints, name, |j| &j.name),
            ObjectType::Geom => scan(&self.geoms, name, |g| &g.name),
            ObjectType::Site => scan(&self.sites, name, |s| &s.name),
            ObjectType::Camera => scan(&self.cameras, name, |c| &c.name),
            ObjectType::Light => scan(&self.lights, name, |l| &l.name),
            ObjectType::Flex => scan(&self.flexes, name, |f| &f.name),
            ObjectType::Mesh => scan(&self.meshes, name, |m| &m.name),
            ObjectType::Skin => scan(&self.skins, name, |s| &s.name),
            ObjectType::HField => scan(&self.hfields, name, |h| &h.name),
            ObjectType::Texture => scan(&self.textures, name, |t| &t.name),
            ObjectType::Material => scan(&self.materials, name, |m| &m.name),
            ObjectType::Pair => scan(&self.pairs, name, |p| &p.name),
            ObjectType::Exclude => scan(&self.excludes, name, |e| &e.name),
            ObjectType::Equality => scan(&self.equalities, name, |e| &e.name),
            ObjectType::Tendon => scan(&self.tendons, name, |t| &t.name),
            ObjectType::Actuator => scan(&self.actuators, name, |a| &a.name),
            ObjectType::Sensor => scan(&self.sensors, name, |s| &s.name),
            ObjectType::Numeric => scan(&self.numerics, name, |n| &n.name),
            ObjectType::Text => scan(&self.texts, name, |t| &t.name),
            ObjectType::Tuple => scan(&self.tuples, name, |t| &t.name),
            ObjectType::Key => scan(&self.keys, name, |k| &k.name),
            ObjectType::Plugin => scan(&self.plugins, name, |p| &p.name),
            ObjectType::None | ObjectType::Dof => None,
        }
    }

    /// The first error of the last failed compile.
    #[must_use]
    pub fn last_error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }

    /// Warnings stored by the last successful compile.
    #[must_use]
    pub fn warnings(&self) -> &[CompileError] {
        &self.warnings
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn world_exists_from_construction() {
        let spec = ModelSpec::new();
        assert_eq!(spec.bodies.len(), 1);
        assert_eq!(spec.world().name, "world");
        assert!(spec.world().joints.is_empty());
    }

    #[test]
    fn add_wires_ownership() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let j = spec.add_joint(b);
        let g = spec.add_geom(b);
        assert_eq!(spec.bodies[0].children, vec![b]);
        assert_eq!(spec.bodies[b].joints, vec![j]);
        assert_eq!(spec.bodies[b].geoms, vec![g]);
        assert_eq!(spec.joints[j].body, b);
    }

    #[test]
    fn find_object_scans_by_kind() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        spec.bodies[b].name = "torso".to_string();
        let g = spec.add_geom(b);
        spec.geoms[g].name = "torso".to_string();

        assert_eq!(spec.find_object(ObjectType::Body, "torso"), Some(b));
        assert_eq!(spec.find_object(ObjectType::Geom, "torso"), Some(g));
        assert_eq!(spec.find_object(ObjectType::Site, "torso"), None);
        assert_eq!(spec.find_object(ObjectType::Body, ""), None);
    }
}
