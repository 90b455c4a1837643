//! Asset entities: meshes, height fields, textures, materials, skins, flexes.
//!
//! Assets may be file-backed or carry in-memory data. The asset compiler
//! (`crate::assets`) validates and canonicalizes them; the structs here keep
//! both the author-level input and the compiled output so a recompile can
//! start over from the original data.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use sim_model::TextureType;

use crate::orientation::Orientation;

/// A triangle mesh asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    /// Mesh name; empty names are filled from the file stem.
    pub name: String,
    /// Default class (provides `scale`).
    pub class: Option<String>,
    /// Backing file, resolved against `meshdir`.
    pub file: Option<String>,
    /// Per-axis scale applied to vertices at load.
    pub scale: Option<Vector3<f64>>,
    /// Author-supplied vertices, `3 * nvert`.
    pub uservert: Vec<f64>,
    /// Author-supplied normals, `3 * nnormal`.
    pub usernormal: Vec<f64>,
    /// Author-supplied texture coordinates, `2 * ntexcoord`.
    pub usertexcoord: Vec<f64>,
    /// Author-supplied faces, `3 * nface` vertex indices.
    pub userface: Vec<i32>,

    // -- compiled output --
    /// Canonical vertices after scaling and re-centering.
    pub vert: Vec<f64>,
    /// Canonical normals (synthesized when absent).
    pub normal: Vec<f64>,
    /// Canonical texture coordinates (possibly empty).
    pub texcoord: Vec<f64>,
    /// Canonical faces.
    pub face: Vec<i32>,
    /// Normal index per face corner.
    pub facenormal: Vec<i32>,
    /// Re-centering translation removed from the vertices.
    pub refpos: Vector3<f64>,
    /// Re-orientation removed from the vertices.
    pub refquat: UnitQuaternion<f64>,
    /// Signed volume.
    pub volume: f64,
    /// Center of mass in canonical coordinates.
    pub com: Vector3<f64>,
    /// Unit-density inertia about the COM, principal diagonal.
    pub inertia: Vector3<f64>,
    /// Principal-axis rotation of the inertia.
    pub inertia_quat: UnitQuaternion<f64>,
    /// Axis-aligned bounds (center, half-size).
    pub aabb: [f64; 6],
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: None,
            file: None,
            scale: None,
            uservert: Vec::new(),
            usernormal: Vec::new(),
            usertexcoord: Vec::new(),
            userface: Vec::new(),
            vert: Vec::new(),
            normal: Vec::new(),
            texcoord: Vec::new(),
            face: Vec::new(),
            facenormal: Vec::new(),
            refpos: Vector3::zeros(),
            refquat: UnitQuaternion::identity(),
            volume: 0.0,
            com: Vector3::zeros(),
            inertia: Vector3::zeros(),
            inertia_quat: UnitQuaternion::identity(),
            aabb: [0.0; 6],
        }
    }
}

/// A height-field asset: a row-major elevation grid normalized to `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HField {
    /// Height-field name; empty names are filled from the file stem.
    pub name: String,
    /// Backing file, resolved against `texturedir`.
    pub file: Option<String>,
    /// Half-sizes `[x, y, z_top, z_bottom]`.
    pub size: [f64; 4],
    /// Grid rows when data is given inline.
    pub nrow: usize,
    /// Grid columns when data is given inline.
    pub ncol: usize,
    /// Author-supplied elevation data, row-major, row 0 at the bottom.
    pub userdata: Vec<f64>,
    /// Compiled elevations, normalized to `[0, 1]`.
    pub data: Vec<f64>,
}

impl Default for HField {
    fn default() -> Self {
        Self {
            name: String::new(),
            file: None,
            size: [1.0, 1.0, 1.0, 0.1],
            nrow: 0,
            ncol: 0,
            userdata: Vec::new(),
            data: Vec::new(),
        }
    }
}

/// A texture asset: 2D bitmap or 6-face cube.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Texture {
    /// Texture name; may stay empty for skyboxes.
    pub name: String,
    /// Texture kind.
    pub ttype: TextureType,
    /// Single backing file (2D, or a cube packed on a grid).
    pub file: Option<String>,
    /// Per-face cube files, order right/left/up/down/front/back.
    pub cubefiles: [Option<String>; 6],
    /// Grid shape `(rows, cols)` of a packed cube file.
    pub gridsize: (usize, usize),
    /// Grid cell symbols from `.RLUDFB`, row-major; `.` skips a cell.
    pub gridlayout: String,
    /// Fill color for faces without a file, and for procedural flat fill.
    pub rgb1: [f64; 3],
    /// Width used when no file is given.
    pub width: usize,
    /// Height used when no file is given.
    pub height: usize,
    /// Compiled RGB bytes, `3 * width * height` (height spans 6 squares for
    /// cubes).
    pub data: Vec<u8>,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            name: String::new(),
            ttype: TextureType::TwoD,
            file: None,
            cubefiles: [None, None, None, None, None, None],
            gridsize: (1, 1),
            gridlayout: String::new(),
            rgb1: [0.8, 0.8, 0.8],
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }
}

/// A material referencing an optional texture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Material name; unique among materials.
    pub name: String,
    /// Texture name.
    pub texture: Option<String>,
    /// Uniform texture scaling.
    pub texuniform: bool,
    /// 2D texture repeat counts.
    pub texrepeat: [f64; 2],
    /// Emission strength.
    pub emission: f64,
    /// Specular strength.
    pub specular: f64,
    /// Specular exponent scale.
    pub shininess: f64,
    /// Reflectance strength.
    pub reflectance: f64,
    /// Base color.
    pub rgba: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            texture: None,
            texuniform: false,
            texrepeat: [1.0, 1.0],
            emission: 0.0,
            specular: 0.5,
            shininess: 0.5,
            reflectance: 0.0,
            rgba: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// One bone of a skin: a body that drives a weighted set of vertices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkinBone {
    /// Driving body name, resolved to an id at compile time.
    pub body: String,
    /// Bind-pose position of the bone.
    pub bindpos: Vector3<f64>,
    /// Bind-pose orientation of the bone.
    pub bindquat: Orientation,
    /// Vertex indices influenced by this bone.
    pub vertid: Vec<i32>,
    /// Weight per influenced vertex.
    pub vertweight: Vec<f64>,
}

/// A skin: a deformable visual surface driven by bones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skin {
    /// Skin name.
    pub name: String,
    /// Backing file, resolved against `meshdir`.
    pub file: Option<String>,
    /// Material name.
    pub material: Option<String>,
    /// Display color.
    pub rgba: [f32; 4],
    /// Face offset along normals.
    pub inflate: f64,
    /// Visualization group.
    pub group: i32,
    /// Bind-pose vertices, `3 * nvert`.
    pub vert: Vec<f64>,
    /// Texture coordinates, `2 * nvert` or empty.
    pub texcoord: Vec<f64>,
    /// Faces, `3 * nface`.
    pub face: Vec<i32>,
    /// Bones.
    pub bones: Vec<SkinBone>,
}

impl Default for Skin {
    fn default() -> Self {
        Self {
            name: String::new(),
            file: None,
            material: None,
            rgba: [1.0, 1.0, 1.0, 1.0],
            inflate: 0.0,
            group: 0,
            vert: Vec::new(),
            texcoord: Vec::new(),
            face: Vec::new(),
            bones: Vec::new(),
        }
    }
}

/// A flex: a deformable body made of vertices pinned to rigid bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flex {
    /// Flex name.
    pub name: String,
    /// Dimensionality: 1 = cable, 2 = shell, 3 = solid.
    pub dim: i32,
    /// Material name.
    pub material: Option<String>,
    /// Collision radius around the primitives.
    pub radius: f64,
    /// Visualization group.
    pub group: i32,
    /// Display color.
    pub rgba: [f32; 4],
    /// Body name carrying each vertex; a single entry applies to all.
    pub vertbody: Vec<String>,
    /// Vertex positions in their carrying body's frame, `3 * nvert`.
    pub vert: Vec<f64>,
    /// Element vertex indices, `(dim + 1)` per element.
    pub elem: Vec<i32>,
    /// Texture coordinates, `2 * nvert` or empty.
    pub texcoord: Vec<f64>,
    /// Enable element-vertex self-collision pair generation.
    pub selfcollide: bool,

    // -- compiled output --
    /// Unique edges derived from the elements.
    pub edge: Vec<[i32; 2]>,
    /// Boundary fragment vertex ids, `dim` per fragment.
    pub shell: Vec<i32>,
    /// Element-vertex collision pairs (self-collision only).
    pub evpair: Vec<[i32; 2]>,
}

impl Default for Flex {
    fn default() -> Self {
        Self {
            name: String::new(),
            dim: 2,
            material: None,
            radius: 0.005,
            group: 0,
            rgba: [0.5, 0.6, 0.7, 1.0],
            vertbody: Vec::new(),
            vert: Vec::new(),
            elem: Vec::new(),
            texcoord: Vec::new(),
            selfcollide: false,
            edge: Vec::new(),
            shell: Vec::new(),
            evpair: Vec::new(),
        }
    }
}
