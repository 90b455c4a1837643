//! Asset compilation: meshes, height fields, textures, skins, flexes.
//!
//! Each submodule canonicalizes one asset kind in place on the spec clone
//! the compiler works on. Materials need no compilation of their own; their
//! texture references resolve with the other cross-references.

pub mod deformable;
pub mod hfield;
pub mod mesh;
pub mod texture;

use crate::error::Result;
use crate::resources::Resources;
use crate::spec::ModelSpec;

/// Compile every asset of the spec in declaration order.
pub fn compile_all(spec: &mut ModelSpec, resources: &dyn Resources) -> Result<()> {
    let filedir = spec.modelfiledir.clone();
    let meshdir = spec.options.meshdir.clone();
    let texturedir = spec.options.texturedir.clone();

    for (id, m) in spec.meshes.iter_mut().enumerate() {
        mesh::compile_mesh(m, id, &filedir, &meshdir, resources)?;
    }
    for (id, h) in spec.hfields.iter_mut().enumerate() {
        hfield::compile_hfield(h, id, &filedir, &texturedir, resources)?;
    }
    for (id, t) in spec.textures.iter_mut().enumerate() {
        texture::compile_texture(t, id, &filedir, &texturedir, resources)?;
    }
    for (id, s) in spec.skins.iter_mut().enumerate() {
        deformable::compile_skin(s, id)?;
    }
    for (id, f) in spec.flexes.iter_mut().enumerate() {
        deformable::compile_flex(f, id)?;
    }
    Ok(())
}
