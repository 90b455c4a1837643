//! Compile preparation: default application, orientation resolution and
//! frame folding.
//!
//! Runs on the working clone of the spec before anything else. Afterwards
//! every entity has its class defaults merged in, every orientation is a
//! plain quaternion, and every frame transform has been folded into the
//! poses of the elements declared inside it.

use nalgebra::{UnitQuaternion, Vector3};
use sim_model::ObjectType;

use crate::error::{CompileError, Result};
use crate::orientation::Orientation;
use crate::spec::ModelSpec;

/// Merge default-class bundles into every entity.
///
/// The effective class of an element is its explicit class if set, else the
/// innermost enclosing body childclass, else "main". Body childclass names
/// are validated here as well.
pub fn apply_defaults(spec: &mut ModelSpec) -> Result<()> {
    // Effective childclass per body, inherited down the tree.
    let nbody = spec.bodies.len();
    let mut childclass: Vec<Option<String>> = vec![None; nbody];
    let mut stack = vec![0usize];
    while let Some(b) = stack.pop() {
        let inherited = if b == 0 {
            None
        } else {
            childclass[spec.bodies[b].parent].clone()
        };
        let own = spec.bodies[b].childclass.clone();
        if let Some(ref name) = own {
            if spec.defaults.find(name).is_none() {
                return Err(CompileError::reference(format!(
                    "unknown childclass '{name}'"
                ))
                .with_object(ObjectType::Body, spec.bodies[b].name.clone(), b));
            }
        }
        childclass[b] = own.or(inherited);
        stack.extend(spec.bodies[b].children.iter().copied());
    }

    let defaults = spec.defaults.clone();
    for (id, joint) in spec.joints.iter_mut().enumerate() {
        let class = defaults
            .resolve(joint.class.as_deref(), childclass[joint.body].as_deref())
            .map_err(|e| e.with_object(ObjectType::Joint, joint.name.clone(), id))?;
        joint.params.merge_from(&class.joint);
    }
    for (id, geom) in spec.geoms.iter_mut().enumerate() {
        let class = defaults
            .resolve(geom.class.as_deref(), childclass[geom.body].as_deref())
            .map_err(|e| e.with_object(ObjectType::Geom, geom.name.clone(), id))?;
        geom.params.merge_from(&class.geom);
    }
    for (id, site) in spec.sites.iter_mut().enumerate() {
        let class = defaults
            .resolve(site.class.as_deref(), childclass[site.body].as_deref())
            .map_err(|e| e.with_object(ObjectType::Site, site.name.clone(), id))?;
        site.params.merge_from(&class.site);
    }
    for (id, pair) in spec.pairs.iter_mut().enumerate() {
        let class = defaults
            .resolve(pair.class.as_deref(), None)
            .map_err(|e| e.with_object(ObjectType::Pair, pair.name.clone(), id))?;
        pair.params.merge_from(&class.pair);
    }
    for (id, tendon) in spec.tendons.iter_mut().enumerate() {
        let class = defaults
            .resolve(tendon.class.as_deref(), None)
            .map_err(|e| e.with_object(ObjectType::Tendon, tendon.name.clone(), id))?;
        tendon.params.merge_from(&class.tendon);
    }
    for (id, actuator) in spec.actuators.iter_mut().enumerate() {
        let class = defaults
            .resolve(actuator.class.as_deref(), None)
            .map_err(|e| e.with_object(ObjectType::Actuator, actuator.name.clone(), id))?;
        actuator.params.merge_from(&class.actuator);
    }
    for (id, mesh) in spec.meshes.iter_mut().enumerate() {
        let class = defaults
            .resolve(mesh.class.as_deref(), None)
            .map_err(|e| e.with_object(ObjectType::Mesh, mesh.name.clone(), id))?;
        if mesh.scale.is_none() {
            mesh.scale = class.mesh_scale;
        }
    }
    Ok(())
}

fn resolve_orient(
    orient: &mut Orientation,
    spec_options: &crate::options::CompilerOptions,
    kind: ObjectType,
    name: &str,
    id: usize,
) -> Result<()> {
    let quat = orient
        .resolve(spec_options)
        .map_err(|e| CompileError::from(e).with_object(kind, name.to_string(), id))?;
    orient.quat = quat;
    orient.alt = None;
    Ok(())
}

/// Resolve every alternative orientation into a plain quaternion.
pub fn resolve_orientations(spec: &mut ModelSpec) -> Result<()> {
    let options = spec.options.clone();
    for id in 0..spec.bodies.len() {
        let name = spec.bodies[id].name.clone();
        resolve_orient(&mut spec.bodies[id].orient, &options, ObjectType::Body, &name, id)?;
        if let Some(ref mut inertial) = spec.bodies[id].inertial {
            resolve_orient(&mut inertial.orient, &options, ObjectType::Body, &name, id)?;
        }
    }
    for id in 0..spec.geoms.len() {
        let name = spec.geoms[id].name.clone();
        resolve_orient(&mut spec.geoms[id].orient, &options, ObjectType::Geom, &name, id)?;
    }
    for id in 0..spec.sites.len() {
        let name = spec.sites[id].name.clone();
        resolve_orient(&mut spec.sites[id].orient, &options, ObjectType::Site, &name, id)?;
    }
    for id in 0..spec.cameras.len() {
        let name = spec.cameras[id].name.clone();
        resolve_orient(&mut spec.cameras[id].orient, &options, ObjectType::Camera, &name, id)?;
    }
    for id in 0..spec.frames.len() {
        let name = spec.frames[id].name.clone();
        resolve_orient(&mut spec.frames[id].orient, &options, ObjectType::None, &name, id)?;
    }
    for id in 0..spec.skins.len() {
        let name = spec.skins[id].name.clone();
        for bone in &mut spec.skins[id].bones {
            resolve_orient(&mut bone.bindquat, &options, ObjectType::Skin, &name, id)?;
        }
    }
    Ok(())
}

/// Fold frame transforms into the poses of the elements that reference them.
///
/// A frame's own pose composes through its enclosing frames parent-first;
/// the chain resolves before any element uses it.
pub fn fold_frames(spec: &mut ModelSpec) -> Result<()> {
    // Absolute pose per frame, memoized. Chains are short; recursion depth
    // is bounded by frame nesting.
    let nframe = spec.frames.len();
    let mut absolute: Vec<Option<(Vector3<f64>, UnitQuaternion<f64>)>> = vec![None; nframe];

    fn resolve(
        frames: &[crate::spec::body::Frame],
        absolute: &mut Vec<Option<(Vector3<f64>, UnitQuaternion<f64>)>>,
        id: usize,
    ) -> (Vector3<f64>, UnitQuaternion<f64>) {
        if let Some(pose) = absolute[id] {
            return pose;
        }
        let own = (frames[id].pos, frames[id].orient.quat);
        let pose = match frames[id].parent {
            None => own,
            Some(parent) => {
                let (ppos, pquat) = resolve(frames, absolute, parent);
                (ppos + pquat * own.0, pquat * own.1)
            }
        };
        absolute[id] = Some(pose);
        pose
    }

    for id in 0..nframe {
        resolve(&spec.frames, &mut absolute, id);
    }

    let apply = |frame: Option<usize>,
                 pos: &mut Vector3<f64>,
                 quat: &mut UnitQuaternion<f64>| {
        if let Some(f) = frame {
            let (fpos, fquat) = absolute[f].unwrap_or((Vector3::zeros(), UnitQuaternion::identity()));
            *pos = fpos + fquat * *pos;
            *quat = fquat * *quat;
        }
    };

    for body in &mut spec.bodies {
        apply(body.frame.take(), &mut body.pos, &mut body.orient.quat);
    }
    for joint in &mut spec.joints {
        // Joints carry a point and an axis rather than a full pose.
        if let Some(f) = joint.frame.take() {
            let (fpos, fquat) =
                absolute[f].unwrap_or((Vector3::zeros(), UnitQuaternion::identity()));
            joint.pos = fpos + fquat * joint.pos;
            if let Some(axis) = joint.params.axis {
                joint.params.axis = Some(fquat * axis);
            }
        }
    }
    for geom in &mut spec.geoms {
        apply(geom.frame.take(), &mut geom.pos, &mut geom.orient.quat);
    }
    for site in &mut spec.sites {
        apply(site.frame.take(), &mut site.pos, &mut site.orient.quat);
    }
    for camera in &mut spec.cameras {
        apply(camera.frame.take(), &mut camera.pos, &mut camera.orient.quat);
    }
    for light in &mut spec.lights {
        if let Some(f) = light.frame.take() {
            let (fpos, fquat) =
                absolute[f].unwrap_or((Vector3::zeros(), UnitQuaternion::identity()));
            light.pos = fpos + fquat * light.pos;
            light.dir = fquat * light.dir;
        }
    }
    Ok(())
}
