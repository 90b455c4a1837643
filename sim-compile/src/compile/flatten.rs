//! Tree flattening and id assignment.
//!
//! Reorders the working arenas so entity ids equal their packed model ids: a
//! pre-order walk of the body tree assigns body ids, and every attached
//! element kind is regrouped by (owning body, declaration order). After this
//! pass an arena index is the final runtime id, so later passes resolve
//! names straight into packed ids.
//!
//! Also enforces the structural rules that depend only on the tree: unique
//! names, world-body restrictions, free-joint placement, mocap placement.

use std::collections::HashMap;

use sim_model::{JointType, ObjectType};

use crate::error::{CompileError, Result};
use crate::spec::ModelSpec;

/// Bodies plus flexes must fit the 16-bit signature space.
const MAX_BODY_FLEX: usize = 65534;

/// Id mappings out of the flatten pass, consumed by the decompiler.
#[derive(Debug, Clone)]
pub(crate) struct FlattenMaps {
    /// Packed body id to pre-flatten arena id.
    pub body_order: Vec<usize>,
    /// Pre-flatten to packed joint ids.
    pub joints: Vec<usize>,
    /// Pre-flatten to packed geom ids.
    pub geoms: Vec<usize>,
    /// Pre-flatten to packed site ids.
    pub sites: Vec<usize>,
    /// Pre-flatten to packed camera ids.
    pub cameras: Vec<usize>,
    /// Pre-flatten to packed light ids.
    pub lights: Vec<usize>,
}

/// Reorder arenas into packed id order and validate tree structure.
pub(crate) fn flatten(spec: &mut ModelSpec) -> Result<FlattenMaps> {
    if !spec.world().joints.is_empty() {
        return Err(CompileError::spec("joint found in world body"));
    }
    if spec.world().mocap {
        return Err(CompileError::spec("world body cannot be mocap"));
    }
    if spec.world().pos.norm() > 0.0 || spec.world().orient.quat.angle() > 0.0 {
        return Err(CompileError::spec("world body must keep the identity pose"));
    }
    if spec.bodies.len() + spec.flexes.len() >= MAX_BODY_FLEX {
        return Err(CompileError::spec(format!(
            "number of bodies plus flexes must be less than {MAX_BODY_FLEX}"
        )));
    }

    // Pre-order body walk, declaration order among siblings.
    let mut order = Vec::with_capacity(spec.bodies.len());
    let mut stack = vec![0usize];
    while let Some(b) = stack.pop() {
        order.push(b);
        for &child in spec.bodies[b].children.iter().rev() {
            stack.push(child);
        }
    }
    if order.len() != spec.bodies.len() {
        return Err(CompileError::internal(
            "body tree does not reach every body",
        ));
    }

    // old id -> new id
    let mut body_map = vec![0usize; spec.bodies.len()];
    for (new, &old) in order.iter().enumerate() {
        body_map[old] = new;
    }

    // Rebuild the body arena in the new order with remapped links.
    let mut bodies = Vec::with_capacity(order.len());
    for &old in &order {
        let mut body = spec.bodies[old].clone();
        body.parent = body_map[body.parent];
        for child in &mut body.children {
            *child = body_map[*child];
        }
        bodies.push(body);
    }
    spec.bodies = bodies;

    // Point attached elements at the new body ids, then regroup their
    // arenas into (body, declaration) order.
    for j in &mut spec.joints {
        j.body = body_map[j.body];
    }
    for g in &mut spec.geoms {
        g.body = body_map[g.body];
    }
    for s in &mut spec.sites {
        s.body = body_map[s.body];
    }
    for c in &mut spec.cameras {
        c.body = body_map[c.body];
    }
    for l in &mut spec.lights {
        l.body = body_map[l.body];
    }
    let maps = regroup_elements(spec);

    check_unique_names(spec)?;
    check_joint_placement(spec)?;
    check_mocap(spec)?;
    Ok(FlattenMaps {
        body_order: order,
        joints: maps.joints,
        geoms: maps.geoms,
        sites: maps.sites,
        cameras: maps.cameras,
        lights: maps.lights,
    })
}

/// Old-to-new element id maps produced by [`regroup_elements`].
pub(crate) struct ElementMaps {
    pub joints: Vec<usize>,
    pub geoms: Vec<usize>,
    pub sites: Vec<usize>,
    pub cameras: Vec<usize>,
    pub lights: Vec<usize>,
}

/// Rebuild the attached-element arenas in (body, declaration) order,
/// rewriting the bodies' element id lists. Used after flattening and again
/// after static fusion moves elements between bodies.
pub(crate) fn regroup_elements(spec: &mut ModelSpec) -> ElementMaps {
    macro_rules! regroup {
        ($arena:ident, $list:ident) => {{
            let mut map = vec![0usize; spec.$arena.len()];
            let mut arena = Vec::with_capacity(spec.$arena.len());
            for body in &mut spec.bodies {
                for old in &mut body.$list {
                    map[*old] = arena.len();
                    let element = spec.$arena[*old].clone();
                    *old = arena.len();
                    arena.push(element);
                }
            }
            spec.$arena = arena;
            map
        }};
    }
    let joints = regroup!(joints, joints);
    let geoms = regroup!(geoms, geoms);
    let sites = regroup!(sites, sites);
    let cameras = regroup!(cameras, cameras);
    let lights = regroup!(lights, lights);
    ElementMaps {
        joints,
        geoms,
        sites,
        cameras,
        lights,
    }
}

fn duplicate<'a, I>(names: I) -> Option<&'a str>
where
    I: Iterator<Item = &'a str>,
{
    let mut seen: HashMap<&str, ()> = HashMap::new();
    for name in names {
        if name.is_empty() {
            continue;
        }
        if seen.insert(name, ()).is_some() {
            return Some(name);
        }
    }
    None
}

/// Names must be unique within their kind; empty names are always allowed.
fn check_unique_names(spec: &ModelSpec) -> Result<()> {
    macro_rules! check {
        ($arena:expr, $label:literal) => {
            if let Some(name) = duplicate($arena.iter().map(|x| x.name.as_str())) {
                return Err(CompileError::spec(format!(
                    "repeated name '{name}' in {}",
                    $label
                )));
            }
        };
    }
    check!(spec.bodies, "body");
    check!(spec.joints, "joint");
    check!(spec.geoms, "geom");
    check!(spec.sites, "site");
    check!(spec.cameras, "camera");
    check!(spec.lights, "light");
    check!(spec.meshes, "mesh");
    check!(spec.hfields, "hfield");
    check!(spec.textures, "texture");
    check!(spec.materials, "material");
    check!(spec.skins, "skin");
    check!(spec.flexes, "flex");
    check!(spec.pairs, "pair");
    check!(spec.excludes, "exclude");
    check!(spec.equalities, "equality");
    check!(spec.tendons, "tendon");
    check!(spec.actuators, "actuator");
    check!(spec.sensors, "sensor");
    check!(spec.numerics, "numeric");
    check!(spec.texts, "text");
    check!(spec.tuples, "tuple");
    check!(spec.keys, "key");
    check!(spec.plugins, "plugin");
    Ok(())
}

/// Free joints only on direct children of world, and only alone.
fn check_joint_placement(spec: &ModelSpec) -> Result<()> {
    for (id, body) in spec.bodies.iter().enumerate() {
        let nfree = body
            .joints
            .iter()
            .filter(|&&j| spec.joints[j].params.jtype == Some(JointType::Free))
            .count();
        if nfree > 1 || (nfree == 1 && body.joints.len() > 1) {
            return Err(CompileError::physical("free joint can only appear by itself")
                .with_object(ObjectType::Body, body.name.clone(), id));
        }
        if nfree == 1 && body.parent != 0 {
            return Err(CompileError::physical("free joint can only be used on top level")
                .with_object(ObjectType::Body, body.name.clone(), id));
        }
    }
    Ok(())
}

/// Mocap bodies are jointless direct children of world.
fn check_mocap(spec: &ModelSpec) -> Result<()> {
    for (id, body) in spec.bodies.iter().enumerate().skip(1) {
        if !body.mocap {
            continue;
        }
        if body.parent != 0 {
            return Err(CompileError::spec("mocap body must be a child of world")
                .with_object(ObjectType::Body, body.name.clone(), id));
        }
        if !body.joints.is_empty() {
            return Err(CompileError::spec("mocap body cannot have joints")
                .with_object(ObjectType::Body, body.name.clone(), id));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn dfs_order_is_stable() {
        // world -> a (-> a1, a2), b. Insertion order: a, b, a1, a2.
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        let b = spec.add_body(0);
        let a1 = spec.add_body(a);
        let a2 = spec.add_body(a);
        for (id, name) in [(a, "a"), (b, "b"), (a1, "a1"), (a2, "a2")] {
            spec.bodies[id].name = name.to_string();
        }
        flatten(&mut spec).unwrap();
        let names: Vec<&str> = spec.bodies.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["world", "a", "a1", "a2", "b"]);
        assert_eq!(spec.bodies[1].children, vec![2, 3]);
        assert_eq!(spec.bodies[2].parent, 1);
        assert_eq!(spec.bodies[4].parent, 0);
    }

    #[test]
    fn elements_regroup_by_body() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        let b = spec.add_body(a);
        // Declare b's geom before a's second geom to test regrouping.
        let ga = spec.add_geom(a);
        let gb = spec.add_geom(b);
        let ga2 = spec.add_geom(a);
        spec.geoms[ga].name = "ga".to_string();
        spec.geoms[gb].name = "gb".to_string();
        spec.geoms[ga2].name = "ga2".to_string();

        flatten(&mut spec).unwrap();
        let names: Vec<&str> = spec.geoms.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["ga", "ga2", "gb"]);
        assert_eq!(spec.bodies[1].geoms, vec![0, 1]);
        assert_eq!(spec.bodies[2].geoms, vec![2]);
        assert_eq!(spec.geoms[2].body, 2);
    }

    #[test]
    fn duplicate_geom_name_fails_with_message() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let g1 = spec.add_geom(b);
        let g2 = spec.add_geom(b);
        spec.geoms[g1].name = "foo".to_string();
        spec.geoms[g2].name = "foo".to_string();
        let err = flatten(&mut spec).unwrap_err();
        assert!(err.to_string().contains("repeated name 'foo' in geom"));
    }

    #[test]
    fn empty_names_never_collide() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        spec.add_geom(b);
        spec.add_geom(b);
        assert!(flatten(&mut spec).is_ok());
    }

    #[test]
    fn free_joint_with_sibling_fails() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let j1 = spec.add_joint(b);
        spec.joints[j1].params.jtype = Some(JointType::Free);
        let j2 = spec.add_joint(b);
        spec.joints[j2].params.jtype = Some(JointType::Hinge);
        let err = flatten(&mut spec).unwrap_err();
        assert!(err.to_string().contains("by itself"));
    }

    #[test]
    fn free_joint_below_top_level_fails() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        let b = spec.add_body(a);
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Free);
        let err = flatten(&mut spec).unwrap_err();
        assert!(err.to_string().contains("top level"));
    }

    #[test]
    fn world_joints_rejected() {
        let mut spec = ModelSpec::new();
        spec.add_joint(0);
        assert!(flatten(&mut spec).is_err());
    }

    #[test]
    fn deep_mocap_rejected() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        let b = spec.add_body(a);
        spec.bodies[b].mocap = true;
        let err = flatten(&mut spec).unwrap_err();
        assert!(err.to_string().contains("mocap"));
    }
}
