//! Cross-reference resolution.
//!
//! Replaces every textual reference with a packed integer id, failing on
//! dangling names. Also hosts the discard-visual pass (which must run before
//! resolution so dropped entities never get ids) and the stable signature
//! sort of pairs and excludes.

use sim_model::{EqualityType, GeomType, ObjectType, SensorDataType, SensorStage, SensorType, TransmissionType, WrapType};

use crate::compile::entity::{GeomComp, SiteComp};
use crate::error::{CompileError, Result};
use crate::spec::constraint::signature;
use crate::spec::sensor::sensor_traits;
use crate::spec::tendon::WrapSpec;
use crate::spec::ModelSpec;

/// One resolved tendon path element.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedWrap {
    Joint { joint: usize, coef: f64 },
    Site { site: usize },
    Geom { wtype: WrapType, geom: usize, sidesite: i32 },
    Pulley { divisor: f64 },
}

/// A resolved sensor.
#[derive(Debug, Clone)]
pub(crate) struct SensorComp {
    pub stype: SensorType,
    pub datatype: SensorDataType,
    pub needstage: SensorStage,
    pub objtype: ObjectType,
    pub objid: i32,
    pub reftype: ObjectType,
    pub refid: i32,
    /// Output width; -1 until the plugin pass fills plugin sensors.
    pub dim: i32,
    pub cutoff: f64,
    pub noise: f64,
    /// Plugin instance id or -1.
    pub plugin: i32,
}

/// Everything the resolver produces beyond mutations of the comp arrays.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedRefs {
    pub mat_texid: Vec<i32>,
    pub cam_target: Vec<i32>,
    pub light_target: Vec<i32>,
    pub pair_geoms: Vec<(usize, usize)>,
    /// Packed pair slot to pre-sort arena id.
    pub pair_order: Vec<usize>,
    /// Packed exclude slot to pre-sort arena id.
    pub exclude_order: Vec<usize>,
    pub eq_objtype: Vec<ObjectType>,
    pub eq_obj: Vec<(i32, i32)>,
    pub wraps: Vec<Vec<ResolvedWrap>>,
    pub actuator_trn: Vec<(TransmissionType, [i32; 2])>,
    pub sensors: Vec<SensorComp>,
    pub skin_bonebody: Vec<Vec<i32>>,
    pub flex_vertbody: Vec<Vec<i32>>,
    pub tuple_obj: Vec<Vec<(ObjectType, i32)>>,
}

fn find(spec: &ModelSpec, kind: ObjectType, name: &str, context: &str) -> Result<usize> {
    spec.find_object(kind, name).ok_or_else(|| {
        CompileError::reference(format!("unknown {kind:?} '{name}' in {context}"))
    })
}

/// Drop visual-only content: materials, textures, flex/mesh texcoords,
/// non-colliding geoms (unless referenced by name elsewhere) and meshes no
/// remaining geom uses. Ids re-densify; later passes never see the removals.
pub(crate) fn apply_discard_visual(spec: &mut ModelSpec) {
    // Geoms referenced by name stay even when visual-only.
    let mut protected: Vec<String> = Vec::new();
    for pair in &spec.pairs {
        protected.push(pair.geom1.clone());
        protected.push(pair.geom2.clone());
    }
    for sensor in &spec.sensors {
        protected.extend(sensor.objname.clone());
        protected.extend(sensor.refname.clone());
    }
    for tuple in &spec.tuples {
        for entry in &tuple.elements {
            if entry.objtype == ObjectType::Geom {
                protected.push(entry.objname.clone());
            }
        }
    }
    for tendon in &spec.tendons {
        for wrap in &tendon.path {
            if let WrapSpec::Geom { geom, .. } = wrap {
                protected.push(geom.clone());
            }
        }
    }

    // Remove visual geoms and rebuild body geom lists.
    let keep: Vec<bool> = spec
        .geoms
        .iter()
        .map(|g| {
            g.params.contype.unwrap_or(1) != 0
                || g.params.conaffinity.unwrap_or(1) != 0
                || (!g.name.is_empty() && protected.contains(&g.name))
        })
        .collect();
    let mut remap = vec![usize::MAX; spec.geoms.len()];
    let mut geoms = Vec::new();
    for (old, g) in spec.geoms.iter().enumerate() {
        if keep[old] {
            remap[old] = geoms.len();
            geoms.push(g.clone());
        }
    }
    spec.geoms = geoms;
    for body in &mut spec.bodies {
        body.geoms = body
            .geoms
            .iter()
            .filter(|&&g| keep[g])
            .map(|&g| remap[g])
            .collect();
    }

    // Drop meshes no remaining geom references.
    let used: Vec<String> = spec.geoms.iter().filter_map(|g| g.mesh.clone()).collect();
    spec.meshes.retain(|m| used.contains(&m.name));

    // Materials and textures go entirely, along with the references to them.
    spec.materials.clear();
    spec.textures.clear();
    for geom in &mut spec.geoms {
        geom.params.material = None;
    }
    for site in &mut spec.sites {
        site.params.material = None;
    }
    for skin in &mut spec.skins {
        skin.material = None;
    }
    for tendon in &mut spec.tendons {
        tendon.params.material = None;
    }
    for mesh in &mut spec.meshes {
        mesh.usertexcoord.clear();
        mesh.texcoord.clear();
    }
    for flex in &mut spec.flexes {
        flex.texcoord.clear();
    }
}

/// Resolve every reference. Pairs and excludes are sorted by signature as a
/// side effect (the arena order becomes the packed order).
pub(crate) fn resolve(
    spec: &mut ModelSpec,
    geoms: &mut [GeomComp],
    sites: &mut [SiteComp],
) -> Result<ResolvedRefs> {
    let mut out = ResolvedRefs::default();

    // Materials -> textures.
    for mat in &spec.materials {
        let texid = match &mat.texture {
            None => -1,
            Some(name) => {
                find(spec, ObjectType::Texture, name, &format!("material '{}'", mat.name))? as i32
            }
        };
        out.mat_texid.push(texid);
    }

    // Geom and site materials.
    for (id, geom) in spec.geoms.iter().enumerate() {
        if let Some(ref name) = geom.params.material {
            geoms[id].matid =
                find(spec, ObjectType::Material, name, &format!("geom '{}'", geom.name))? as i32;
        }
    }
    for (id, site) in spec.sites.iter().enumerate() {
        if let Some(ref name) = site.params.material {
            sites[id].matid =
                find(spec, ObjectType::Material, name, &format!("site '{}'", site.name))? as i32;
        }
    }

    // Camera and light target bodies.
    for cam in &spec.cameras {
        out.cam_target.push(match &cam.targetbody {
            None => -1,
            Some(name) => {
                find(spec, ObjectType::Body, name, &format!("camera '{}'", cam.name))? as i32
            }
        });
    }
    for light in &spec.lights {
        out.light_target.push(match &light.targetbody {
            None => -1,
            Some(name) => {
                find(spec, ObjectType::Body, name, &format!("light '{}'", light.name))? as i32
            }
        });
    }

    // Pairs: geoms, then the signature from the owning bodies.
    let mut pair_resolved = Vec::with_capacity(spec.pairs.len());
    for pair in &spec.pairs {
        let context = format!("pair '{}'", pair.name);
        let g1 = find(spec, ObjectType::Geom, &pair.geom1, &context)?;
        let g2 = find(spec, ObjectType::Geom, &pair.geom2, &context)?;
        let (b1, b2) = (spec.geoms[g1].body, spec.geoms[g2].body);
        // Keep the geom order aligned with the body order inside the key.
        let (g1, g2) = if b1 <= b2 { (g1, g2) } else { (g2, g1) };
        pair_resolved.push((signature(b1, b2), g1, g2));
    }
    // Stable sort: equal signatures keep first-occurrence order.
    let mut order: Vec<usize> = (0..spec.pairs.len()).collect();
    order.sort_by_key(|&i| pair_resolved[i].0);
    spec.pairs = order.iter().map(|&i| spec.pairs[i].clone()).collect();
    out.pair_geoms = order
        .iter()
        .map(|&i| (pair_resolved[i].1, pair_resolved[i].2))
        .collect();
    for (slot, &i) in order.iter().enumerate() {
        spec.pairs[slot].signature = pair_resolved[i].0;
    }
    out.pair_order = order;

    // Excludes: bodies, same sort.
    let mut excl_resolved = Vec::with_capacity(spec.excludes.len());
    for excl in &spec.excludes {
        let context = format!("exclude '{}'", excl.name);
        let b1 = find(spec, ObjectType::Body, &excl.body1, &context)?;
        let b2 = find(spec, ObjectType::Body, &excl.body2, &context)?;
        excl_resolved.push(signature(b1, b2));
    }
    let mut order: Vec<usize> = (0..spec.excludes.len()).collect();
    order.sort_by_key(|&i| excl_resolved[i]);
    spec.excludes = order.iter().map(|&i| spec.excludes[i].clone()).collect();
    for (slot, &i) in order.iter().enumerate() {
        spec.excludes[slot].signature = excl_resolved[i];
    }
    out.exclude_order = order;

    // Equalities.
    for eq in &spec.equalities {
        let context = format!("equality '{}'", eq.name);
        let (objtype, kind) = match eq.eqtype {
            EqualityType::Connect | EqualityType::Weld => (ObjectType::Body, ObjectType::Body),
            EqualityType::Joint => (ObjectType::Joint, ObjectType::Joint),
            EqualityType::Tendon => (ObjectType::Tendon, ObjectType::Tendon),
            EqualityType::Flex => (ObjectType::Flex, ObjectType::Flex),
        };
        let obj1 = find(spec, kind, &eq.name1, &context)? as i32;
        let obj2 = match &eq.name2 {
            Some(name) => find(spec, kind, name, &context)? as i32,
            // Bodies anchor to the world; scalar couplings turn constant.
            None if kind == ObjectType::Body => 0,
            None => -1,
        };
        out.eq_objtype.push(objtype);
        out.eq_obj.push((obj1, obj2));
    }

    // Tendon paths.
    for tendon in &spec.tendons {
        out.wraps.push(resolve_tendon(spec, tendon, geoms)?);
    }

    // Actuator transmissions.
    for act in &spec.actuators {
        let context = format!("actuator '{}'", act.name);
        use crate::spec::actuator::ActuatorTarget as T;
        let resolved = match &act.target {
            T::Joint(name) => (
                TransmissionType::Joint,
                [find(spec, ObjectType::Joint, name, &context)? as i32, -1],
            ),
            T::JointInParent(name) => (
                TransmissionType::JointInParent,
                [find(spec, ObjectType::Joint, name, &context)? as i32, -1],
            ),
            T::SliderCrank { site, cranksite } => (
                TransmissionType::SliderCrank,
                [
                    find(spec, ObjectType::Site, site, &context)? as i32,
                    find(spec, ObjectType::Site, cranksite, &context)? as i32,
                ],
            ),
            T::Tendon(name) => (
                TransmissionType::Tendon,
                [find(spec, ObjectType::Tendon, name, &context)? as i32, -1],
            ),
            T::Site { site, refsite } => {
                let refid = match refsite {
                    None => -1,
                    Some(name) => find(spec, ObjectType::Site, name, &context)? as i32,
                };
                (
                    TransmissionType::Site,
                    [find(spec, ObjectType::Site, site, &context)? as i32, refid],
                )
            }
            T::Body(name) => (
                TransmissionType::Body,
                [find(spec, ObjectType::Body, name, &context)? as i32, -1],
            ),
        };
        out.actuator_trn.push(resolved);
    }

    // Sensors.
    for sensor in &spec.sensors {
        out.sensors.push(resolve_sensor(spec, sensor)?);
    }

    // Skin bones and flex vertex bodies.
    for skin in &spec.skins {
        let context = format!("skin '{}'", skin.name);
        let mut bones = Vec::with_capacity(skin.bones.len());
        for bone in &skin.bones {
            bones.push(find(spec, ObjectType::Body, &bone.body, &context)? as i32);
        }
        out.skin_bonebody.push(bones);
    }
    for flex in &spec.flexes {
        let context = format!("flex '{}'", flex.name);
        let nvert = flex.vert.len() / 3;
        let bodies = if flex.vertbody.len() == 1 {
            vec![find(spec, ObjectType::Body, &flex.vertbody[0], &context)? as i32; nvert]
        } else {
            let mut v = Vec::with_capacity(nvert);
            for name in &flex.vertbody {
                v.push(find(spec, ObjectType::Body, name, &context)? as i32);
            }
            v
        };
        out.flex_vertbody.push(bodies);
    }

    // Tuples: resolved entries, each object at most once.
    for tuple in &spec.tuples {
        let context = format!("tuple '{}'", tuple.name);
        if tuple.elements.is_empty() {
            return Err(CompileError::spec(format!("tuple '{}' is empty", tuple.name)));
        }
        let mut entries = Vec::with_capacity(tuple.elements.len());
        for entry in &tuple.elements {
            let id = find(spec, entry.objtype, &entry.objname, &context)? as i32;
            if entries.contains(&(entry.objtype, id)) {
                return Err(CompileError::reference(format!(
                    "repeated object '{}' in {context}",
                    entry.objname
                )));
            }
            entries.push((entry.objtype, id));
        }
        out.tuple_obj.push(entries);
    }

    Ok(out)
}

fn resolve_tendon(
    spec: &ModelSpec,
    tendon: &crate::spec::tendon::Tendon,
    geoms: &[GeomComp],
) -> Result<Vec<ResolvedWrap>> {
    let context = format!("tendon '{}'", tendon.name);
    if tendon.path.is_empty() {
        return Err(CompileError::spec(format!("{context} has an empty path")));
    }

    let fixed = tendon.is_fixed();
    let spatial = tendon
        .path
        .iter()
        .all(|w| !matches!(w, WrapSpec::Joint { .. }));
    if !fixed && !spatial {
        return Err(CompileError::spec(format!(
            "{context} mixes joint and spatial path elements"
        )));
    }

    if spatial {
        // Path shape rules: sites at both ends, wrapping geoms bracketed by
        // sites, pulleys followed by a site.
        let n = tendon.path.len();
        if !matches!(tendon.path[0], WrapSpec::Site(_))
            || !matches!(tendon.path[n - 1], WrapSpec::Site(_))
        {
            return Err(CompileError::spec(format!(
                "{context} must start and end with a site"
            )));
        }
        for (i, wrap) in tendon.path.iter().enumerate() {
            match wrap {
                WrapSpec::Geom { .. } => {
                    let before = matches!(tendon.path[i - 1], WrapSpec::Site(_));
                    let after = matches!(tendon.path[i + 1], WrapSpec::Site(_));
                    if !before || !after {
                        return Err(CompileError::spec(format!(
                            "{context}: wrapping geoms must sit between two sites"
                        )));
                    }
                }
                WrapSpec::Pulley { divisor } => {
                    if *divisor <= 0.0 {
                        return Err(CompileError::spec(format!(
                            "{context}: pulley divisor must be positive"
                        )));
                    }
                    if !matches!(tendon.path[i + 1], WrapSpec::Site(_)) {
                        return Err(CompileError::spec(format!(
                            "{context}: pulley must be followed by a site"
                        )));
                    }
                }
                _ => {}
            }
        }
    }

    let mut out = Vec::with_capacity(tendon.path.len());
    for wrap in &tendon.path {
        out.push(match wrap {
            WrapSpec::Joint { joint, coef } => {
                let j = find(spec, ObjectType::Joint, joint, &context)?;
                let jtype = spec.joints[j]
                    .params
                    .jtype
                    .unwrap_or(sim_model::JointType::Hinge);
                if !matches!(jtype, sim_model::JointType::Hinge | sim_model::JointType::Slide) {
                    return Err(CompileError::spec(format!(
                        "{context}: fixed tendons require scalar joints"
                    )));
                }
                ResolvedWrap::Joint { joint: j, coef: *coef }
            }
            WrapSpec::Site(site) => ResolvedWrap::Site {
                site: find(spec, ObjectType::Site, site, &context)?,
            },
            WrapSpec::Geom { geom, sidesite } => {
                let g = find(spec, ObjectType::Geom, geom, &context)?;
                let wtype = match geoms[g].gtype {
                    GeomType::Sphere => WrapType::Sphere,
                    GeomType::Cylinder => WrapType::Cylinder,
                    other => {
                        return Err(CompileError::spec(format!(
                            "{context}: tendons can wrap spheres and cylinders, not {other:?}"
                        )));
                    }
                };
                let side = match sidesite {
                    None => -1,
                    Some(name) => find(spec, ObjectType::Site, name, &context)? as i32,
                };
                ResolvedWrap::Geom {
                    wtype,
                    geom: g,
                    sidesite: side,
                }
            }
            WrapSpec::Pulley { divisor } => ResolvedWrap::Pulley { divisor: *divisor },
        });
    }
    Ok(out)
}

fn resolve_sensor(spec: &ModelSpec, sensor: &crate::spec::sensor::Sensor) -> Result<SensorComp> {
    let context = format!("sensor '{}'", sensor.name);
    let (objtype, dim, datatype, needstage) = sensor_traits(sensor.stype);

    // Frame sensors accept several attached kinds; resolve by probing.
    let (objtype, objid) = match objtype {
        ObjectType::None => (ObjectType::None, -1),
        ObjectType::XBody => {
            let name = sensor
                .objname
                .as_deref()
                .ok_or_else(|| CompileError::spec(format!("{context} has no attached object")))?;
            resolve_frame_object(spec, name, &context)?
        }
        kind => {
            let name = sensor
                .objname
                .as_deref()
                .ok_or_else(|| CompileError::spec(format!("{context} has no attached object")))?;
            (kind, find(spec, kind, name, &context)? as i32)
        }
    };

    // Reference frame for frame sensors.
    let (reftype, refid) = match &sensor.refname {
        None => (ObjectType::None, -1),
        Some(name) => match sensor.reftype {
            Some(kind) => (kind, find(spec, kind, name, &context)? as i32),
            None => resolve_frame_object(spec, name, &context)?,
        },
    };

    // Ball-joint sensors require a ball joint.
    if matches!(sensor.stype, SensorType::BallQuat | SensorType::BallAngVel) {
        let jtype = spec.joints[objid as usize]
            .params
            .jtype
            .unwrap_or(sim_model::JointType::Hinge);
        if jtype != sim_model::JointType::Ball {
            return Err(CompileError::reference(format!(
                "{context} requires a ball joint"
            )));
        }
    }

    let dim = match sensor.stype {
        SensorType::User => sensor.dim.ok_or_else(|| {
            CompileError::spec(format!("{context} needs an explicit dimension"))
        })?,
        SensorType::Plugin => -1,
        _ => dim as i32,
    };
    if sensor.stype == SensorType::User && dim <= 0 {
        return Err(CompileError::spec(format!(
            "{context} needs a positive dimension"
        )));
    }

    Ok(SensorComp {
        stype: sensor.stype,
        datatype: sensor.datatype.unwrap_or(datatype),
        needstage: sensor.needstage.unwrap_or(needstage),
        objtype,
        objid,
        reftype,
        refid,
        dim,
        cutoff: sensor.cutoff,
        noise: sensor.noise,
        plugin: -1,
    })
}

/// Frame sensors attach to whatever object the name denotes: site, body,
/// geom or camera, probed in that order.
fn resolve_frame_object(
    spec: &ModelSpec,
    name: &str,
    context: &str,
) -> Result<(ObjectType, i32)> {
    for kind in [
        ObjectType::Site,
        ObjectType::Body,
        ObjectType::Geom,
        ObjectType::Camera,
    ] {
        if let Some(id) = spec.find_object(kind, name) {
            let kind = if kind == ObjectType::Body {
                ObjectType::XBody
            } else {
                kind
            };
            return Ok((kind, id as i32));
        }
    }
    Err(CompileError::reference(format!(
        "unknown frame object '{name}' in {context}"
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::compile::entity::{compile_geoms, compile_sites};
    use nalgebra::Vector3;

    fn resolve_spec(spec: &mut ModelSpec) -> Result<ResolvedRefs> {
        let mut geoms = compile_geoms(spec)?;
        let mut sites = compile_sites(spec)?;
        resolve(spec, &mut geoms, &mut sites)
    }

    fn body_with_geom(spec: &mut ModelSpec, body_name: &str, geom_name: &str) -> usize {
        let b = spec.add_body(0);
        spec.bodies[b].name = body_name.to_string();
        let g = spec.add_geom(b);
        spec.geoms[g].name = geom_name.to_string();
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        b
    }

    #[test]
    fn pairs_sort_by_signature() {
        let mut spec = ModelSpec::new();
        body_with_geom(&mut spec, "b1", "g1");
        body_with_geom(&mut spec, "b2", "g2");
        body_with_geom(&mut spec, "b3", "g3");
        // Declare the higher-signature pair first.
        let p1 = spec.add_pair();
        spec.pairs[p1].name = "late".to_string();
        spec.pairs[p1].geom1 = "g2".to_string();
        spec.pairs[p1].geom2 = "g3".to_string();
        let p2 = spec.add_pair();
        spec.pairs[p2].name = "early".to_string();
        spec.pairs[p2].geom1 = "g1".to_string();
        spec.pairs[p2].geom2 = "g2".to_string();

        resolve_spec(&mut spec).unwrap();
        assert_eq!(spec.pairs[0].name, "early");
        assert_eq!(spec.pairs[1].name, "late");
        assert!(spec.pairs[0].signature < spec.pairs[1].signature);
    }

    #[test]
    fn exclude_signature_orders_bodies() {
        let mut spec = ModelSpec::new();
        body_with_geom(&mut spec, "a", "ga");
        body_with_geom(&mut spec, "b", "gb");
        let e = spec.add_exclude();
        spec.excludes[e].body1 = "b".to_string();
        spec.excludes[e].body2 = "a".to_string();
        resolve_spec(&mut spec).unwrap();
        assert_eq!(spec.excludes[0].signature, (1 << 16) | 2);
    }

    #[test]
    fn dangling_pair_geom_fails() {
        let mut spec = ModelSpec::new();
        body_with_geom(&mut spec, "a", "ga");
        let p = spec.add_pair();
        spec.pairs[p].geom1 = "ga".to_string();
        spec.pairs[p].geom2 = "ghost".to_string();
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("unknown Geom 'ghost'"));
    }

    #[test]
    fn tuple_repeats_fail() {
        let mut spec = ModelSpec::new();
        body_with_geom(&mut spec, "a", "ga");
        let t = spec.add_tuple();
        spec.tuples[t].name = "objects".to_string();
        for _ in 0..2 {
            spec.tuples[t].elements.push(crate::spec::custom::TupleEntry {
                objtype: ObjectType::Body,
                objname: "a".to_string(),
                prm: 0.0,
            });
        }
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("repeated object"));
    }

    #[test]
    fn empty_tuple_fails() {
        let mut spec = ModelSpec::new();
        let t = spec.add_tuple();
        spec.tuples[t].name = "empty".to_string();
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn empty_tendon_path_fails() {
        let mut spec = ModelSpec::new();
        let t = spec.add_tendon();
        spec.tendons[t].name = "cable".to_string();
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("empty path"));
    }

    #[test]
    fn spatial_tendon_must_end_with_sites() {
        let mut spec = ModelSpec::new();
        let b = body_with_geom(&mut spec, "a", "ga");
        let s = spec.add_site(b);
        spec.sites[s].name = "s0".to_string();
        let t = spec.add_tendon();
        spec.tendons[t].name = "cable".to_string();
        spec.tendons[t].path = vec![
            WrapSpec::Site("s0".to_string()),
            WrapSpec::Geom {
                geom: "ga".to_string(),
                sidesite: None,
            },
        ];
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("start and end with a site"));
    }

    #[test]
    fn wrap_geom_must_be_sphere_or_cylinder() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        spec.bodies[b].name = "a".to_string();
        let g = spec.add_geom(b);
        spec.geoms[g].name = "slab".to_string();
        spec.geoms[g].params.gtype = Some(GeomType::Box);
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.1, 0.1));
        let s1 = spec.add_site(b);
        spec.sites[s1].name = "s1".to_string();
        let s2 = spec.add_site(b);
        spec.sites[s2].name = "s2".to_string();
        let t = spec.add_tendon();
        spec.tendons[t].name = "cable".to_string();
        spec.tendons[t].path = vec![
            WrapSpec::Site("s1".to_string()),
            WrapSpec::Geom {
                geom: "slab".to_string(),
                sidesite: None,
            },
            WrapSpec::Site("s2".to_string()),
        ];
        let err = resolve_spec(&mut spec).unwrap_err();
        assert!(err.to_string().contains("spheres and cylinders"));
    }

    #[test]
    fn discard_visual_drops_geoms_and_orphan_meshes() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let collide = spec.add_geom(b);
        spec.geoms[collide].name = "hull".to_string();
        spec.geoms[collide].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        let visual = spec.add_geom(b);
        spec.geoms[visual].name = "shine".to_string();
        spec.geoms[visual].params.contype = Some(0);
        spec.geoms[visual].params.conaffinity = Some(0);
        let m = spec.add_mesh();
        spec.meshes[m].name = "shell".to_string();
        spec.geoms[visual].mesh = Some("shell".to_string());
        spec.geoms[visual].params.gtype = Some(GeomType::Mesh);
        let mat = spec.add_material();
        spec.materials[mat].name = "chrome".to_string();
        spec.geoms[collide].params.material = Some("chrome".to_string());

        apply_discard_visual(&mut spec);
        assert_eq!(spec.geoms.len(), 1);
        assert_eq!(spec.geoms[0].name, "hull");
        assert!(spec.meshes.is_empty(), "orphan mesh dropped");
        assert!(spec.materials.is_empty());
        assert_eq!(spec.geoms[0].params.material, None);
        assert_eq!(spec.bodies[b].geoms, vec![0]);
    }

    #[test]
    fn discard_visual_protects_referenced_geoms() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let visual = spec.add_geom(b);
        spec.geoms[visual].name = "marker".to_string();
        spec.geoms[visual].params.contype = Some(0);
        spec.geoms[visual].params.conaffinity = Some(0);
        let s = spec.add_sensor();
        spec.sensors[s].stype = SensorType::FramePos;
        spec.sensors[s].objname = Some("marker".to_string());

        apply_discard_visual(&mut spec);
        assert_eq!(spec.geoms.len(), 1, "sensor-referenced geom survives");
    }
}
