//! Static-body fusion.
//!
//! Merges jointless, non-mocap bodies into their parents: mass and inertia
//! combine through the parallel-axis theorem, attached geoms and sites move
//! into the parent frame, and grandchildren splice into the parent's child
//! list at the fused body's position. The pass restarts at the current index
//! so newly exposed grandchildren fuse too.
//!
//! The pass is conservative: any entity kind that stores ids which would
//! shift (skins, pairs, excludes, equalities, tendons, actuators, sensors,
//! tuples, cameras, lights, flexes) disables it wholesale.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::compile::entity::{GeomComp, SiteComp, MINVAL};
use crate::compile::flatten::regroup_elements;
use crate::compile::inertia::BodyInertia;
use crate::error::{CompileError, Result};
use crate::spec::ModelSpec;

/// Apply static fusion. Mutates the spec arenas, the comp arrays and the
/// consolidated inertias; returns whether anything fused.
pub(crate) fn fuse_static(
    spec: &mut ModelSpec,
    geoms: &mut Vec<GeomComp>,
    sites: &mut Vec<SiteComp>,
    inertia: &mut Vec<BodyInertia>,
) -> Result<bool> {
    // Conservative preconditions: skip when any id-holding entity exists.
    if !spec.skins.is_empty()
        || !spec.pairs.is_empty()
        || !spec.excludes.is_empty()
        || !spec.equalities.is_empty()
        || !spec.tendons.is_empty()
        || !spec.actuators.is_empty()
        || !spec.sensors.is_empty()
        || !spec.tuples.is_empty()
        || !spec.cameras.is_empty()
        || !spec.lights.is_empty()
        || !spec.flexes.is_empty()
    {
        return Ok(false);
    }

    let mut changed = false;
    let mut i = 1;
    while i < spec.bodies.len() {
        if !spec.bodies[i].joints.is_empty() || spec.bodies[i].mocap {
            i += 1;
            continue;
        }
        fuse_one(spec, geoms, sites, inertia, i)?;
        changed = true;
        // Recheck the same index: a grandchild now sits here.
    }

    if changed {
        // Restore (body, declaration) arena order for moved elements.
        let maps = regroup_elements(spec);
        *geoms = permute(std::mem::take(geoms), &maps.geoms);
        *sites = permute(std::mem::take(sites), &maps.sites);
    }
    Ok(changed)
}

fn permute<T: Clone>(old: Vec<T>, map: &[usize]) -> Vec<T> {
    let mut out = old.clone();
    for (from, &to) in map.iter().enumerate() {
        out[to] = old[from].clone();
    }
    out
}

fn fuse_one(
    spec: &mut ModelSpec,
    geoms: &mut [GeomComp],
    sites: &mut [SiteComp],
    inertia: &mut Vec<BodyInertia>,
    body: usize,
) -> Result<()> {
    let parent = spec.bodies[body].parent;
    let bpos = spec.bodies[body].pos;
    let bquat = spec.bodies[body].orient.quat;

    // Mass and inertia combine only below the world.
    if parent > 0 && inertia[body].mass >= MINVAL {
        merge_inertia(spec, inertia, parent, body, bpos, bquat)?;
    }

    // Move geoms and sites into the parent frame.
    for &g in &spec.bodies[body].geoms.clone() {
        spec.geoms[g].body = parent;
        spec.geoms[g].pos = bpos + bquat * spec.geoms[g].pos;
        spec.geoms[g].orient.quat = bquat * spec.geoms[g].orient.quat;
        geoms[g].pos = bpos + bquat * geoms[g].pos;
        geoms[g].quat = bquat * geoms[g].quat;
    }
    for &s in &spec.bodies[body].sites.clone() {
        spec.sites[s].body = parent;
        spec.sites[s].pos = bpos + bquat * spec.sites[s].pos;
        spec.sites[s].orient.quat = bquat * spec.sites[s].orient.quat;
        sites[s].pos = bpos + bquat * sites[s].pos;
        sites[s].quat = bquat * sites[s].quat;
    }

    // Re-frame grandchildren.
    for &c in &spec.bodies[body].children.clone() {
        spec.bodies[c].parent = parent;
        spec.bodies[c].pos = bpos + bquat * spec.bodies[c].pos;
        spec.bodies[c].orient.quat = bquat * spec.bodies[c].orient.quat;
    }

    // Splice into the parent: grandchildren replace the fused body at its
    // position; geoms and sites append.
    let fused = spec.bodies[body].clone();
    let parent_body = &mut spec.bodies[parent];
    let slot = parent_body
        .children
        .iter()
        .position(|&c| c == body)
        .ok_or_else(|| CompileError::internal("fused body missing from parent child list"))?;
    parent_body.children.splice(slot..=slot, fused.children.iter().copied());
    parent_body.geoms.extend(fused.geoms.iter().copied());
    parent_body.sites.extend(fused.sites.iter().copied());

    // Remove the body; every body id above shifts down by one.
    spec.bodies.remove(body);
    inertia.remove(body);
    let fix = |id: &mut usize| {
        if *id > body {
            *id -= 1;
        }
    };
    for b in &mut spec.bodies {
        fix(&mut b.parent);
        for c in &mut b.children {
            fix(c);
        }
    }
    for j in &mut spec.joints {
        fix(&mut j.body);
    }
    for g in &mut spec.geoms {
        fix(&mut g.body);
    }
    for s in &mut spec.sites {
        fix(&mut s.body);
    }
    Ok(())
}

/// Combine the fused body's inertial frame into its parent's.
fn merge_inertia(
    spec: &ModelSpec,
    inertia: &mut [BodyInertia],
    parent: usize,
    body: usize,
    bpos: Vector3<f64>,
    bquat: UnitQuaternion<f64>,
) -> Result<()> {
    // Child inertial frame expressed in the parent frame.
    let child_ipos = bpos + bquat * inertia[body].ipos;
    let child_iquat = bquat * inertia[body].iquat;

    let masses = [inertia[parent].mass, inertia[body].mass];
    let ipos = [inertia[parent].ipos, child_ipos];
    let iquat = [inertia[parent].iquat, child_iquat];
    let diag = [inertia[parent].inertia, inertia[body].inertia];

    let total: f64 = masses.iter().sum();
    if total < MINVAL {
        inertia[parent] = BodyInertia::default();
        return Ok(());
    }
    let com = (ipos[0] * masses[0] + ipos[1] * masses[1]) / total;

    let mut tensor = Matrix3::zeros();
    for k in 0..2 {
        let rot = iquat[k].to_rotation_matrix();
        let global = rot * Matrix3::from_diagonal(&diag[k]) * rot.transpose();
        let d = ipos[k] - com;
        let shift = masses[k] * (Matrix3::identity() * d.dot(&d) - d * d.transpose());
        tensor += global + shift;
    }

    let (principal, quat) = crate::compile::inertia::diagonalize(&tensor).map_err(|e| {
        CompileError::physical(format!(
            "could not fuse inertia of body '{}': {}",
            spec.bodies[body].name, e.message
        ))
    })?;
    inertia[parent] = BodyInertia {
        mass: total,
        ipos: com,
        iquat: quat,
        inertia: principal,
    };
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::compile::entity::{compile_geoms, compile_sites};
    use crate::compile::inertia::consolidate;
    use crate::spec::body::Inertial;
    use approx::assert_relative_eq;

    fn run_fuse(spec: &mut ModelSpec) -> (Vec<GeomComp>, Vec<SiteComp>, Vec<BodyInertia>, bool) {
        let mut geoms = compile_geoms(spec).unwrap();
        let mut sites = compile_sites(spec).unwrap();
        let mut inertia = consolidate(spec, &geoms).unwrap();
        let changed = fuse_static(spec, &mut geoms, &mut sites, &mut inertia).unwrap();
        (geoms, sites, inertia, changed)
    }

    #[test]
    fn chain_of_static_bodies_fuses_into_one() {
        // world -> a (jointed) -> b (static, mass 2 at x=1) -> c (static,
        // mass 3 at origin of b).
        let mut spec = ModelSpec::new();
        spec.options.fusestatic = true;
        let a = spec.add_body(0);
        spec.add_joint(a);
        spec.bodies[a].inertial = Some(Inertial {
            mass: 0.0,
            ..Inertial::default()
        });
        let b = spec.add_body(a);
        spec.bodies[b].inertial = Some(Inertial {
            mass: 2.0,
            pos: nalgebra::Vector3::new(1.0, 0.0, 0.0),
            diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
            ..Inertial::default()
        });
        let c = spec.add_body(b);
        spec.bodies[c].inertial = Some(Inertial {
            mass: 3.0,
            diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
            ..Inertial::default()
        });

        let (_, _, inertia, changed) = run_fuse(&mut spec);
        assert!(changed);
        assert_eq!(spec.bodies.len(), 2, "world + jointed body");
        assert_relative_eq!(inertia[1].mass, 5.0);
        // COM: (2*1 + 3*0)/5 = 0.4 along x.
        assert_relative_eq!(inertia[1].ipos.x, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn fusion_preserves_parallel_axis_inertia() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        spec.add_joint(a);
        spec.bodies[a].inertial = Some(Inertial {
            mass: 2.0,
            diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
            ..Inertial::default()
        });
        let b = spec.add_body(a);
        spec.bodies[b].pos = nalgebra::Vector3::new(1.0, 0.0, 0.0);
        spec.bodies[b].inertial = Some(Inertial {
            mass: 2.0,
            diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
            ..Inertial::default()
        });

        let (_, _, inertia, _) = run_fuse(&mut spec);
        // Two point-symmetric halves at +-0.5 from the COM: Iy and Iz gain
        // 2 * m * d^2 = 2 * 2 * 0.25 = 1 over the summed 2.0.
        assert_relative_eq!(inertia[1].ipos.x, 0.5, epsilon = 1e-12);
        let mut diag: Vec<f64> = inertia[1].inertia.iter().copied().collect();
        diag.sort_by(f64::total_cmp);
        assert_relative_eq!(diag[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(diag[2], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn geoms_transfer_with_frame_composition() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        spec.add_joint(a);
        let g0 = spec.add_geom(a);
        spec.geoms[g0].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        let b = spec.add_body(a);
        spec.bodies[b].pos = nalgebra::Vector3::new(0.0, 0.0, 0.5);
        let g1 = spec.add_geom(b);
        spec.geoms[g1].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        spec.geoms[g1].pos = nalgebra::Vector3::new(0.0, 0.2, 0.0);

        crate::compile::flatten::flatten(&mut spec).unwrap();
        let (geoms, _, _, changed) = run_fuse(&mut spec);
        assert!(changed);
        assert_eq!(spec.bodies.len(), 2);
        assert_eq!(spec.bodies[1].geoms.len(), 2);
        let moved = &geoms[1];
        assert_relative_eq!(moved.pos.y, 0.2, epsilon = 1e-12);
        assert_relative_eq!(moved.pos.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn preconditions_disable_fusion() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        spec.add_joint(a);
        spec.add_body(a); // static child that would otherwise fuse
        spec.add_sensor();
        spec.sensors[0].stype = sim_model::SensorType::Clock;
        let (_, _, _, changed) = run_fuse(&mut spec);
        assert!(!changed);
        assert_eq!(spec.bodies.len(), 3);
    }

    #[test]
    fn mocap_bodies_do_not_fuse() {
        let mut spec = ModelSpec::new();
        let m = spec.add_body(0);
        spec.bodies[m].mocap = true;
        let (_, _, _, changed) = run_fuse(&mut spec);
        assert!(!changed);
    }
}
