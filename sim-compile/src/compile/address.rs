//! DOF and address assignment.
//!
//! One linear pass over the flattened bodies assigns qpos/dof addresses and
//! the dof parent chain, classifies body simplicity, and derives the sparse
//! mass-matrix sizes: `nM` (lower triangle non-zeros with `dof_madr`),
//! `nD = 2*nM - nv`, and `nB` from subtree and ancestor dof counts.

use nalgebra::Vector3;
use sim_model::{GeomType, JointType, ObjectType};

use crate::compile::entity::{GeomComp, JointComp, MINVAL};
use crate::compile::inertia::BodyInertia;
use crate::error::{CompileError, Result};
use crate::spec::ModelSpec;

/// Everything the address pass derives.
#[derive(Debug, Clone, Default)]
pub(crate) struct Layout {
    pub nq: usize,
    pub nv: usize,
    pub nm: usize,
    pub nd: usize,
    pub nb: usize,
    pub ntree: usize,

    pub jnt_qposadr: Vec<i32>,
    pub jnt_dofadr: Vec<i32>,

    pub body_jntadr: Vec<i32>,
    pub body_jntnum: Vec<i32>,
    pub body_dofadr: Vec<i32>,
    pub body_dofnum: Vec<i32>,
    pub body_weldid: Vec<i32>,
    pub body_rootid: Vec<i32>,
    pub body_treeid: Vec<i32>,
    pub body_sameframe: Vec<i32>,
    pub body_simple: Vec<i32>,
    pub subtreedofs: Vec<usize>,

    pub dof_bodyid: Vec<i32>,
    pub dof_jntid: Vec<i32>,
    pub dof_parentid: Vec<i32>,
    pub dof_treeid: Vec<i32>,
    pub dof_madr: Vec<i32>,
    pub dof_simplenum: Vec<i32>,

    pub qpos0: Vec<f64>,
    pub qpos_spring: Vec<f64>,
}

/// Run the address pass. Bodies are in flattened order: parents precede
/// children.
pub(crate) fn assign(
    spec: &ModelSpec,
    joints: &[JointComp],
    geoms: &[GeomComp],
    inertia: &[BodyInertia],
) -> Result<Layout> {
    let nbody = spec.bodies.len();
    let mut l = Layout {
        body_jntadr: vec![-1; nbody],
        body_jntnum: vec![0; nbody],
        body_dofadr: vec![-1; nbody],
        body_dofnum: vec![0; nbody],
        body_weldid: vec![0; nbody],
        body_rootid: vec![0; nbody],
        body_treeid: vec![-1; nbody],
        body_sameframe: vec![0; nbody],
        body_simple: vec![0; nbody],
        subtreedofs: vec![0; nbody],
        jnt_qposadr: vec![0; joints.len()],
        jnt_dofadr: vec![0; joints.len()],
        ..Layout::default()
    };

    // Last dof created on each body's kinematic chain, for parent linkage.
    let mut lastdof: Vec<i32> = vec![-1; nbody];

    for i in 0..nbody {
        let body = &spec.bodies[i];
        let parent = body.parent;

        // weldid: self with joints, else the parent's weld representative.
        l.body_weldid[i] = if i == 0 {
            0
        } else if body.joints.is_empty() {
            l.body_weldid[parent]
        } else {
            i as i32
        };

        // rootid: self for world and its direct children.
        l.body_rootid[i] = if i == 0 || parent == 0 {
            i as i32
        } else {
            l.body_rootid[parent]
        };

        lastdof[i] = if i == 0 { -1 } else { lastdof[parent] };

        // sameframe: the inertial frame coincides with the body frame.
        l.body_sameframe[i] =
            i32::from(inertia[i].ipos.norm() < MINVAL && inertia[i].iquat.angle() < MINVAL);

        // Initial simplicity: sameframe and either self-rooted or hanging
        // off a fixed direct child of world.
        let grandparent_fixed =
            i > 0 && spec.bodies[parent].parent == 0 && spec.bodies[parent].joints.is_empty();
        l.body_simple[i] = i32::from(
            l.body_sameframe[i] == 1 && (l.body_rootid[i] == i as i32 || grandparent_fixed),
        );
        if i > 0 && parent > 0 {
            l.body_simple[parent] = 0;
        }

        if !body.joints.is_empty() {
            l.body_jntadr[i] = body.joints[0] as i32;
            l.body_dofadr[i] = l.nv as i32;
        }
        l.body_jntnum[i] = body.joints.len() as i32;

        let mut rotfound = false;
        let mut body_nv = 0;
        for &j in &body.joints {
            let comp = &joints[j];
            l.jnt_qposadr[j] = l.nq as i32;
            l.jnt_dofadr[j] = l.nv as i32;

            // A second rotation, an offset anchor or an off-axis direction
            // all demote simplicity.
            let offaxis = matches!(comp.jtype, JointType::Hinge | JointType::Slide)
                && comp.axis.iter().filter(|a| a.abs() > MINVAL).count() > 1;
            if rotfound || comp.pos.norm() > MINVAL || offaxis {
                l.body_simple[i] = 0;
            }
            if matches!(comp.jtype, JointType::Ball | JointType::Hinge) {
                rotfound = true;
            }

            // Reference configuration.
            match comp.jtype {
                JointType::Free => {
                    let p = body.pos;
                    let q = body.orient.quat.into_inner();
                    l.qpos0.extend_from_slice(&[p.x, p.y, p.z, q.w, q.i, q.j, q.k]);
                    l.qpos_spring
                        .extend_from_slice(&[p.x, p.y, p.z, q.w, q.i, q.j, q.k]);
                }
                JointType::Ball => {
                    l.qpos0.extend_from_slice(&[1.0, 0.0, 0.0, 0.0]);
                    l.qpos_spring.extend_from_slice(&[1.0, 0.0, 0.0, 0.0]);
                }
                JointType::Hinge | JointType::Slide => {
                    l.qpos0.push(comp.refpos);
                    l.qpos_spring.push(comp.springref);
                }
            }

            // Dof chain.
            for _ in 0..comp.jtype.nv() {
                l.dof_bodyid.push(i as i32);
                l.dof_jntid.push(j as i32);
                l.dof_parentid.push(lastdof[i]);
                lastdof[i] = l.dof_bodyid.len() as i32 - 1;
            }
            l.nq += comp.jtype.nq();
            l.nv += comp.jtype.nv();
            body_nv += comp.jtype.nv();
        }
        l.body_dofnum[i] = body_nv as i32;
    }

    // Simple bodies with only sliders get the stronger classification.
    for i in 0..nbody {
        if l.body_simple[i] != 0 && l.body_dofnum[i] > 0 {
            let all_slide = spec.bodies[i]
                .joints
                .iter()
                .all(|&j| joints[j].jtype == JointType::Slide);
            l.body_simple[i] = if all_slide { 2 } else { 1 };
        }
    }

    // Kinematic trees: every parentless dof starts one.
    l.dof_treeid = vec![0; l.nv];
    let mut ntree = 0;
    for d in 0..l.nv {
        if l.dof_parentid[d] == -1 {
            ntree += 1;
        }
        l.dof_treeid[d] = ntree - 1;
    }
    l.ntree = ntree as usize;
    for i in 0..nbody {
        let weld = l.body_weldid[i] as usize;
        l.body_treeid[i] = if l.body_dofnum[weld] > 0 {
            l.dof_treeid[l.body_dofadr[weld] as usize]
        } else {
            -1
        };
    }

    // nM and dof_madr: each dof contributes itself plus all ancestors.
    l.dof_madr = vec![0; l.nv];
    let mut nm = 0usize;
    for d in 0..l.nv {
        l.dof_madr[d] = nm as i32;
        let mut j = d as i32;
        while j >= 0 {
            nm += 1;
            j = l.dof_parentid[j as usize];
        }
    }
    l.nm = nm;
    l.nd = 2 * nm - l.nv;

    // Subtree dof counts, reverse pass.
    for i in (1..nbody).rev() {
        l.subtreedofs[i] += l.body_dofnum[i] as usize;
        let parent = spec.bodies[i].parent;
        l.subtreedofs[parent] += l.subtreedofs[i];
    }
    l.subtreedofs[0] += l.body_dofnum[0] as usize;
    if l.subtreedofs[0] != l.nv {
        // SHOULD NOT OCCUR
        return Err(CompileError::internal("all DOFs should be in world subtree"));
    }

    // nB: per body, its subtree dofs plus the dofs of every ancestor.
    let mut nb = 0usize;
    for i in 0..nbody {
        nb += l.subtreedofs[i];
        let mut j = spec.bodies[i].parent;
        while j > 0 {
            nb += l.body_dofnum[j] as usize;
            j = spec.bodies[j].parent;
        }
    }
    l.nb = nb;

    // Trailing runs of simple-body dofs.
    l.dof_simplenum = vec![0; l.nv];
    let mut count = 0;
    for d in (0..l.nv).rev() {
        if l.body_simple[l.dof_bodyid[d] as usize] != 0 {
            count += 1;
        } else {
            count = 0;
        }
        l.dof_simplenum[d] = count;
    }

    check_planes(spec, geoms, &l)?;
    Ok(l)
}

/// Planes may only sit on bodies welded to the world.
fn check_planes(spec: &ModelSpec, geoms: &[GeomComp], l: &Layout) -> Result<()> {
    for (id, comp) in geoms.iter().enumerate() {
        if comp.gtype == GeomType::Plane && l.body_weldid[spec.geoms[id].body] != 0 {
            return Err(CompileError::physical("plane geom requires a body welded to the world")
                .with_object(ObjectType::Geom, spec.geoms[id].name.clone(), id));
        }
    }
    Ok(())
}

/// World position of every body at the reference configuration, chained
/// through the flattened tree. Used for statistics and BVH framing.
pub(crate) fn world_poses(
    spec: &ModelSpec,
) -> Vec<(Vector3<f64>, nalgebra::UnitQuaternion<f64>)> {
    let mut out = Vec::with_capacity(spec.bodies.len());
    for (i, body) in spec.bodies.iter().enumerate() {
        if i == 0 {
            out.push((Vector3::zeros(), nalgebra::UnitQuaternion::identity()));
        } else {
            let (ppos, pquat) = out[body.parent];
            out.push((ppos + pquat * body.pos, pquat * body.orient.quat));
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::compile::entity::{compile_geoms, compile_joints};
    use crate::compile::inertia::BodyInertia;

    fn layout(spec: &ModelSpec) -> Result<Layout> {
        let joints = compile_joints(spec)?;
        let geoms = compile_geoms(spec)?;
        let inertia = vec![BodyInertia::default(); spec.bodies.len()];
        assign(spec, &joints, &geoms, &inertia)
    }

    fn add_hinge(spec: &mut ModelSpec, body: usize) -> usize {
        let j = spec.add_joint(body);
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        j
    }

    #[test]
    fn single_hinge_counts() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        add_hinge(&mut spec, b);
        let l = layout(&spec).unwrap();
        assert_eq!((l.nq, l.nv), (1, 1));
        assert_eq!(l.nm, 1);
        assert_eq!(l.nd, 1);
        assert_eq!(l.ntree, 1);
        assert_eq!(l.body_weldid[1], 1);
        assert_eq!(l.body_rootid[1], 1);
        assert_eq!(l.dof_parentid[0], -1);
    }

    #[test]
    fn free_joint_mass_matrix_sizes() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        spec.bodies[b].pos = Vector3::new(0.0, 0.0, 1.0);
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Free);
        let l = layout(&spec).unwrap();
        assert_eq!((l.nq, l.nv), (7, 6));
        // Chain of 6 dofs: nM = 1+2+3+4+5+6 = 21, nD = 2*21 - 6 = 36.
        assert_eq!(l.nm, 21);
        assert_eq!(l.nd, 36);
        assert_eq!(l.qpos0, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(l.dof_madr, vec![0, 1, 3, 6, 10, 15]);
    }

    #[test]
    fn dof_chain_spans_bodies() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        add_hinge(&mut spec, a);
        let b = spec.add_body(a);
        add_hinge(&mut spec, b);
        let l = layout(&spec).unwrap();
        assert_eq!(l.dof_parentid, vec![-1, 0]);
        assert_eq!(l.nm, 3);
        assert_eq!(l.nd, 4);
        assert_eq!(l.ntree, 1);
        assert_eq!(l.body_treeid[2], 0);
        // nB: world subtree 2; body a: subtree 2; body b: subtree 1 +
        // ancestor a's 1 dof = 2. Total 2 + 2 + 2 = 6.
        assert_eq!(l.nb, 6);
    }

    #[test]
    fn sibling_trees_are_separate() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        add_hinge(&mut spec, a);
        let b = spec.add_body(0);
        add_hinge(&mut spec, b);
        let l = layout(&spec).unwrap();
        assert_eq!(l.ntree, 2);
        assert_eq!(l.dof_treeid, vec![0, 1]);
        assert_eq!(l.body_treeid[1], 0);
        assert_eq!(l.body_treeid[2], 1);
    }

    #[test]
    fn weldid_follows_jointless_chain() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        add_hinge(&mut spec, a);
        let fixed = spec.add_body(a);
        let l = layout(&spec).unwrap();
        assert_eq!(l.body_weldid[fixed], a as i32);
        assert_eq!(l.body_treeid[fixed], 0);
    }

    #[test]
    fn aligned_slider_body_is_simple_level_2() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Slide);
        spec.joints[j].params.axis = Some(Vector3::x());
        let l = layout(&spec).unwrap();
        assert_eq!(l.body_simple[1], 2);
        assert_eq!(l.dof_simplenum[0], 1);
    }

    #[test]
    fn hinge_body_is_simple_level_1() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let j = add_hinge(&mut spec, b);
        spec.joints[j].params.axis = Some(Vector3::z());
        let l = layout(&spec).unwrap();
        assert_eq!(l.body_simple[1], 1);
    }

    #[test]
    fn off_axis_joint_demotes_simplicity() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let j = add_hinge(&mut spec, b);
        spec.joints[j].params.axis = Some(Vector3::new(1.0, 1.0, 0.0));
        let l = layout(&spec).unwrap();
        assert_eq!(l.body_simple[1], 0);
    }

    #[test]
    fn child_demotes_parent_simplicity() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        add_hinge(&mut spec, a);
        let b = spec.add_body(a);
        add_hinge(&mut spec, b);
        let l = layout(&spec).unwrap();
        assert_eq!(l.body_simple[1], 0, "parent with jointed child");
    }

    #[test]
    fn plane_on_moving_body_fails() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        add_hinge(&mut spec, b);
        let g = spec.add_geom(b);
        spec.geoms[g].params.gtype = Some(GeomType::Plane);
        let err = layout(&spec).unwrap_err();
        assert!(err.to_string().contains("welded to the world"));
    }

    #[test]
    fn plane_on_fixed_body_is_fine() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let g = spec.add_geom(b);
        spec.geoms[g].params.gtype = Some(GeomType::Plane);
        assert!(layout(&spec).is_ok());
    }

    #[test]
    fn sum_of_dofnum_is_nv() {
        let mut spec = ModelSpec::new();
        let a = spec.add_body(0);
        let j = spec.add_joint(a);
        spec.joints[j].params.jtype = Some(JointType::Ball);
        let b = spec.add_body(a);
        add_hinge(&mut spec, b);
        let l = layout(&spec).unwrap();
        let total: i32 = l.body_dofnum.iter().sum();
        assert_eq!(total as usize, l.nv);
        assert_eq!(l.nv, 4);
        assert_eq!(l.nq, 5);
    }
}
