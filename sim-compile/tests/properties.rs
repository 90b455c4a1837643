//! Structural invariants of compiled models.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use nalgebra::{Matrix3, Vector3};
use sim_compile::spec::body::Inertial;
use sim_compile::{AngleUnit, ModelSpec};
use sim_model::{JointType, Model};

/// A branching articulated model that exercises every joint type.
fn articulated_spec() -> ModelSpec {
    let mut spec = ModelSpec::new();
    spec.options.angle = AngleUnit::Radian;

    // Floating base with a box.
    let base = spec.add_body(0);
    spec.bodies[base].name = "base".to_string();
    spec.bodies[base].pos = Vector3::new(0.0, 0.0, 1.0);
    let j = spec.add_joint(base);
    spec.joints[j].params.jtype = Some(JointType::Free);
    let g = spec.add_geom(base);
    spec.geoms[g].params.gtype = Some(sim_model::GeomType::Box);
    spec.geoms[g].params.size = Some(Vector3::new(0.2, 0.1, 0.05));

    // Ball-jointed arm.
    let arm = spec.add_body(base);
    spec.bodies[arm].name = "arm".to_string();
    spec.bodies[arm].pos = Vector3::new(0.2, 0.0, 0.0);
    let j = spec.add_joint(arm);
    spec.joints[j].params.jtype = Some(JointType::Ball);
    let g = spec.add_geom(arm);
    spec.geoms[g].params.gtype = Some(sim_model::GeomType::Capsule);
    spec.geoms[g].params.size = Some(Vector3::new(0.03, 0.15, 0.0));

    // Hinged leg with a slide extension.
    let leg = spec.add_body(base);
    spec.bodies[leg].name = "leg".to_string();
    spec.bodies[leg].pos = Vector3::new(-0.2, 0.0, 0.0);
    let j = spec.add_joint(leg);
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    spec.joints[j].params.axis = Some(Vector3::y());
    let g = spec.add_geom(leg);
    spec.geoms[g].params.size = Some(Vector3::new(0.05, 0.0, 0.0));

    let foot = spec.add_body(leg);
    spec.bodies[foot].name = "foot".to_string();
    spec.bodies[foot].pos = Vector3::new(0.0, 0.0, -0.3);
    let j = spec.add_joint(foot);
    spec.joints[j].params.jtype = Some(JointType::Slide);
    spec.joints[j].params.axis = Some(Vector3::z());
    let g = spec.add_geom(foot);
    spec.geoms[g].params.size = Some(Vector3::new(0.04, 0.0, 0.0));

    // A second, independent hinge chain.
    let tail = spec.add_body(0);
    spec.bodies[tail].name = "tail".to_string();
    let j = spec.add_joint(tail);
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    let g = spec.add_geom(tail);
    spec.geoms[g].params.size = Some(Vector3::new(0.05, 0.0, 0.0));

    spec
}

fn compiled() -> Model {
    articulated_spec().compile().expect("compile failed")
}

#[test]
fn dof_counts_are_consistent() {
    let m = compiled();
    let dof_sum: i32 = m.body_dofnum.iter().sum();
    assert_eq!(dof_sum as usize, m.nv);

    let nq_sum: usize = m.jnt_type.iter().map(|t| t.nq()).sum();
    assert_eq!(nq_sum, m.nq);
    let nv_sum: usize = m.jnt_type.iter().map(|t| t.nv()).sum();
    assert_eq!(nv_sum, m.nv);

    assert_eq!(m.nd, 2 * m.nm - m.nv);
}

#[test]
fn madr_deltas_are_dof_depths() {
    let m = compiled();
    let depth = |mut d: i32| {
        let mut count = 0;
        while d >= 0 {
            count += 1;
            d = m.dof_parentid[d as usize];
        }
        count
    };
    for i in 0..m.nv {
        let next = if i + 1 < m.nv {
            m.dof_madr[i + 1]
        } else {
            m.nm as i32
        };
        assert_eq!(
            next - m.dof_madr[i],
            depth(i as i32),
            "dof {i} mass-matrix row width"
        );
    }
}

#[test]
fn rootids_follow_the_tree() {
    let m = compiled();
    for i in 1..m.nbody {
        let parent = m.body_parentid[i] as usize;
        if parent == 0 {
            assert_eq!(m.body_rootid[i], i as i32);
        } else {
            assert_eq!(m.body_rootid[i], m.body_rootid[parent]);
        }
    }
}

#[test]
fn weldids_follow_joints() {
    let m = compiled();
    for i in 1..m.nbody {
        let parent = m.body_parentid[i] as usize;
        if m.body_jntnum[i] > 0 {
            assert_eq!(m.body_weldid[i], i as i32);
        } else {
            assert_eq!(m.body_weldid[i], m.body_weldid[parent]);
        }
    }
}

#[test]
fn pair_and_exclude_signatures_are_sorted() {
    let mut spec = ModelSpec::new();
    spec.options.angle = AngleUnit::Radian;
    let names = ["a", "b", "c"];
    for name in names {
        let b = spec.add_body(0);
        spec.bodies[b].name = name.to_string();
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        let g = spec.add_geom(b);
        spec.geoms[g].name = format!("g_{name}");
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
    }
    // Declare pairs and excludes in reverse signature order.
    for (g1, g2) in [("g_b", "g_c"), ("g_a", "g_c"), ("g_a", "g_b")] {
        let p = spec.add_pair();
        spec.pairs[p].geom1 = g1.to_string();
        spec.pairs[p].geom2 = g2.to_string();
    }
    for (b1, b2) in [("b", "c"), ("c", "a"), ("a", "b")] {
        let e = spec.add_exclude();
        spec.excludes[e].body1 = b1.to_string();
        spec.excludes[e].body2 = b2.to_string();
    }

    let m = spec.compile().expect("compile failed");
    for i in 0..m.npair {
        let sig = m.pair_signature[i];
        let (b1, b2) = ((sig >> 16) as usize, (sig & 0xffff) as usize);
        assert!(b1 <= b2, "pair {i} body order");
        let g1 = m.pair_geom1[i] as usize;
        assert_eq!(m.geom_bodyid[g1] as usize, b1, "geom order matches key");
        if i > 0 {
            assert!(m.pair_signature[i - 1] <= sig, "pair sort");
        }
    }
    for i in 1..m.nexclude {
        assert!(m.exclude_signature[i - 1] <= m.exclude_signature[i]);
    }
    for &sig in &m.exclude_signature {
        assert!((sig >> 16) <= (sig & 0xffff));
    }
}

#[test]
fn keyframe_quaternions_are_normalized() {
    let mut spec = articulated_spec();
    let nq = 7 + 4 + 1 + 1 + 1;
    let mut qpos = vec![0.0; nq];
    // Unnormalized free-joint and ball quaternions.
    qpos[3] = 2.0;
    qpos[4] = 2.0;
    qpos[7] = 0.0;
    qpos[8] = 3.0;
    let k = spec.add_key();
    spec.keys[k].qpos = Some(qpos);

    let m = spec.compile().expect("compile failed");
    assert_eq!(m.nkey, 1);
    for j in 0..m.njnt {
        let offset = match m.jnt_type[j] {
            JointType::Ball => 0,
            JointType::Free => 3,
            _ => continue,
        };
        let adr = m.jnt_qposadr[j] as usize + offset;
        let q = &m.key_qpos[adr..adr + 4];
        let norm: f64 = q.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6, "joint {j} quat norm {norm}");
    }
}

#[test]
fn recompile_after_copy_back_is_identical() {
    let mut spec = articulated_spec();
    let first = spec.compile().expect("first compile");
    assert!(spec.copy_back(&first));
    let second = spec.compile().expect("second compile");

    assert_eq!(first.nq, second.nq);
    assert_eq!(first.nv, second.nv);
    assert_eq!(first.nm, second.nm);
    assert_eq!(first.qpos0, second.qpos0);
    assert_eq!(first.qpos_spring, second.qpos_spring);
    assert_eq!(first.body_mass, second.body_mass);
    assert_eq!(first.jnt_range, second.jnt_range);
    assert_eq!(first.dof_madr, second.dof_madr);
    assert_eq!(first.names, second.names);
    assert_eq!(first.names_map, second.names_map);
    assert_eq!(first.narena, second.narena);
    for i in 0..first.nbody {
        assert!((first.body_ipos[i] - second.body_ipos[i]).norm() < 1e-12);
        assert!((first.body_inertia[i] - second.body_inertia[i]).norm() < 1e-12);
    }
}

/// The inertia tensor of the weld group is preserved by static fusion: the
/// fused body's tensor equals the sum of the originals, both expressed at
/// the same point in the parent frame.
#[test]
fn fusion_preserves_group_inertia() {
    let build = |fuse: bool| {
        let mut spec = ModelSpec::new();
        spec.options.angle = AngleUnit::Radian;
        spec.options.fusestatic = fuse;
        let a = spec.add_body(0);
        spec.bodies[a].name = "a".to_string();
        let j = spec.add_joint(a);
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        spec.bodies[a].inertial = Some(Inertial {
            mass: 2.0,
            pos: Vector3::new(0.1, 0.0, 0.0),
            diaginertia: Some(Vector3::new(0.4, 0.5, 0.6)),
            ..Inertial::default()
        });
        let b = spec.add_body(a);
        spec.bodies[b].name = "b".to_string();
        spec.bodies[b].pos = Vector3::new(0.0, 0.3, 0.0);
        spec.bodies[b].inertial = Some(Inertial {
            mass: 1.0,
            pos: Vector3::new(0.0, 0.1, 0.2),
            diaginertia: Some(Vector3::new(0.2, 0.2, 0.3)),
            ..Inertial::default()
        });
        spec.compile().expect("compile failed")
    };

    // Tensor about the parent origin from packed inertial data.
    let tensor_at_origin = |m: &Model| {
        let mut total = Matrix3::zeros();
        let mut body = 1;
        while body < m.nbody {
            let rot = m.body_iquat[body].to_rotation_matrix();
            let global =
                rot * Matrix3::from_diagonal(&m.body_inertia[body]) * rot.transpose();
            // Parent-frame COM offset: for the unfused child, compose its
            // body frame first.
            let mut d = m.body_ipos[body];
            if m.body_parentid[body] != 0 {
                let parent_offset = m.body_pos[body];
                d = parent_offset + m.body_quat[body] * d;
            }
            let shift = m.body_mass[body]
                * (Matrix3::identity() * d.dot(&d) - d * d.transpose());
            total += global + shift;
            body += 1;
        }
        total
    };

    let unfused = build(false);
    let fused = build(true);
    assert_eq!(fused.nbody, 2);
    assert_eq!(unfused.nbody, 3);

    let total_mass_unfused: f64 = unfused.body_mass.iter().sum();
    let total_mass_fused: f64 = fused.body_mass.iter().sum();
    assert!((total_mass_unfused - total_mass_fused).abs() < 1e-12);

    let t1 = tensor_at_origin(&unfused);
    let t2 = tensor_at_origin(&fused);
    assert!(
        (t1 - t2).norm() < 1e-9,
        "inertia tensors differ:\n{t1}\n{t2}"
    );
}
