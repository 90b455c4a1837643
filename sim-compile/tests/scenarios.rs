//! End-to-end compile scenarios.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use nalgebra::Vector3;
use sim_compile::{
    AngleUnit, ErrorKind, LengthRangeMode, ModelSpec, NullHost, SweepEngine,
};
use sim_compile::spec::body::Inertial;
use sim_compile::spec::tendon::WrapSpec;
use sim_model::{JointType, ObjectType};

fn radian_spec() -> ModelSpec {
    let mut spec = ModelSpec::new();
    spec.options.angle = AngleUnit::Radian;
    spec
}

/// World plus one hinged body with a single sphere geom.
#[test]
fn minimal_hinge_model() {
    let mut spec = radian_spec();
    let b = spec.add_body(0);
    spec.bodies[b].name = "pole".to_string();
    let j = spec.add_joint(b);
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    spec.joints[j].params.axis = Some(Vector3::z());
    spec.joints[j].params.range = Some((-1.0, 1.0));
    let g = spec.add_geom(b);
    spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
    spec.geoms[g].params.density = Some(1000.0);

    let model = spec.compile().expect("compile failed");
    assert_eq!(model.nq, 1);
    assert_eq!(model.nv, 1);
    assert_eq!(model.nu, 0);
    assert_eq!(model.nbody, 2);
    assert_eq!(model.nm, 1);
    assert_eq!(model.nd, 1);
    assert_eq!(model.jnt_range[0], (-1.0, 1.0));
    // Sphere of radius 0.1 at density 1000: 4/3 pi r^3 rho.
    let expected = 4.0 / 3.0 * std::f64::consts::PI * 0.1f64.powi(3) * 1000.0;
    assert!(
        (model.body_mass[1] - expected).abs() < 1e-9,
        "mass {} vs {expected}",
        model.body_mass[1]
    );
}

/// A free body: 7 position coordinates, a 6-dof chain, dense mass matrix.
#[test]
fn free_body_model() {
    let mut spec = radian_spec();
    let b = spec.add_body(0);
    spec.bodies[b].name = "brick".to_string();
    spec.bodies[b].pos = Vector3::new(0.2, -0.1, 1.0);
    let j = spec.add_joint(b);
    spec.joints[j].params.jtype = Some(JointType::Free);
    let g = spec.add_geom(b);
    spec.geoms[g].params.gtype = Some(sim_model::GeomType::Box);
    spec.geoms[g].params.size = Some(Vector3::new(0.5, 0.5, 0.5));
    spec.geoms[g].params.density = Some(1000.0);

    let model = spec.compile().expect("compile failed");
    assert_eq!(model.nq, 7);
    assert_eq!(model.nv, 6);
    assert_eq!(model.jnt_type[0], JointType::Free);
    assert_eq!(
        &model.qpos0[..],
        &[0.2, -0.1, 1.0, 1.0, 0.0, 0.0, 0.0],
        "free joint reference is the body pose"
    );
    assert_eq!(model.nm, 21);
    assert_eq!(model.nd, 36);
    // Half-extents 0.5 give a unit cube: mass = 1000.
    assert!((model.body_mass[1] - 1000.0).abs() < 1e-9);
}

/// Static fusion folds a child's mass into its moving parent.
#[test]
fn static_fusion_merges_mass() {
    let mut spec = radian_spec();
    spec.options.fusestatic = true;
    let a = spec.add_body(0);
    spec.bodies[a].name = "carrier".to_string();
    let j = spec.add_joint(a);
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    spec.bodies[a].inertial = Some(Inertial {
        mass: 2.0,
        pos: Vector3::new(1.0, 0.0, 0.0),
        diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
        ..Inertial::default()
    });
    let b = spec.add_body(a);
    spec.bodies[b].name = "payload".to_string();
    spec.bodies[b].inertial = Some(Inertial {
        mass: 3.0,
        diaginertia: Some(Vector3::new(1.0, 1.0, 1.0)),
        ..Inertial::default()
    });

    let model = spec.compile().expect("compile failed");
    assert_eq!(model.nbody, 2, "payload fused into carrier");
    assert!((model.body_mass[1] - 5.0).abs() < 1e-12);
    // COM: (2*1 + 3*0) / 5 along x.
    assert!(
        (model.body_ipos[1].x - 0.4).abs() < 1e-12,
        "ipos {:?}",
        model.body_ipos[1]
    );
}

/// Duplicate names within a kind fail with the offending name.
#[test]
fn duplicate_geom_names_fail() {
    let mut spec = radian_spec();
    for _ in 0..2 {
        let g = spec.add_geom(0);
        spec.geoms[g].name = "foo".to_string();
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
    }
    assert!(spec.compile().is_none());
    let err = spec.last_error().unwrap();
    assert_eq!(err.kind, ErrorKind::ParseOrSpec);
    assert!(err.to_string().contains("repeated name 'foo' in geom"));
}

/// Triangle-inequality violations fail, unless balancing repairs them.
#[test]
fn triangle_inequality_scenario() {
    let build = |balance: bool| {
        let mut spec = radian_spec();
        spec.options.balanceinertia = balance;
        let b = spec.add_body(0);
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        spec.bodies[b].inertial = Some(Inertial {
            mass: 1.0,
            diaginertia: Some(Vector3::new(1.0, 1.0, 3.0)),
            ..Inertial::default()
        });
        spec
    };

    let mut failing = build(false);
    assert!(failing.compile().is_none());
    assert_eq!(failing.last_error().unwrap().kind, ErrorKind::Physical);

    let mut repaired = build(true);
    let model = repaired.compile().expect("balanced compile succeeds");
    for k in 0..3 {
        assert!((model.body_inertia[1][k] - 5.0 / 3.0).abs() < 1e-12);
    }
}

fn lengthrange_spec() -> ModelSpec {
    let mut spec = radian_spec();
    spec.options.lengthrange.mode = LengthRangeMode::All;
    spec.options.lengthrange.useexisting = false;
    for (i, coef) in [1.0, 2.0].into_iter().enumerate() {
        let b = spec.add_body(0);
        spec.bodies[b].name = format!("link{i}");
        let j = spec.add_joint(b);
        spec.joints[j].name = format!("hinge{i}");
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        spec.joints[j].params.range = Some((0.0, std::f64::consts::FRAC_PI_2));
        let g = spec.add_geom(b);
        spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        let t = spec.add_tendon();
        spec.tendons[t].name = format!("cable{i}");
        spec.tendons[t].path = vec![WrapSpec::Joint {
            joint: format!("hinge{i}"),
            coef,
        }];
        let a = spec.add_actuator();
        spec.actuators[a].name = format!("motor{i}");
        spec.actuators[a].target =
            sim_compile::spec::actuator::ActuatorTarget::Tendon(format!("cable{i}"));
    }
    spec
}

/// Tendon actuators get length ranges; the threaded result matches the
/// single-threaded one.
#[test]
fn length_range_scenario() {
    let mut spec = lengthrange_spec();
    let threaded = spec.compile().expect("compile failed");
    let (lo0, hi0) = threaded.actuator_lengthrange[0];
    let (lo1, hi1) = threaded.actuator_lengthrange[1];
    assert!(lo0 < hi0);
    assert!(hi0 < hi1, "coef 2 doubles the excursion: {hi0} vs {hi1}");
    assert!((hi0 - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    assert!((lo0 - 0.0).abs() < 1e-9 && (lo1 - 0.0).abs() < 1e-9);

    let mut single_spec = lengthrange_spec();
    single_spec.options.lengthrange.usethread = false;
    let single = single_spec
        .compile_with(&sim_compile::DirResources, &SweepEngine, &NullHost)
        .expect("single-threaded compile failed");
    assert_eq!(
        threaded.actuator_lengthrange,
        single.actuator_lengthrange
    );
}

/// A free joint below the top level is rejected.
#[test]
fn nested_free_joint_fails() {
    let mut spec = radian_spec();
    let a = spec.add_body(0);
    let j0 = spec.add_joint(a);
    spec.joints[j0].params.jtype = Some(JointType::Hinge);
    let b = spec.add_body(a);
    let j = spec.add_joint(b);
    spec.joints[j].params.jtype = Some(JointType::Free);
    assert!(spec.compile().is_none());
    assert_eq!(spec.last_error().unwrap().kind, ErrorKind::Physical);
}

/// A moving body with no mass anywhere in its weld group is rejected.
#[test]
fn massless_moving_body_fails() {
    let mut spec = radian_spec();
    let b = spec.add_body(0);
    let j = spec.add_joint(b);
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    assert!(spec.compile().is_none());
    assert_eq!(spec.last_error().unwrap().kind, ErrorKind::Physical);
}

/// Post-compile name lookup goes through the packed hash map.
#[test]
fn packed_name_lookup() {
    let mut spec = radian_spec();
    let b = spec.add_body(0);
    spec.bodies[b].name = "torso".to_string();
    let j = spec.add_joint(b);
    spec.joints[j].name = "waist".to_string();
    spec.joints[j].params.jtype = Some(JointType::Hinge);
    let g = spec.add_geom(b);
    spec.geoms[g].name = "shell".to_string();
    spec.geoms[g].params.size = Some(Vector3::new(0.1, 0.0, 0.0));

    let model = spec.compile().expect("compile failed");
    assert_eq!(model.model_name(), "model");
    assert_eq!(model.name2id(ObjectType::Body, "torso"), Some(1));
    assert_eq!(model.name2id(ObjectType::Joint, "waist"), Some(0));
    assert_eq!(model.name2id(ObjectType::Geom, "shell"), Some(0));
    assert_eq!(model.name2id(ObjectType::Geom, "missing"), None);
    assert_eq!(model.id2name(ObjectType::Body, 1), "torso");
}
