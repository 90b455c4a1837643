//! Per-entity compilation.
//!
//! Resolves defaultable parameters to concrete values, validates geometry,
//! and derives per-geom mass/inertia/bounds. The outputs are parallel `Comp`
//! arrays indexed by packed entity ids; the spec itself stays author-level.

use nalgebra::{UnitQuaternion, Vector3};
use sim_model::{GeomType, JointType, ObjectType};

use crate::error::{CompileError, Result};
use crate::options::CompilerOptions;
use crate::orientation::{AltOrientation, Orientation};
use crate::spec::ModelSpec;

/// Values below this count as zero.
pub(crate) const MINVAL: f64 = 1e-15;
/// Stand-in for unbounded extents.
pub(crate) const MAXVAL: f64 = 1e10;

/// Default contact solver reference.
pub(crate) const DEFAULT_SOLREF: [f64; 2] = [0.02, 1.0];
/// Default contact solver impedance.
pub(crate) const DEFAULT_SOLIMP: [f64; 5] = [0.9, 0.95, 0.001, 0.5, 2.0];

/// Fully-resolved geom.
#[derive(Debug, Clone)]
pub(crate) struct GeomComp {
    pub gtype: GeomType,
    pub size: Vector3<f64>,
    pub pos: Vector3<f64>,
    pub quat: UnitQuaternion<f64>,
    pub contype: u32,
    pub conaffinity: u32,
    pub condim: i32,
    pub group: i32,
    pub priority: i32,
    pub friction: Vector3<f64>,
    pub solmix: f64,
    pub solref: [f64; 2],
    pub solimp: [f64; 5],
    pub margin: f64,
    pub gap: f64,
    pub rgba: [f32; 4],
    /// Mesh or hfield asset id; -1 for primitives.
    pub dataid: i32,
    /// Material id, resolved later; -1 until then.
    pub matid: i32,
    pub mass: f64,
    /// Diagonal inertia in the geom frame.
    pub inertia: Vector3<f64>,
    /// Local AABB, center + half-size.
    pub aabb: [f64; 6],
    pub rbound: f64,
    pub fluid: [f64; 12],
}

impl GeomComp {
    /// Visual-only geoms take no part in collision or inertia grouping.
    pub fn is_visual(&self) -> bool {
        self.contype == 0 && self.conaffinity == 0
    }
}

/// Fully-resolved joint.
#[derive(Debug, Clone)]
pub(crate) struct JointComp {
    pub jtype: JointType,
    pub pos: Vector3<f64>,
    pub axis: Vector3<f64>,
    pub group: i32,
    pub limited: bool,
    pub range: (f64, f64),
    pub actfrclimited: bool,
    pub actfrcrange: (f64, f64),
    pub stiffness: f64,
    pub springref: f64,
    pub refpos: f64,
    pub damping: f64,
    pub armature: f64,
    pub frictionloss: f64,
    pub margin: f64,
    pub solref_limit: [f64; 2],
    pub solimp_limit: [f64; 5],
    pub solref_friction: [f64; 2],
    pub solimp_friction: [f64; 5],
}

/// Fully-resolved site.
#[derive(Debug, Clone)]
pub(crate) struct SiteComp {
    pub stype: GeomType,
    pub size: Vector3<f64>,
    pub pos: Vector3<f64>,
    pub quat: UnitQuaternion<f64>,
    pub group: i32,
    pub rgba: [f32; 4],
    pub matid: i32,
}

/// Compile every geom. Mesh and hfield references resolve here because the
/// derived mass needs the asset data.
pub(crate) fn compile_geoms(spec: &ModelSpec) -> Result<Vec<GeomComp>> {
    let mut out = Vec::with_capacity(spec.geoms.len());
    for (id, geom) in spec.geoms.iter().enumerate() {
        let ctx = |e: CompileError| e.with_object(ObjectType::Geom, geom.name.clone(), id);
        out.push(compile_geom(spec, id).map_err(ctx)?);
    }
    Ok(out)
}

fn compile_geom(spec: &ModelSpec, id: usize) -> Result<GeomComp> {
    let geom = &spec.geoms[id];
    let p = &geom.params;
    let gtype = p.gtype.unwrap_or(GeomType::Sphere);
    let mut size = p.size.unwrap_or_else(Vector3::zeros);
    let mut pos = geom.pos;
    let mut quat = geom.orient.quat;

    for k in 0..3 {
        if size[k].is_nan() {
            return Err(CompileError::geometry("nan size in geom"));
        }
        if size[k] < 0.0 {
            return Err(CompileError::geometry(format!(
                "negative size {} in geom",
                size[k]
            )));
        }
    }

    // fromto overrides position and orientation along the segment.
    if let Some(ft) = geom.fromto {
        if !matches!(
            gtype,
            GeomType::Capsule | GeomType::Cylinder | GeomType::Ellipsoid | GeomType::Box
        ) {
            return Err(CompileError::geometry(format!(
                "fromto requires a capsule, cylinder, ellipsoid or box geom, not {gtype:?}"
            )));
        }
        let from = Vector3::new(ft[0], ft[1], ft[2]);
        let to = Vector3::new(ft[3], ft[4], ft[5]);
        let dir = to - from;
        let len = dir.norm();
        if len < MINVAL {
            return Err(CompileError::geometry("fromto segment has zero length"));
        }
        pos = (from + to) / 2.0;
        let orient = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::ZAxis([dir.x, dir.y, dir.z])),
        };
        // The z-axis form cannot fail here: the length was checked above.
        quat = orient
            .resolve(&CompilerOptions::default())
            .map_err(CompileError::from)?;
        let half = len / 2.0;
        match gtype {
            GeomType::Capsule | GeomType::Cylinder => size[1] = half,
            GeomType::Ellipsoid | GeomType::Box => size[2] = half,
            _ => {}
        }
    }

    // Required positive sizes per type.
    let required: &[usize] = match gtype {
        GeomType::Sphere => &[0],
        GeomType::Capsule | GeomType::Cylinder => &[0, 1],
        GeomType::Ellipsoid | GeomType::Box => &[0, 1, 2],
        GeomType::Plane | GeomType::Mesh | GeomType::HField | GeomType::Sdf => &[],
    };
    for &k in required {
        if size[k] < MINVAL {
            return Err(CompileError::geometry(format!(
                "size {k} must be positive in {gtype:?} geom"
            )));
        }
    }

    // Asset resolution.
    let mut dataid = -1i32;
    let mut mesh = None;
    match gtype {
        GeomType::Mesh => {
            let name = geom.mesh.as_deref().ok_or_else(|| {
                CompileError::reference("mesh geom has no mesh reference")
            })?;
            let mid = spec
                .find_object(ObjectType::Mesh, name)
                .ok_or_else(|| CompileError::reference(format!("unknown mesh '{name}'")))?;
            dataid = mid as i32;
            mesh = Some(&spec.meshes[mid]);
        }
        GeomType::HField => {
            let name = geom.hfield.as_deref().ok_or_else(|| {
                CompileError::reference("hfield geom has no hfield reference")
            })?;
            let hid = spec
                .find_object(ObjectType::HField, name)
                .ok_or_else(|| CompileError::reference(format!("unknown hfield '{name}'")))?;
            dataid = hid as i32;
            // The geom inherits the asset's half-sizes for bounds and mass.
            let hs = spec.hfields[hid].size;
            size = Vector3::new(hs[0], hs[1], hs[2]);
        }
        _ => {
            if geom.mesh.is_some() || geom.hfield.is_some() {
                return Err(CompileError::reference(format!(
                    "asset reference requires a mesh or hfield geom, not {gtype:?}"
                )));
            }
        }
    }

    // Compose the mesh's removed re-centering transform into the geom pose.
    if let Some(m) = mesh {
        pos += quat * m.refpos;
        quat *= m.refquat;
    }

    // Mass and diagonal inertia at unit orientation.
    let volume = match gtype {
        GeomType::Sphere => 4.0 * std::f64::consts::PI * size[0].powi(3) / 3.0,
        GeomType::Capsule => {
            let height = 2.0 * size[1];
            std::f64::consts::PI
                * (size[0] * size[0] * height + 4.0 * size[0].powi(3) / 3.0)
        }
        GeomType::Cylinder => std::f64::consts::PI * size[0] * size[0] * 2.0 * size[1],
        GeomType::Ellipsoid => 4.0 * std::f64::consts::PI * size[0] * size[1] * size[2] / 3.0,
        GeomType::Box | GeomType::HField => 8.0 * size[0] * size[1] * size[2],
        GeomType::Mesh | GeomType::Sdf => mesh.map_or(0.0, |m| m.volume),
        GeomType::Plane => 0.0,
    };
    let density = p.density.unwrap_or(1000.0);
    let mass = match p.mass {
        Some(m) => {
            if m < 0.0 || m.is_nan() {
                return Err(CompileError::physical(format!("negative mass {m} in geom")));
            }
            m
        }
        None => density * volume,
    };
    // Effective density backs out the inertia of explicit-mass geoms.
    let eff_density = if volume > MINVAL { mass / volume } else { 0.0 };
    let inertia = geom_inertia(gtype, size, mass, mesh, eff_density);

    // Local bounds.
    let (aabb, rbound) = geom_bounds(gtype, size, mesh, spec, dataid);

    // Fluid interaction.
    let mut fluid = [0.0; 12];
    if p.fluidshape.unwrap_or(false) {
        let coef = p.fluidcoef.unwrap_or([0.5, 0.25, 1.5, 0.7, 1.0]);
        fluid = fluid_interaction(gtype, size, coef);
    }

    Ok(GeomComp {
        gtype,
        size,
        pos,
        quat,
        contype: p.contype.unwrap_or(1),
        conaffinity: p.conaffinity.unwrap_or(1),
        condim: p.condim.unwrap_or(3),
        group: p.group.unwrap_or(0),
        priority: p.priority.unwrap_or(0),
        friction: p.friction.unwrap_or_else(|| Vector3::new(1.0, 0.005, 0.0001)),
        solmix: p.solmix.unwrap_or(1.0),
        solref: p.solref.unwrap_or(DEFAULT_SOLREF),
        solimp: p.solimp.unwrap_or(DEFAULT_SOLIMP),
        margin: p.margin.unwrap_or(0.0),
        gap: p.gap.unwrap_or(0.0),
        rgba: p.rgba.unwrap_or([0.5, 0.5, 0.5, 1.0]),
        dataid,
        matid: -1,
        mass,
        inertia,
        aabb,
        rbound,
        fluid,
    })
}

fn geom_inertia(
    gtype: GeomType,
    size: Vector3<f64>,
    mass: f64,
    mesh: Option<&crate::spec::asset::Mesh>,
    eff_density: f64,
) -> Vector3<f64> {
    match gtype {
        GeomType::Sphere => Vector3::repeat(2.0 * mass * size[0] * size[0] / 5.0),
        GeomType::Capsule => {
            let height = 2.0 * size[1];
            let radius = size[0];
            let sphere_mass = mass * 4.0 * radius / (4.0 * radius + 3.0 * height);
            let cylinder_mass = mass - sphere_mass;
            let mut ixy = cylinder_mass * (3.0 * radius * radius + height * height) / 12.0;
            let mut iz = cylinder_mass * radius * radius / 2.0;
            let sphere_inertia = 2.0 * sphere_mass * radius * radius / 5.0;
            ixy += sphere_inertia + sphere_mass * height * (3.0 * radius + 2.0 * height) / 8.0;
            iz += sphere_inertia;
            Vector3::new(ixy, ixy, iz)
        }
        GeomType::Cylinder => {
            let height = 2.0 * size[1];
            let ixy = mass * (3.0 * size[0] * size[0] + height * height) / 12.0;
            Vector3::new(ixy, ixy, mass * size[0] * size[0] / 2.0)
        }
        GeomType::Ellipsoid => Vector3::new(
            mass * (size[1] * size[1] + size[2] * size[2]) / 5.0,
            mass * (size[0] * size[0] + size[2] * size[2]) / 5.0,
            mass * (size[0] * size[0] + size[1] * size[1]) / 5.0,
        ),
        GeomType::Box | GeomType::HField => Vector3::new(
            mass * (size[1] * size[1] + size[2] * size[2]) / 3.0,
            mass * (size[0] * size[0] + size[2] * size[2]) / 3.0,
            mass * (size[0] * size[0] + size[1] * size[1]) / 3.0,
        ),
        GeomType::Mesh | GeomType::Sdf => {
            mesh.map_or_else(Vector3::zeros, |m| m.inertia * eff_density)
        }
        GeomType::Plane => Vector3::zeros(),
    }
}

fn geom_bounds(
    gtype: GeomType,
    size: Vector3<f64>,
    mesh: Option<&crate::spec::asset::Mesh>,
    spec: &ModelSpec,
    dataid: i32,
) -> ([f64; 6], f64) {
    match gtype {
        GeomType::Sphere => (
            [0.0, 0.0, 0.0, size[0], size[0], size[0]],
            size[0],
        ),
        GeomType::Capsule => (
            [0.0, 0.0, 0.0, size[0], size[0], size[0] + size[1]],
            size[0] + size[1],
        ),
        GeomType::Cylinder => (
            [0.0, 0.0, 0.0, size[0], size[0], size[1]],
            (size[0] * size[0] + size[1] * size[1]).sqrt(),
        ),
        GeomType::Ellipsoid => (
            [0.0, 0.0, 0.0, size[0], size[1], size[2]],
            size[0].max(size[1]).max(size[2]),
        ),
        GeomType::Box => (
            [0.0, 0.0, 0.0, size[0], size[1], size[2]],
            (size[0] * size[0] + size[1] * size[1] + size[2] * size[2]).sqrt(),
        ),
        GeomType::Plane => (
            [0.0, 0.0, -MAXVAL / 2.0, MAXVAL, MAXVAL, MAXVAL / 2.0],
            0.0,
        ),
        GeomType::HField => {
            let hs = spec.hfields[dataid as usize].size;
            let center = (hs[2] - hs[3]) / 2.0;
            let half = (hs[2] + hs[3]) / 2.0;
            (
                [0.0, 0.0, center, hs[0], hs[1], half],
                (hs[0] * hs[0] + hs[1] * hs[1] + hs[2].max(hs[3]).powi(2)).sqrt(),
            )
        }
        GeomType::Mesh | GeomType::Sdf => {
            let aabb = mesh.map_or([0.0; 6], |m| m.aabb);
            let h = [
                aabb[0].abs() + aabb[3],
                aabb[1].abs() + aabb[4],
                aabb[2].abs() + aabb[5],
            ];
            (aabb, (h[0] * h[0] + h[1] * h[1] + h[2] * h[2]).sqrt())
        }
    }
}

/// Added-mass coefficient of the equivalent ellipsoid along its first axis.
///
/// 15-point Gauss-Kronrod quadrature of
/// `dx*dy*dz / ((dx^2+l) * sqrt((dx^2+l)(dy^2+l)(dz^2+l)))` over `[0, inf)`,
/// with the change of variables `l = x^3 / (1-x)^2`.
fn added_mass_kappa(dx: f64, dy: f64, dz: f64) -> f64 {
    const KRONROD_W: [f64; 15] = [
        0.011_467_66, 0.031_546_05, 0.052_395_01, 0.070_326_63, 0.084_502_36,
        0.095_175_29, 0.102_216_47, 0.104_741_07, 0.102_216_47, 0.095_175_29,
        0.084_502_36, 0.070_326_63, 0.052_395_01, 0.031_546_05, 0.011_467_66,
    ];
    const KRONROD_L: [f64; 15] = [
        7.865_151_709_349_917e-8,
        1.734_797_691_390_727_4e-5,
        3.548_008_144_506_193e-4,
        2.846_636_252_924_549e-3,
        1.409_426_090_359_607_7e-2,
        5.306_326_172_739_663_6e-2,
        0.170_419_787_413_177_73,
        0.5,
        1.403_630_154_868_699_1,
        3.935_348_482_702_264_2,
        11.644_841_677_041_734,
        39.531_878_074_109_03,
        177.571_136_222_080_1,
        1_429.477_291_293_739_7,
        54_087.416_549_217_705,
    ];
    const KRONROD_D: [f64; 15] = [
        5.538_677_720_489_877e-5,
        2.080_868_285_293_228e-3,
        1.651_412_652_072_316_6e-2,
        7.261_900_344_370_877e-2,
        0.239_852_434_018_626_02,
        0.686_831_824_902_072_5,
        1.855_112_951_918_289_4,
        5.0,
        14.060_031_152_313_941,
        43.289_412_396_110_09,
        156.585_463_763_971_12,
        747.982_608_530_502_4,
        5_827.404_295_002_711_5,
        116_754.019_794_451_2,
        25_482_945.327_264_845,
    ];

    let invdx2 = 1.0 / (dx * dx);
    let invdy2 = 1.0 / (dy * dy);
    let invdz2 = 1.0 / (dz * dz);
    let scale = (dx * dx * dx * dy * dz).powf(0.4);
    let mut kappa = 0.0;
    for i in 0..15 {
        let lambda = scale * KRONROD_L[i];
        let denom = (1.0 + lambda * invdx2)
            * ((1.0 + lambda * invdx2) * (1.0 + lambda * invdy2) * (1.0 + lambda * invdz2))
                .sqrt();
        kappa += scale * KRONROD_D[i] / denom * KRONROD_W[i];
    }
    kappa * invdx2
}

/// Pack the 12-element fluid interaction vector for an ellipsoid-equivalent
/// geom: enable flag, the five drag coefficients, then virtual mass and
/// virtual inertia per axis.
fn fluid_interaction(gtype: GeomType, size: Vector3<f64>, coef: [f64; 5]) -> [f64; 12] {
    let (dx, dy, dz) = match gtype {
        GeomType::Sphere => (size[0], size[0], size[0]),
        GeomType::Capsule => (size[0], size[0], size[1] + size[0]),
        GeomType::Cylinder => (size[0], size[0], size[1]),
        _ => (size[0], size[1], size[2]),
    };
    let volume = 4.0 / 3.0 * std::f64::consts::PI * dx * dy * dz;

    // Invariant to permutation of the last two arguments.
    let kx = added_mass_kappa(dx, dy, dz);
    let ky = added_mass_kappa(dy, dz, dx);
    let kz = added_mass_kappa(dz, dx, dy);

    let pow2 = |v: f64| v * v;
    let ixfac = pow2(dy * dy - dz * dz) * (kz - ky).abs()
        / MINVAL.max((2.0 * (dy * dy - dz * dz) + (dy * dy + dz * dz) * (ky - kz)).abs());
    let iyfac = pow2(dz * dz - dx * dx) * (kx - kz).abs()
        / MINVAL.max((2.0 * (dz * dz - dx * dx) + (dz * dz + dx * dx) * (kz - kx)).abs());
    let izfac = pow2(dx * dx - dy * dy) * (ky - kx).abs()
        / MINVAL.max((2.0 * (dx * dx - dy * dy) + (dx * dx + dy * dy) * (kx - ky)).abs());

    [
        1.0,
        coef[0],
        coef[1],
        coef[2],
        coef[3],
        coef[4],
        volume * kx / MINVAL.max(2.0 - kx),
        volume * ky / MINVAL.max(2.0 - ky),
        volume * kz / MINVAL.max(2.0 - kz),
        volume * ixfac / 5.0,
        volume * iyfac / 5.0,
        volume * izfac / 5.0,
    ]
}

/// Compile every joint.
pub(crate) fn compile_joints(spec: &ModelSpec) -> Result<Vec<JointComp>> {
    let mut out = Vec::with_capacity(spec.joints.len());
    for (id, joint) in spec.joints.iter().enumerate() {
        let ctx = |e: CompileError| e.with_object(ObjectType::Joint, joint.name.clone(), id);
        let p = &joint.params;
        let jtype = p.jtype.unwrap_or(JointType::Hinge);

        let mut axis = p.axis.unwrap_or_else(Vector3::z);
        if matches!(jtype, JointType::Hinge | JointType::Slide) {
            let norm = axis.norm();
            if norm < MINVAL {
                return Err(ctx(CompileError::geometry("joint axis is degenerate")));
            }
            axis /= norm;
        } else {
            axis = Vector3::z();
        }

        // Angular quantities arrive in the author's angle unit.
        let angular = matches!(jtype, JointType::Hinge | JointType::Ball);
        let convert = |v: f64| {
            if angular {
                spec.options.to_radians(v)
            } else {
                v
            }
        };
        let range = p.range.map_or((0.0, 0.0), |(lo, hi)| (convert(lo), convert(hi)));
        let limited = p.limited.unwrap_or(range.0 < range.1);
        if limited && range.0 >= range.1 {
            return Err(ctx(CompileError::spec(format!(
                "invalid joint range ({}, {})",
                range.0, range.1
            ))));
        }
        if limited && jtype == JointType::Free {
            return Err(ctx(CompileError::spec("free joint cannot have limits")));
        }
        let actfrcrange = p.actfrcrange.unwrap_or((0.0, 0.0));
        let actfrclimited = p.actfrclimited.unwrap_or(actfrcrange.0 < actfrcrange.1);

        out.push(JointComp {
            jtype,
            pos: if jtype == JointType::Free {
                Vector3::zeros()
            } else {
                joint.pos
            },
            axis,
            group: p.group.unwrap_or(0),
            limited,
            range,
            actfrclimited,
            actfrcrange,
            stiffness: p.stiffness.unwrap_or(0.0),
            springref: convert(p.springref.unwrap_or(0.0)),
            refpos: convert(p.refpos.unwrap_or(0.0)),
            damping: p.damping.unwrap_or(0.0),
            armature: p.armature.unwrap_or(0.0),
            frictionloss: p.frictionloss.unwrap_or(0.0),
            margin: p.margin.unwrap_or(0.0),
            solref_limit: p.solref_limit.unwrap_or(DEFAULT_SOLREF),
            solimp_limit: p.solimp_limit.unwrap_or(DEFAULT_SOLIMP),
            solref_friction: p.solref_friction.unwrap_or(DEFAULT_SOLREF),
            solimp_friction: p.solimp_friction.unwrap_or(DEFAULT_SOLIMP),
        });
    }
    Ok(out)
}

/// Compile every site.
pub(crate) fn compile_sites(spec: &ModelSpec) -> Result<Vec<SiteComp>> {
    let mut out = Vec::with_capacity(spec.sites.len());
    for (id, site) in spec.sites.iter().enumerate() {
        let p = &site.params;
        let stype = p.stype.unwrap_or(GeomType::Sphere);
        if stype.needs_asset() || stype == GeomType::Plane {
            return Err(CompileError::spec(format!(
                "site type must be a bounded primitive, not {stype:?}"
            ))
            .with_object(ObjectType::Site, site.name.clone(), id));
        }
        out.push(SiteComp {
            stype,
            size: p.size.unwrap_or_else(|| Vector3::repeat(0.005)),
            pos: site.pos,
            quat: site.orient.quat,
            group: p.group.unwrap_or(0),
            rgba: p.rgba.unwrap_or([0.5, 0.5, 0.5, 1.0]),
            matid: -1,
        });
    }
    Ok(out)
}

/// Validate cameras and lights in place (they need no derived data).
pub(crate) fn check_cameras_and_lights(spec: &mut ModelSpec) -> Result<()> {
    for (id, cam) in spec.cameras.iter().enumerate() {
        let uses_intrinsics = cam.sensorsize[0] != 0.0 || cam.sensorsize[1] != 0.0;
        if !uses_intrinsics && !(0.0 < cam.fovy && cam.fovy < 180.0) {
            return Err(CompileError::spec(format!(
                "camera fovy must be in (0, 180), is {}",
                cam.fovy
            ))
            .with_object(ObjectType::Camera, cam.name.clone(), id));
        }
        if uses_intrinsics && (cam.resolution[0] <= 0 || cam.resolution[1] <= 0) {
            return Err(CompileError::spec(
                "camera with sensor size needs a positive resolution",
            )
            .with_object(ObjectType::Camera, cam.name.clone(), id));
        }
    }
    for (id, light) in spec.lights.iter_mut().enumerate() {
        let norm = light.dir.norm();
        if norm < MINVAL {
            return Err(CompileError::geometry("light direction is degenerate")
                .with_object(ObjectType::Light, light.name.clone(), id));
        }
        light.dir /= norm;
    }
    Ok(())
}
