//! Body inertia consolidation.
//!
//! Derives each body's inertial frame: explicit inertial data (with full
//! tensors diagonalized) or accumulation over the body's geoms, followed by
//! the mass post-processing pipeline: bound clamping and triangle-inequality
//! repair. Total-mass rescaling happens after packing, on the model arrays.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use sim_model::ObjectType;

use crate::compile::entity::{GeomComp, MINVAL};
use crate::error::{CompileError, Result};
use crate::options::InertiaFromGeom;
use crate::spec::ModelSpec;

/// Consolidated inertial frame of one body.
#[derive(Debug, Clone)]
pub(crate) struct BodyInertia {
    pub mass: f64,
    pub ipos: Vector3<f64>,
    pub iquat: UnitQuaternion<f64>,
    pub inertia: Vector3<f64>,
}

impl Default for BodyInertia {
    fn default() -> Self {
        Self {
            mass: 0.0,
            ipos: Vector3::zeros(),
            iquat: UnitQuaternion::identity(),
            inertia: Vector3::zeros(),
        }
    }
}

/// Consolidate every body. `geoms` is indexed by packed geom id.
pub(crate) fn consolidate(spec: &ModelSpec, geoms: &[GeomComp]) -> Result<Vec<BodyInertia>> {
    let mut out = vec![BodyInertia::default(); spec.bodies.len()];
    for id in 1..spec.bodies.len() {
        let body = &spec.bodies[id];
        let ctx = |e: CompileError| e.with_object(ObjectType::Body, body.name.clone(), id);

        let explicit = body.inertial.as_ref();
        let use_geoms = match spec.options.inertiafromgeom {
            InertiaFromGeom::Always => true,
            InertiaFromGeom::Auto => explicit.is_none(),
            InertiaFromGeom::Never => false,
        };

        let mut bi = if use_geoms {
            from_geoms(spec, geoms, id).map_err(ctx)?
        } else if let Some(inertial) = explicit {
            from_explicit(inertial).map_err(ctx)?
        } else {
            BodyInertia::default()
        };

        if bi.mass.is_nan() || bi.mass < 0.0 {
            return Err(ctx(CompileError::physical(format!(
                "negative body mass {}",
                bi.mass
            ))));
        }

        // Bound clamping.
        if spec.options.boundmass > 0.0 {
            bi.mass = bi.mass.max(spec.options.boundmass);
        }
        if spec.options.boundinertia > 0.0 {
            for k in 0..3 {
                bi.inertia[k] = bi.inertia[k].max(spec.options.boundinertia);
            }
        }

        // Triangle inequality on the principal inertia.
        let (a, b, c) = (bi.inertia[0], bi.inertia[1], bi.inertia[2]);
        if a + b < c || a + c < b || b + c < a {
            if spec.options.balanceinertia {
                let mean = (a + b + c) / 3.0;
                bi.inertia = Vector3::repeat(mean);
            } else {
                return Err(ctx(CompileError::physical(format!(
                    "inertia must satisfy A + B >= C; use balanceinertia to repair ({a}, {b}, {c})"
                ))));
            }
        }

        out[id] = bi;
    }
    Ok(out)
}

/// Explicit inertial data; full tensors diagonalize into the returned quat.
fn from_explicit(inertial: &crate::spec::body::Inertial) -> Result<BodyInertia> {
    let mut bi = BodyInertia {
        mass: inertial.mass,
        ipos: inertial.pos,
        iquat: inertial.orient.quat,
        inertia: Vector3::zeros(),
    };
    if let Some(full) = inertial.fullinertia {
        let m = Matrix3::new(
            full[0], full[3], full[4], //
            full[3], full[1], full[5], //
            full[4], full[5], full[2],
        );
        let (inertia, quat) = diagonalize(&m)?;
        bi.inertia = inertia;
        bi.iquat = inertial.orient.quat * quat;
    } else if let Some(diag) = inertial.diaginertia {
        bi.inertia = diag;
    }
    Ok(bi)
}

/// Accumulate the inertial frame from the body's geoms whose group is inside
/// the model's inertia group range.
fn from_geoms(spec: &ModelSpec, geoms: &[GeomComp], body: usize) -> Result<BodyInertia> {
    let (lo, hi) = spec.options.inertiagrouprange;
    let selected: Vec<&GeomComp> = spec.bodies[body]
        .geoms
        .iter()
        .map(|&g| &geoms[g])
        .filter(|g| lo <= g.group && g.group <= hi)
        .collect();

    let mut bi = BodyInertia::default();
    if selected.is_empty() {
        return Ok(bi);
    }

    // Mass-weighted center of mass.
    let mut mass = 0.0;
    let mut com = Vector3::zeros();
    for g in &selected {
        mass += g.mass;
        com += g.pos * g.mass;
    }
    if mass < MINVAL {
        return Ok(bi);
    }
    com /= mass;

    // Full tensor about the COM: rotate each geom's diagonal inertia to the
    // body frame and displace by the parallel-axis term.
    let mut tensor = Matrix3::zeros();
    for g in &selected {
        let rot = g.quat.to_rotation_matrix();
        let local = Matrix3::from_diagonal(&g.inertia);
        let rotated = rot * local * rot.transpose();
        let d = g.pos - com;
        let shift = g.mass * (Matrix3::identity() * d.dot(&d) - d * d.transpose());
        tensor += rotated + shift;
    }

    let (inertia, quat) = diagonalize(&tensor)?;
    bi.mass = mass;
    bi.ipos = com;
    bi.iquat = quat;
    bi.inertia = inertia;
    Ok(bi)
}

/// Symmetric eigendecomposition with a right-handed eigenbasis. Fails when
/// the smallest eigenvalue is not positive.
pub(crate) fn diagonalize(m: &Matrix3<f64>) -> Result<(Vector3<f64>, UnitQuaternion<f64>)> {
    let eigen = m.symmetric_eigen();
    let min = eigen
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if min < MINVAL {
        return Err(CompileError::geometry(format!(
            "inertia tensor is degenerate (smallest eigenvalue {min:.3e})"
        )));
    }
    let inertia = Vector3::new(
        eigen.eigenvalues[0],
        eigen.eigenvalues[1],
        eigen.eigenvalues[2],
    );
    let mut rot = eigen.eigenvectors;
    if rot.determinant() < 0.0 {
        rot.set_column(2, &(-rot.column(2)));
    }
    let quat = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));
    Ok((inertia, quat))
}

/// Every moving body needs real mass somewhere in its weld group: itself or
/// a jointless descendant.
pub(crate) fn check_moving_masses(
    spec: &ModelSpec,
    inertia: &[BodyInertia],
) -> Result<()> {
    for (id, body) in spec.bodies.iter().enumerate().skip(1) {
        if body.joints.is_empty() {
            continue;
        }
        let mut ok = has_mass(&inertia[id]);
        if !ok {
            // Search jointless descendants (welded into this body).
            let mut stack: Vec<usize> = body.children.clone();
            while let Some(b) = stack.pop() {
                if !spec.bodies[b].joints.is_empty() {
                    continue;
                }
                if has_mass(&inertia[b]) {
                    ok = true;
                    break;
                }
                stack.extend(spec.bodies[b].children.iter().copied());
            }
        }
        if !ok {
            return Err(CompileError::physical(
                "moving body must have positive mass and inertia, on itself or a static child",
            )
            .with_object(ObjectType::Body, body.name.clone(), id));
        }
    }
    Ok(())
}

fn has_mass(bi: &BodyInertia) -> bool {
    bi.mass >= MINVAL && bi.inertia.iter().all(|&i| i > 0.0)
}
