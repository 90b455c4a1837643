//! Orientation resolution.
//!
//! Author-level elements may give their orientation as a quaternion or as one
//! of four alternative forms (axis-angle, xy-axes, z-axis, euler sequence).
//! This module folds whichever form is present into a canonical unit
//! quaternion. Degenerate inputs produce an [`OrientationError`] tag; the
//! caller attaches the offending entity.

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::OrientationError;
use crate::options::CompilerOptions;

/// Degeneracy threshold for axis lengths.
const MIN_AXIS: f64 = 1e-10;

/// One alternative orientation form. At most one may accompany a quaternion;
/// the type makes multiple forms unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AltOrientation {
    /// `[x, y, z, angle]`; the axis is normalized, the angle obeys the
    /// compiler's angle unit.
    AxisAngle([f64; 4]),
    /// Frame X and Y axes; Y is orthogonalized against X, Z completes.
    XYAxes([f64; 6]),
    /// Frame Z axis; the minimal rotation from +Z is used.
    ZAxis([f64; 3]),
    /// Angles per character of the compiler's euler sequence.
    Euler([f64; 3]),
}

/// A pose orientation: explicit quaternion plus optional alternative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Explicit quaternion `(w, x, y, z)`, used when no alternative is set.
    pub quat: UnitQuaternion<f64>,
    /// Alternative form, which takes precedence when present.
    pub alt: Option<AltOrientation>,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            quat: UnitQuaternion::identity(),
            alt: None,
        }
    }
}

impl Orientation {
    /// Resolve to a unit quaternion under the given compiler options.
    pub fn resolve(
        &self,
        options: &CompilerOptions,
    ) -> Result<UnitQuaternion<f64>, OrientationError> {
        match &self.alt {
            None => Ok(self.quat),
            Some(AltOrientation::AxisAngle(aa)) => {
                let axis = Vector3::new(aa[0], aa[1], aa[2]);
                if axis.norm() < MIN_AXIS {
                    return Err(OrientationError::AxisTooSmall);
                }
                let angle = options.to_radians(aa[3]);
                Ok(UnitQuaternion::from_axis_angle(
                    &nalgebra::Unit::new_normalize(axis),
                    angle,
                ))
            }
            Some(AltOrientation::XYAxes(xy)) => {
                // Gram-Schmidt: normalize x, orthogonalize y, cross for z.
                let mut x = Vector3::new(xy[0], xy[1], xy[2]);
                let xn = x.norm();
                if xn < MIN_AXIS {
                    return Err(OrientationError::CrossTooSmall);
                }
                x /= xn;
                let mut y = Vector3::new(xy[3], xy[4], xy[5]);
                y -= x * x.dot(&y);
                let yn = y.norm();
                if yn < MIN_AXIS {
                    return Err(OrientationError::YAxisTooSmall);
                }
                y /= yn;
                let z = x.cross(&y);
                let rot = Matrix3::from_columns(&[x, y, z]);
                Ok(UnitQuaternion::from_rotation_matrix(
                    &Rotation3::from_matrix_unchecked(rot),
                ))
            }
            Some(AltOrientation::ZAxis(zd)) => {
                let dir = Vector3::new(zd[0], zd[1], zd[2]);
                let n = dir.norm();
                if n < MIN_AXIS {
                    return Err(OrientationError::ZAxisTooSmall);
                }
                Ok(z_to_quat(dir / n))
            }
            Some(AltOrientation::Euler(angles)) => {
                let rad = Vector3::new(
                    options.to_radians(angles[0]),
                    options.to_radians(angles[1]),
                    options.to_radians(angles[2]),
                );
                euler_seq_to_quat(rad, &options.eulerseq)
            }
        }
    }
}

/// Minimal rotation taking +Z to `zdir` (unit length).
fn z_to_quat(zdir: Vector3<f64>) -> UnitQuaternion<f64> {
    let mut axis = Vector3::z().cross(&zdir);
    let s = axis.norm();
    if s < MIN_AXIS {
        // Parallel or anti-parallel: rotate about X.
        axis = Vector3::x();
    } else {
        axis /= s;
    }
    let angle = s.atan2(zdir.z);
    let half = angle / 2.0;
    let xyz = axis * half.sin();
    UnitQuaternion::from_quaternion(Quaternion::new(half.cos(), xyz.x, xyz.y, xyz.z))
}

/// Compose a rotation sequence into a quaternion.
///
/// Each character of `seq` selects an axis; lowercase means moving axes
/// (post-multiply), uppercase means fixed axes (pre-multiply). Characters
/// outside `xyzXYZ` fail with [`OrientationError::EulerSequence`].
pub fn euler_seq_to_quat(
    euler_rad: Vector3<f64>,
    seq: &str,
) -> Result<UnitQuaternion<f64>, OrientationError> {
    let mut q = UnitQuaternion::identity();
    for (i, ch) in seq.chars().take(3).enumerate() {
        let axis = match ch.to_ascii_lowercase() {
            'x' => Vector3::x_axis(),
            'y' => Vector3::y_axis(),
            'z' => Vector3::z_axis(),
            _ => return Err(OrientationError::EulerSequence),
        };
        let r = UnitQuaternion::from_axis_angle(&axis, euler_rad[i]);
        if ch.is_ascii_lowercase() {
            q *= r;
        } else {
            q = r * q;
        }
    }
    Ok(q)
}

/// Extract intrinsic-xyz euler angles from a quaternion. Used by copy-back
/// and by round-trip tests; inverse of `euler_seq_to_quat(_, "xyz")` away
/// from the pitch singularity.
#[must_use]
pub fn quat_to_euler_xyz(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    let m = q.to_rotation_matrix();
    let m = m.matrix();
    // Intrinsic xyz: R = Rx * Ry * Rz.
    let pitch = m[(0, 2)].clamp(-1.0, 1.0).asin();
    if pitch.cos().abs() > 1e-9 {
        Vector3::new(
            (-m[(1, 2)]).atan2(m[(2, 2)]),
            pitch,
            (-m[(0, 1)]).atan2(m[(0, 0)]),
        )
    } else {
        // Gimbal lock: fold the lost rotation into the first angle.
        Vector3::new(m[(2, 1)].atan2(m[(1, 1)]), pitch, 0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::options::AngleUnit;

    fn radians() -> CompilerOptions {
        CompilerOptions {
            angle: AngleUnit::Radian,
            ..CompilerOptions::default()
        }
    }

    #[test]
    fn quat_passthrough() {
        let o = Orientation::default();
        let q = o.resolve(&radians()).unwrap();
        assert!((q.into_inner() - UnitQuaternion::identity().into_inner()).norm() < 1e-15);
    }

    #[test]
    fn axisangle_normalizes_axis() {
        let o = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::AxisAngle([
                0.0,
                0.0,
                3.0,
                std::f64::consts::FRAC_PI_2,
            ])),
        };
        let q = o.resolve(&radians()).unwrap();
        let expected =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        assert!((q.into_inner() - expected.into_inner()).norm() < 1e-12);
    }

    #[test]
    fn axisangle_degenerate_axis_fails() {
        let o = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::AxisAngle([0.0, 0.0, 0.0, 1.0])),
        };
        assert_eq!(
            o.resolve(&radians()),
            Err(OrientationError::AxisTooSmall)
        );
    }

    #[test]
    fn xyaxes_gram_schmidt() {
        // Non-orthogonal input: x=(1,1,0), y=(0,1,0) -> 45 degrees about Z.
        let o = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::XYAxes([1.0, 1.0, 0.0, 0.0, 1.0, 0.0])),
        };
        let q = o.resolve(&radians()).unwrap();
        let expected =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4);
        assert!((q.into_inner() - expected.into_inner()).norm() < 1e-8);
    }

    #[test]
    fn xyaxes_parallel_fails() {
        let o = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::XYAxes([1.0, 0.0, 0.0, 2.0, 0.0, 0.0])),
        };
        assert_eq!(o.resolve(&radians()), Err(OrientationError::YAxisTooSmall));
    }

    #[test]
    fn zaxis_antiparallel() {
        let o = Orientation {
            quat: UnitQuaternion::identity(),
            alt: Some(AltOrientation::ZAxis([0.0, 0.0, -1.0])),
        };
        let q = o.resolve(&radians()).unwrap();
        let expected = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
        assert!((q.into_inner() - expected.into_inner()).norm() < 1e-12);
    }

    #[test]
    fn euler_case_controls_composition_order() {
        let e = Vector3::new(0.1, 0.2, 0.3);
        let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.1);
        let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.2);
        let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);

        let intrinsic = euler_seq_to_quat(e, "xyz").unwrap();
        assert!((intrinsic.into_inner() - (rx * ry * rz).into_inner()).norm() < 1e-12);

        let extrinsic = euler_seq_to_quat(e, "XYZ").unwrap();
        assert!((extrinsic.into_inner() - (rz * ry * rx).into_inner()).norm() < 1e-12);

        let mixed = euler_seq_to_quat(e, "XYz").unwrap();
        assert!((mixed.into_inner() - (ry * rx * rz).into_inner()).norm() < 1e-12);
    }

    #[test]
    fn euler_bad_sequence_fails() {
        assert_eq!(
            euler_seq_to_quat(Vector3::zeros(), "xqz"),
            Err(OrientationError::EulerSequence)
        );
    }

    #[test]
    fn euler_round_trip_xyz() {
        let e = Vector3::new(0.4, -0.7, 1.1);
        let q = euler_seq_to_quat(e, "xyz").unwrap();
        let back = quat_to_euler_xyz(&q);
        assert!((back - e).norm() < 1e-10, "got {back:?}");
    }
}
