//! Shared enumerations for the packed model.
//!
//! These are the type tags stored in the per-entity arrays of [`crate::Model`].
//! The compiler writes them; the engine reads them. Variants follow the
//! runtime layout, so their discriminant order is part of the model format.

use serde::{Deserialize, Serialize};

/// Joint types, ordered by generalized-coordinate width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    /// 7 qpos (3 translation + unit quaternion), 6 dofs.
    Free,
    /// Unit-quaternion rotation, 3 dofs.
    Ball,
    /// Rotation about an axis, 1 dof.
    Hinge,
    /// Translation along an axis, 1 dof.
    Slide,
}

impl JointType {
    /// Number of generalized position coordinates for this joint type.
    #[must_use]
    pub fn nq(self) -> usize {
        match self {
            Self::Free => 7,
            Self::Ball => 4,
            Self::Hinge | Self::Slide => 1,
        }
    }

    /// Number of degrees of freedom for this joint type.
    #[must_use]
    pub fn nv(self) -> usize {
        match self {
            Self::Free => 6,
            Self::Ball => 3,
            Self::Hinge | Self::Slide => 1,
        }
    }
}

/// Geometric primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeomType {
    /// Infinite plane, normal +Z in the geom frame.
    Plane,
    /// Height field; `geom_dataid` selects the asset.
    HField,
    /// Sphere, size\[0\] = radius.
    Sphere,
    /// Capsule, size\[0\] = radius, size\[1\] = half-length.
    Capsule,
    /// Ellipsoid, size = semi-axes.
    Ellipsoid,
    /// Cylinder, size\[0\] = radius, size\[1\] = half-length.
    Cylinder,
    /// Box, size = half-extents.
    Box,
    /// Triangle mesh; `geom_dataid` selects the asset.
    Mesh,
    /// Signed distance field backed by a plugin.
    Sdf,
}

impl GeomType {
    /// Whether this type references an asset through `geom_dataid`.
    #[must_use]
    pub fn needs_asset(self) -> bool {
        matches!(self, Self::Mesh | Self::HField | Self::Sdf)
    }
}

/// Texture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureType {
    /// Flat 2D bitmap.
    TwoD,
    /// Six-face cube map, faces stacked vertically in storage.
    Cube,
    /// Cube map used as a skybox (may be unnamed).
    Skybox,
}

/// Equality-constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EqualityType {
    /// Coincident points on two bodies.
    Connect,
    /// Full 6-dof weld of two bodies.
    Weld,
    /// Polynomial coupling of two scalar joints.
    Joint,
    /// Polynomial coupling of two tendon lengths.
    Tendon,
    /// Rigidify a flex.
    Flex,
}

/// Tendon path element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapType {
    /// Scalar joint term of a fixed tendon; `wrap_prm` is the coefficient.
    Joint,
    /// Site waypoint of a spatial tendon.
    Site,
    /// Wrapping sphere geom.
    Sphere,
    /// Wrapping cylinder geom.
    Cylinder,
    /// Branch divider; `wrap_prm` is the divisor.
    Pulley,
}

/// Actuator transmission targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmissionType {
    /// Force on a joint's dofs scaled by gear.
    Joint,
    /// Like `Joint` but gear is expressed in the parent frame.
    JointInParent,
    /// Slider-crank mechanism through a site pair.
    SliderCrank,
    /// Force along a tendon.
    Tendon,
    /// Cartesian wrench at a site.
    Site,
    /// Adhesion force on a body's geoms.
    Body,
}

/// Activation dynamics types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynType {
    /// Direct feed-through, no activation state.
    None,
    /// First-order integrator.
    Integrator,
    /// First-order low-pass filter.
    Filter,
    /// Filter applied before force computation.
    FilterExact,
    /// Muscle activation/deactivation dynamics.
    Muscle,
    /// Dynamics supplied by a plugin.
    User,
}

/// Force-gain models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GainType {
    /// Constant gain `gainprm[0]`.
    Fixed,
    /// Gain affine in length and velocity.
    Affine,
    /// Muscle FLV gain.
    Muscle,
    /// Gain supplied by a plugin.
    User,
}

/// Bias-force models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiasType {
    /// No bias.
    None,
    /// Bias affine in length and velocity.
    Affine,
    /// Muscle passive force.
    Muscle,
    /// Bias supplied by a plugin.
    User,
}

/// Sensor kinds. The variant determines the attached-object type, the output
/// dimension and the pipeline stage at which the value becomes available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// Scalar touch force at a site.
    Touch,
    /// 3-axis accelerometer at a site.
    Accelerometer,
    /// 3-axis rate gyro at a site.
    Gyro,
    /// Interaction force at a site.
    Force,
    /// Interaction torque at a site.
    Torque,
    /// Magnetometer at a site.
    Magnetometer,
    /// Range finder along a site's +Z.
    RangeFinder,
    /// Scalar joint position.
    JointPos,
    /// Scalar joint velocity.
    JointVel,
    /// Tendon length.
    TendonPos,
    /// Tendon velocity.
    TendonVel,
    /// Actuator transmission length.
    ActuatorPos,
    /// Actuator transmission velocity.
    ActuatorVel,
    /// Actuator force.
    ActuatorFrc,
    /// Ball joint orientation quaternion.
    BallQuat,
    /// Ball joint angular velocity.
    BallAngVel,
    /// Frame position of an attached object.
    FramePos,
    /// Frame orientation quaternion of an attached object.
    FrameQuat,
    /// Frame X axis.
    FrameXAxis,
    /// Frame Y axis.
    FrameYAxis,
    /// Frame Z axis.
    FrameZAxis,
    /// Frame linear velocity.
    FrameLinVel,
    /// Frame angular velocity.
    FrameAngVel,
    /// Frame linear acceleration.
    FrameLinAcc,
    /// Frame angular acceleration.
    FrameAngAcc,
    /// Subtree center of mass.
    SubtreeCom,
    /// Subtree linear velocity.
    SubtreeLinVel,
    /// Subtree angular momentum.
    SubtreeAngMom,
    /// Simulation clock.
    Clock,
    /// Output supplied by a plugin.
    Plugin,
    /// User-defined sensor; dimension from the spec.
    User,
}

/// Output value class of a sensor, used for noise/cutoff post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorDataType {
    /// Unrestricted real values.
    Real,
    /// Non-negative values.
    Positive,
    /// Unit 3-vector.
    Axis,
    /// Unit quaternion.
    Quaternion,
}

/// Pipeline stage after which a sensor value is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorStage {
    /// Position-dependent quantities.
    Pos,
    /// Velocity-dependent quantities.
    Vel,
    /// Acceleration/force-dependent quantities.
    Acc,
}

/// Object kinds addressable by `(kind, id)` cross-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// No object.
    None,
    /// Rigid body.
    Body,
    /// The inertial frame of a body.
    XBody,
    /// Joint.
    Joint,
    /// Degree of freedom.
    Dof,
    /// Geom.
    Geom,
    /// Site.
    Site,
    /// Camera.
    Camera,
    /// Light.
    Light,
    /// Flex.
    Flex,
    /// Mesh asset.
    Mesh,
    /// Skin asset.
    Skin,
    /// Height field asset.
    HField,
    /// Texture asset.
    Texture,
    /// Material asset.
    Material,
    /// Contact pair.
    Pair,
    /// Contact exclude.
    Exclude,
    /// Equality constraint.
    Equality,
    /// Tendon.
    Tendon,
    /// Actuator.
    Actuator,
    /// Sensor.
    Sensor,
    /// Numeric custom field.
    Numeric,
    /// Text custom field.
    Text,
    /// Tuple custom field.
    Tuple,
    /// Keyframe.
    Key,
    /// Plugin instance.
    Plugin,
}

/// Plugin capability classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginCapability {
    /// Produces actuator forces.
    Actuator,
    /// Produces sensor readings.
    Sensor,
    /// Produces passive forces.
    Passive,
    /// Provides a signed distance field.
    Sdf,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn joint_widths() {
        assert_eq!(JointType::Free.nq(), 7);
        assert_eq!(JointType::Free.nv(), 6);
        assert_eq!(JointType::Ball.nq(), 4);
        assert_eq!(JointType::Ball.nv(), 3);
        assert_eq!(JointType::Hinge.nq(), 1);
        assert_eq!(JointType::Slide.nv(), 1);
    }

    #[test]
    fn asset_backed_geoms() {
        assert!(GeomType::Mesh.needs_asset());
        assert!(GeomType::HField.needs_asset());
        assert!(!GeomType::Sphere.needs_asset());
        assert!(!GeomType::Plane.needs_asset());
    }
}
