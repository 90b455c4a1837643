//! Sensors.

use serde::{Deserialize, Serialize};
use sim_model::{ObjectType, SensorDataType, SensorStage, SensorType};

/// A sensor reading one scalar- or vector-valued quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    /// Sensor name; unique among sensors when non-empty.
    pub name: String,
    /// Sensor kind.
    pub stype: SensorType,
    /// Attached object name; the required kind follows from `stype`.
    pub objname: Option<String>,
    /// Reference object name, for frame sensors measured relative to a frame.
    pub refname: Option<String>,
    /// Reference object kind, when `refname` is set.
    pub reftype: Option<ObjectType>,
    /// Output width for `User` sensors; other kinds derive it.
    pub dim: Option<i32>,
    /// Clamping cutoff, 0 disables.
    pub cutoff: f64,
    /// Noise standard deviation.
    pub noise: f64,
    /// Stage override for `User` sensors.
    pub needstage: Option<SensorStage>,
    /// Datatype override for `User` sensors.
    pub datatype: Option<SensorDataType>,
    /// Plugin instance name, for plugin sensors.
    pub plugin: Option<String>,
}

impl Default for Sensor {
    fn default() -> Self {
        Self {
            name: String::new(),
            stype: SensorType::Clock,
            objname: None,
            refname: None,
            reftype: None,
            dim: None,
            cutoff: 0.0,
            noise: 0.0,
            needstage: None,
            datatype: None,
            plugin: None,
        }
    }
}

/// Static per-kind sensor tables: attached-object kind, output width,
/// datatype and stage. `None` object kind means the sensor is global.
#[must_use]
pub fn sensor_traits(
    stype: SensorType,
) -> (ObjectType, usize, SensorDataType, SensorStage) {
    use SensorDataType as D;
    use SensorStage as S;
    use SensorType as T;
    match stype {
        T::Touch => (ObjectType::Site, 1, D::Positive, S::Acc),
        T::Accelerometer => (ObjectType::Site, 3, D::Real, S::Acc),
        T::Gyro => (ObjectType::Site, 3, D::Real, S::Vel),
        T::Force => (ObjectType::Site, 3, D::Real, S::Acc),
        T::Torque => (ObjectType::Site, 3, D::Real, S::Acc),
        T::Magnetometer => (ObjectType::Site, 3, D::Real, S::Pos),
        T::RangeFinder => (ObjectType::Site, 1, D::Real, S::Pos),
        T::JointPos => (ObjectType::Joint, 1, D::Real, S::Pos),
        T::JointVel => (ObjectType::Joint, 1, D::Real, S::Vel),
        T::TendonPos => (ObjectType::Tendon, 1, D::Real, S::Pos),
        T::TendonVel => (ObjectType::Tendon, 1, D::Real, S::Vel),
        T::ActuatorPos => (ObjectType::Actuator, 1, D::Real, S::Pos),
        T::ActuatorVel => (ObjectType::Actuator, 1, D::Real, S::Vel),
        T::ActuatorFrc => (ObjectType::Actuator, 1, D::Real, S::Acc),
        T::BallQuat => (ObjectType::Joint, 4, D::Quaternion, S::Pos),
        T::BallAngVel => (ObjectType::Joint, 3, D::Real, S::Vel),
        T::FramePos => (ObjectType::XBody, 3, D::Real, S::Pos),
        T::FrameQuat => (ObjectType::XBody, 4, D::Quaternion, S::Pos),
        T::FrameXAxis | T::FrameYAxis | T::FrameZAxis => {
            (ObjectType::XBody, 3, D::Axis, S::Pos)
        }
        T::FrameLinVel | T::FrameAngVel => (ObjectType::XBody, 3, D::Real, S::Vel),
        T::FrameLinAcc | T::FrameAngAcc => (ObjectType::XBody, 3, D::Real, S::Acc),
        T::SubtreeCom | T::SubtreeLinVel | T::SubtreeAngMom => {
            (ObjectType::Body, 3, D::Real, if stype == T::SubtreeCom { S::Pos } else { S::Vel })
        }
        T::Clock => (ObjectType::None, 1, D::Real, S::Pos),
        T::Plugin => (ObjectType::None, 0, D::Real, S::Acc),
        T::User => (ObjectType::None, 0, D::Real, S::Acc),
    }
}
