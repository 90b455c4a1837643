//! Actuators.

use serde::{Deserialize, Serialize};
use sim_model::{BiasType, DynType, GainType};

/// The transmission target of an actuator, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorTarget {
    /// Force on a joint's dofs.
    Joint(String),
    /// Like `Joint` but gear expressed in the parent frame.
    JointInParent(String),
    /// Slider-crank through a slider site and a crank site.
    SliderCrank {
        /// Slider site name.
        site: String,
        /// Crank site name.
        cranksite: String,
    },
    /// Force along a tendon.
    Tendon(String),
    /// Cartesian wrench at a site, optionally relative to a reference site.
    Site {
        /// Target site name.
        site: String,
        /// Reference site name.
        refsite: Option<String>,
    },
    /// Adhesion force on a body's geoms.
    Body(String),
}

/// Defaultable actuator parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActuatorParams {
    /// Activation dynamics.
    pub dyntype: Option<DynType>,
    /// Force gain model.
    pub gaintype: Option<GainType>,
    /// Bias force model.
    pub biastype: Option<BiasType>,
    /// Dynamics parameters.
    pub dynprm: Option<[f64; 3]>,
    /// Gain parameters.
    pub gainprm: Option<[f64; 9]>,
    /// Bias parameters.
    pub biasprm: Option<[f64; 9]>,
    /// Transmission scaling.
    pub gear: Option<[f64; 6]>,
    /// Slider-crank rod length.
    pub cranklength: Option<f64>,
    /// Whether control clamping applies.
    pub ctrllimited: Option<bool>,
    /// Control limits.
    pub ctrlrange: Option<(f64, f64)>,
    /// Whether force clamping applies.
    pub forcelimited: Option<bool>,
    /// Force limits.
    pub forcerange: Option<(f64, f64)>,
    /// Whether activation clamping applies.
    pub actlimited: Option<bool>,
    /// Activation limits.
    pub actrange: Option<(f64, f64)>,
    /// Visualization group.
    pub group: Option<i32>,
}

impl ActuatorParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.dyntype = self.dyntype.or(def.dyntype);
        self.gaintype = self.gaintype.or(def.gaintype);
        self.biastype = self.biastype.or(def.biastype);
        self.dynprm = self.dynprm.or(def.dynprm);
        self.gainprm = self.gainprm.or(def.gainprm);
        self.biasprm = self.biasprm.or(def.biasprm);
        self.gear = self.gear.or(def.gear);
        self.cranklength = self.cranklength.or(def.cranklength);
        self.ctrllimited = self.ctrllimited.or(def.ctrllimited);
        self.ctrlrange = self.ctrlrange.or(def.ctrlrange);
        self.forcelimited = self.forcelimited.or(def.forcelimited);
        self.forcerange = self.forcerange.or(def.forcerange);
        self.actlimited = self.actlimited.or(def.actlimited);
        self.actrange = self.actrange.or(def.actrange);
        self.group = self.group.or(def.group);
    }
}

/// An actuator: transmission plus activation dynamics plus force model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actuator {
    /// Actuator name; unique among actuators when non-empty.
    pub name: String,
    /// Default class.
    pub class: Option<String>,
    /// Transmission target.
    pub target: ActuatorTarget,
    /// Explicit activation-state width; `None` derives it from `dyntype`.
    pub actdim: Option<i32>,
    /// Known-valid length range, kept when `useexisting` is set.
    pub lengthrange: Option<(f64, f64)>,
    /// Plugin instance name, for plugin-driven actuators.
    pub plugin: Option<String>,
    /// Defaultable parameters.
    pub params: ActuatorParams,
}

impl Default for Actuator {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: None,
            target: ActuatorTarget::Joint(String::new()),
            actdim: None,
            lengthrange: None,
            plugin: None,
            params: ActuatorParams::default(),
        }
    }
}
