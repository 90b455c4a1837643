//! Tendons and their path elements.

use serde::{Deserialize, Serialize};

/// Defaultable tendon parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TendonParams {
    /// Whether length limits apply.
    pub limited: Option<bool>,
    /// Length limits.
    pub range: Option<(f64, f64)>,
    /// Limit solver reference.
    pub solref_limit: Option<[f64; 2]>,
    /// Limit solver impedance.
    pub solimp_limit: Option<[f64; 5]>,
    /// Friction solver reference.
    pub solref_friction: Option<[f64; 2]>,
    /// Friction solver impedance.
    pub solimp_friction: Option<[f64; 5]>,
    /// Limit activation distance.
    pub margin: Option<f64>,
    /// Spring stiffness.
    pub stiffness: Option<f64>,
    /// Damping coefficient.
    pub damping: Option<f64>,
    /// Dry friction.
    pub frictionloss: Option<f64>,
    /// Spring rest-length band; equal entries give a simple spring.
    pub springlength: Option<[f64; 2]>,
    /// Display width.
    pub width: Option<f64>,
    /// Material name.
    pub material: Option<String>,
    /// Visualization group.
    pub group: Option<i32>,
    /// Display color.
    pub rgba: Option<[f32; 4]>,
}

impl TendonParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.limited = self.limited.or(def.limited);
        self.range = self.range.or(def.range);
        self.solref_limit = self.solref_limit.or(def.solref_limit);
        self.solimp_limit = self.solimp_limit.or(def.solimp_limit);
        self.solref_friction = self.solref_friction.or(def.solref_friction);
        self.solimp_friction = self.solimp_friction.or(def.solimp_friction);
        self.margin = self.margin.or(def.margin);
        self.stiffness = self.stiffness.or(def.stiffness);
        self.damping = self.damping.or(def.damping);
        self.frictionloss = self.frictionloss.or(def.frictionloss);
        self.springlength = self.springlength.or(def.springlength);
        self.width = self.width.or(def.width);
        if self.material.is_none() {
            self.material.clone_from(&def.material);
        }
        self.group = self.group.or(def.group);
        self.rgba = self.rgba.or(def.rgba);
    }
}

/// One element of a tendon path.
///
/// Spatial tendons route through sites, optionally wrapping geoms and
/// branching at pulleys; fixed tendons sum joint positions through
/// coefficients. The two families must not mix within one tendon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WrapSpec {
    /// Waypoint at a named site.
    Site(String),
    /// Wrap around a named sphere or cylinder geom, with an optional side
    /// site disambiguating the wrapping side.
    Geom {
        /// Wrapping geom name.
        geom: String,
        /// Side site name.
        sidesite: Option<String>,
    },
    /// Scalar joint term of a fixed tendon.
    Joint {
        /// Joint name.
        joint: String,
        /// Length contribution per unit joint position.
        coef: f64,
    },
    /// Branch divider for spatial tendons.
    Pulley {
        /// Length divisor applied to the following branch.
        divisor: f64,
    },
}

/// A tendon: a scalar length element actuators and constraints can attach to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tendon {
    /// Tendon name; unique among tendons when non-empty.
    pub name: String,
    /// Default class.
    pub class: Option<String>,
    /// Ordered path elements.
    pub path: Vec<WrapSpec>,
    /// Defaultable parameters.
    pub params: TendonParams,
}

impl Tendon {
    /// Whether the path is a fixed (joint-coefficient) tendon.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.path
            .iter()
            .all(|w| matches!(w, WrapSpec::Joint { .. }))
    }
}
