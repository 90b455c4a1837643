//! Collision overrides and equality constraints.

use serde::{Deserialize, Serialize};
use sim_model::EqualityType;

/// Defaultable contact-pair parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairParams {
    /// Override contact dimensionality.
    pub condim: Option<i32>,
    /// 5-dof friction coefficients.
    pub friction: Option<[f64; 5]>,
    /// Normal solver reference.
    pub solref: Option<[f64; 2]>,
    /// Friction solver reference.
    pub solreffriction: Option<[f64; 2]>,
    /// Solver impedance.
    pub solimp: Option<[f64; 5]>,
    /// Activation distance.
    pub margin: Option<f64>,
    /// Inactive buffer inside the margin.
    pub gap: Option<f64>,
}

impl PairParams {
    /// Fill unset fields from a default bundle.
    pub fn merge_from(&mut self, def: &Self) {
        self.condim = self.condim.or(def.condim);
        self.friction = self.friction.or(def.friction);
        self.solref = self.solref.or(def.solref);
        self.solreffriction = self.solreffriction.or(def.solreffriction);
        self.solimp = self.solimp.or(def.solimp);
        self.margin = self.margin.or(def.margin);
        self.gap = self.gap.or(def.gap);
    }
}

/// An explicit collision pair between two named geoms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pair {
    /// Pair name.
    pub name: String,
    /// Default class.
    pub class: Option<String>,
    /// First geom name.
    pub geom1: String,
    /// Second geom name.
    pub geom2: String,
    /// Defaultable parameters.
    pub params: PairParams,
    /// `(body1 << 16) | body2` with `body1 <= body2`; set during resolution.
    pub signature: u32,
}

/// A collision exclusion between two named bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exclude {
    /// Exclude name.
    pub name: String,
    /// First body name.
    pub body1: String,
    /// Second body name.
    pub body2: String,
    /// `(body1 << 16) | body2` with `body1 <= body2`; set during resolution.
    pub signature: u32,
}

/// An equality constraint between two named operands.
///
/// The operand kind follows `eqtype`: bodies for connect/weld, joints for
/// joint couplings, tendons for tendon couplings, a flex for flex rigidity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equality {
    /// Equality name.
    pub name: String,
    /// Constraint kind.
    pub eqtype: EqualityType,
    /// First operand name.
    pub name1: String,
    /// Second operand name; optional kinds anchor to the world/identity.
    pub name2: Option<String>,
    /// Initially active.
    pub active: bool,
    /// Solver reference.
    pub solref: [f64; 2],
    /// Solver impedance.
    pub solimp: [f64; 5],
    /// Kind-specific parameters (anchor, relative pose, polynomial
    /// coefficients).
    pub data: [f64; 11],
}

impl Default for Equality {
    fn default() -> Self {
        Self {
            name: String::new(),
            eqtype: EqualityType::Connect,
            name1: String::new(),
            name2: None,
            active: true,
            solref: [0.02, 1.0],
            solimp: [0.9, 0.95, 0.001, 0.5, 2.0],
            data: [0.0; 11],
        }
    }
}

/// Compose the 32-bit sort key from two body ids, low id in the high half.
#[must_use]
pub fn signature(body1: usize, body2: usize) -> u32 {
    let (lo, hi) = if body1 <= body2 {
        (body1, body2)
    } else {
        (body2, body1)
    };
    ((lo as u32) << 16) | (hi as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_orders_bodies() {
        assert_eq!(signature(3, 1), signature(1, 3));
        assert_eq!(signature(1, 3), (1 << 16) | 3);
        assert_eq!(signature(0, 0), 0);
    }

    #[test]
    fn signature_sorts_by_first_body_then_second() {
        assert!(signature(1, 2) < signature(1, 3));
        assert!(signature(1, 500) < signature(2, 3));
    }
}
