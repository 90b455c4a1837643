//! Compiler options.
//!
//! [`CompilerOptions`] lives on the spec and controls interpretation of
//! author input (angle units, euler sequence), the inertia pipeline, the
//! structural passes (fuse, discard) and the arena-size override.
//! [`LengthRangeOptions`] configures the actuator length-range solver.

use serde::{Deserialize, Serialize};

/// Angle units used by author-level rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleUnit {
    /// Angles in degrees (converted at compile time).
    Degree,
    /// Angles in radians.
    Radian,
}

/// How body inertial frames are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InertiaFromGeom {
    /// Always derive from geoms, overriding explicit inertial data.
    Always,
    /// Derive from geoms only when no explicit inertial data is present.
    Auto,
    /// Use explicit inertial data only; missing data stays zero.
    Never,
}

/// Options controlling spec interpretation and the compile pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Angle units for rotations given as angles.
    pub angle: AngleUnit,
    /// Euler rotation sequence; lowercase = moving axes, uppercase = fixed.
    pub eulerseq: String,
    /// Inertial-frame derivation policy.
    pub inertiafromgeom: InertiaFromGeom,
    /// Geom group range included in inertia derivation, inclusive.
    pub inertiagrouprange: (i32, i32),
    /// Minimum body mass after compilation; 0 disables the clamp.
    pub boundmass: f64,
    /// Minimum diagonal inertia component; 0 disables the clamp.
    pub boundinertia: f64,
    /// Repair triangle-inequality violations by averaging instead of failing.
    pub balanceinertia: bool,
    /// Rescale all masses so they sum to this value; non-positive disables.
    pub settotalmass: f64,
    /// Fuse jointless, non-mocap bodies into their parents.
    pub fusestatic: bool,
    /// Drop visual-only geoms, materials, textures and orphaned meshes.
    pub discardvisual: bool,
    /// Explicit arena size in bytes; `None` selects the heuristic.
    pub memory: Option<usize>,
    /// Legacy arena size as a multiple of `size_of::<f64>()`.
    pub nstack: Option<usize>,
    /// Directory prefix for mesh and skin files.
    pub meshdir: String,
    /// Directory prefix for texture and height-field files.
    pub texturedir: String,
    /// Length-range solver configuration.
    pub lengthrange: LengthRangeOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            angle: AngleUnit::Degree,
            eulerseq: "xyz".to_string(),
            inertiafromgeom: InertiaFromGeom::Auto,
            inertiagrouprange: (0, 5),
            boundmass: 0.0,
            boundinertia: 0.0,
            balanceinertia: false,
            settotalmass: -1.0,
            fusestatic: false,
            discardvisual: false,
            memory: None,
            nstack: None,
            meshdir: String::new(),
            texturedir: String::new(),
            lengthrange: LengthRangeOptions::default(),
        }
    }
}

impl CompilerOptions {
    /// Convert an author-level angle to radians according to `angle`.
    #[must_use]
    pub fn to_radians(&self, angle: f64) -> f64 {
        match self.angle {
            AngleUnit::Degree => angle.to_radians(),
            AngleUnit::Radian => angle,
        }
    }
}

/// Which actuators get a computed length range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthRangeMode {
    /// Compute nothing.
    None,
    /// Muscle actuators only.
    Muscle,
    /// Muscle and user-gain/bias actuators.
    MuscleUser,
    /// Every actuator.
    All,
}

/// Length-range solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthRangeOptions {
    /// Actuator selection mode.
    pub mode: LengthRangeMode,
    /// Keep an already-valid range instead of recomputing it.
    pub useexisting: bool,
    /// Use the multi-worker path when enough actuators qualify.
    pub usethread: bool,
    /// Simulation timestep override; `None` keeps the model timestep.
    pub timestep: Option<f64>,
    /// Total simulated time per direction, seconds.
    pub inttotal: f64,
    /// Trailing measurement window, seconds.
    pub interval: f64,
    /// Tolerance for range convergence, relative to the measurement window.
    pub tolrange: f64,
}

impl Default for LengthRangeOptions {
    fn default() -> Self {
        Self {
            mode: LengthRangeMode::Muscle,
            useexisting: true,
            usethread: true,
            timestep: None,
            inttotal: 10.0,
            interval: 2.0,
            tolrange: 0.05,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn angle_conversion() {
        let mut opts = CompilerOptions::default();
        assert!((opts.to_radians(180.0) - std::f64::consts::PI).abs() < 1e-12);
        opts.angle = AngleUnit::Radian;
        assert!((opts.to_radians(1.25) - 1.25).abs() < 1e-15);
    }

    #[test]
    fn defaults_match_authoring_conventions() {
        let opts = CompilerOptions::default();
        assert_eq!(opts.eulerseq, "xyz");
        assert_eq!(opts.inertiagrouprange, (0, 5));
        assert!(!opts.fusestatic);
        assert_eq!(opts.lengthrange.mode, LengthRangeMode::Muscle);
        assert!(opts.lengthrange.useexisting);
    }
}
