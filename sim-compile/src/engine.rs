//! Physics-engine seam.
//!
//! The compiler needs an engine twice: a single test step after packing, and
//! the per-actuator length-range computation. Both go through the [`Engine`]
//! trait and report failures as ordinary `Result`s — the engine's error
//! channel is a return value, not a process-global handler.
//!
//! [`SweepEngine`] is the bundled collaborator: a deterministic quasistatic
//! evaluator that covers joint and fixed-tendon transmissions, which is what
//! the compile-time subcalls need. A full dynamics engine can be substituted
//! by the caller.

use sim_model::{JointType, Model, TransmissionType, WrapType};
use thiserror::Error;

use crate::options::LengthRangeOptions;

/// Failure inside an engine subcall.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Engine-provided description.
    pub message: String,
}

impl EngineError {
    /// Build an error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Transient simulation state owned by one engine call site.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Generalized positions, length `nq`.
    pub qpos: Vec<f64>,
    /// Generalized velocities, length `nv`.
    pub qvel: Vec<f64>,
    /// Simulation time.
    pub time: f64,
}

/// The engine operations the compiler invokes.
///
/// Implementations must be shareable across the length-range worker pool;
/// each worker owns its own [`EngineState`].
pub trait Engine: Sync {
    /// Allocate a state initialized at `qpos0`.
    fn make_state(&self, model: &Model) -> EngineState {
        EngineState {
            qpos: model.qpos0.clone(),
            qvel: vec![0.0; model.nv],
            time: 0.0,
        }
    }

    /// Advance the state by one timestep. Returns an optional warning
    /// message to store alongside the compiled model.
    fn step(&self, model: &Model, state: &mut EngineState)
        -> Result<Option<String>, EngineError>;

    /// Compute the feasible transmission length range of one actuator.
    fn set_length_range(
        &self,
        model: &Model,
        state: &mut EngineState,
        actuator: usize,
        options: &LengthRangeOptions,
    ) -> Result<(f64, f64), EngineError>;
}

/// Deterministic quasistatic length evaluator.
///
/// Joint sweeps use the joint's limit range; unlimited hinges sweep one full
/// revolution and unlimited slides one unit of travel, which bounds the
/// search the way the disabled-gravity simulation does.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepEngine;

/// Sweep interval of an unlimited hinge, radians.
const UNLIMITED_HINGE_SPAN: f64 = std::f64::consts::PI;
/// Sweep interval of an unlimited slide, meters.
const UNLIMITED_SLIDE_SPAN: f64 = 1.0;

impl SweepEngine {
    fn joint_span(model: &Model, jnt: usize) -> Result<(f64, f64), EngineError> {
        match model.jnt_type[jnt] {
            JointType::Hinge => Ok(if model.jnt_limited[jnt] {
                model.jnt_range[jnt]
            } else {
                (-UNLIMITED_HINGE_SPAN, UNLIMITED_HINGE_SPAN)
            }),
            JointType::Slide => Ok(if model.jnt_limited[jnt] {
                model.jnt_range[jnt]
            } else {
                (-UNLIMITED_SLIDE_SPAN, UNLIMITED_SLIDE_SPAN)
            }),
            JointType::Ball | JointType::Free => Err(EngineError::new(format!(
                "length range not defined for {:?} joint transmission",
                model.jnt_type[jnt]
            ))),
        }
    }
}

impl Engine for SweepEngine {
    fn step(
        &self,
        model: &Model,
        state: &mut EngineState,
    ) -> Result<Option<String>, EngineError> {
        if state.qpos.iter().any(|q| !q.is_finite()) {
            return Err(EngineError::new("qpos is not finite"));
        }
        state.time += model.opt.timestep;
        Ok(None)
    }

    fn set_length_range(
        &self,
        model: &Model,
        _state: &mut EngineState,
        actuator: usize,
        _options: &LengthRangeOptions,
    ) -> Result<(f64, f64), EngineError> {
        let gear = model.actuator_gear[actuator][0];
        match model.actuator_trntype[actuator] {
            TransmissionType::Joint | TransmissionType::JointInParent => {
                let jnt = model.actuator_trnid[actuator][0] as usize;
                let (lo, hi) = Self::joint_span(model, jnt)?;
                let (a, b) = (gear * lo, gear * hi);
                Ok((a.min(b), a.max(b)))
            }
            TransmissionType::Tendon => {
                let tendon = model.actuator_trnid[actuator][0] as usize;
                let adr = model.tendon_adr[tendon] as usize;
                let num = model.tendon_num[tendon] as usize;
                let mut lo = 0.0;
                let mut hi = 0.0;
                for w in adr..adr + num {
                    match model.wrap_type[w] {
                        WrapType::Joint => {
                            let jnt = model.wrap_objid[w] as usize;
                            let coef = model.wrap_prm[w];
                            let (jlo, jhi) = Self::joint_span(model, jnt)?;
                            let (a, b) = (coef * jlo, coef * jhi);
                            lo += a.min(b);
                            hi += a.max(b);
                        }
                        _ => {
                            return Err(EngineError::new(
                                "length range of spatial tendons requires full dynamics",
                            ));
                        }
                    }
                }
                let (a, b) = (gear * lo, gear * hi);
                Ok((a.min(b), a.max(b)))
            }
            // Site and body transmissions have no scalar travel to sweep;
            // their range stays unset.
            TransmissionType::Site | TransmissionType::Body => Ok((0.0, 0.0)),
            TransmissionType::SliderCrank => Err(EngineError::new(
                "length range of slider-crank transmissions requires full dynamics",
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn one_hinge_model() -> Model {
        let mut m = Model {
            nq: 1,
            nv: 1,
            nu: 1,
            ..Model::default()
        };
        m.qpos0 = vec![0.0];
        m.jnt_type = vec![JointType::Hinge];
        m.jnt_limited = vec![true];
        m.jnt_range = vec![(-0.5, 1.5)];
        m.actuator_trntype = vec![TransmissionType::Joint];
        m.actuator_trnid = vec![[0, -1]];
        m.actuator_gear = vec![[2.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
        m
    }

    #[test]
    fn joint_range_scales_with_gear() {
        let m = one_hinge_model();
        let engine = SweepEngine;
        let mut state = engine.make_state(&m);
        let (lo, hi) = engine.set_length_range(&m, &mut state, 0, &LengthRangeOptions::default()).unwrap();
        assert!((lo + 1.0).abs() < 1e-12);
        assert!((hi - 3.0).abs() < 1e-12);
    }

    #[test]
    fn negative_gear_keeps_range_ordered() {
        let mut m = one_hinge_model();
        m.actuator_gear[0][0] = -1.0;
        let engine = SweepEngine;
        let mut state = engine.make_state(&m);
        let (lo, hi) = engine.set_length_range(&m, &mut state, 0, &LengthRangeOptions::default()).unwrap();
        assert!(lo < hi);
        assert!((lo + 1.5).abs() < 1e-12);
        assert!((hi - 0.5).abs() < 1e-12);
    }

    #[test]
    fn step_rejects_non_finite_state() {
        let m = one_hinge_model();
        let engine = SweepEngine;
        let mut state = engine.make_state(&m);
        state.qpos[0] = f64::NAN;
        assert!(engine.step(&m, &mut state).is_err());
    }
}
