//! Actuator length-range computation.
//!
//! Selects actuators by mode, disables gravity/contact/passive/actuation/
//! friction-loss for the duration, and shards the engine subcalls across a
//! worker pool of at most `min(16, available_parallelism / 2)` threads. Each
//! worker owns its simulation state; results land in disjoint slots keyed by
//! actuator id, so the outcome is identical for any worker count. When
//! several workers fail, the error of the lowest-indexed worker wins.

use sim_model::{
    BiasType, DISABLE_ACTUATION, DISABLE_CONTACT, DISABLE_FRICTIONLOSS, DISABLE_GRAVITY,
    DISABLE_PASSIVE, GainType, Model,
};

use crate::engine::Engine;
use crate::error::{CompileError, Result};
use crate::options::{LengthRangeMode, LengthRangeOptions};

/// Hard cap on the worker pool.
const MAX_WORKERS: usize = 16;

/// Compute and store length ranges for every qualifying actuator.
pub(crate) fn compute(
    model: &mut Model,
    engine: &dyn Engine,
    options: &LengthRangeOptions,
) -> Result<()> {
    // Select qualifying actuators.
    let targets: Vec<usize> = (0..model.nu)
        .filter(|&i| {
            let ismuscle = model.actuator_gaintype[i] == GainType::Muscle
                || model.actuator_biastype[i] == BiasType::Muscle;
            let isuser = model.actuator_gaintype[i] == GainType::User
                || model.actuator_biastype[i] == BiasType::User;
            match options.mode {
                LengthRangeMode::None => false,
                LengthRangeMode::Muscle => ismuscle,
                LengthRangeMode::MuscleUser => ismuscle || isuser,
                LengthRangeMode::All => true,
            }
        })
        .filter(|&i| {
            // Keep an already-valid range when asked to.
            let (lo, hi) = model.actuator_lengthrange[i];
            !(options.useexisting && lo < hi)
        })
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    // Disable dynamics that would perturb the search; restore on exit.
    let saved = model.opt.clone();
    model.opt.disableflags |= DISABLE_FRICTIONLOSS
        | DISABLE_CONTACT
        | DISABLE_PASSIVE
        | DISABLE_GRAVITY
        | DISABLE_ACTUATION;
    if let Some(timestep) = options.timestep {
        model.opt.timestep = timestep;
    }

    let result = run(model, engine, options, &targets);

    model.opt = saved;
    result
}

fn run(
    model: &mut Model,
    engine: &dyn Engine,
    options: &LengthRangeOptions,
    targets: &[usize],
) -> Result<()> {
    let nworker = std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS);

    let ranges = if !options.usethread || targets.len() < 2 || nworker < 2 {
        // Single-threaded path.
        let mut state = engine.make_state(model);
        let mut out = Vec::with_capacity(targets.len());
        for &i in targets {
            let range = engine
                .set_length_range(model, &mut state, i, options)
                .map_err(|e| CompileError::engine(e.message))?;
            out.push((i, range));
        }
        out
    } else {
        // Contiguous shards, one worker each. Workers return their slice of
        // results; writes stay disjoint by actuator id.
        let shard = targets.len().div_ceil(nworker);
        let model_ref: &Model = model;
        let results: Vec<std::result::Result<Vec<(usize, (f64, f64))>, CompileError>> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = targets
                    .chunks(shard)
                    .map(|chunk| {
                        scope.spawn(move || {
                            let mut state = engine.make_state(model_ref);
                            let mut out = Vec::with_capacity(chunk.len());
                            for &i in chunk {
                                let range = engine
                                    .set_length_range(model_ref, &mut state, i, options)
                                    .map_err(|e| CompileError::engine(e.message))?;
                                out.push((i, range));
                            }
                            Ok(out)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(CompileError::internal("length-range worker panicked"))
                        })
                    })
                    .collect()
            });

        // First worker error wins, by worker index.
        let mut out = Vec::with_capacity(targets.len());
        for result in results {
            out.extend(result?);
        }
        out
    };

    for (i, range) in ranges {
        model.actuator_lengthrange[i] = range;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineState, SweepEngine};
    use sim_model::{JointType, TransmissionType};

    fn hinge_model(nu: usize) -> Model {
        let mut m = Model {
            nq: nu,
            nv: nu,
            nu,
            ..Model::default()
        };
        m.qpos0 = vec![0.0; nu];
        for i in 0..nu {
            m.jnt_type.push(JointType::Hinge);
            m.jnt_limited.push(true);
            m.jnt_range.push((0.0, 1.0 + i as f64));
            m.actuator_trntype.push(TransmissionType::Joint);
            m.actuator_trnid.push([i as i32, -1]);
            m.actuator_gear.push([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
            m.actuator_gaintype.push(sim_model::GainType::Fixed);
            m.actuator_biastype.push(sim_model::BiasType::None);
            m.actuator_lengthrange.push((0.0, 0.0));
        }
        m
    }

    fn opts(mode: LengthRangeMode) -> LengthRangeOptions {
        LengthRangeOptions {
            mode,
            useexisting: false,
            ..LengthRangeOptions::default()
        }
    }

    #[test]
    fn mode_none_computes_nothing() {
        let mut m = hinge_model(2);
        compute(&mut m, &SweepEngine, &opts(LengthRangeMode::None)).unwrap();
        assert_eq!(m.actuator_lengthrange[0], (0.0, 0.0));
    }

    #[test]
    fn mode_all_fills_every_slot() {
        let mut m = hinge_model(3);
        compute(&mut m, &SweepEngine, &opts(LengthRangeMode::All)).unwrap();
        for i in 0..3 {
            let (lo, hi) = m.actuator_lengthrange[i];
            assert!(lo < hi, "actuator {i} has range ({lo}, {hi})");
            assert!((hi - (1.0 + i as f64)).abs() < 1e-12);
        }
    }

    #[test]
    fn useexisting_skips_valid_ranges() {
        let mut m = hinge_model(2);
        m.actuator_lengthrange[0] = (-9.0, 9.0);
        let options = LengthRangeOptions {
            mode: LengthRangeMode::All,
            useexisting: true,
            ..LengthRangeOptions::default()
        };
        compute(&mut m, &SweepEngine, &options).unwrap();
        assert_eq!(m.actuator_lengthrange[0], (-9.0, 9.0), "kept");
        assert!(m.actuator_lengthrange[1].1 > 0.0, "computed");
    }

    #[test]
    fn threaded_matches_single_threaded() {
        let mut threaded = hinge_model(24);
        compute(&mut threaded, &SweepEngine, &opts(LengthRangeMode::All)).unwrap();

        let mut single = hinge_model(24);
        let options = LengthRangeOptions {
            mode: LengthRangeMode::All,
            useexisting: false,
            usethread: false,
            ..LengthRangeOptions::default()
        };
        compute(&mut single, &SweepEngine, &options).unwrap();

        assert_eq!(threaded.actuator_lengthrange, single.actuator_lengthrange);
    }

    #[test]
    fn options_restore_after_compute() {
        let mut m = hinge_model(2);
        let before = m.opt.disableflags;
        compute(&mut m, &SweepEngine, &opts(LengthRangeMode::All)).unwrap();
        assert_eq!(m.opt.disableflags, before);
    }

    /// An engine that fails on one specific actuator.
    struct FailingEngine {
        bad: usize,
    }

    impl Engine for FailingEngine {
        fn step(
            &self,
            _model: &Model,
            _state: &mut EngineState,
        ) -> std::result::Result<Option<String>, EngineError> {
            Ok(None)
        }

        fn set_length_range(
            &self,
            _model: &Model,
            _state: &mut EngineState,
            actuator: usize,
            _options: &LengthRangeOptions,
        ) -> std::result::Result<(f64, f64), EngineError> {
            if actuator == self.bad {
                Err(EngineError::new(format!("diverged on actuator {actuator}")))
            } else {
                Ok((0.0, 1.0))
            }
        }
    }

    #[test]
    fn engine_error_becomes_compile_error() {
        let mut m = hinge_model(4);
        let err = compute(&mut m, &FailingEngine { bad: 2 }, &opts(LengthRangeMode::All))
            .unwrap_err();
        assert!(err.to_string().contains("diverged on actuator 2"));
        // Options restored even on failure.
        assert_eq!(m.opt.disableflags, 0);
    }
}
