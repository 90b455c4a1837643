//! Copy-back: write runtime-model values into the authoring spec.
//!
//! Valid only for a model this spec produced with no structural passes in
//! between: every entity count must match and the compile-time id maps must
//! still be available. User-mutable fields come back in the author's units
//! (angles convert back to degrees when the spec is degree-based); values
//! the compiler derived (addresses, masses folded from geoms, normalized
//! grids) return in their canonical runtime form. Statistics are recorded
//! as user overrides only when they differ from the auto-computed values.

use sim_model::{JointType, Model, SensorType};

use crate::error::CompileError;
use crate::orientation::Orientation;
use crate::spec::ModelSpec;
use crate::spec::body::Inertial;

/// Tolerance for detecting statistic overrides.
const STAT_TOL: f64 = 1e-10;

impl ModelSpec {
    /// Write user-mutable model fields back into the spec.
    ///
    /// Returns `false` (and records the reason on [`ModelSpec::last_error`])
    /// when the model does not match this spec's last successful compile.
    pub fn copy_back(&mut self, m: &Model) -> bool {
        match self.try_copy_back(m) {
            Ok(()) => true,
            Err(err) => {
                self.error = Some(err);
                false
            }
        }
    }

    fn try_copy_back(&mut self, m: &Model) -> crate::error::Result<()> {
        let maps = self.compile_maps.clone().ok_or_else(|| {
            CompileError::spec(
                "copy-back requires a model from this spec's last compile without structural passes",
            )
        })?;

        // Exact size agreement, every kind.
        let sizes = [
            (m.nbody, self.bodies.len(), "nbody"),
            (m.njnt, self.joints.len(), "njnt"),
            (m.ngeom, self.geoms.len(), "ngeom"),
            (m.nsite, self.sites.len(), "nsite"),
            (m.ncam, self.cameras.len(), "ncam"),
            (m.nlight, self.lights.len(), "nlight"),
            (m.nmesh, self.meshes.len(), "nmesh"),
            (m.nhfield, self.hfields.len(), "nhfield"),
            (m.nmat, self.materials.len(), "nmat"),
            (m.npair, self.pairs.len(), "npair"),
            (m.nexclude, self.excludes.len(), "nexclude"),
            (m.neq, self.equalities.len(), "neq"),
            (m.ntendon, self.tendons.len(), "ntendon"),
            (m.nu, self.actuators.len(), "nu"),
            (m.nsensor, self.sensors.len(), "nsensor"),
            (m.nnumeric, self.numerics.len(), "nnumeric"),
            (m.ntuple, self.tuples.len(), "ntuple"),
            (m.nkey, self.keys.len(), "nkey"),
        ];
        for (model_n, spec_n, label) in sizes {
            if model_n != spec_n {
                return Err(CompileError::spec(format!(
                    "size mismatch in copy-back: model {label}={model_n}, spec has {spec_n}"
                )));
            }
        }

        let degree_based = self.options.angle == crate::options::AngleUnit::Degree;

        // Bodies: pose and the consolidated inertial frame.
        for i in 1..m.nbody {
            let s = maps.bodies[i];
            self.bodies[s].pos = m.body_pos[i];
            self.bodies[s].orient = Orientation {
                quat: m.body_quat[i],
                alt: None,
            };
            self.bodies[s].inertial = Some(Inertial {
                pos: m.body_ipos[i],
                orient: Orientation {
                    quat: m.body_iquat[i],
                    alt: None,
                },
                mass: m.body_mass[i],
                diaginertia: Some(m.body_inertia[i]),
                fullinertia: None,
            });
        }

        // Joints: limits and references, back in author units.
        for j in 0..m.njnt {
            let s = maps.joints[j];
            let angular = matches!(m.jnt_type[j], JointType::Hinge | JointType::Ball);
            let back = move |v: f64| {
                if angular && degree_based {
                    v.to_degrees()
                } else {
                    v
                }
            };
            let params = &mut self.joints[s].params;
            params.range = Some((back(m.jnt_range[j].0), back(m.jnt_range[j].1)));
            params.refpos = Some(back(m.jnt_ref[j]));
            params.springref = Some(back(m.jnt_springref[j]));
            params.stiffness = Some(m.jnt_stiffness[j]);
            params.actfrcrange = Some(m.jnt_actfrcrange[j]);
            params.margin = Some(m.jnt_margin[j]);
            let dof = m.jnt_dofadr[j] as usize;
            params.damping = Some(m.dof_damping[dof]);
            params.armature = Some(m.dof_armature[dof]);
            params.frictionloss = Some(m.dof_frictionloss[dof]);
        }

        // Geoms: sizes and contact parameters. Poses stay: mesh and fromto
        // composition is not invertible.
        for g in 0..m.ngeom {
            let s = maps.geoms[g];
            let params = &mut self.geoms[s].params;
            if !matches!(
                m.geom_type[g],
                sim_model::GeomType::Mesh | sim_model::GeomType::HField
            ) {
                params.size = Some(m.geom_size[g]);
            }
            params.friction = Some(m.geom_friction[g]);
            params.margin = Some(m.geom_margin[g]);
            params.gap = Some(m.geom_gap[g]);
            params.solmix = Some(m.geom_solmix[g]);
            params.solref = Some(m.geom_solref[g]);
            params.solimp = Some(m.geom_solimp[g]);
        }

        // Meshes: the re-centering transform the compiler removed.
        for (i, mesh) in self.meshes.iter_mut().enumerate() {
            mesh.refpos = m.mesh_pos[i];
            mesh.refquat = m.mesh_quat[i];
        }

        // Height fields: runtime grids are bottom-up; restore author order.
        for (i, hfield) in self.hfields.iter_mut().enumerate() {
            let nrow = m.hfield_nrow[i] as usize;
            let ncol = m.hfield_ncol[i] as usize;
            let adr = m.hfield_adr[i] as usize;
            let mut rows = Vec::with_capacity(nrow * ncol);
            for r in (0..nrow).rev() {
                rows.extend_from_slice(&m.hfield_data[adr + r * ncol..adr + (r + 1) * ncol]);
            }
            hfield.userdata = rows;
            hfield.nrow = nrow;
            hfield.ncol = ncol;
            hfield.size = m.hfield_size[i];
        }

        // Sites, cameras, lights.
        for s in 0..m.nsite {
            let id = maps.sites[s];
            self.sites[id].pos = m.site_pos[s];
            self.sites[id].orient = Orientation {
                quat: m.site_quat[s],
                alt: None,
            };
            self.sites[id].params.size = Some(m.site_size[s]);
        }
        for c in 0..m.ncam {
            let id = maps.cameras[c];
            self.cameras[id].pos = m.cam_pos[c];
            self.cameras[id].orient = Orientation {
                quat: m.cam_quat[c],
                alt: None,
            };
            self.cameras[id].fovy = m.cam_fovy[c];
            self.cameras[id].intrinsic = m.cam_intrinsic[c];
            self.cameras[id].sensorsize = m.cam_sensorsize[c];
        }
        for l in 0..m.nlight {
            let id = maps.lights[l];
            self.lights[id].pos = m.light_pos[l];
            self.lights[id].dir = m.light_dir[l];
            self.lights[id].attenuation = m.light_attenuation[l];
            self.lights[id].cutoff = m.light_cutoff[l];
            self.lights[id].exponent = m.light_exponent[l];
        }

        // Materials.
        for (i, mat) in self.materials.iter_mut().enumerate() {
            mat.texuniform = m.mat_texuniform[i];
            mat.texrepeat = m.mat_texrepeat[i];
            mat.emission = m.mat_emission[i];
            mat.specular = m.mat_specular[i];
            mat.shininess = m.mat_shininess[i];
            mat.reflectance = m.mat_reflectance[i];
            mat.rgba = m.mat_rgba[i];
        }

        // Pairs and equalities. The resolved signatures also come back so
        // the spec records reflect the packed sort keys.
        for p in 0..m.npair {
            let id = maps.pairs[p];
            self.pairs[id].signature = m.pair_signature[p];
            let params = &mut self.pairs[id].params;
            params.condim = Some(m.pair_dim[p]);
            params.friction = Some(m.pair_friction[p]);
            params.solref = Some(m.pair_solref[p]);
            params.solreffriction = Some(m.pair_solreffriction[p]);
            params.solimp = Some(m.pair_solimp[p]);
            params.margin = Some(m.pair_margin[p]);
            params.gap = Some(m.pair_gap[p]);
        }
        for e in 0..m.nexclude {
            let id = maps.excludes[e];
            self.excludes[id].signature = m.exclude_signature[e];
        }
        for (e, eq) in self.equalities.iter_mut().enumerate() {
            eq.active = m.eq_active0[e];
            eq.solref = m.eq_solref[e];
            eq.solimp = m.eq_solimp[e];
            eq.data = m.eq_data[e];
        }

        // Tendons and actuators (declaration order is preserved for both).
        for (t, tendon) in self.tendons.iter_mut().enumerate() {
            let params = &mut tendon.params;
            params.range = Some(m.tendon_range[t]);
            params.margin = Some(m.tendon_margin[t]);
            params.stiffness = Some(m.tendon_stiffness[t]);
            params.damping = Some(m.tendon_damping[t]);
            params.frictionloss = Some(m.tendon_frictionloss[t]);
            params.width = Some(m.tendon_width[t]);
            params.springlength = Some(m.tendon_lengthspring[t]);
        }
        for (a, act) in self.actuators.iter_mut().enumerate() {
            let params = &mut act.params;
            params.dynprm = Some(m.actuator_dynprm[a]);
            params.gainprm = Some(m.actuator_gainprm[a]);
            params.biasprm = Some(m.actuator_biasprm[a]);
            params.ctrlrange = Some(m.actuator_ctrlrange[a]);
            params.forcerange = Some(m.actuator_forcerange[a]);
            params.actrange = Some(m.actuator_actrange[a]);
            params.gear = Some(m.actuator_gear[a]);
            params.cranklength = Some(m.actuator_cranklength[a]);
            act.lengthrange = Some(m.actuator_lengthrange[a]);
        }

        // Sensors.
        for (s, sensor) in self.sensors.iter_mut().enumerate() {
            sensor.cutoff = m.sensor_cutoff[s];
            sensor.noise = m.sensor_noise[s];
            if sensor.stype == SensorType::User {
                sensor.dim = Some(m.sensor_dim[s]);
            }
        }

        // Custom data.
        for (n, numeric) in self.numerics.iter_mut().enumerate() {
            let adr = m.numeric_adr[n] as usize;
            let size = m.numeric_size[n] as usize;
            numeric.size = Some(size);
            numeric.data = m.numeric_data[adr..adr + size].to_vec();
        }
        for (t, tuple) in self.tuples.iter_mut().enumerate() {
            let adr = m.tuple_adr[t] as usize;
            for (e, entry) in tuple.elements.iter_mut().enumerate() {
                entry.prm = m.tuple_objprm[adr + e];
            }
        }

        // Keyframes.
        for (k, key) in self.keys.iter_mut().enumerate() {
            key.time = m.key_time[k];
            key.qpos = Some(m.key_qpos[k * m.nq..(k + 1) * m.nq].to_vec());
            key.qvel = Some(m.key_qvel[k * m.nv..(k + 1) * m.nv].to_vec());
            key.act = Some(m.key_act[k * m.na..(k + 1) * m.na].to_vec());
            key.ctrl = Some(m.key_ctrl[k * m.nu..(k + 1) * m.nu].to_vec());
            key.mpos = Some(m.key_mpos[k * 3 * m.nmocap..(k + 1) * 3 * m.nmocap].to_vec());
            key.mquat = Some(m.key_mquat[k * 4 * m.nmocap..(k + 1) * 4 * m.nmocap].to_vec());
        }

        // Statistics: only differences from the auto values become overrides.
        if let Some(auto) = self.stat_auto.clone() {
            let set = |target: &mut Option<f64>, auto: f64, current: f64| {
                if (current - auto).abs() > STAT_TOL {
                    *target = Some(current);
                }
            };
            set(&mut self.stat.meanmass, auto.meanmass, m.stat.meanmass);
            set(&mut self.stat.meaninertia, auto.meaninertia, m.stat.meaninertia);
            set(&mut self.stat.meansize, auto.meansize, m.stat.meansize);
            set(&mut self.stat.extent, auto.extent, m.stat.extent);
            if (m.stat.center - auto.center).norm() > STAT_TOL {
                self.stat.center = Some(m.stat.center);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sim_model::JointType;

    fn pendulum() -> ModelSpec {
        let mut spec = ModelSpec::new();
        spec.options.angle = crate::options::AngleUnit::Radian;
        let b = spec.add_body(0);
        spec.bodies[b].name = "pole".to_string();
        let j = spec.add_joint(b);
        spec.joints[j].params.jtype = Some(JointType::Hinge);
        spec.joints[j].params.range = Some((-1.0, 1.0));
        let g = spec.add_geom(b);
        spec.geoms[g].params.size = Some(nalgebra::Vector3::new(0.1, 0.0, 0.0));
        spec
    }

    #[test]
    fn copy_back_round_trips_joint_ranges() {
        let mut spec = pendulum();
        let model = spec.compile().unwrap();
        assert!(spec.copy_back(&model));
        assert_eq!(spec.joints[0].params.range, Some((-1.0, 1.0)));
        // The consolidated inertial frame is now explicit on the body.
        let inertial = spec.bodies[1].inertial.as_ref().unwrap();
        assert!((inertial.mass - model.body_mass[1]).abs() < 1e-12);
    }

    #[test]
    fn copy_back_converts_angles_to_degrees() {
        let mut spec = pendulum();
        spec.options.angle = crate::options::AngleUnit::Degree;
        spec.joints[0].params.range = Some((-90.0, 90.0));
        let model = spec.compile().unwrap();
        assert!(spec.copy_back(&model));
        let (lo, hi) = spec.joints[0].params.range.unwrap();
        assert!((lo + 90.0).abs() < 1e-9, "got {lo}");
        assert!((hi - 90.0).abs() < 1e-9, "got {hi}");
    }

    #[test]
    fn copy_back_rejects_mismatched_model() {
        let mut spec = pendulum();
        let model = spec.compile().unwrap();
        let mut other = pendulum();
        other.add_geom(1);
        other.compile().unwrap();
        assert!(!other.copy_back(&model));
        assert!(other
            .last_error()
            .map(|e| e.to_string().contains("size mismatch"))
            .unwrap_or(false));
    }

    #[test]
    fn copy_back_then_recompile_reproduces_model() {
        let mut spec = pendulum();
        let model = spec.compile().unwrap();
        assert!(spec.copy_back(&model));
        let again = spec.compile().unwrap();
        assert_eq!(model.nq, again.nq);
        assert_eq!(model.qpos0, again.qpos0);
        assert_eq!(model.body_mass, again.body_mass);
        assert_eq!(model.jnt_range, again.jnt_range);
        assert_eq!(model.narena, again.narena);
    }

    #[test]
    fn statistics_override_only_when_changed() {
        let mut spec = pendulum();
        let mut model = spec.compile().unwrap();
        assert!(spec.copy_back(&model));
        assert!(spec.stat.extent.is_none(), "unchanged stat stays auto");

        model.stat.extent = 42.0;
        assert!(spec.copy_back(&model));
        assert_eq!(spec.stat.extent, Some(42.0));
    }
}
