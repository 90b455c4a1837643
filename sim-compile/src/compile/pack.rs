//! Final packing into the runtime model.
//!
//! Computes every output size, then copies the compiled entities into the
//! flat model arrays: kinematic tree, assets, constraints, tendons,
//! actuators, sensors, custom fields, keyframes, BVH pools, and the
//! names/paths tables with their hash maps. Also applies total-mass
//! rescaling, derives the summary statistics, and sizes the arena.

use nalgebra::{UnitQuaternion, Vector3};
use sim_model::{DynType, JointType, Model, ObjectType, SensorType, WrapType, names};

use crate::compile::address::{Layout, world_poses};
use crate::compile::bvh::BvhTree;
use crate::compile::entity::{GeomComp, JointComp, MINVAL, SiteComp};
use crate::compile::inertia::BodyInertia;
use crate::compile::resolve::{ResolvedRefs, ResolvedWrap};
use crate::error::{CompileError, Result};
use crate::plugin::PluginHost;
use crate::resources::resolve_path;
use crate::spec::ModelSpec;

/// Footprint of one contact record in the arena heuristic.
const CONTACT_BYTES: usize = 592;
/// Arena granularity: sizes round up to whole megabytes.
const MEGABYTE: usize = 1 << 20;

/// All compiled intermediate state the packer consumes.
pub(crate) struct Packed<'a> {
    pub geoms: &'a [GeomComp],
    pub sites: &'a [SiteComp],
    pub joints: &'a [JointComp],
    pub inertia: &'a [BodyInertia],
    pub layout: &'a Layout,
    pub refs: &'a ResolvedRefs,
    pub body_trees: &'a [BvhTree],
    pub mesh_trees: &'a [BvhTree],
    pub flex_trees: &'a [BvhTree],
}

/// Build the runtime model. Also returns the auto-computed statistics
/// before user overrides, which the decompiler needs.
pub(crate) fn pack(
    spec: &ModelSpec,
    parts: &Packed,
    host: &dyn PluginHost,
) -> Result<(Model, sim_model::Statistics)> {
    let mut m = Model::default();
    let l = parts.layout;

    // ------------------------------ sizes ------------------------------
    m.nq = l.nq;
    m.nv = l.nv;
    m.nbody = spec.bodies.len();
    m.njnt = spec.joints.len();
    m.ngeom = spec.geoms.len();
    m.nsite = spec.sites.len();
    m.ncam = spec.cameras.len();
    m.nlight = spec.lights.len();
    m.nmesh = spec.meshes.len();
    m.nskin = spec.skins.len();
    m.nhfield = spec.hfields.len();
    m.ntex = spec.textures.len();
    m.nmat = spec.materials.len();
    m.nflex = spec.flexes.len();
    m.npair = spec.pairs.len();
    m.nexclude = spec.excludes.len();
    m.neq = spec.equalities.len();
    m.ntendon = spec.tendons.len();
    m.nsensor = spec.sensors.len();
    m.nnumeric = spec.numerics.len();
    m.ntext = spec.texts.len();
    m.ntuple = spec.tuples.len();
    m.nkey = spec.keys.len();
    m.nplugin = spec.plugins.len();
    m.nu = spec.actuators.len();
    m.nm = l.nm;
    m.nd = l.nd;
    m.nb = l.nb;
    m.ntree = l.ntree;
    m.opt = spec.model_options.clone();

    // ------------------------------ state ------------------------------
    m.qpos0.clone_from(&l.qpos0);
    m.qpos_spring.clone_from(&l.qpos_spring);

    // ------------------------------ bodies ------------------------------
    for (i, body) in spec.bodies.iter().enumerate() {
        m.body_parentid.push(body.parent as i32);
        m.body_rootid.push(l.body_rootid[i]);
        m.body_weldid.push(l.body_weldid[i]);
        m.body_jntadr.push(l.body_jntadr[i]);
        m.body_jntnum.push(l.body_jntnum[i]);
        m.body_dofadr.push(l.body_dofadr[i]);
        m.body_dofnum.push(l.body_dofnum[i]);
        m.body_geomadr
            .push(body.geoms.first().map_or(-1, |&g| g as i32));
        m.body_geomnum.push(body.geoms.len() as i32);
        m.body_treeid.push(l.body_treeid[i]);
        m.body_simple.push(l.body_simple[i]);
        m.body_sameframe.push(l.body_sameframe[i]);
        m.body_pos.push(body.pos);
        m.body_quat.push(body.orient.quat);
        m.body_ipos.push(parts.inertia[i].ipos);
        m.body_iquat.push(parts.inertia[i].iquat);
        m.body_mass.push(parts.inertia[i].mass);
        m.body_inertia.push(parts.inertia[i].inertia);
        if body.mocap {
            m.body_mocapid.push(m.nmocap as i32);
            m.nmocap += 1;
        } else {
            m.body_mocapid.push(-1);
        }
    }
    m.body_subtreemass = vec![0.0; m.nbody];

    // ------------------------------ joints & dofs ------------------------------
    for (j, comp) in parts.joints.iter().enumerate() {
        m.jnt_type.push(comp.jtype);
        m.jnt_qposadr.push(l.jnt_qposadr[j]);
        m.jnt_dofadr.push(l.jnt_dofadr[j]);
        m.jnt_bodyid.push(spec.joints[j].body as i32);
        m.jnt_limited.push(comp.limited);
        m.jnt_actfrclimited.push(comp.actfrclimited);
        m.jnt_pos.push(comp.pos);
        m.jnt_axis.push(comp.axis);
        m.jnt_stiffness.push(comp.stiffness);
        m.jnt_range.push(comp.range);
        m.jnt_actfrcrange.push(comp.actfrcrange);
        m.jnt_margin.push(comp.margin);
        m.jnt_ref.push(comp.refpos);
        m.jnt_springref.push(comp.springref);
        m.jnt_solref.push(comp.solref_limit);
        m.jnt_solimp.push(comp.solimp_limit);
    }
    m.dof_bodyid.clone_from(&l.dof_bodyid);
    m.dof_jntid.clone_from(&l.dof_jntid);
    m.dof_parentid.clone_from(&l.dof_parentid);
    m.dof_treeid.clone_from(&l.dof_treeid);
    m.dof_madr.clone_from(&l.dof_madr);
    m.dof_simplenum.clone_from(&l.dof_simplenum);
    for d in 0..m.nv {
        let j = m.dof_jntid[d] as usize;
        let comp = &parts.joints[j];
        m.dof_armature.push(comp.armature);
        m.dof_damping.push(comp.damping);
        m.dof_frictionloss.push(comp.frictionloss);
        m.dof_solref.push(comp.solref_friction);
        m.dof_solimp.push(comp.solimp_friction);
    }

    // ------------------------------ geoms ------------------------------
    for comp in parts.geoms {
        m.geom_type.push(comp.gtype);
        m.geom_contype.push(comp.contype);
        m.geom_conaffinity.push(comp.conaffinity);
        m.geom_condim.push(comp.condim);
        m.geom_dataid.push(comp.dataid);
        m.geom_matid.push(comp.matid);
        m.geom_group.push(comp.group);
        m.geom_priority.push(comp.priority);
        m.geom_size.push(comp.size);
        m.geom_aabb.push(comp.aabb);
        m.geom_rbound.push(comp.rbound);
        m.geom_pos.push(comp.pos);
        m.geom_quat.push(comp.quat);
        m.geom_friction.push(comp.friction);
        m.geom_solmix.push(comp.solmix);
        m.geom_solref.push(comp.solref);
        m.geom_solimp.push(comp.solimp);
        m.geom_margin.push(comp.margin);
        m.geom_gap.push(comp.gap);
        m.geom_fluid.push(comp.fluid);
        m.geom_rgba.push(comp.rgba);
    }
    for geom in &spec.geoms {
        m.geom_bodyid.push(geom.body as i32);
    }

    // ------------------------------ sites ------------------------------
    for (s, comp) in parts.sites.iter().enumerate() {
        m.site_type.push(comp.stype);
        m.site_bodyid.push(spec.sites[s].body as i32);
        m.site_matid.push(comp.matid);
        m.site_group.push(comp.group);
        m.site_size.push(comp.size);
        m.site_pos.push(comp.pos);
        m.site_quat.push(comp.quat);
        m.site_rgba.push(comp.rgba);
    }

    // ------------------------------ cameras & lights ------------------------------
    for (c, cam) in spec.cameras.iter().enumerate() {
        m.cam_bodyid.push(cam.body as i32);
        m.cam_targetbodyid.push(parts.refs.cam_target[c]);
        m.cam_pos.push(cam.pos);
        m.cam_quat.push(cam.orient.quat);
        m.cam_fovy.push(cam.fovy);
        m.cam_resolution.push(cam.resolution);
        m.cam_sensorsize.push(cam.sensorsize);
        m.cam_intrinsic.push(cam.intrinsic);
    }
    for (i, light) in spec.lights.iter().enumerate() {
        m.light_bodyid.push(light.body as i32);
        m.light_targetbodyid.push(parts.refs.light_target[i]);
        m.light_directional.push(light.directional);
        m.light_castshadow.push(light.castshadow);
        m.light_pos.push(light.pos);
        m.light_dir.push(light.dir);
        m.light_attenuation.push(light.attenuation);
        m.light_cutoff.push(light.cutoff);
        m.light_exponent.push(light.exponent);
        m.light_ambient.push(light.ambient);
        m.light_diffuse.push(light.diffuse);
        m.light_specular.push(light.specular);
    }

    // ------------------------------ BVH pools ------------------------------
    // Body trees first (the dynamic pool), then mesh and flex trees.
    let append_tree = |m: &mut Model, tree: &BvhTree| -> (i32, i32) {
        if tree.len() == 0 {
            return (-1, 0);
        }
        let adr = m.bvh_depth.len() as i32;
        let base = adr;
        m.bvh_depth.extend_from_slice(&tree.depth);
        m.bvh_nodeid.extend_from_slice(&tree.nodeid);
        m.bvh_aabb.extend_from_slice(&tree.aabb);
        for &[a, b] in &tree.child {
            m.bvh_child.push([
                if a >= 0 { a + base } else { -1 },
                if b >= 0 { b + base } else { -1 },
            ]);
        }
        (adr, tree.len() as i32)
    };
    for tree in parts.body_trees {
        let (adr, num) = append_tree(&mut m, tree);
        m.body_bvhadr.push(adr);
        m.body_bvhnum.push(num);
    }
    m.nbvhdynamic = m.bvh_depth.len();
    for tree in parts.mesh_trees {
        let (adr, num) = append_tree(&mut m, tree);
        m.mesh_bvhadr.push(adr);
        m.mesh_bvhnum.push(num);
    }
    for tree in parts.flex_trees {
        let (adr, num) = append_tree(&mut m, tree);
        m.flex_bvhadr.push(adr);
        m.flex_bvhnum.push(num);
    }
    m.nbvh = m.bvh_depth.len();
    m.nbvhstatic = m.nbvh - m.nbvhdynamic;

    // ------------------------------ meshes ------------------------------
    for mesh in &spec.meshes {
        m.mesh_vertadr.push(m.mesh_vert.len() as i32 / 3);
        m.mesh_vertnum.push(mesh.vert.len() as i32 / 3);
        m.mesh_normaladr.push(m.mesh_normal.len() as i32 / 3);
        m.mesh_normalnum.push(mesh.normal.len() as i32 / 3);
        m.mesh_texcoordadr.push(if mesh.texcoord.is_empty() {
            -1
        } else {
            m.mesh_texcoord.len() as i32 / 2
        });
        m.mesh_texcoordnum.push(mesh.texcoord.len() as i32 / 2);
        m.mesh_faceadr.push(m.mesh_face.len() as i32 / 3);
        m.mesh_facenum.push(mesh.face.len() as i32 / 3);
        m.mesh_graphadr.push(-1);
        m.mesh_pos.push(mesh.refpos);
        m.mesh_quat.push(mesh.refquat);
        m.mesh_vert.extend_from_slice(&mesh.vert);
        m.mesh_normal.extend_from_slice(&mesh.normal);
        m.mesh_texcoord.extend_from_slice(&mesh.texcoord);
        m.mesh_face.extend_from_slice(&mesh.face);
        m.mesh_facenormal.extend_from_slice(&mesh.facenormal);
    }
    m.nmeshvert = m.mesh_vert.len() / 3;
    m.nmeshnormal = m.mesh_normal.len() / 3;
    m.nmeshtexcoord = m.mesh_texcoord.len() / 2;
    m.nmeshface = m.mesh_face.len() / 3;
    m.nmeshgraph = m.mesh_graph.len();

    // ------------------------------ hfields ------------------------------
    for hfield in &spec.hfields {
        m.hfield_size.push(hfield.size);
        m.hfield_nrow.push(hfield.nrow as i32);
        m.hfield_ncol.push(hfield.ncol as i32);
        m.hfield_adr.push(m.hfield_data.len() as i32);
        m.hfield_data.extend_from_slice(&hfield.data);
    }
    m.nhfielddata = m.hfield_data.len();

    // ------------------------------ textures & materials ------------------------------
    for tex in &spec.textures {
        m.tex_type.push(tex.ttype);
        m.tex_height.push(tex.height as i32);
        m.tex_width.push(tex.width as i32);
        m.tex_adr.push(m.tex_rgb.len() as i32);
        m.tex_rgb.extend_from_slice(&tex.data);
    }
    m.ntexdata = m.tex_rgb.len();
    for (i, mat) in spec.materials.iter().enumerate() {
        m.mat_texid.push(parts.refs.mat_texid[i]);
        m.mat_texuniform.push(mat.texuniform);
        m.mat_texrepeat.push(mat.texrepeat);
        m.mat_emission.push(mat.emission);
        m.mat_specular.push(mat.specular);
        m.mat_shininess.push(mat.shininess);
        m.mat_reflectance.push(mat.reflectance);
        m.mat_rgba.push(mat.rgba);
    }

    // ------------------------------ skins ------------------------------
    for (i, skin) in spec.skins.iter().enumerate() {
        let matid = match skin.material {
            None => -1,
            Some(ref name) => spec
                .find_object(ObjectType::Material, name)
                .ok_or_else(|| {
                    CompileError::reference(format!(
                        "unknown Material '{name}' in skin '{}'",
                        skin.name
                    ))
                })? as i32,
        };
        m.skin_matid.push(matid);
        m.skin_group.push(skin.group);
        m.skin_rgba.push(skin.rgba);
        m.skin_inflate.push(skin.inflate);
        m.skin_vertadr.push(m.skin_vert.len() as i32 / 3);
        m.skin_vertnum.push(skin.vert.len() as i32 / 3);
        m.skin_texcoordadr.push(if skin.texcoord.is_empty() {
            -1
        } else {
            m.skin_texcoord.len() as i32 / 2
        });
        m.skin_faceadr.push(m.skin_face.len() as i32 / 3);
        m.skin_facenum.push(skin.face.len() as i32 / 3);
        m.skin_boneadr.push(m.skin_bonebodyid.len() as i32);
        m.skin_bonenum.push(skin.bones.len() as i32);
        m.skin_vert.extend_from_slice(&skin.vert);
        m.skin_texcoord.extend_from_slice(&skin.texcoord);
        m.skin_face.extend_from_slice(&skin.face);
        for (b, bone) in skin.bones.iter().enumerate() {
            m.skin_bonevertadr.push(m.skin_bonevertid.len() as i32);
            m.skin_bonevertnum.push(bone.vertid.len() as i32);
            m.skin_bonebindpos.push(bone.bindpos);
            m.skin_bonebindquat.push(bone.bindquat.quat);
            m.skin_bonebodyid.push(parts.refs.skin_bonebody[i][b]);
            m.skin_bonevertid.extend_from_slice(&bone.vertid);
            m.skin_bonevertweight.extend_from_slice(&bone.vertweight);
        }
    }
    m.nskinvert = m.skin_vert.len() / 3;
    m.nskinface = m.skin_face.len() / 3;
    m.nskinbone = m.skin_bonebodyid.len();
    m.nskinbonevert = m.skin_bonevertid.len();

    // ------------------------------ flexes ------------------------------
    let mut elem_count = 0i32;
    for (i, flex) in spec.flexes.iter().enumerate() {
        let stride = (flex.dim + 1) as usize;
        let nelem = (flex.elem.len() / stride) as i32;
        m.flex_dim.push(flex.dim);
        m.flex_matid.push(-1);
        m.flex_group.push(flex.group);
        m.flex_vertadr.push(m.flex_vert.len() as i32 / 3);
        m.flex_vertnum.push(flex.vert.len() as i32 / 3);
        m.flex_edgeadr.push(m.flex_edge.len() as i32);
        m.flex_edgenum.push(flex.edge.len() as i32);
        m.flex_elemadr.push(elem_count);
        m.flex_elemnum.push(nelem);
        elem_count += nelem;
        m.flex_elemdataadr.push(m.flex_elem.len() as i32);
        m.flex_shelldataadr.push(if flex.shell.is_empty() {
            -1
        } else {
            m.flex_shell.len() as i32
        });
        m.flex_shellnum.push(flex.shell.len() as i32 / flex.dim.max(1));
        m.flex_evpairadr.push(m.flex_evpair.len() as i32);
        m.flex_evpairnum.push(flex.evpair.len() as i32);
        m.flex_radius.push(flex.radius);
        m.flex_rgba.push(flex.rgba);
        m.flex_vert.extend_from_slice(&flex.vert);
        m.flex_vertbodyid
            .extend_from_slice(&parts.refs.flex_vertbody[i]);
        m.flex_edge.extend_from_slice(&flex.edge);
        m.flex_elem.extend_from_slice(&flex.elem);
        m.flex_shell.extend_from_slice(&flex.shell);
        m.flex_evpair.extend_from_slice(&flex.evpair);
        m.flex_texcoord.extend_from_slice(&flex.texcoord);
    }
    m.nflexvert = m.flex_vert.len() / 3;
    m.nflexedge = m.flex_edge.len();
    m.nflexelem = elem_count as usize;
    m.nflexelemdata = m.flex_elem.len();
    m.nflexshelldata = m.flex_shell.len();
    m.nflexevpair = m.flex_evpair.len();

    // ------------------------------ pairs & excludes ------------------------------
    for (i, pair) in spec.pairs.iter().enumerate() {
        let p = &pair.params;
        let (g1, g2) = parts.refs.pair_geoms[i];
        m.pair_dim.push(p.condim.unwrap_or(3));
        m.pair_geom1.push(g1 as i32);
        m.pair_geom2.push(g2 as i32);
        m.pair_signature.push(pair.signature);
        m.pair_solref
            .push(p.solref.unwrap_or(crate::compile::entity::DEFAULT_SOLREF));
        m.pair_solreffriction.push(p.solreffriction.unwrap_or([0.0, 0.0]));
        m.pair_solimp
            .push(p.solimp.unwrap_or(crate::compile::entity::DEFAULT_SOLIMP));
        m.pair_margin.push(p.margin.unwrap_or(0.0));
        m.pair_gap.push(p.gap.unwrap_or(0.0));
        m.pair_friction
            .push(p.friction.unwrap_or([1.0, 1.0, 0.005, 0.0001, 0.0001]));
    }
    for exclude in &spec.excludes {
        m.exclude_signature.push(exclude.signature);
    }

    // ------------------------------ equalities ------------------------------
    for (i, eq) in spec.equalities.iter().enumerate() {
        m.eq_type.push(eq.eqtype);
        m.eq_obj1id.push(parts.refs.eq_obj[i].0);
        m.eq_obj2id.push(parts.refs.eq_obj[i].1);
        m.eq_objtype.push(parts.refs.eq_objtype[i]);
        m.eq_active0.push(eq.active);
        m.eq_solref.push(eq.solref);
        m.eq_solimp.push(eq.solimp);
        m.eq_data.push(eq.data);
    }

    // ------------------------------ tendons ------------------------------
    let body_pose = world_poses(spec);
    for (t, tendon) in spec.tendons.iter().enumerate() {
        let p = &tendon.params;
        m.tendon_adr.push(m.wrap_type.len() as i32);
        m.tendon_num.push(parts.refs.wraps[t].len() as i32);
        m.tendon_matid.push(-1);
        m.tendon_group.push(p.group.unwrap_or(0));
        let range = p.range.unwrap_or((0.0, 0.0));
        m.tendon_limited.push(p.limited.unwrap_or(range.0 < range.1));
        m.tendon_range.push(range);
        m.tendon_width.push(p.width.unwrap_or(0.003));
        m.tendon_solref_lim
            .push(p.solref_limit.unwrap_or(crate::compile::entity::DEFAULT_SOLREF));
        m.tendon_solimp_lim
            .push(p.solimp_limit.unwrap_or(crate::compile::entity::DEFAULT_SOLIMP));
        m.tendon_solref_fri
            .push(p.solref_friction.unwrap_or(crate::compile::entity::DEFAULT_SOLREF));
        m.tendon_solimp_fri
            .push(p.solimp_friction.unwrap_or(crate::compile::entity::DEFAULT_SOLIMP));
        m.tendon_margin.push(p.margin.unwrap_or(0.0));
        m.tendon_stiffness.push(p.stiffness.unwrap_or(0.0));
        m.tendon_damping.push(p.damping.unwrap_or(0.0));
        m.tendon_frictionloss.push(p.frictionloss.unwrap_or(0.0));
        m.tendon_rgba.push(p.rgba.unwrap_or([0.5, 0.5, 0.5, 1.0]));

        for wrap in &parts.refs.wraps[t] {
            match wrap {
                ResolvedWrap::Joint { joint, coef } => {
                    m.wrap_type.push(WrapType::Joint);
                    m.wrap_objid.push(*joint as i32);
                    m.wrap_prm.push(*coef);
                }
                ResolvedWrap::Site { site } => {
                    m.wrap_type.push(WrapType::Site);
                    m.wrap_objid.push(*site as i32);
                    m.wrap_prm.push(0.0);
                }
                ResolvedWrap::Geom {
                    wtype,
                    geom,
                    sidesite,
                } => {
                    m.wrap_type.push(*wtype);
                    m.wrap_objid.push(*geom as i32);
                    m.wrap_prm.push(f64::from(*sidesite));
                }
                ResolvedWrap::Pulley { divisor } => {
                    m.wrap_type.push(WrapType::Pulley);
                    m.wrap_objid.push(-1);
                    m.wrap_prm.push(*divisor);
                }
            }
        }

        // Length at the reference configuration: joint sums for fixed
        // tendons, straight segments between sites (with pulley division)
        // for spatial ones.
        let length0 = tendon_length0(spec, parts, t, &body_pose, &m);
        m.tendon_length0.push(length0);
        m.tendon_lengthspring
            .push(p.springlength.unwrap_or([length0, length0]));
    }
    m.nwrap = m.wrap_type.len();

    // ------------------------------ actuators ------------------------------
    for (a, act) in spec.actuators.iter().enumerate() {
        let p = &act.params;
        let (trntype, trnid) = parts.refs.actuator_trn[a];
        let dyntype = p.dyntype.unwrap_or(DynType::None);
        m.actuator_trntype.push(trntype);
        m.actuator_dyntype.push(dyntype);
        m.actuator_gaintype
            .push(p.gaintype.unwrap_or(sim_model::GainType::Fixed));
        m.actuator_biastype
            .push(p.biastype.unwrap_or(sim_model::BiasType::None));
        m.actuator_trnid.push(trnid);
        let actnum = match act.actdim {
            Some(dim) => {
                if dim < 0 {
                    return Err(CompileError::spec(format!(
                        "actuator '{}' has negative actdim",
                        act.name
                    )));
                }
                dim
            }
            None => i32::from(dyntype != DynType::None),
        };
        m.actuator_actadr
            .push(if actnum > 0 { m.na as i32 } else { -1 });
        m.actuator_actnum.push(actnum);
        m.na += actnum as usize;
        let ctrlrange = p.ctrlrange.unwrap_or((0.0, 0.0));
        let forcerange = p.forcerange.unwrap_or((0.0, 0.0));
        let actrange = p.actrange.unwrap_or((0.0, 0.0));
        m.actuator_ctrllimited
            .push(p.ctrllimited.unwrap_or(ctrlrange.0 < ctrlrange.1));
        m.actuator_forcelimited
            .push(p.forcelimited.unwrap_or(forcerange.0 < forcerange.1));
        m.actuator_actlimited
            .push(p.actlimited.unwrap_or(actrange.0 < actrange.1));
        m.actuator_ctrlrange.push(ctrlrange);
        m.actuator_forcerange.push(forcerange);
        m.actuator_actrange.push(actrange);
        m.actuator_dynprm.push(p.dynprm.unwrap_or([1.0, 0.0, 0.0]));
        m.actuator_gainprm
            .push(p.gainprm.unwrap_or([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        m.actuator_biasprm.push(p.biasprm.unwrap_or([0.0; 9]));
        m.actuator_gear
            .push(p.gear.unwrap_or([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        m.actuator_cranklength.push(p.cranklength.unwrap_or(0.0));
        m.actuator_lengthrange
            .push(act.lengthrange.unwrap_or((0.0, 0.0)));
        m.actuator_plugin.push(-1);
    }

    // ------------------------------ plugins ------------------------------
    resolve_plugins(spec, &mut m, host)?;

    // ------------------------------ sensors ------------------------------
    for comp in &parts.refs.sensors {
        let mut comp = comp.clone();
        if comp.stype == SensorType::Plugin {
            // Dim and instance were filled by the plugin pass below.
            let s = m.sensor_type.len();
            comp.dim = plugin_sensor_dim(spec, s, host)?;
            comp.plugin = plugin_instance_id(spec, s)?;
        }
        m.sensor_type.push(comp.stype);
        m.sensor_datatype.push(comp.datatype);
        m.sensor_needstage.push(comp.needstage);
        m.sensor_objtype.push(comp.objtype);
        m.sensor_objid.push(comp.objid);
        m.sensor_reftype.push(comp.reftype);
        m.sensor_refid.push(comp.refid);
        m.sensor_dim.push(comp.dim);
        m.sensor_adr.push(m.nsensordata as i32);
        m.nsensordata += comp.dim.max(0) as usize;
        m.sensor_cutoff.push(comp.cutoff);
        m.sensor_noise.push(comp.noise);
        m.sensor_plugin.push(comp.plugin);
    }

    // ------------------------------ custom fields ------------------------------
    for numeric in &spec.numerics {
        let size = numeric.size.unwrap_or(numeric.data.len());
        if size == 0 {
            return Err(CompileError::spec(format!(
                "numeric '{}' has empty size",
                numeric.name
            )));
        }
        if numeric.data.len() > size {
            return Err(CompileError::spec(format!(
                "numeric '{}' data exceeds declared size",
                numeric.name
            )));
        }
        m.numeric_adr.push(m.numeric_data.len() as i32);
        m.numeric_size.push(size as i32);
        m.numeric_data.extend_from_slice(&numeric.data);
        m.numeric_data
            .extend(std::iter::repeat(0.0).take(size - numeric.data.len()));
    }
    m.nnumericdata = m.numeric_data.len();

    for text in &spec.texts {
        if text.data.is_empty() {
            return Err(CompileError::spec(format!(
                "text '{}' has empty data",
                text.name
            )));
        }
        m.text_adr.push(m.text_data.len() as i32);
        m.text_size.push(text.data.len() as i32 + 1);
        m.text_data.extend_from_slice(text.data.as_bytes());
        m.text_data.push(0);
    }
    m.ntextdata = m.text_data.len();

    for (t, tuple) in spec.tuples.iter().enumerate() {
        m.tuple_adr.push(m.tuple_objid.len() as i32);
        m.tuple_size.push(tuple.elements.len() as i32);
        for (e, entry) in tuple.elements.iter().enumerate() {
            let (objtype, objid) = parts.refs.tuple_obj[t][e];
            m.tuple_objtype.push(objtype);
            m.tuple_objid.push(objid);
            m.tuple_objprm.push(entry.prm);
        }
    }
    m.ntupledata = m.tuple_objid.len();

    // ------------------------------ keyframes ------------------------------
    pack_keyframes(spec, &mut m)?;

    // ------------------------------ names & paths ------------------------------
    pack_names(spec, &mut m);
    pack_paths(spec, &mut m);

    // ------------------------------ mass rescaling & derived mass data ------------------------------
    if spec.options.settotalmass > 0.0 {
        let total: f64 = m.body_mass.iter().skip(1).sum();
        if total > MINVAL {
            let scale = spec.options.settotalmass / total;
            for i in 1..m.nbody {
                m.body_mass[i] *= scale;
                m.body_inertia[i] *= scale;
            }
        }
    }
    for i in (1..m.nbody).rev() {
        m.body_subtreemass[i] += m.body_mass[i];
        let parent = m.body_parentid[i] as usize;
        m.body_subtreemass[parent] += m.body_subtreemass[i];
    }

    // ------------------------------ statistics & arena ------------------------------
    let auto = compute_statistics(spec, &mut m, &body_pose);
    m.narena = arena_size(spec, &m);

    Ok((m, auto))
}

/// Tendon length at the reference configuration.
fn tendon_length0(
    spec: &ModelSpec,
    parts: &Packed,
    t: usize,
    body_pose: &[(Vector3<f64>, UnitQuaternion<f64>)],
    m: &Model,
) -> f64 {
    let wraps = &parts.refs.wraps[t];
    if spec.tendons[t].is_fixed() {
        let mut length = 0.0;
        for wrap in wraps {
            if let ResolvedWrap::Joint { joint, coef } = wrap {
                let adr = m.jnt_qposadr[*joint] as usize;
                length += coef * m.qpos0[adr];
            }
        }
        return length;
    }
    // Spatial: straight segments between consecutive sites, divided at
    // pulleys. Wrapping geoms are ignored at the reference configuration.
    let site_world = |s: usize| {
        let body = spec.sites[s].body;
        let (bpos, bquat) = body_pose[body];
        bpos + bquat * parts.sites[s].pos
    };
    let mut length = 0.0;
    let mut divisor = 1.0;
    let mut prev: Option<Vector3<f64>> = None;
    for wrap in wraps {
        match wrap {
            ResolvedWrap::Site { site } => {
                let p = site_world(*site);
                if let Some(q) = prev {
                    length += (p - q).norm() / divisor;
                }
                prev = Some(p);
            }
            ResolvedWrap::Pulley { divisor: d } => {
                divisor = *d;
                prev = None;
            }
            ResolvedWrap::Geom { .. } | ResolvedWrap::Joint { .. } => {}
        }
    }
    length
}

/// Resolve plugin instances: capability, state addresses, packed attributes.
fn resolve_plugins(spec: &ModelSpec, m: &mut Model, host: &dyn PluginHost) -> Result<()> {
    for instance in &spec.plugins {
        let capability = host.capability(&instance.plugin_name).ok_or_else(|| {
            CompileError::plugin(format!("unknown plugin '{}'", instance.plugin_name))
        })?;
        let statenum = host.state_size(&instance.plugin_name, &instance.attributes)?;
        m.plugin_capability.push(capability);
        m.plugin_stateadr.push(m.npluginstate as i32);
        m.plugin_statenum.push(statenum as i32);
        m.npluginstate += statenum;
        m.plugin_attradr.push(m.plugin_attr.len() as i32);
        for (key, value) in &instance.attributes {
            m.plugin_attr.extend_from_slice(key.as_bytes());
            m.plugin_attr.push(b'=');
            m.plugin_attr.extend_from_slice(value.as_bytes());
            m.plugin_attr.push(0);
        }
    }
    m.npluginattr = m.plugin_attr.len();

    // Actuators driven by plugins: the instance must be an actuator plugin.
    for (a, act) in spec.actuators.iter().enumerate() {
        if let Some(ref name) = act.plugin {
            let id = spec.find_object(ObjectType::Plugin, name).ok_or_else(|| {
                CompileError::plugin(format!("unknown plugin instance '{name}'"))
            })?;
            if m.plugin_capability[id] != sim_model::PluginCapability::Actuator {
                return Err(CompileError::plugin(format!(
                    "plugin instance '{name}' does not provide an actuator"
                )));
            }
            m.actuator_plugin[a] = id as i32;
        }
    }
    Ok(())
}

fn plugin_instance_id(spec: &ModelSpec, sensor: usize) -> Result<i32> {
    let name = spec.sensors[sensor].plugin.as_deref().ok_or_else(|| {
        CompileError::plugin(format!(
            "plugin sensor '{}' names no plugin instance",
            spec.sensors[sensor].name
        ))
    })?;
    spec.find_object(ObjectType::Plugin, name)
        .map(|id| id as i32)
        .ok_or_else(|| CompileError::plugin(format!("unknown plugin instance '{name}'")))
}

fn plugin_sensor_dim(spec: &ModelSpec, sensor: usize, host: &dyn PluginHost) -> Result<i32> {
    let id = plugin_instance_id(spec, sensor)? as usize;
    let instance = &spec.plugins[id];
    match host.capability(&instance.plugin_name) {
        Some(sim_model::PluginCapability::Sensor) => {}
        _ => {
            return Err(CompileError::plugin(format!(
                "plugin instance '{}' does not provide a sensor",
                instance.name
            )));
        }
    }
    Ok(host.sensor_dim(&instance.plugin_name, &instance.attributes)? as i32)
}

/// Keyframes: validate lengths, fill defaults, normalize quaternions.
fn pack_keyframes(spec: &ModelSpec, m: &mut Model) -> Result<()> {
    for key in &spec.keys {
        let check = |field: &Option<Vec<f64>>, label: &str, expected: usize| -> Result<()> {
            if let Some(v) = field {
                if v.len() != expected {
                    return Err(CompileError::spec(format!(
                        "keyframe '{}': {label} length {} does not match {expected}",
                        key.name,
                        v.len()
                    )));
                }
                if v.iter().any(|x| !x.is_finite()) {
                    return Err(CompileError::spec(format!(
                        "keyframe '{}': {label} is not finite",
                        key.name
                    )));
                }
            }
            Ok(())
        };
        check(&key.qpos, "qpos", m.nq)?;
        check(&key.qvel, "qvel", m.nv)?;
        check(&key.act, "act", m.na)?;
        check(&key.ctrl, "ctrl", m.nu)?;
        check(&key.mpos, "mpos", 3 * m.nmocap)?;
        check(&key.mquat, "mquat", 4 * m.nmocap)?;

        m.key_time.push(key.time);
        let qpos_start = m.key_qpos.len();
        match &key.qpos {
            Some(v) => m.key_qpos.extend_from_slice(v),
            None => m.key_qpos.extend_from_slice(&m.qpos0.clone()),
        }
        match &key.qvel {
            Some(v) => m.key_qvel.extend_from_slice(v),
            None => m.key_qvel.extend(std::iter::repeat(0.0).take(m.nv)),
        }
        match &key.act {
            Some(v) => m.key_act.extend_from_slice(v),
            None => m.key_act.extend(std::iter::repeat(0.0).take(m.na)),
        }
        match &key.ctrl {
            Some(v) => m.key_ctrl.extend_from_slice(v),
            None => m.key_ctrl.extend(std::iter::repeat(0.0).take(m.nu)),
        }
        match &key.mpos {
            Some(v) => m.key_mpos.extend_from_slice(v),
            None => {
                for i in 0..m.nbody {
                    if m.body_mocapid[i] >= 0 {
                        let p = m.body_pos[i];
                        m.key_mpos.extend_from_slice(&[p.x, p.y, p.z]);
                    }
                }
            }
        }
        match &key.mquat {
            Some(v) => m.key_mquat.extend_from_slice(v),
            None => {
                for i in 0..m.nbody {
                    if m.body_mocapid[i] >= 0 {
                        let q = m.body_quat[i].into_inner();
                        m.key_mquat.extend_from_slice(&[q.w, q.i, q.j, q.k]);
                    }
                }
            }
        }

        // Normalize ball and free-joint quaternions in place.
        for j in 0..m.njnt {
            let offset = match m.jnt_type[j] {
                JointType::Ball => 0,
                JointType::Free => 3,
                _ => continue,
            };
            let adr = qpos_start + m.jnt_qposadr[j] as usize + offset;
            let q = &mut m.key_qpos[adr..adr + 4];
            let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
            if norm < MINVAL {
                q.copy_from_slice(&[1.0, 0.0, 0.0, 0.0]);
            } else {
                for x in q {
                    *x /= norm;
                }
            }
        }
    }
    Ok(())
}

/// Pack the names buffer, the per-kind address arrays and the hash map.
fn pack_names(spec: &ModelSpec, m: &mut Model) {
    let mut buf = Vec::new();
    names::append_str(&mut buf, &spec.modelname);

    macro_rules! kind {
        ($arena:expr, $adr:ident) => {{
            let list: Vec<String> = $arena.iter().map(|x| x.name.clone()).collect();
            for name in &list {
                m.$adr.push(names::append_str(&mut buf, name));
            }
            list
        }};
    }
    let all: Vec<Vec<String>> = vec![
        kind!(spec.bodies, name_bodyadr),
        kind!(spec.joints, name_jntadr),
        kind!(spec.geoms, name_geomadr),
        kind!(spec.sites, name_siteadr),
        kind!(spec.cameras, name_camadr),
        kind!(spec.lights, name_lightadr),
        kind!(spec.flexes, name_flexadr),
        kind!(spec.meshes, name_meshadr),
        kind!(spec.skins, name_skinadr),
        kind!(spec.hfields, name_hfieldadr),
        kind!(spec.textures, name_texadr),
        kind!(spec.materials, name_matadr),
        kind!(spec.pairs, name_pairadr),
        kind!(spec.excludes, name_excludeadr),
        kind!(spec.equalities, name_eqadr),
        kind!(spec.tendons, name_tendonadr),
        kind!(spec.actuators, name_actuatoradr),
        kind!(spec.sensors, name_sensoradr),
        kind!(spec.numerics, name_numericadr),
        kind!(spec.texts, name_textadr),
        kind!(spec.tuples, name_tupleadr),
        kind!(spec.keys, name_keyadr),
        kind!(spec.plugins, name_pluginadr),
    ];

    let total: usize = all.iter().map(Vec::len).sum();
    let mut map = vec![-1i32; names::LOAD_MULTIPLE * total];
    let mut offset = 0;
    for list in &all {
        let len = names::LOAD_MULTIPLE * list.len();
        names::insert_names(list, &mut map[offset..offset + len]);
        offset += len;
    }

    m.nnames = buf.len();
    m.nnames_map = map.len();
    m.names = buf;
    m.names_map = map;
}

/// Pack asset file origins. A single NUL keeps the buffer non-empty when no
/// asset has a file.
fn pack_paths(spec: &ModelSpec, m: &mut Model) {
    let filedir = &spec.modelfiledir;
    let meshdir = &spec.options.meshdir;
    let texturedir = &spec.options.texturedir;
    let mut buf = Vec::new();

    let push = |buf: &mut Vec<u8>, file: &Option<String>, dir: &str| -> i32 {
        match file {
            None => -1,
            Some(f) => names::append_str(buf, &resolve_path(filedir, dir, f)),
        }
    };
    for mesh in &spec.meshes {
        let adr = push(&mut buf, &mesh.file, meshdir);
        m.mesh_pathadr.push(adr);
    }
    for skin in &spec.skins {
        let adr = push(&mut buf, &skin.file, meshdir);
        m.skin_pathadr.push(adr);
    }
    for hfield in &spec.hfields {
        let adr = push(&mut buf, &hfield.file, texturedir);
        m.hfield_pathadr.push(adr);
    }
    for tex in &spec.textures {
        let adr = push(&mut buf, &tex.file, texturedir);
        m.tex_pathadr.push(adr);
    }
    if buf.is_empty() {
        buf.push(0);
    }
    m.npaths = buf.len();
    m.paths = buf;
}

/// Auto statistics, then user overrides. Returns the auto values.
fn compute_statistics(
    spec: &ModelSpec,
    m: &mut Model,
    body_pose: &[(Vector3<f64>, UnitQuaternion<f64>)],
) -> sim_model::Statistics {
    let nbody_moving = m.nbody.saturating_sub(1);
    m.stat.meanmass = if nbody_moving > 0 {
        m.body_mass.iter().skip(1).sum::<f64>() / nbody_moving as f64
    } else {
        0.0
    };
    m.stat.meaninertia = if m.nv > 0 {
        m.body_inertia
            .iter()
            .map(|i| i.x + i.y + i.z)
            .sum::<f64>()
            / m.nv as f64
    } else {
        1.0
    };
    let bounded: Vec<f64> = m
        .geom_rbound
        .iter()
        .copied()
        .filter(|&r| r > 0.0)
        .collect();
    m.stat.meansize = if bounded.is_empty() {
        0.1
    } else {
        bounded.iter().sum::<f64>() / bounded.len() as f64
    };

    // Extent: bounds over geom bounding spheres and body origins at the
    // reference configuration.
    let mut lo = Vector3::repeat(f64::INFINITY);
    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
    let mut any = false;
    for &(bpos, _) in body_pose.iter().skip(1) {
        lo = lo.inf(&bpos);
        hi = hi.sup(&bpos);
        any = true;
    }
    for (g, comp) in m.geom_pos.iter().enumerate() {
        let body = m.geom_bodyid[g] as usize;
        let (bpos, bquat) = body_pose[body];
        let center = bpos + bquat * comp;
        let r = m.geom_rbound[g];
        if r > 0.0 {
            lo = lo.inf(&(center - Vector3::repeat(r)));
            hi = hi.sup(&(center + Vector3::repeat(r)));
            any = true;
        }
    }
    if any {
        m.stat.center = (lo + hi) / 2.0;
        m.stat.extent = (hi - lo).max().max(2.0 * m.stat.meansize);
    } else {
        m.stat.center = Vector3::zeros();
        m.stat.extent = 1.0;
    }

    let auto = m.stat.clone();

    // User overrides.
    if let Some(v) = spec.stat.meanmass {
        m.stat.meanmass = v;
    }
    if let Some(v) = spec.stat.meaninertia {
        m.stat.meaninertia = v;
    }
    if let Some(v) = spec.stat.meansize {
        m.stat.meansize = v;
    }
    if let Some(v) = spec.stat.extent {
        m.stat.extent = v;
    }
    if let Some(v) = spec.stat.center {
        m.stat.center = v;
    }
    auto
}

/// Arena-size heuristic: explicit byte size, legacy stack multiple, or the
/// quadratic formula, plus the contact/jacobian footprint, rounded up to the
/// next megabyte.
fn arena_size(spec: &ModelSpec, m: &Model) -> usize {
    if let Some(memory) = spec.options.memory {
        return memory;
    }
    let num = std::mem::size_of::<f64>();
    let nconmax = if m.opt.nconmax == -1 { 100 } else { m.opt.nconmax as usize };
    let njmax = if m.opt.njmax == -1 { 500 } else { m.opt.njmax as usize };

    let mut bytes = if let Some(nstack) = spec.options.nstack {
        num * nstack
    } else {
        let quadratic = njmax + m.neq + m.nv;
        let linear = m.nq
            + m.nv
            + m.nu
            + m.na
            + m.nbody
            + m.njnt
            + m.ngeom
            + m.nsite
            + m.neq
            + m.ntendon
            + m.nwrap;
        num * (5 * quadratic * quadratic + 20 * linear).max(1000)
    };

    // Contacts, jacobian rows and efc-index arrays.
    bytes += nconmax * CONTACT_BYTES
        + njmax * (8 * 4 + 14 * 8)
        + m.nv * (3 * 4)
        + njmax * m.nv * (2 * 4 + 2 * 8)
        + njmax * njmax * (4 + 8);

    // Round up to the next megabyte.
    bytes.div_ceil(MEGABYTE) * MEGABYTE
}
