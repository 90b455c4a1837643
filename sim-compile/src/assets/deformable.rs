//! Skin and flex asset compilation.
//!
//! Skins are validated (vertex/face/weight consistency); their bone body
//! names resolve later with the other references. Flexes get their derived
//! topology here: unique edges, boundary shell fragments, and element-vertex
//! self-collision pairs.

use std::collections::{BTreeMap, BTreeSet};

use sim_model::ObjectType;

use crate::error::{CompileError, Result};
use crate::spec::asset::{Flex, Skin};

/// Validate one skin in place.
pub fn compile_skin(skin: &mut Skin, id: usize) -> Result<()> {
    let ctx = |e: CompileError| {
        let name = skin.name.clone();
        e.with_object(ObjectType::Skin, name, id)
    };

    if skin.file.is_some() {
        return Err(ctx(CompileError::asset(
            "file-backed skins are not supported; supply vertex data inline",
        )));
    }
    if skin.vert.len() % 3 != 0 || skin.vert.is_empty() {
        return Err(ctx(CompileError::asset("skin vertex data must be a non-empty multiple of 3")));
    }
    let nvert = skin.vert.len() / 3;
    if skin.face.len() % 3 != 0 {
        return Err(ctx(CompileError::asset("skin face data must be a multiple of 3")));
    }
    for &f in &skin.face {
        if f < 0 || f as usize >= nvert {
            return Err(ctx(CompileError::asset(format!(
                "skin face vertex index {f} out of range (nvert={nvert})"
            ))));
        }
    }
    if !skin.texcoord.is_empty() && skin.texcoord.len() != 2 * nvert {
        return Err(ctx(CompileError::asset(
            "skin texcoord data must cover every vertex",
        )));
    }
    if skin.bones.is_empty() {
        return Err(ctx(CompileError::spec("skin has no bones")));
    }
    for bone in &skin.bones {
        if bone.vertid.len() != bone.vertweight.len() {
            return Err(ctx(CompileError::asset(
                "skin bone vertex ids and weights must have equal length",
            )));
        }
        for &v in &bone.vertid {
            if v < 0 || v as usize >= nvert {
                return Err(ctx(CompileError::asset(format!(
                    "skin bone vertex index {v} out of range (nvert={nvert})"
                ))));
            }
        }
    }
    Ok(())
}

/// Compile one flex in place: validate inputs and derive topology.
pub fn compile_flex(flex: &mut Flex, id: usize) -> Result<()> {
    let ctx = |e: CompileError| {
        let name = flex.name.clone();
        e.with_object(ObjectType::Flex, name, id)
    };

    if !(1..=3).contains(&flex.dim) {
        return Err(ctx(CompileError::spec(format!(
            "flex dim must be 1, 2 or 3, is {}",
            flex.dim
        ))));
    }
    if flex.vert.len() % 3 != 0 || flex.vert.is_empty() {
        return Err(ctx(CompileError::asset("flex vertex data must be a non-empty multiple of 3")));
    }
    let nvert = flex.vert.len() / 3;
    let stride = (flex.dim + 1) as usize;
    if flex.elem.is_empty() || flex.elem.len() % stride != 0 {
        return Err(ctx(CompileError::asset(format!(
            "flex element data must be a non-empty multiple of {stride}"
        ))));
    }
    for &v in &flex.elem {
        if v < 0 || v as usize >= nvert {
            return Err(ctx(CompileError::asset(format!(
                "flex element vertex index {v} out of range (nvert={nvert})"
            ))));
        }
    }
    if flex.vertbody.is_empty() {
        return Err(ctx(CompileError::spec("flex has no vertex bodies")));
    }
    if flex.vertbody.len() != 1 && flex.vertbody.len() != nvert {
        return Err(ctx(CompileError::asset(format!(
            "flex must name one body or one per vertex, names {} bodies for {nvert} vertices",
            flex.vertbody.len()
        ))));
    }
    if !flex.texcoord.is_empty() && flex.texcoord.len() != 2 * nvert {
        return Err(ctx(CompileError::asset(
            "flex texcoord data must cover every vertex",
        )));
    }

    let elems: Vec<&[i32]> = flex.elem.chunks_exact(stride).collect();

    // Unique edges, ascending vertex order, first-occurrence sequence.
    let mut seen = BTreeSet::new();
    let mut edges = Vec::new();
    for elem in &elems {
        for i in 0..stride {
            for j in (i + 1)..stride {
                let (a, b) = if elem[i] <= elem[j] {
                    (elem[i], elem[j])
                } else {
                    (elem[j], elem[i])
                };
                if seen.insert((a, b)) {
                    edges.push([a, b]);
                }
            }
        }
    }
    flex.edge = edges;

    // Boundary shell: sub-simplices of size `dim` used by exactly one
    // element. Cables expose their endpoints, shells their border edges,
    // solids their surface triangles.
    let dim = flex.dim as usize;
    let mut counts: BTreeMap<Vec<i32>, (usize, Vec<i32>)> = BTreeMap::new();
    for elem in &elems {
        for skip in 0..stride {
            let fragment: Vec<i32> = (0..stride)
                .filter(|&k| k != skip)
                .map(|k| elem[k])
                .collect();
            let mut key = fragment.clone();
            key.sort_unstable();
            let entry = counts.entry(key).or_insert((0, fragment));
            entry.0 += 1;
        }
    }
    let mut shell = Vec::new();
    for (_, (count, fragment)) in counts {
        if count == 1 {
            shell.extend_from_slice(&fragment);
        }
    }
    debug_assert_eq!(shell.len() % dim, 0);
    flex.shell = shell;

    // Element-vertex pairs for self-collision: every vertex against every
    // element it is not part of.
    flex.evpair.clear();
    if flex.selfcollide {
        for (e, elem) in elems.iter().enumerate() {
            for v in 0..nvert as i32 {
                if !elem.contains(&v) {
                    flex.evpair.push([e as i32, v]);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::spec::asset::SkinBone;

    fn triangle_flex() -> Flex {
        // Two triangles sharing an edge: vertices 0-1-2 and 1-3-2.
        Flex {
            dim: 2,
            vertbody: vec!["b".to_string()],
            vert: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0,
            ],
            elem: vec![0, 1, 2, 1, 3, 2],
            ..Flex::default()
        }
    }

    #[test]
    fn flex_edges_are_unique() {
        let mut flex = triangle_flex();
        compile_flex(&mut flex, 0).unwrap();
        // 5 unique edges: shared edge 1-2 counted once.
        assert_eq!(flex.edge.len(), 5);
        assert!(flex.edge.contains(&[1, 2]));
    }

    #[test]
    fn flex_shell_is_the_boundary() {
        let mut flex = triangle_flex();
        compile_flex(&mut flex, 0).unwrap();
        // Boundary of the two-triangle quad: 4 edges of dim-2 fragments.
        assert_eq!(flex.shell.len(), 8);
        // Interior edge 1-2 must not appear.
        let fragments: Vec<&[i32]> = flex.shell.chunks_exact(2).collect();
        assert!(!fragments
            .iter()
            .any(|f| { (f[0] == 1 && f[1] == 2) || (f[0] == 2 && f[1] == 1) }));
    }

    #[test]
    fn flex_evpairs_only_when_selfcollide() {
        let mut flex = triangle_flex();
        compile_flex(&mut flex, 0).unwrap();
        assert!(flex.evpair.is_empty());

        flex.selfcollide = true;
        compile_flex(&mut flex, 0).unwrap();
        // Each of 2 elements pairs with the 1 vertex it does not contain.
        assert_eq!(flex.evpair.len(), 2);
        assert!(flex.evpair.contains(&[0, 3]));
        assert!(flex.evpair.contains(&[1, 0]));
    }

    #[test]
    fn flex_bad_dim_fails() {
        let mut flex = triangle_flex();
        flex.dim = 4;
        assert!(compile_flex(&mut flex, 0).is_err());
    }

    #[test]
    fn skin_weight_mismatch_fails() {
        let mut skin = Skin {
            vert: vec![0.0; 9],
            face: vec![0, 1, 2],
            bones: vec![SkinBone {
                body: "b".to_string(),
                vertid: vec![0, 1],
                vertweight: vec![1.0],
                ..SkinBone::default()
            }],
            ..Skin::default()
        };
        let err = compile_skin(&mut skin, 0).unwrap_err();
        assert!(err.to_string().contains("equal length"));
    }

    #[test]
    fn skin_file_backing_unsupported() {
        let mut skin = Skin {
            file: Some("body.skn".to_string()),
            vert: vec![0.0; 9],
            bones: vec![SkinBone::default()],
            ..Skin::default()
        };
        let err = compile_skin(&mut skin, 0).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
