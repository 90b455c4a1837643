//! Bounding-volume-hierarchy construction.
//!
//! Per-body trees over colliding geoms (framed in the body's inertial
//! frame), per-mesh trees over faces, and per-flex trees over elements.
//! Construction is top-down: split on the longest axis at the median leaf
//! center. Every leaf holds exactly one source element; internal nodes store
//! a center/half-size box covering their subtree.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::warn;

use crate::compile::entity::{GeomComp, MINVAL};
use crate::compile::inertia::BodyInertia;
use crate::spec::ModelSpec;

/// Warn when a tree grows past this depth.
const MAX_TREE_DEPTH: usize = 50;

/// One flat BVH, appended into the model's node pool by the packer.
#[derive(Debug, Clone, Default)]
pub(crate) struct BvhTree {
    pub depth: Vec<i32>,
    pub child: Vec<[i32; 2]>,
    pub nodeid: Vec<i32>,
    pub aabb: Vec<[f64; 6]>,
}

impl BvhTree {
    pub fn len(&self) -> usize {
        self.nodeid.len()
    }
}

struct Leaf {
    lo: Vector3<f64>,
    hi: Vector3<f64>,
    id: i32,
}

/// Build one tree from leaf bounds. Empty input gives an empty tree.
fn build(mut leaves: Vec<Leaf>) -> BvhTree {
    let mut tree = BvhTree::default();
    if leaves.is_empty() {
        return tree;
    }
    let n = leaves.len();
    let mut max_depth = 0;
    split(&mut tree, &mut leaves, 0, n, 0, &mut max_depth);
    if max_depth > MAX_TREE_DEPTH {
        warn!("BVH depth {max_depth} exceeds {MAX_TREE_DEPTH}");
    }
    tree
}

fn split(
    tree: &mut BvhTree,
    leaves: &mut [Leaf],
    start: usize,
    end: usize,
    depth: usize,
    max_depth: &mut usize,
) -> i32 {
    *max_depth = (*max_depth).max(depth);

    // Bounds of this node, inflated so flat boxes keep a volume.
    let mut lo = Vector3::repeat(f64::INFINITY);
    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
    for leaf in &leaves[start..end] {
        lo = lo.inf(&leaf.lo);
        hi = hi.sup(&leaf.hi);
    }
    let center = (lo + hi) / 2.0;
    let half = ((hi - lo) / 2.0).map(|h| h.max(MINVAL));
    let aabb = [center.x, center.y, center.z, half.x, half.y, half.z];

    let node = tree.len() as i32;
    tree.depth.push(depth as i32);
    tree.aabb.push(aabb);
    if end - start == 1 {
        tree.child.push([-1, -1]);
        tree.nodeid.push(leaves[start].id);
        return node;
    }
    tree.child.push([0, 0]);
    tree.nodeid.push(-1);

    // Longest-axis median split over leaf centers.
    let axis = if half.x >= half.y && half.x >= half.z {
        0
    } else if half.y >= half.z {
        1
    } else {
        2
    };
    let mid = (end - start) / 2;
    leaves[start..end].select_nth_unstable_by(mid, |a, b| {
        let ca = (a.lo[axis] + a.hi[axis]) / 2.0;
        let cb = (b.lo[axis] + b.hi[axis]) / 2.0;
        ca.total_cmp(&cb)
    });

    let left = split(tree, leaves, start, start + mid, depth + 1, max_depth);
    let right = split(tree, leaves, start + mid, end, depth + 1, max_depth);
    tree.child[node as usize] = [left, right];
    node
}

fn aabb_leaf(
    center: Vector3<f64>,
    half: Vector3<f64>,
    pos: Vector3<f64>,
    quat: UnitQuaternion<f64>,
    id: i32,
) -> Leaf {
    // Transform the 8 box corners and re-bound.
    let mut lo = Vector3::repeat(f64::INFINITY);
    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let corner = center + Vector3::new(sx * half.x, sy * half.y, sz * half.z);
                let world = pos + quat * corner;
                lo = lo.inf(&world);
                hi = hi.sup(&world);
            }
        }
    }
    Leaf { lo, hi, id }
}

/// Per-body trees over colliding geoms, in the body's inertial frame.
pub(crate) fn build_body_trees(
    spec: &ModelSpec,
    geoms: &[GeomComp],
    inertia: &[BodyInertia],
) -> Vec<BvhTree> {
    let mut out = Vec::with_capacity(spec.bodies.len());
    for (i, body) in spec.bodies.iter().enumerate() {
        let iquat_inv = inertia[i].iquat.inverse();
        let leaves: Vec<Leaf> = body
            .geoms
            .iter()
            .filter(|&&g| !geoms[g].is_visual())
            .map(|&g| {
                let comp = &geoms[g];
                // Geom pose relative to the inertial frame.
                let rel_pos = iquat_inv * (comp.pos - inertia[i].ipos);
                let rel_quat = iquat_inv * comp.quat;
                let center = Vector3::new(comp.aabb[0], comp.aabb[1], comp.aabb[2]);
                let half = Vector3::new(comp.aabb[3], comp.aabb[4], comp.aabb[5]);
                aabb_leaf(center, half, rel_pos, rel_quat, g as i32)
            })
            .collect();
        out.push(build(leaves));
    }
    out
}

/// Per-mesh trees over triangle faces, in canonical mesh coordinates.
pub(crate) fn build_mesh_trees(spec: &ModelSpec) -> Vec<BvhTree> {
    spec.meshes
        .iter()
        .map(|mesh| {
            let leaves: Vec<Leaf> = mesh
                .face
                .chunks_exact(3)
                .enumerate()
                .map(|(f, idx)| {
                    let mut lo = Vector3::repeat(f64::INFINITY);
                    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
                    for &v in idx {
                        let p = Vector3::new(
                            mesh.vert[3 * v as usize],
                            mesh.vert[3 * v as usize + 1],
                            mesh.vert[3 * v as usize + 2],
                        );
                        lo = lo.inf(&p);
                        hi = hi.sup(&p);
                    }
                    Leaf { lo, hi, id: f as i32 }
                })
                .collect();
            build(leaves)
        })
        .collect()
}

/// Per-flex trees over elements, vertex bounds inflated by the radius.
pub(crate) fn build_flex_trees(spec: &ModelSpec) -> Vec<BvhTree> {
    spec.flexes
        .iter()
        .map(|flex| {
            let stride = (flex.dim + 1) as usize;
            let leaves: Vec<Leaf> = flex
                .elem
                .chunks_exact(stride)
                .enumerate()
                .map(|(e, idx)| {
                    let mut lo = Vector3::repeat(f64::INFINITY);
                    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
                    for &v in idx {
                        let p = Vector3::new(
                            flex.vert[3 * v as usize],
                            flex.vert[3 * v as usize + 1],
                            flex.vert[3 * v as usize + 2],
                        );
                        lo = lo.inf(&p);
                        hi = hi.sup(&p);
                    }
                    Leaf {
                        lo: lo - Vector3::repeat(flex.radius),
                        hi: hi + Vector3::repeat(flex.radius),
                        id: e as i32,
                    }
                })
                .collect();
            build(leaves)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn leaf_at(x: f64, id: i32) -> Leaf {
        Leaf {
            lo: Vector3::new(x - 0.1, -0.1, -0.1),
            hi: Vector3::new(x + 0.1, 0.1, 0.1),
            id,
        }
    }

    #[test]
    fn single_leaf_is_root() {
        let tree = build(vec![leaf_at(0.0, 7)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodeid[0], 7);
        assert_eq!(tree.child[0], [-1, -1]);
        assert_eq!(tree.depth[0], 0);
    }

    #[test]
    fn binary_tree_over_line_of_leaves() {
        let tree = build((0..4).map(|i| leaf_at(i as f64, i)).collect());
        // 4 leaves -> 3 internal nodes.
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.nodeid[0], -1);
        // Root covers all leaves.
        assert!((tree.aabb[0][0] - 1.5).abs() < 1e-12);
        assert!((tree.aabb[0][3] - 1.6).abs() < 1e-12);
        // Every source id appears exactly once among the leaves.
        let mut ids: Vec<i32> = tree.nodeid.iter().copied().filter(|&i| i >= 0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        // Children bounds nest inside their parent.
        for n in 0..tree.len() {
            let [l, r] = tree.child[n];
            for &c in &[l, r] {
                if c >= 0 {
                    assert_eq!(tree.depth[c as usize], tree.depth[n] + 1);
                }
            }
        }
    }

    #[test]
    fn flat_boxes_inflate() {
        let leaves = vec![Leaf {
            lo: Vector3::zeros(),
            hi: Vector3::zeros(),
            id: 0,
        }];
        let tree = build(leaves);
        assert!(tree.aabb[0][3] > 0.0);
        assert!(tree.aabb[0][5] > 0.0);
    }

    #[test]
    fn visual_geoms_are_excluded_from_body_trees() {
        let mut spec = ModelSpec::new();
        let b = spec.add_body(0);
        let g1 = spec.add_geom(b);
        spec.geoms[g1].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        let g2 = spec.add_geom(b);
        spec.geoms[g2].params.size = Some(Vector3::new(0.1, 0.0, 0.0));
        spec.geoms[g2].params.contype = Some(0);
        spec.geoms[g2].params.conaffinity = Some(0);

        let geoms = crate::compile::entity::compile_geoms(&spec).unwrap();
        let inertia = vec![BodyInertia::default(); spec.bodies.len()];
        let trees = build_body_trees(&spec, &geoms, &inertia);
        assert_eq!(trees[b].len(), 1, "only the colliding geom is a leaf");
        assert_eq!(trees[0].len(), 0, "world owns no colliding geoms");
    }
}
