//! Binary AABB tree over a mesh's triangles.
//!
//! The tree stores reordered triangle indices and a flattened node array;
//! it does not own the geometry. Queries borrow the mesh's node and face
//! buffers so a rebuilt tree never holds a stale copy.

use itertools::partition;
use log::debug;

use crate::bounds::{Axis, Bounds3f};
use crate::intersect::{intersect_ray_triangle, ShapeHit, EPS_TIE};
use crate::ray::Ray;
use crate::{Float, Point3f, Vector3f};

/// Leaves hold at most this many triangles.
pub const MAX_FACES_PER_LEAF: usize = 4;

#[derive(Debug)]
pub struct BVH {
    nodes: Vec<LinearNode>,
    face_order: Vec<usize>,
}

impl BVH {
    /// Build the tree over `faces`, splitting on the longest axis of the
    /// centroid bounds at the midpoint, with a median-sort fallback when
    /// the midpoint partition degenerates.
    pub fn build(nodes: &[Point3f], faces: &[[usize; 3]]) -> BVH {
        if faces.is_empty() {
            return BVH {
                nodes: Vec::new(),
                face_order: Vec::new(),
            };
        }

        let mut info: Vec<TriangleInfo> = faces
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let mut b = Bounds3f::from_point(&nodes[f[0]]);
                b.extend(&nodes[f[1]]);
                b.extend(&nodes[f[2]]);
                TriangleInfo {
                    face_index: i,
                    centroid: b.centroid(),
                    bounds: b,
                }
            })
            .collect();

        let mut face_order = Vec::with_capacity(faces.len());
        let mut total_nodes = 0;
        let root = BVH::recursive_build(&mut info, 0, faces.len(), &mut face_order, &mut total_nodes);

        let mut linear = Vec::with_capacity(total_nodes);
        BVH::flatten(&root, &mut linear);
        debug_assert_eq!(linear.len(), total_nodes);
        debug!(
            "Built BVH with {} nodes over {} triangles",
            total_nodes,
            faces.len()
        );

        BVH {
            nodes: linear,
            face_order,
        }
    }

    fn recursive_build(
        info: &mut Vec<TriangleInfo>,
        start: usize,
        end: usize,
        face_order: &mut Vec<usize>,
        total_nodes: &mut usize,
    ) -> BuildNode {
        *total_nodes += 1;
        let bounds = info[start..end]
            .iter()
            .fold(Bounds3f::new(), |b, ti| Bounds3f::union(&b, &ti.bounds));
        let n_faces = end - start;
        if n_faces <= MAX_FACES_PER_LEAF {
            return BVH::leaf(info, start, end, face_order, bounds);
        }

        let centroid_bounds = info[start..end]
            .iter()
            .fold(Bounds3f::new(), |b, ti| Bounds3f::union_point(&b, &ti.centroid));
        let axis = centroid_bounds.maximum_extent();
        // All centroids coincide along the split axis: nothing to partition.
        if centroid_bounds.p_min[axis] == centroid_bounds.p_max[axis] {
            return BVH::leaf(info, start, end, face_order, bounds);
        }

        let pmid = 0.5 * (centroid_bounds.p_min[axis] + centroid_bounds.p_max[axis]);
        let mut mid = start
            + partition(info[start..end].iter_mut(), |ti| {
                ti.centroid[axis] < pmid
            });
        if mid == start || mid == end {
            // Midpoint partition failed; split at the median instead.
            info[start..end].sort_by(|a, b| {
                a.centroid[axis].partial_cmp(&b.centroid[axis]).unwrap()
            });
            mid = (start + end) / 2;
        }

        let left = Box::new(BVH::recursive_build(info, start, mid, face_order, total_nodes));
        let right = Box::new(BVH::recursive_build(info, mid, end, face_order, total_nodes));
        BuildNode::interior(axis, left, right)
    }

    fn leaf(
        info: &[TriangleInfo],
        start: usize,
        end: usize,
        face_order: &mut Vec<usize>,
        bounds: Bounds3f,
    ) -> BuildNode {
        let first = face_order.len();
        for ti in &info[start..end] {
            face_order.push(ti.face_index);
        }
        BuildNode::Leaf {
            bounds,
            first,
            count: end - start,
        }
    }

    fn flatten(node: &BuildNode, nodes: &mut Vec<LinearNode>) -> usize {
        let offset = nodes.len();
        match *node {
            BuildNode::Leaf {
                bounds,
                first,
                count,
            } => {
                nodes.push(LinearNode {
                    bounds,
                    data: LinearNodeData::Leaf { first, count },
                });
            }
            BuildNode::Interior {
                bounds,
                split_axis,
                ref children,
            } => {
                nodes.push(LinearNode {
                    bounds,
                    data: LinearNodeData::Interior {
                        axis: split_axis,
                        second_child_offset: 0,
                    },
                });
                BVH::flatten(&children[0], nodes);
                let second_offset = BVH::flatten(&children[1], nodes);
                nodes[offset].data = LinearNodeData::Interior {
                    axis: split_axis,
                    second_child_offset: second_offset,
                };
            }
        }
        offset
    }

    /// Closest hit along the ray, or `None`. Ties within the crate's
    /// tie-break tolerance resolve to the lowest face index, matching the
    /// brute-force scan.
    pub fn intersect(
        &self,
        ray: &Ray,
        nodes: &[Point3f],
        faces: &[[usize; 3]],
    ) -> Option<ShapeHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = Vector3f::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
        let dir_is_neg = [
            (inv_dir.x < 0.0) as usize,
            (inv_dir.y < 0.0) as usize,
            (inv_dir.z < 0.0) as usize,
        ];

        let mut best: Option<ShapeHit> = None;
        let mut to_visit_offset = 0;
        let mut current_node_idx = 0;
        let mut nodes_to_visit = [0usize; 64];
        loop {
            // Keep a small margin past the running best so an equal-t hit
            // with a lower face index in another leaf is still reachable.
            let t_prune = best.map_or(Float::INFINITY, |h| h.distance + EPS_TIE);
            let linear_node = &self.nodes[current_node_idx];
            if linear_node
                .bounds
                .intersect_p_fast(ray, &inv_dir, &dir_is_neg, t_prune)
            {
                match linear_node.data {
                    LinearNodeData::Leaf { first, count } => {
                        for &fi in &self.face_order[first..first + count] {
                            let f = &faces[fi];
                            if let Some(h) = intersect_ray_triangle(
                                ray,
                                &nodes[f[0]],
                                &nodes[f[1]],
                                &nodes[f[2]],
                            ) {
                                let replace = match best {
                                    None => true,
                                    Some(b) => b.improved_by(h.t, fi),
                                };
                                if replace {
                                    best = Some(ShapeHit {
                                        face_index: fi,
                                        distance: h.t,
                                        point: h.point,
                                    });
                                }
                            }
                        }
                        if to_visit_offset == 0 {
                            break;
                        }
                        to_visit_offset -= 1;
                        current_node_idx = nodes_to_visit[to_visit_offset];
                    }
                    LinearNodeData::Interior {
                        axis,
                        second_child_offset,
                    } => {
                        // Visit the near child first.
                        if dir_is_neg[axis.as_index()] != 0 {
                            nodes_to_visit[to_visit_offset] = current_node_idx + 1;
                            to_visit_offset += 1;
                            current_node_idx = second_child_offset;
                        } else {
                            nodes_to_visit[to_visit_offset] = second_child_offset;
                            to_visit_offset += 1;
                            current_node_idx += 1;
                        }
                    }
                }
            } else {
                if to_visit_offset == 0 {
                    break;
                }
                to_visit_offset -= 1;
                current_node_idx = nodes_to_visit[to_visit_offset];
            }
        }
        best
    }

    /// Whether any triangle is hit with `t` in `(ε, t_max)`, skipping
    /// `skip_face` when given. Returns on the first hit found.
    pub fn intersect_p(
        &self,
        ray: &Ray,
        nodes: &[Point3f],
        faces: &[[usize; 3]],
        t_max: Float,
        skip_face: Option<usize>,
    ) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let inv_dir = Vector3f::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
        let dir_is_neg = [
            (inv_dir.x < 0.0) as usize,
            (inv_dir.y < 0.0) as usize,
            (inv_dir.z < 0.0) as usize,
        ];

        let mut to_visit_offset = 0;
        let mut current_node_idx = 0;
        let mut nodes_to_visit = [0usize; 64];
        loop {
            let linear_node = &self.nodes[current_node_idx];
            if linear_node
                .bounds
                .intersect_p_fast(ray, &inv_dir, &dir_is_neg, t_max)
            {
                match linear_node.data {
                    LinearNodeData::Leaf { first, count } => {
                        for &fi in &self.face_order[first..first + count] {
                            if skip_face == Some(fi) {
                                continue;
                            }
                            let f = &faces[fi];
                            if let Some(h) = intersect_ray_triangle(
                                ray,
                                &nodes[f[0]],
                                &nodes[f[1]],
                                &nodes[f[2]],
                            ) {
                                if h.t < t_max {
                                    return true;
                                }
                            }
                        }
                        if to_visit_offset == 0 {
                            break;
                        }
                        to_visit_offset -= 1;
                        current_node_idx = nodes_to_visit[to_visit_offset];
                    }
                    LinearNodeData::Interior {
                        axis,
                        second_child_offset,
                    } => {
                        if dir_is_neg[axis.as_index()] != 0 {
                            nodes_to_visit[to_visit_offset] = current_node_idx + 1;
                            to_visit_offset += 1;
                            current_node_idx = second_child_offset;
                        } else {
                            nodes_to_visit[to_visit_offset] = second_child_offset;
                            to_visit_offset += 1;
                            current_node_idx += 1;
                        }
                    }
                }
            } else {
                if to_visit_offset == 0 {
                    break;
                }
                to_visit_offset -= 1;
                current_node_idx = nodes_to_visit[to_visit_offset];
            }
        }
        false
    }

    /// Bounds of the whole tree (the root's AABB).
    pub fn world_bounds(&self) -> Bounds3f {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct TriangleInfo {
    face_index: usize,
    centroid: Point3f,
    bounds: Bounds3f,
}

enum BuildNode {
    Interior {
        bounds: Bounds3f,
        children: [Box<BuildNode>; 2],
        split_axis: Axis,
    },
    Leaf {
        bounds: Bounds3f,
        first: usize,
        count: usize,
    },
}

impl BuildNode {
    fn interior(axis: Axis, child1: Box<BuildNode>, child2: Box<BuildNode>) -> BuildNode {
        let bounds = Bounds3f::union(child1.bounds(), child2.bounds());
        BuildNode::Interior {
            bounds,
            children: [child1, child2],
            split_axis: axis,
        }
    }

    fn bounds(&self) -> &Bounds3f {
        match self {
            BuildNode::Interior { ref bounds, .. } | BuildNode::Leaf { ref bounds, .. } => bounds,
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum LinearNodeData {
    Interior {
        second_child_offset: usize,
        axis: Axis,
    },
    Leaf {
        first: usize,
        count: usize,
    },
}

#[derive(Debug, Copy, Clone)]
struct LinearNode {
    bounds: Bounds3f,
    data: LinearNodeData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::grid_to_faces;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Brute-force closest hit with the same tie-break as the BVH.
    fn brute_force(
        ray: &Ray,
        nodes: &[Point3f],
        faces: &[[usize; 3]],
    ) -> Option<ShapeHit> {
        let mut best: Option<ShapeHit> = None;
        for (fi, f) in faces.iter().enumerate() {
            if let Some(h) =
                intersect_ray_triangle(ray, &nodes[f[0]], &nodes[f[1]], &nodes[f[2]])
            {
                let replace = match best {
                    None => true,
                    Some(b) => b.improved_by(h.t, fi),
                };
                if replace {
                    best = Some(ShapeHit {
                        face_index: fi,
                        distance: h.t,
                        point: h.point,
                    });
                }
            }
        }
        best
    }

    fn bumpy_grid(seed: u64) -> (Vec<Point3f>, Vec<[usize; 3]>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let xs: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let ys: Vec<f64> = (0..12).map(|j| j as f64).collect();
        let zs: Vec<f64> = (0..144).map(|_| rng.gen_range(-1.0..1.0)).collect();
        grid_to_faces(&xs, &ys, &zs)
    }

    #[test]
    fn test_bvh_matches_brute_force() {
        let (nodes, faces) = bumpy_grid(7);
        let bvh = BVH::build(&nodes, &faces);
        assert!(bvh.node_count() > 1);

        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..500 {
            let o = Point3f::new(
                rng.gen_range(-2.0..13.0),
                rng.gen_range(-2.0..13.0),
                rng.gen_range(2.0..6.0),
            );
            let target = Point3f::new(
                rng.gen_range(0.0..11.0),
                rng.gen_range(0.0..11.0),
                rng.gen_range(-1.0..1.0),
            );
            let ray = Ray::new(o, target - o);

            let expected = brute_force(&ray, &nodes, &faces);
            let got = bvh.intersect(&ray, &nodes, &faces);
            match (expected, got) {
                (None, None) => {}
                (Some(e), Some(g)) => {
                    assert_eq!(e.face_index, g.face_index);
                    assert!((e.distance - g.distance).abs() < 1e-10);
                }
                (e, g) => panic!("bvh disagrees with brute force: {:?} vs {:?}", e, g),
            }
        }
    }

    #[test]
    fn test_bvh_any_hit_window() {
        let (nodes, faces) = bumpy_grid(3);
        let bvh = BVH::build(&nodes, &faces);
        let ray = Ray::new(Point3f::new(5.0, 5.0, 5.0), Vector3f::new(0.0, 0.0, -1.0));

        let closest = bvh.intersect(&ray, &nodes, &faces).unwrap();
        assert!(bvh.intersect_p(&ray, &nodes, &faces, Float::INFINITY, None));
        // A window that ends before the first hit sees nothing.
        assert!(!bvh.intersect_p(&ray, &nodes, &faces, closest.distance * 0.5, None));
    }

    #[test]
    fn test_bvh_any_hit_skip_face() {
        let nodes = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2]];
        let bvh = BVH::build(&nodes, &faces);
        let ray = Ray::new(Point3f::new(0.25, 0.25, 1.0), Vector3f::new(0.0, 0.0, -1.0));
        assert!(bvh.intersect_p(&ray, &nodes, &faces, Float::INFINITY, None));
        assert!(!bvh.intersect_p(&ray, &nodes, &faces, Float::INFINITY, Some(0)));
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = BVH::build(&[], &[]);
        assert!(bvh.is_empty());
        let ray = Ray::new(Point3f::origin(), Vector3f::new(1.0, 0.0, 0.0));
        assert!(bvh.intersect(&ray, &[], &[]).is_none());
        assert!(!bvh.intersect_p(&ray, &[], &[], Float::INFINITY, None));
    }
}
