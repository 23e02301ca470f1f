//! The polygon shape model: nodes, triangular faces, the eagerly-computed
//! per-face cache, and the optional acceleration subfields.

use std::fmt;

use log::info;

use crate::bounds::Bounds3f;
use crate::bvh::BVH;
use crate::error::{Error, Result};
use crate::face;
use crate::intersect::{intersect_ray_triangle, ShapeHit};
use crate::ray::Ray;
use crate::visibility::{self, VisibilityGraph};
use crate::{Float, Normal3f, Point3f};

/// A triangular surface mesh with per-face derived data.
///
/// `face_centers`, `face_normals` and `face_areas` are always in sync with
/// `nodes` and `faces`; the mesh never resizes after construction. The
/// optional subfields are built on request, are write-once-then-read-many,
/// and a rebuild replaces the whole subfield.
///
/// Node indices are 0-based throughout the crate.
#[derive(Debug)]
pub struct ShapeModel {
    pub nodes: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,

    pub face_centers: Vec<Point3f>,
    pub face_normals: Vec<Normal3f>,
    pub face_areas: Vec<Float>,

    pub bvh: Option<BVH>,
    pub visibility_graph: Option<VisibilityGraph>,
    pub face_max_elevations: Option<Vec<Float>>,
}

impl ShapeModel {
    /// Build a model from nodes and faces, filling the per-face cache.
    ///
    /// Faces referencing nodes outside `0..nodes.len()` are rejected.
    /// Zero-area faces are kept; their normals are NaN.
    pub fn new(nodes: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Result<ShapeModel> {
        for (i, f) in faces.iter().enumerate() {
            for &v in f.iter() {
                if v >= nodes.len() {
                    return Err(Error::invalid_argument(format!(
                        "face {} references node {} but the mesh has {} nodes",
                        i,
                        v,
                        nodes.len()
                    )));
                }
            }
        }

        let face_centers = faces
            .iter()
            .map(|f| face::face_center(&nodes[f[0]], &nodes[f[1]], &nodes[f[2]]))
            .collect();
        let face_normals = faces
            .iter()
            .map(|f| face::face_normal(&nodes[f[0]], &nodes[f[1]], &nodes[f[2]]))
            .collect();
        let face_areas = faces
            .iter()
            .map(|f| face::face_area(&nodes[f[0]], &nodes[f[1]], &nodes[f[2]]))
            .collect();

        Ok(ShapeModel {
            nodes,
            faces,
            face_centers,
            face_normals,
            face_areas,
            bvh: None,
            visibility_graph: None,
            face_max_elevations: None,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Build (or rebuild) the BVH over the faces.
    pub fn build_bvh(&mut self) {
        self.bvh = Some(BVH::build(&self.nodes, &self.faces));
    }

    /// Build (or rebuild) the face-to-face visibility graph.
    pub fn build_face_visibility_graph(&mut self) {
        let graph = visibility::build_face_visibility_graph(self);
        info!(
            "Visibility graph: {} faces, {} visible pairs",
            graph.num_faces(),
            graph.nnz()
        );
        self.visibility_graph = Some(graph);
    }

    /// Fill the per-face maximum horizon elevations. Requires the
    /// visibility graph.
    pub fn compute_face_max_elevations(&mut self) -> Result<()> {
        let graph = self.visibility_graph.as_ref().ok_or_else(|| {
            Error::precondition(
                "compute_face_max_elevations requires the face visibility graph",
            )
        })?;
        self.face_max_elevations = Some(visibility::face_max_elevations(graph, &self.face_normals));
        Ok(())
    }

    /// AABB over all nodes. Recomputed on every call; nothing is cached.
    pub fn compute_bounding_box(&self) -> Bounds3f {
        self.nodes
            .iter()
            .fold(Bounds3f::new(), |mut b, n| {
                b.extend(n);
                b
            })
    }

    /// Closest intersection of `ray` with the surface.
    ///
    /// Uses the BVH when built; otherwise scans every triangle behind an
    /// AABB rejection test. Equal distances within the tie tolerance
    /// resolve to the lowest face index in both paths.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<ShapeHit> {
        if let Some(ref bvh) = self.bvh {
            return bvh.intersect(ray, &self.nodes, &self.faces);
        }

        if !self.compute_bounding_box().intersect_p(ray, Float::INFINITY) {
            return None;
        }
        let mut best: Option<ShapeHit> = None;
        for (fi, f) in self.faces.iter().enumerate() {
            if let Some(h) = intersect_ray_triangle(
                ray,
                &self.nodes[f[0]],
                &self.nodes[f[1]],
                &self.nodes[f[2]],
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
        best
    }

    /// Total surface area, the sum of the per-face cache.
    pub fn surface_area(&self) -> Float {
        self.face_areas.iter().sum()
    }

    /// Signed enclosed volume (divergence theorem).
    pub fn volume(&self) -> Float {
        face::polyhedron_volume(&self.nodes, &self.faces)
    }

    /// Radius of the sphere of equal volume.
    pub fn equivalent_radius(&self) -> Float {
        face::equivalent_radius(self.volume())
    }

    pub fn maximum_radius(&self) -> Float {
        face::maximum_radius(&self.nodes)
    }

    pub fn minimum_radius(&self) -> Float {
        face::minimum_radius(&self.nodes)
    }
}

/// Closest-hit query against a shape model; see
/// [`ShapeModel::intersect_ray`].
pub fn intersect_ray_shape(ray: &Ray, shape: &ShapeModel) -> Option<ShapeHit> {
    shape.intersect_ray(ray)
}

impl fmt::Display for ShapeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShapeModel [{} nodes, {} faces, radius {:.3}–{:.3}{}{}{}]",
            self.num_nodes(),
            self.num_faces(),
            self.minimum_radius(),
            self.maximum_radius(),
            if self.bvh.is_some() { ", bvh" } else { "" },
            if self.visibility_graph.is_some() {
                ", visibility"
            } else {
                ""
            },
            if self.face_max_elevations.is_some() {
                ", elevations"
            } else {
                ""
            },
        )
    }
}
