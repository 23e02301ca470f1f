//! The face-to-face visibility graph and the per-face horizon elevations.
//!
//! The graph is compressed row storage over `N = |faces|`: `row_ptr` and
//! `col_idx` plus parallel value arrays of view factors, center distances
//! and unit directions. It is immutable once built and symmetric by
//! construction: face `i` lists `j` iff `j` lists `i`.

use std::ops::Range;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::face::{view_factor, ViewFactor};
use crate::intersect::intersect_ray_triangle;
use crate::mesh::ShapeModel;
use crate::ray::Ray;
use crate::{clamp, Float, Normal3f, Vector3f};

/// Relative margin trimmed off the far end of the center-to-center segment
/// so the target face's own triangle never counts as an occluder.
const SEGMENT_MARGIN: Float = 1e-9;

/// One neighbor record of the visibility graph.
#[derive(Debug, Copy, Clone)]
pub struct VisibleFaceData {
    pub face_index: usize,
    pub view_factor: Float,
    pub distance: Float,
    pub direction: Vector3f,
}

#[derive(Debug)]
pub struct VisibilityGraph {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    view_factors: Vec<Float>,
    distances: Vec<Float>,
    directions: Vec<Vector3f>,
}

impl VisibilityGraph {
    pub fn num_faces(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// Number of stored (ordered) visible pairs.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    fn row(&self, face_index: usize) -> Result<Range<usize>> {
        if face_index >= self.num_faces() {
            return Err(Error::invalid_argument(format!(
                "face index {} out of range for visibility graph over {} faces",
                face_index,
                self.num_faces()
            )));
        }
        Ok(self.row_ptr[face_index]..self.row_ptr[face_index + 1])
    }

    pub(crate) fn neighbors(&self, face_index: usize) -> &[usize] {
        debug_assert!(face_index < self.num_faces());
        &self.col_idx[self.row_ptr[face_index]..self.row_ptr[face_index + 1]]
    }

    pub(crate) fn neighbor_directions(&self, face_index: usize) -> &[Vector3f] {
        debug_assert!(face_index < self.num_faces());
        &self.directions[self.row_ptr[face_index]..self.row_ptr[face_index + 1]]
    }

    /// Indices of the faces visible from `face_index`, ascending.
    pub fn visible_face_indices(&self, face_index: usize) -> Result<&[usize]> {
        let r = self.row(face_index)?;
        Ok(&self.col_idx[r])
    }

    /// View factors toward each visible face, parallel to
    /// [`visible_face_indices`](Self::visible_face_indices).
    pub fn view_factors(&self, face_index: usize) -> Result<&[Float]> {
        let r = self.row(face_index)?;
        Ok(&self.view_factors[r])
    }

    /// Center-to-center distances toward each visible face.
    pub fn visible_face_distances(&self, face_index: usize) -> Result<&[Float]> {
        let r = self.row(face_index)?;
        Ok(&self.distances[r])
    }

    /// Unit directions from this face's center toward each visible face.
    pub fn visible_face_directions(&self, face_index: usize) -> Result<&[Vector3f]> {
        let r = self.row(face_index)?;
        Ok(&self.directions[r])
    }

    pub fn num_visible_faces(&self, face_index: usize) -> Result<usize> {
        Ok(self.row(face_index)?.len())
    }

    /// The `k`-th neighbor record of `face_index`.
    pub fn visible_face_data(&self, face_index: usize, k: usize) -> Result<VisibleFaceData> {
        let r = self.row(face_index)?;
        if k >= r.len() {
            return Err(Error::invalid_argument(format!(
                "neighbor index {} out of range: face {} has {} visible faces",
                k,
                face_index,
                r.len()
            )));
        }
        let at = r.start + k;
        Ok(VisibleFaceData {
            face_index: self.col_idx[at],
            view_factor: self.view_factors[at],
            distance: self.distances[at],
            direction: self.directions[at],
        })
    }
}

/// One accepted pair `(i, j)` with `i < j`, carrying both directed records.
struct PairRecord {
    j: usize,
    forward: ViewFactor,
    backward: ViewFactor,
}

/// Decide visibility of the pair `(i, j)`, `i < j`.
///
/// Both faces must lie in each other's forward half-space, and the open
/// segment between the two centers must not be interrupted by any third
/// triangle. Faces with NaN normals never pass the orientation test.
fn test_pair(shape: &ShapeModel, i: usize, j: usize) -> Option<PairRecord> {
    let ci = shape.face_centers[i];
    let cj = shape.face_centers[j];
    let to = cj - ci;
    let d = to.length();
    if d == 0.0 {
        return None;
    }
    let dir = to / d;

    let cos_i = dir.dotn(&shape.face_normals[i]);
    if !(cos_i > 0.0) {
        return None;
    }
    let cos_j = (-dir).dotn(&shape.face_normals[j]);
    if !(cos_j > 0.0) {
        return None;
    }

    let ray = Ray::new(ci, dir);
    let t_max = d * (1.0 - SEGMENT_MARGIN);
    let occluded = match shape.bvh {
        // Faces i and j exclude themselves: the ray starts in i's plane
        // and reaches j only at t ≈ d, past the window.
        Some(ref bvh) => bvh.intersect_p(&ray, &shape.nodes, &shape.faces, t_max, None),
        None => shape.faces.iter().enumerate().any(|(k, f)| {
            k != i
                && k != j
                && intersect_ray_triangle(
                    &ray,
                    &shape.nodes[f[0]],
                    &shape.nodes[f[1]],
                    &shape.nodes[f[2]],
                )
                .map_or(false, |h| h.t < t_max)
        }),
    };
    if occluded {
        return None;
    }

    Some(PairRecord {
        j,
        forward: view_factor(
            &ci,
            &cj,
            &shape.face_normals[i],
            &shape.face_normals[j],
            shape.face_areas[j],
        ),
        backward: view_factor(
            &cj,
            &ci,
            &shape.face_normals[j],
            &shape.face_normals[i],
            shape.face_areas[i],
        ),
    })
}

/// Build the visibility graph for `shape`.
///
/// The upper-triangle pairs are evaluated in parallel, one row per source
/// face; mirroring and the prefix-sum concatenation into CSR are a
/// deterministic sequential pass, so identical meshes always produce
/// identical graphs.
pub(crate) fn build_face_visibility_graph(shape: &ShapeModel) -> VisibilityGraph {
    let n = shape.num_faces();

    let upper: Vec<Vec<PairRecord>> = (0..n)
        .into_par_iter()
        .map(|i| ((i + 1)..n).filter_map(|j| test_pair(shape, i, j)).collect())
        .collect();

    let mut rows: Vec<Vec<(usize, ViewFactor)>> = vec![Vec::new(); n];
    for (i, row) in upper.iter().enumerate() {
        for rec in row {
            rows[i].push((rec.j, rec.forward));
            rows[rec.j].push((i, rec.backward));
        }
    }

    let mut row_ptr = Vec::with_capacity(n + 1);
    row_ptr.push(0);
    let nnz = rows.iter().map(Vec::len).sum();
    let mut col_idx = Vec::with_capacity(nnz);
    let mut view_factors = Vec::with_capacity(nnz);
    let mut distances = Vec::with_capacity(nnz);
    let mut directions = Vec::with_capacity(nnz);
    for row in &rows {
        for (j, vf) in row {
            col_idx.push(*j);
            view_factors.push(vf.factor);
            distances.push(vf.distance);
            directions.push(vf.direction);
        }
        row_ptr.push(col_idx.len());
    }

    VisibilityGraph {
        row_ptr,
        col_idx,
        view_factors,
        distances,
        directions,
    }
}

/// Maximum horizon elevation per face: the largest
/// `asin(max(0, d̂·n̂))` over the face's visible neighbors, 0 for faces
/// with none. Values lie in `[0, π/2]`. Recomputation over the same graph
/// yields the same values.
pub(crate) fn face_max_elevations(
    graph: &VisibilityGraph,
    face_normals: &[Normal3f],
) -> Vec<Float> {
    (0..graph.num_faces())
        .into_par_iter()
        .map(|i| {
            graph
                .neighbor_directions(i)
                .iter()
                .map(|dir| clamp(dir.dotn(&face_normals[i]), 0.0, 1.0).asin())
                .fold(0.0, Float::max)
        })
        .collect()
}
