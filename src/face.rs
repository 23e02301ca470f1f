//! Per-face geometry kernels: centers, normals, areas, angles, the
//! view-factor kernel, polyhedron volume and the height-grid triangulation.

use crate::{clamp, Float, Normal3f, Point3f, Vector3f, PI};

/// Arithmetic mean of the three vertices.
pub fn face_center(v1: &Point3f, v2: &Point3f, v3: &Point3f) -> Point3f {
    (*v1 + *v2 + *v3) / 3.0
}

/// Unit outward normal of a counter-clockwise triangle.
///
/// Zero-area inputs return a normal of NaNs; callers either tolerate the
/// NaNs or validate areas first.
pub fn face_normal(v1: &Point3f, v2: &Point3f, v3: &Point3f) -> Normal3f {
    let n = (*v2 - *v1).cross(&(*v3 - *v1));
    Normal3f::from(n.normalize())
}

pub fn face_area(v1: &Point3f, v2: &Point3f, v3: &Point3f) -> Float {
    0.5 * (*v2 - *v1).cross(&(*v3 - *v1)).length()
}

/// Angle between two vectors in radians, in [0, π].
pub fn angle_rad(a: &Vector3f, b: &Vector3f) -> Float {
    clamp(a.dot(b) / (a.length() * b.length()), -1.0, 1.0).acos()
}

pub fn angle_deg(a: &Vector3f, b: &Vector3f) -> Float {
    angle_rad(a, b).to_degrees()
}

/// Sun–target–observer angle as seen from the target.
pub fn solar_phase_angle(sun: &Point3f, target: &Point3f, observer: &Point3f) -> Float {
    angle_rad(&(*sun - *target), &(*observer - *target))
}

/// Sun–observer–target angle as seen from the observer.
pub fn solar_elongation_angle(sun: &Point3f, observer: &Point3f, target: &Point3f) -> Float {
    angle_rad(&(*sun - *observer), &(*target - *observer))
}

/// Point-area view factor from a patch at `c1` toward a patch at `c2`,
/// together with the center distance and the unit direction from `c1` to
/// `c2`.
#[derive(Debug, Copy, Clone)]
pub struct ViewFactor {
    pub factor: Float,
    pub distance: Float,
    pub direction: Vector3f,
}

/// `f = max(0, n̂₁·d̂) · max(0, −n̂₂·d̂) · area₂ / (π d²)`.
///
/// Coincident centers (d = 0) report a zero factor and a zero direction so
/// no infinity leaks out of the kernel; patches oriented away from each
/// other report exactly 0.
pub fn view_factor(
    c1: &Point3f,
    c2: &Point3f,
    n1: &Normal3f,
    n2: &Normal3f,
    area2: Float,
) -> ViewFactor {
    let to = *c2 - *c1;
    let d = to.length();
    if d == 0.0 {
        return ViewFactor {
            factor: 0.0,
            distance: 0.0,
            direction: Vector3f::zero(),
        };
    }
    let dir = to / d;
    let cos1 = n1.dot(&dir).max(0.0);
    let cos2 = (-*n2).dot(&dir).max(0.0);
    ViewFactor {
        factor: cos1 * cos2 * area2 / (PI * d * d),
        distance: d,
        direction: dir,
    }
}

/// Signed volume of a closed triangulated surface by the divergence
/// theorem. Negative for inward-oriented meshes, near zero for surfaces
/// that do not close.
pub fn polyhedron_volume(nodes: &[Point3f], faces: &[[usize; 3]]) -> Float {
    faces
        .iter()
        .map(|f| {
            let a = Vector3f::from(nodes[f[0]]);
            let b = Vector3f::from(nodes[f[1]]);
            let c = Vector3f::from(nodes[f[2]]);
            a.dot(&b.cross(&c))
        })
        .sum::<Float>()
        / 6.0
}

/// Radius of the sphere with the given volume.
pub fn equivalent_radius(volume: Float) -> Float {
    (3.0 * volume / (4.0 * PI)).cbrt()
}

/// Largest node distance from the origin.
pub fn maximum_radius(nodes: &[Point3f]) -> Float {
    nodes.iter().map(|n| n.norm()).fold(0.0, Float::max)
}

/// Smallest node distance from the origin.
pub fn minimum_radius(nodes: &[Point3f]) -> Float {
    nodes
        .iter()
        .map(|n| n.norm())
        .fold(Float::INFINITY, Float::min)
}

/// Triangulate a regular height field.
///
/// `zs` is indexed `zs[i * ys.len() + j]` for the sample at
/// `(xs[i], ys[j])`. Every grid quad is split along the same diagonal into
/// the triangles `[c00, c10, c01]` and `[c11, c01, c10]`, which orients
/// all normals toward +z for an upward-facing field. The result is
/// `|xs|·|ys|` nodes and `2(|xs|−1)(|ys|−1)` triangles.
pub fn grid_to_faces(
    xs: &[Float],
    ys: &[Float],
    zs: &[Float],
) -> (Vec<Point3f>, Vec<[usize; 3]>) {
    let nx = xs.len();
    let ny = ys.len();
    assert_eq!(zs.len(), nx * ny, "height grid size mismatch");

    let mut nodes = Vec::with_capacity(nx * ny);
    for (i, &x) in xs.iter().enumerate() {
        for (j, &y) in ys.iter().enumerate() {
            nodes.push(Point3f::new(x, y, zs[i * ny + j]));
        }
    }

    let mut faces = Vec::with_capacity(2 * nx.saturating_sub(1) * ny.saturating_sub(1));
    for i in 0..nx.saturating_sub(1) {
        for j in 0..ny.saturating_sub(1) {
            let c00 = i * ny + j;
            let c10 = (i + 1) * ny + j;
            let c01 = i * ny + (j + 1);
            let c11 = (i + 1) * ny + (j + 1);
            faces.push([c00, c10, c01]);
            faces.push([c11, c01, c10]);
        }
    }

    (nodes, faces)
}
