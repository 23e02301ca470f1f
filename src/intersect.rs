//! Ray/primitive intersection kernels.
//!
//! Distances are reported as the ray parameter `t`, in units of the ray
//! direction's length.

use crate::error::{Error, Result};
use crate::ray::Ray;
use crate::{Float, Point3f};

/// Determinant threshold below which a ray is treated as parallel to the
/// triangle's plane.
pub const EPS_DET: Float = 1e-12;

/// Smallest accepted hit distance. Chosen slightly positive so that a ray
/// whose origin lies exactly in the triangle's plane reports a miss.
pub const EPS_HIT: Float = 1e-12;

/// Two closest-hit distances within this of each other are treated as a tie
/// and resolved toward the lower face index.
pub const EPS_TIE: Float = 1e-10;

/// A hit against a single triangle.
#[derive(Debug, Copy, Clone)]
pub struct TriangleHit {
    pub t: Float,
    pub point: Point3f,
}

/// A closest hit against a mesh.
#[derive(Debug, Copy, Clone)]
pub struct ShapeHit {
    pub face_index: usize,
    pub distance: Float,
    pub point: Point3f,
}

impl ShapeHit {
    /// Whether a new hit at `(t, face_index)` should replace this one:
    /// strictly closer, or tied within [`EPS_TIE`] with a lower face index.
    pub(crate) fn improved_by(&self, t: Float, face_index: usize) -> bool {
        t < self.distance - EPS_TIE
            || ((t - self.distance).abs() <= EPS_TIE && face_index < self.face_index)
    }
}

/// Möller–Trumbore ray/triangle intersection.
///
/// No backface culling: rays approaching from behind the triangle still
/// hit. Ray/shape traversal relies on this so that rays cast from inside a
/// closed mesh report an intersection with the far wall.
pub fn intersect_ray_triangle(
    ray: &Ray,
    v1: &Point3f,
    v2: &Point3f,
    v3: &Point3f,
) -> Option<TriangleHit> {
    let e1 = *v2 - *v1;
    let e2 = *v3 - *v1;
    let pvec = ray.d.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < EPS_DET {
        // Parallel to the plane.
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.o - *v1;
    let u = tvec.dot(&pvec) * inv_det;
    if u < 0.0 || u > 1.0 {
        return None;
    }

    let qvec = tvec.cross(&e1);
    let v = ray.d.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qvec) * inv_det;
    if t <= EPS_HIT {
        return None;
    }

    Some(TriangleHit {
        t,
        point: ray.at(t),
    })
}

/// A sphere with a checked non-negative radius. Radius zero is degenerate
/// but legal; it never reports a hit.
#[derive(Debug, Copy, Clone)]
pub struct Sphere {
    center: Point3f,
    radius: Float,
}

impl Sphere {
    pub fn new(center: Point3f, radius: Float) -> Result<Sphere> {
        if radius < 0.0 {
            return Err(Error::invalid_argument(format!(
                "sphere radius must be non-negative, got {}",
                radius
            )));
        }
        Ok(Sphere { center, radius })
    }

    pub fn center(&self) -> Point3f {
        self.center
    }

    pub fn radius(&self) -> Float {
        self.radius
    }
}

/// Both roots of a ray/sphere intersection, `t1 <= t2`. Roots are reported
/// even when negative; a ray starting inside the sphere has `t1 < 0 < t2`.
/// Callers interpret the signs.
#[derive(Debug, Copy, Clone)]
pub struct SphereHit {
    pub t1: Float,
    pub t2: Float,
    pub point1: Point3f,
    pub point2: Point3f,
}

/// Solve `‖o + t·d − c‖² = r²` for t.
pub fn intersect_ray_sphere(ray: &Ray, sphere: &Sphere) -> Option<SphereHit> {
    if sphere.radius == 0.0 {
        return None;
    }
    let oc = ray.o - sphere.center;
    let a = ray.d.dot(&ray.d);
    if a == 0.0 {
        return None;
    }
    let b = 2.0 * ray.d.dot(&oc);
    let c = oc.dot(&oc) - sphere.radius * sphere.radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) / (2.0 * a);
    let t2 = (-b + sqrt_d) / (2.0 * a);
    Some(SphereHit {
        t1,
        t2,
        point1: ray.at(t1),
        point2: ray.at(t2),
    })
}

/// Parameter of the point on the ray closest to `p`, in units of `t`.
/// Negative when the closest approach lies behind the origin.
pub fn closest_approach(ray: &Ray, p: &Point3f) -> Float {
    ray.d.dot(&(*p - ray.o)) / ray.d.dot(&ray.d)
}
