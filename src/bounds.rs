use std::fmt;
use std::ops::Index;

use crate::ray::Ray;
use crate::{Float, Point3f, Vector3f};

/// Axis Aligned Bounding Box.
#[derive(Debug, Copy, Clone)]
pub struct Bounds3f {
    pub p_min: Point3f,
    pub p_max: Point3f,
}

impl Bounds3f {
    /// The empty box: any `extend` or union replaces it.
    pub fn new() -> Bounds3f {
        Bounds3f {
            p_min: Point3f::new(Float::INFINITY, Float::INFINITY, Float::INFINITY),
            p_max: Point3f::new(
                Float::NEG_INFINITY,
                Float::NEG_INFINITY,
                Float::NEG_INFINITY,
            ),
        }
    }

    pub fn from_point(p: &Point3f) -> Bounds3f {
        Bounds3f {
            p_min: *p,
            p_max: *p,
        }
    }

    pub fn from_points(p1: &Point3f, p2: &Point3f) -> Bounds3f {
        Bounds3f {
            p_min: Point3f::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            p_max: Point3f::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z)),
        }
    }

    pub fn extend(&mut self, p: &Point3f) {
        self.p_min = Point3f::new(
            self.p_min.x.min(p.x),
            self.p_min.y.min(p.y),
            self.p_min.z.min(p.z),
        );
        self.p_max = Point3f::new(
            self.p_max.x.max(p.x),
            self.p_max.y.max(p.y),
            self.p_max.z.max(p.z),
        );
    }

    pub fn union(b1: &Bounds3f, b2: &Bounds3f) -> Bounds3f {
        let mut b = *b1;
        b.extend(&b2.p_min);
        b.extend(&b2.p_max);
        b
    }

    pub fn union_point(b: &Bounds3f, p: &Point3f) -> Bounds3f {
        let mut b = *b;
        b.extend(p);
        b
    }

    pub fn centroid(&self) -> Point3f {
        0.5 * self.p_min + 0.5 * self.p_max
    }

    pub fn diagonal(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    pub fn maximum_extent(&self) -> Axis {
        let v = self.diagonal();
        if v.x > v.y {
            if v.x > v.z {
                Axis::X
            } else {
                Axis::Z
            }
        } else if v.y > v.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Position of `p` relative to the corners, each component in [0, 1]
    /// when `p` is inside.
    pub fn offset(&self, p: &Point3f) -> Vector3f {
        let mut o = *p - self.p_min;
        if self.p_max.x > self.p_min.x {
            o.x /= self.p_max.x - self.p_min.x;
        }
        if self.p_max.y > self.p_min.y {
            o.y /= self.p_max.y - self.p_min.y;
        }
        if self.p_max.z > self.p_min.z {
            o.z /= self.p_max.z - self.p_min.z;
        }
        o
    }

    pub fn inside(&self, p: &Point3f) -> bool {
        p.x >= self.p_min.x
            && p.x <= self.p_max.x
            && p.y >= self.p_min.y
            && p.y <= self.p_max.y
            && p.z >= self.p_min.z
            && p.z <= self.p_max.z
    }

    /// Slab test: does the ray's parameter interval intersect `[0, t_max)`
    /// within the box?
    pub fn intersect_p(&self, ray: &Ray, t_max: Float) -> bool {
        let inv_dir = Vector3f::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
        let dir_is_neg = [
            (ray.d.x < 0.0) as usize,
            (ray.d.y < 0.0) as usize,
            (ray.d.z < 0.0) as usize,
        ];
        self.intersect_p_fast(ray, &inv_dir, &dir_is_neg, t_max)
    }

    /// Slab test with the reciprocal direction and sign mask precomputed,
    /// for the traversal inner loop.
    pub fn intersect_p_fast(
        &self,
        ray: &Ray,
        inv_dir: &Vector3f,
        dir_is_neg: &[usize; 3],
        t_max: Float,
    ) -> bool {
        // X and Y slabs
        let mut tmin = (self[dir_is_neg[0]].x - ray.o.x) * inv_dir.x;
        let mut tmax = (self[1 - dir_is_neg[0]].x - ray.o.x) * inv_dir.x;
        let tymin = (self[dir_is_neg[1]].y - ray.o.y) * inv_dir.y;
        let tymax = (self[1 - dir_is_neg[1]].y - ray.o.y) * inv_dir.y;
        if (tmin > tymax) || (tymin > tmax) {
            return false;
        }
        if tymin > tmin {
            tmin = tymin;
        }
        if tymax < tmax {
            tmax = tymax;
        }
        // Z slab
        let tzmin = (self[dir_is_neg[2]].z - ray.o.z) * inv_dir.z;
        let tzmax = (self[1 - dir_is_neg[2]].z - ray.o.z) * inv_dir.z;
        if (tmin > tzmax) || (tzmin > tmax) {
            return false;
        }
        if tzmin > tmin {
            tmin = tzmin;
        }
        if tzmax < tmax {
            tmax = tzmax;
        }

        tmin < t_max && tmax > 0.0
    }
}

impl Default for Bounds3f {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Bounds3f {
    type Output = Point3f;

    fn index(&self, i: usize) -> &Point3f {
        match i {
            0 => &self.p_min,
            1 => &self.p_max,
            _ => panic!("Invalid index!"),
        }
    }
}

impl fmt::Display for Bounds3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.p_min, self.p_max)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn as_index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl Index<Axis> for Point3f {
    type Output = Float;

    fn index(&self, axis: Axis) -> &Float {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl Index<Axis> for Vector3f {
    type Output = Float;

    fn index(&self, axis: Axis) -> &Float {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_from_empty() {
        let mut b = Bounds3f::new();
        b.extend(&Point3f::new(1.0, -1.0, 0.0));
        b.extend(&Point3f::new(-2.0, 3.0, 1.0));
        assert_eq!(b.p_min, Point3f::new(-2.0, -1.0, 0.0));
        assert_eq!(b.p_max, Point3f::new(1.0, 3.0, 1.0));
    }

    #[test]
    fn test_maximum_extent() {
        let b = Bounds3f::from_points(&Point3f::new(0.0, 0.0, 0.0), &Point3f::new(1.0, 3.0, 2.0));
        assert_eq!(b.maximum_extent(), Axis::Y);
    }

    #[test]
    fn test_slab_hit_and_miss() {
        let b = Bounds3f::from_points(&Point3f::new(-1.0, -1.0, -1.0), &Point3f::new(1.0, 1.0, 1.0));
        let hit = Ray::new(Point3f::new(0.0, 0.0, 5.0), Vector3f::new(0.0, 0.0, -1.0));
        assert!(b.intersect_p(&hit, Float::INFINITY));
        let miss = Ray::new(Point3f::new(0.0, 5.0, 5.0), Vector3f::new(0.0, 0.0, -1.0));
        assert!(!b.intersect_p(&miss, Float::INFINITY));
        // Box entirely behind the t_max cap.
        assert!(!b.intersect_p(&hit, 1.0));
    }

    #[test]
    fn test_slab_from_inside() {
        let b = Bounds3f::from_points(&Point3f::new(-1.0, -1.0, -1.0), &Point3f::new(1.0, 1.0, 1.0));
        let r = Ray::new(Point3f::origin(), Vector3f::new(1.0, 0.0, 0.0));
        assert!(b.intersect_p(&r, Float::INFINITY));
    }
}
