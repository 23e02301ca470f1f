use std::fmt;

use crate::{Float, Point3f, Vector3f};

/// A ray with origin and direction. The direction need not be unit length:
/// intersection kernels report distances as the parameter `t` of
/// `o + t * d`, i.e. in units of `‖d‖`. Rays carry no near/far clip; result
/// types carry the distance.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub o: Point3f,
    pub d: Vector3f,
}

impl Ray {
    pub fn new(o: Point3f, d: Vector3f) -> Ray {
        debug_assert!(!o.has_nan());
        debug_assert!(!d.has_nan());
        debug_assert_ne!(d.length_squared(), 0.0);
        Ray { o, d }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.o + t * self.d
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[o={}, d={}]", self.o, self.d)
    }
}
