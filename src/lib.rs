//! Visibility and ray tracing for triangular shape models of small bodies.
//!
//! The crate answers three questions about an asteroid-scale surface mesh:
//! which faces see the Sun, which faces see each other, and where a given
//! ray strikes the surface. The answers are built from a small set of
//! components: per-face geometry kernels, a BVH over the triangles, a
//! compressed face-to-face visibility graph with view factors, per-face
//! horizon elevations, direct (self-shadowed) illumination, and mutual
//! eclipse shadowing between two bodies.
//!
//! All computation is in `f64`; see [`Float`].

// Lints
#![deny(unused_must_use)]
#![warn(rust_2018_idioms)]
// Clippy config
#![allow(
    clippy::float_cmp,
    clippy::many_single_char_names,
    clippy::too_many_arguments
)]

pub mod bounds;
pub mod bvh;
pub mod error;
pub mod face;
pub mod geometry;
pub mod illumination;
pub mod intersect;
pub mod mesh;
pub mod obj;
pub mod ray;
pub mod visibility;

pub use crate::bounds::{Axis, Bounds3f};
pub use crate::bvh::BVH;
pub use crate::error::{Error, Result};
pub use crate::geometry::{Matrix3x3, Normal3, Point3, Vector3};
pub use crate::illumination::{
    apply_eclipse_shadowing, illuminated_faces, is_illuminated, update_illumination, EclipseStatus,
};
pub use crate::intersect::{ShapeHit, Sphere};
pub use crate::mesh::{intersect_ray_shape, ShapeModel};
pub use crate::obj::{load_obj, load_shape_obj};
pub use crate::ray::Ray;
pub use crate::visibility::{VisibilityGraph, VisibleFaceData};

/// Scalar type used for all geometry.
pub type Float = f64;

pub type Vector3f = Vector3<Float>;
pub type Point3f = Point3<Float>;
pub type Normal3f = Normal3<Float>;

pub const PI: Float = std::f64::consts::PI;

/// Clamp `val` into `[low, high]`.
pub fn clamp<T>(val: T, low: T, high: T) -> T
where
    T: PartialOrd + Copy,
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}
