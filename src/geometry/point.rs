use std::fmt::{Display, Error, Formatter};
use std::ops::{Add, AddAssign, Div, Index, Mul, Sub};

use num::Num;

use crate::geometry::Vector3;
use crate::Float;

/// A position in 3-space. Positions carry meters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Point3<T>
where
    T: Num + Copy,
{
    pub fn new(x: T, y: T, z: T) -> Point3<T> {
        Point3 { x, y, z }
    }

    pub fn origin() -> Point3<T> {
        Point3::new(T::zero(), T::zero(), T::zero())
    }
}

impl Point3<Float> {
    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }

    pub fn distance(&self, p: &Point3<Float>) -> Float {
        (*p - *self).length()
    }

    /// Distance from the coordinate origin.
    pub fn norm(&self) -> Float {
        Vector3::from(*self).length()
    }
}

// Operators
// Point3 + Vector3 -> Point3
impl<T> Add<Vector3<T>> for Point3<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn add(self, rhs: Vector3<T>) -> Point3<T> {
        Point3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

// Point3 + Point3 -> Point3 (used for averaging)
impl<T> Add<Point3<T>> for Point3<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn add(self, rhs: Point3<T>) -> Point3<T> {
        Point3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl<T> AddAssign<Vector3<T>> for Point3<T>
where
    T: AddAssign + Copy,
{
    fn add_assign(&mut self, rhs: Vector3<T>) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

// Point3 - Point3 -> Vector3
impl<T> Sub<Point3<T>> for Point3<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Vector3<T>;

    fn sub(self, rhs: Point3<T>) -> Vector3<T> {
        Vector3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

// Point3 - Vector3 -> Point3
impl<T> Sub<Vector3<T>> for Point3<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn sub(self, rhs: Vector3<T>) -> Point3<T> {
        Point3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl<T> Mul<T> for Point3<T>
where
    T: Mul<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn mul(self, s: T) -> Point3<T> {
        Point3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}

impl Mul<Point3<Float>> for Float {
    type Output = Point3<Float>;

    fn mul(self, p: Point3<Float>) -> Point3<Float> {
        p * self
    }
}

impl<T> Div<T> for Point3<T>
where
    T: Div<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn div(self, s: T) -> Point3<T> {
        Point3 {
            x: self.x / s,
            y: self.y / s,
            z: self.z / s,
        }
    }
}

impl<T> Index<usize> for Point3<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Invalid index into point"),
        }
    }
}

impl<T> From<Vector3<T>> for Point3<T>
where
    T: Num + Copy,
{
    fn from(v: Vector3<T>) -> Point3<T> {
        Point3::new(v.x, v.y, v.z)
    }
}

impl<T> Default for Point3<T>
where
    T: Default,
{
    fn default() -> Self {
        Point3 {
            x: T::default(),
            y: T::default(),
            z: T::default(),
        }
    }
}

impl<T> Display for Point3<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}
