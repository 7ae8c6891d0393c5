use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use glam::DVec3;

/// 3D position or displacement in fixed-point planet units.
///
/// Skeleton vertices, triangle centers and the viewer position all live in
/// this space. See [`UnitScale`](crate::UnitScale) for the meter mapping.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Vec3I128 {
    pub x: i128,
    pub y: i128,
    pub z: i128,
}

impl Vec3I128 {
    /// Create a new Vec3I128 with the given coordinates.
    pub const fn new(x: i128, y: i128, z: i128) -> Self {
        Self { x, y, z }
    }

    /// Zero vector (0, 0, 0).
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Checked addition that returns None on overflow.
    pub fn checked_add(self, rhs: Vec3I128) -> Option<Vec3I128> {
        Some(Vec3I128::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    /// Returns the dot product: x₁x₂ + y₁y₂ + z₁z₂
    ///
    /// # Overflow
    /// Safe when each component magnitude is below 2⁶². Planet coordinates
    /// with a 2¹⁰ units-per-meter scale stay below 2⁴⁵ for bodies up to
    /// ~30 million km across.
    pub fn dot(self, rhs: Vec3I128) -> i128 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Returns the cross product self × rhs.
    pub fn cross(self, rhs: Vec3I128) -> Vec3I128 {
        Vec3I128::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Returns x² + y² + z².
    pub fn magnitude_squared(self) -> i128 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns None if any intermediate multiplication or the
    /// final sum overflows i128.
    pub fn checked_magnitude_squared(self) -> Option<i128> {
        let x2 = self.x.checked_mul(self.x)?;
        let y2 = self.y.checked_mul(self.y)?;
        let z2 = self.z.checked_mul(self.z)?;
        x2.checked_add(y2)?.checked_add(z2)
    }

    /// Converts to f64 and computes √(x² + y² + z²).
    pub fn magnitude_f64(self) -> f64 {
        self.as_dvec3().length()
    }

    /// Midpoint of two positions, rounding toward zero per component.
    ///
    /// Halves before adding so the sum cannot overflow.
    pub fn midpoint(self, rhs: Vec3I128) -> Vec3I128 {
        Vec3I128::new(
            self.x / 2 + rhs.x / 2 + (self.x % 2 + rhs.x % 2) / 2,
            self.y / 2 + rhs.y / 2 + (self.y % 2 + rhs.y % 2) / 2,
            self.z / 2 + rhs.z / 2 + (self.z % 2 + rhs.z % 2) / 2,
        )
    }

    /// Average of three positions. Each component is divided individually
    /// before summing to keep intermediate values in range.
    pub fn average3(a: Vec3I128, b: Vec3I128, c: Vec3I128) -> Vec3I128 {
        a / 3 + b / 3 + c / 3
    }

    /// Raw component cast to f64, without any unit conversion.
    pub fn as_dvec3(self) -> DVec3 {
        DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Round a raw f64 vector to the nearest integer position.
    pub fn from_dvec3_round(v: DVec3) -> Vec3I128 {
        Vec3I128::new(
            v.x.round() as i128,
            v.y.round() as i128,
            v.z.round() as i128,
        )
    }
}

impl fmt::Display for Vec3I128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3I128({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Add for Vec3I128 {
    type Output = Vec3I128;

    fn add(self, rhs: Vec3I128) -> Self::Output {
        Vec3I128::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3I128 {
    type Output = Vec3I128;

    fn sub(self, rhs: Vec3I128) -> Self::Output {
        Vec3I128::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3I128 {
    type Output = Vec3I128;

    fn neg(self) -> Self::Output {
        Vec3I128::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<i128> for Vec3I128 {
    type Output = Vec3I128;

    fn mul(self, rhs: i128) -> Self::Output {
        Vec3I128::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<i128> for Vec3I128 {
    type Output = Vec3I128;

    fn div(self, rhs: i128) -> Self::Output {
        Vec3I128::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl AddAssign for Vec3I128 {
    fn add_assign(&mut self, rhs: Vec3I128) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec3I128 {
    fn sub_assign(&mut self, rhs: Vec3I128) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

/// Squared Euclidean distance between two positions.
pub fn distance_squared(a: Vec3I128, b: Vec3I128) -> i128 {
    (a - b).magnitude_squared()
}

/// Squared distance, or `None` when it does not fit `i128`.
pub fn checked_distance_squared(a: Vec3I128, b: Vec3I128) -> Option<i128> {
    (a - b).checked_magnitude_squared()
}

/// Returns `true` if `a` and `b` are strictly closer than `threshold` units.
///
/// Compares squared distances, so no square root or float conversion is
/// involved. Distances too large to square are treated as far away.
pub fn is_within_distance(a: Vec3I128, b: Vec3I128, threshold: u64) -> bool {
    let threshold = u128::from(threshold);
    match checked_distance_squared(a, b) {
        Some(dist_sq) => dist_sq.unsigned_abs() < threshold * threshold,
        None => false,
    }
}
