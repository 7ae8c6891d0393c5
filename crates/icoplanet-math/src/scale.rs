use glam::DVec3;

use crate::Vec3I128;

/// Mapping between meters and fixed-point planet units.
///
/// One meter equals `2^shift` units. A shift of 10 gives ~1 mm resolution
/// while keeping an Earth-sized planet below 2⁴³ units from its center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitScale {
    shift: u32,
}

impl UnitScale {
    /// Create a scale of `2^shift` units per meter.
    ///
    /// # Panics
    ///
    /// Panics if `shift` exceeds 40, which would leave too few integer
    /// bits for planet-sized coordinates.
    pub const fn new(shift: u32) -> Self {
        assert!(shift <= 40, "unit scale shift must be at most 40");
        Self { shift }
    }

    /// Number of fractional bits per meter.
    pub const fn shift(self) -> u32 {
        self.shift
    }

    /// Units in one meter.
    pub const fn units_per_meter(self) -> i128 {
        1i128 << self.shift
    }

    /// Convert a length in meters to units, rounding to nearest.
    pub fn to_units(self, meters: f64) -> i128 {
        (meters * self.units_per_meter() as f64).round() as i128
    }

    /// Convert a length in units to meters.
    pub fn to_meters(self, units: i128) -> f64 {
        units as f64 / self.units_per_meter() as f64
    }

    /// Convert a position in meters to units.
    pub fn vec_to_units(self, meters: DVec3) -> Vec3I128 {
        Vec3I128::from_dvec3_round(meters * self.units_per_meter() as f64)
    }

    /// Convert a position in units to meters.
    pub fn vec_to_meters(self, units: Vec3I128) -> DVec3 {
        units.as_dvec3() / self.units_per_meter() as f64
    }
}

impl Default for UnitScale {
    fn default() -> Self {
        Self::new(10)
    }
}
