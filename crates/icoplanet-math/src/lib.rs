//! Planet-scale integer vectors and fixed-point unit conversion for icoplanet.

mod scale;
mod vector;

pub use scale::UnitScale;
pub use vector::{Vec3I128, checked_distance_squared, distance_squared, is_within_distance};
