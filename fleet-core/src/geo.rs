//! Great-circle bearing between two positions.

use crate::types::Position;

/// Initial compass bearing in degrees from point 1 to point 2, in [0, 360).
///
/// NaN in, NaN out. Coincident points yield 0 (`atan2(0, 0)`).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_degrees(x.atan2(y).to_degrees())
}

/// Fold any angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let d = (deg % 360.0 + 360.0) % 360.0;
    // Tiny negative inputs round up to exactly 360.0
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Heading of travel from `from` to `to`, or `None` when the bearing is not
/// a finite number.
pub fn derived_heading(from: &Position, to: &Position) -> Option<f64> {
    let hdg = bearing(from.latitude, from.longitude, to.latitude, to.longitude);
    hdg.is_finite().then_some(hdg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
