//! Pure conversions between grid vectors and compass headings.

use crate::{CompassDirection, Coordinates, DecisionError};

/// Vector leading from `origin` to `target`.
#[must_use]
pub fn difference_vector(origin: Coordinates, target: Coordinates) -> Coordinates {
    target - origin
}

/// Clockwise bearing of the vector in degrees, north being zero, in `[0, 360)`.
///
/// Returns `None` for the zero vector.
#[must_use]
pub fn bearing_degrees(vector: Coordinates) -> Option<f64> {
    if vector.is_zero() {
        return None;
    }

    // y grows downward, so north is the negative y axis.
    let radians = f64::from(vector.x()).atan2(f64::from(-vector.y()));
    Some(radians.to_degrees().rem_euclid(360.0))
}

/// Maps a vector onto the nearest of the eight 45 degree compass sectors.
///
/// Sector `k` spans `[k * 45 - 22.5, k * 45 + 22.5)` degrees, so a vector
/// lying exactly on a boundary resolves to the clockwise neighbour.
pub fn approximate_direction(vector: Coordinates) -> Result<CompassDirection, DecisionError> {
    let bearing = bearing_degrees(vector).ok_or(DecisionError::ZeroVector)?;
    let sector = ((bearing + 22.5) / 45.0).floor() as i32;
    Ok(CompassDirection::from_index(sector))
}

/// Signed number of compass steps separating `from` and `to`, in `(-4, 4]`.
///
/// A half turn is reported as `+4`, i.e. clockwise.
#[must_use]
pub fn turn_steps(from: CompassDirection, to: CompassDirection) -> i32 {
    let delta = (i32::from(to.index()) - i32::from(from.index())).rem_euclid(8);
    if delta > 4 {
        delta - 8
    } else {
        delta
    }
}

/// Heading reached when rotating from `from` toward `to` by at most
/// `max_steps` compass steps.
#[must_use]
pub fn partial_turn(
    from: CompassDirection,
    to: CompassDirection,
    max_steps: u32,
) -> CompassDirection {
    let limit = i32::try_from(max_steps.min(4)).unwrap_or(4);
    from.rotated(turn_steps(from, to).clamp(-limit, limit))
}
