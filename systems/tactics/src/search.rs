//! Candidate destination searches around the own ship.
//!
//! Every search clears and refills caller-owned buffers so the engine can
//! reuse them across ticks.

use skirmish_core::{
    geometry::{approximate_direction, difference_vector},
    CompassDirection, Coordinates, SafetyValue, MAX_MOVE_DISTANCE,
};
use skirmish_system_safety_map::SafetyMap;

const REACH: i32 = MAX_MOVE_DISTANCE as i32;

/// Collects safe cells in rings of growing radius around `origin`.
///
/// Cells lying in the `heading` sector are moved to the front. Future danger
/// cells are gathered into `risky` with the same ordering rule.
pub(crate) fn ring_search(
    map: &SafetyMap,
    origin: Coordinates,
    heading: CompassDirection,
    safe: &mut Vec<Coordinates>,
    risky: &mut Vec<Coordinates>,
) {
    safe.clear();
    risky.clear();

    for radius in 1..=REACH {
        for x in origin.x() - radius..=origin.x() + radius {
            for y in origin.y() - radius..=origin.y() + radius {
                let cell = Coordinates::new(x, y);
                if origin.chebyshev_distance(cell) != radius.unsigned_abs() {
                    continue;
                }

                let bucket = match map.get(cell) {
                    Some(SafetyValue::Safe) => &mut *safe,
                    Some(SafetyValue::FutureDanger) => &mut *risky,
                    _ => continue,
                };

                let aligned = approximate_direction(difference_vector(origin, cell))
                    .is_ok_and(|direction| direction == heading);
                if aligned {
                    bucket.insert(0, cell);
                } else {
                    bucket.push(cell);
                }
            }
        }
    }
}

/// Collects cells within move range that do not bring the ship closer to
/// `threat`.
///
/// Safe cells that keep or grow the distance land in `safe`. Future danger
/// cells, and safe cells that close the distance, land in `fallback`.
pub(crate) fn retreat_through_safe(
    map: &SafetyMap,
    origin: Coordinates,
    threat: Coordinates,
    safe: &mut Vec<Coordinates>,
    fallback: &mut Vec<Coordinates>,
) {
    safe.clear();
    fallback.clear();
    let current = origin.euclidean_distance(threat);

    for cell in move_range(origin) {
        let value = map.get(cell);
        let usable = matches!(
            value,
            Some(SafetyValue::Safe | SafetyValue::FutureDanger)
        );
        if !usable {
            continue;
        }

        if cell.euclidean_distance(threat) >= current && value == Some(SafetyValue::Safe) {
            safe.push(cell);
        } else {
            fallback.push(cell);
        }
    }
}

/// Collects every interior cell within move range, split by whether it keeps
/// the distance to `threat`.
pub(crate) fn retreat_anywhere(
    origin: Coordinates,
    threat: Coordinates,
    farther: &mut Vec<Coordinates>,
    closer: &mut Vec<Coordinates>,
) {
    farther.clear();
    closer.clear();
    let current = origin.euclidean_distance(threat);

    for cell in move_range(origin).filter(|cell| !cell.is_border()) {
        if cell.euclidean_distance(threat) >= current {
            farther.push(cell);
        } else {
            closer.push(cell);
        }
    }
}

/// Collects safe cells perpendicular to `toward`, farthest first, alternating
/// between the counter-clockwise and clockwise sides.
///
/// The walk stops at the first off-grid cell on either side.
pub(crate) fn perpendicular_cells(
    map: &SafetyMap,
    origin: Coordinates,
    toward: CompassDirection,
    out: &mut Vec<Coordinates>,
) {
    out.clear();
    let sides = [toward.rotated(-2).vector(), toward.rotated(2).vector()];

    'walk: for distance in (1..=REACH).rev() {
        for side in sides {
            let cell = origin + side * distance;
            if !cell.is_on_grid() {
                break 'walk;
            }
            if map.is(cell, SafetyValue::Safe) {
                out.push(cell);
            }
        }
    }
}

fn move_range(origin: Coordinates) -> impl Iterator<Item = Coordinates> {
    (origin.x() - REACH..=origin.x() + REACH)
        .flat_map(move |x| {
            (origin.y() - REACH..=origin.y() + REACH).map(move |y| Coordinates::new(x, y))
        })
        .filter(Coordinates::is_on_grid)
}
