#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Heat-aware shot selection.
//!
//! Every projectile costs `speed * mass` heat. The planner enumerates the
//! whole lattice once and afterwards answers which shot is the strongest one
//! the ship can still afford.

use std::collections::BTreeMap;

/// Projectile parameters the ship can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shot {
    speed: u32,
    mass: u32,
}

impl Shot {
    /// Creates a new shot description.
    #[must_use]
    pub const fn new(speed: u32, mass: u32) -> Self {
        Self { speed, mass }
    }

    /// Cells travelled per tick.
    #[must_use]
    pub const fn speed(&self) -> u32 {
        self.speed
    }

    /// Projectile mass.
    #[must_use]
    pub const fn mass(&self) -> u32 {
        self.mass
    }

    /// Heat generated by firing the shot.
    #[must_use]
    pub const fn heat_cost(&self) -> u32 {
        self.speed * self.mass
    }
}

/// Precomputed heat lattice answering "best affordable shot" queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArmamentPlanner {
    fastest_by_cost: BTreeMap<u32, Shot>,
}

impl ArmamentPlanner {
    /// Enumerates every shot with `speed < max_speed` and `mass < max_mass`.
    ///
    /// For each achievable heat cost the fastest shot is retained.
    #[must_use]
    pub fn new(max_speed: u32, max_mass: u32) -> Self {
        let mut fastest_by_cost: BTreeMap<u32, Shot> = BTreeMap::new();
        for speed in 0..max_speed {
            for mass in 0..max_mass {
                let shot = Shot::new(speed, mass);
                let slot = fastest_by_cost.entry(shot.heat_cost()).or_insert(shot);
                if shot.speed > slot.speed {
                    *slot = shot;
                }
            }
        }

        tracing::debug!(
            max_speed,
            max_mass,
            costs = ?fastest_by_cost.keys().collect::<Vec<_>>(),
            "heat lattice prepared"
        );

        Self { fastest_by_cost }
    }

    /// Distinct achievable heat costs in ascending order.
    pub fn heat_costs(&self) -> impl Iterator<Item = u32> + '_ {
        self.fastest_by_cost.keys().copied()
    }

    /// Fastest shot producing exactly `cost` heat.
    #[must_use]
    pub fn shot_for_cost(&self, cost: u32) -> Option<Shot> {
        self.fastest_by_cost.get(&cost).copied()
    }

    /// Strongest shot whose heat still fits below `max_heat`.
    ///
    /// Returns `None` once `current_heat` has reached `heat_limit`, or when
    /// the only affordable shot would carry no heat at all.
    #[must_use]
    pub fn best_shot(&self, current_heat: i32, max_heat: i32, heat_limit: i32) -> Option<Shot> {
        if current_heat >= heat_limit {
            return None;
        }

        let budget = u32::try_from(max_heat.saturating_sub(current_heat)).ok()?;
        let (&cost, &shot) = self.fastest_by_cost.range(..=budget).next_back()?;
        (cost > 0).then_some(shot)
    }
}
