#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tactical decision engine that turns one battlefield snapshot into one
//! command.
//!
//! The engine owns a [`SafetyMapBuilder`], an [`ArmamentPlanner`] and a
//! seeded random number generator. Each call to [`TacticalEngine::decide`]
//! classifies the snapshot and then walks a fixed priority policy: escape
//! danger first, otherwise engage or evade a visible enemy, otherwise hunt
//! the enemy by sound, and finally fall back to a random action.

mod search;

use glam::Vec2;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use skirmish_core::{
    geometry::{approximate_direction, difference_vector, partial_turn},
    Command, CompassDirection, Coordinates, DecisionError, Decider, GameState, OwnShipId,
    TeamAiContext, MAX_MOVE_DISTANCE,
};
use skirmish_system_armament::{ArmamentPlanner, Shot};
use skirmish_system_safety_map::{SafetyMap, SafetyMapBuilder, SafetyScan};

/// Turn rate assumed until a match announces its own.
pub const DEFAULT_TURN_RATE: u32 = 1;

/// Tunable parameters of the tactical policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Heat at which the ship starts taking damage.
    pub max_heat: i32,
    /// Heat at or above which the ship stops firing.
    pub heat_limit: i32,
    /// Exclusive upper bound on projectile speed.
    pub max_shot_speed: u32,
    /// Exclusive upper bound on projectile mass.
    pub max_shot_mass: u32,
    /// Distance beyond which a visible enemy is shot at instead of evaded.
    pub engage_distance: u32,
    /// Largest angle, in radians, between a target and a compass heading for
    /// the target to count as lying on that heading.
    pub firing_tolerance_radians: f32,
    /// Seed for the random number generator; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            max_heat: 25,
            heat_limit: 20,
            max_shot_speed: 3,
            max_shot_mass: 4,
            engage_distance: 7,
            firing_tolerance_radians: 0.15,
            seed: None,
        }
    }
}

/// Reasons a [`TacticsConfig`] is rejected.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TacticsConfigError {
    /// The firing threshold exceeds the damage threshold.
    #[error("heat_limit ({heat_limit}) must not exceed max_heat ({max_heat})")]
    HeatLimitAboveMaximum {
        /// Configured firing threshold.
        heat_limit: i32,
        /// Configured damage threshold.
        max_heat: i32,
    },
    /// One of the shot bounds leaves no shot with positive heat.
    #[error("max_shot_speed and max_shot_mass must both be at least 2")]
    EmptyLattice,
    /// The firing tolerance is negative or not a number.
    #[error("firing_tolerance_radians must be a non-negative number, got {0}")]
    InvalidTolerance(f32),
}

impl TacticsConfig {
    /// Checks the configuration for contradictory values.
    pub fn validate(&self) -> Result<(), TacticsConfigError> {
        if self.heat_limit > self.max_heat {
            return Err(TacticsConfigError::HeatLimitAboveMaximum {
                heat_limit: self.heat_limit,
                max_heat: self.max_heat,
            });
        }
        if self.max_shot_speed < 2 || self.max_shot_mass < 2 {
            return Err(TacticsConfigError::EmptyLattice);
        }
        if self.firing_tolerance_radians.is_nan() || self.firing_tolerance_radians < 0.0 {
            return Err(TacticsConfigError::InvalidTolerance(
                self.firing_tolerance_radians,
            ));
        }
        Ok(())
    }
}

/// Stateful per-match decision engine.
#[derive(Debug)]
pub struct TacticalEngine {
    own_id: OwnShipId,
    builder: SafetyMapBuilder,
    policy: Policy,
}

impl TacticalEngine {
    /// Creates an engine steering the ship identified by `own_id`.
    #[must_use]
    pub fn new(own_id: OwnShipId, config: TacticsConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        tracing::debug!(seed, ship = own_id.as_str(), "tactical engine seeded");

        Self {
            own_id,
            builder: SafetyMapBuilder::new(),
            policy: Policy {
                planner: ArmamentPlanner::new(config.max_shot_speed, config.max_shot_mass),
                config,
                rng: ChaCha8Rng::seed_from_u64(seed),
                last_sound: None,
                turn_rate: DEFAULT_TURN_RATE,
                primary: Vec::new(),
                secondary: Vec::new(),
            },
        }
    }

    /// Identifier of the steered ship.
    #[must_use]
    pub fn own_id(&self) -> &OwnShipId {
        &self.own_id
    }

    /// Forgets everything learned during the current match.
    pub fn reset(&mut self) {
        self.policy.last_sound = None;
        self.policy.turn_rate = DEFAULT_TURN_RATE;
    }

    /// Chooses the command for the provided snapshot.
    pub fn decide(
        &mut self,
        state: &GameState,
        context: Option<&TeamAiContext>,
    ) -> Result<Command, DecisionError> {
        if let Some(context) = context {
            self.policy.turn_rate = context.turn_rate();
        }

        let scan = self.builder.build(state, &self.own_id)?;
        let command = self.policy.choose(&scan)?;
        tracing::debug!(turn = state.turn_number, ?command, "command chosen");
        Ok(command)
    }
}

impl Decider for TacticalEngine {
    fn decide(
        &mut self,
        state: &GameState,
        context: Option<&TeamAiContext>,
    ) -> Result<Command, DecisionError> {
        TacticalEngine::decide(self, state, context)
    }

    fn reset(&mut self) {
        TacticalEngine::reset(self);
    }
}

#[derive(Debug)]
struct Policy {
    config: TacticsConfig,
    planner: ArmamentPlanner,
    rng: ChaCha8Rng,
    last_sound: Option<Coordinates>,
    turn_rate: u32,
    primary: Vec<Coordinates>,
    secondary: Vec<Coordinates>,
}

impl Policy {
    fn choose(&mut self, scan: &SafetyScan<'_>) -> Result<Command, DecisionError> {
        if let Some(sound) = scan.sound_position {
            self.last_sound = Some(sound);
        }

        let ship = Ship {
            position: scan.own_ship.position,
            heading: scan.own_ship.direction,
            heat: scan.own_ship.heat_or_zero(),
        };
        let sound = scan.sound_position.or(self.last_sound);
        let enemy = scan.enemy_ship.map(|enemy| enemy.position);

        let command = if scan.in_danger() {
            self.escape(scan.map, ship, enemy.or(sound))?
        } else if let Some(enemy) = enemy {
            self.confront(scan.map, ship, enemy)?
        } else {
            self.hunt(scan.map, ship, sound)?
        };

        match command {
            Some(command) => Ok(command),
            None => {
                tracing::debug!("no tactical option found, choosing a random action");
                self.random_command(ship, enemy.or(sound))
            }
        }
    }

    fn escape(
        &mut self,
        map: &SafetyMap,
        ship: Ship,
        target: Option<Coordinates>,
    ) -> Result<Option<Command>, DecisionError> {
        search::ring_search(
            map,
            ship.position,
            ship.heading,
            &mut self.primary,
            &mut self.secondary,
        );
        if self.primary.is_empty() {
            std::mem::swap(&mut self.primary, &mut self.secondary);
        }

        if self.primary.is_empty() {
            if let Some(command) = self.return_fire(ship, target)? {
                return Ok(Some(command));
            }
        }

        self.move_through_ring(ship)
    }

    fn confront(
        &mut self,
        map: &SafetyMap,
        ship: Ship,
        enemy: Coordinates,
    ) -> Result<Option<Command>, DecisionError> {
        // Truncated, so 7.9 still counts as within an engage distance of 7.
        let distance = ship.position.euclidean_distance(enemy).floor();
        if distance > f64::from(self.config.engage_distance) {
            if let Some(command) = self.return_fire(ship, Some(enemy))? {
                return Ok(Some(command));
            }
        }

        if let Some(command) = self.retreat_safely(map, ship, enemy)? {
            return Ok(Some(command));
        }
        self.retreat_anywhere(ship, enemy)
    }

    fn hunt(
        &mut self,
        map: &SafetyMap,
        ship: Ship,
        sound: Option<Coordinates>,
    ) -> Result<Option<Command>, DecisionError> {
        if let Some(sound) = sound {
            if let Some(command) = self.return_fire(ship, Some(sound))? {
                return Ok(Some(command));
            }
            if let Some(command) = self.reposition_perpendicular(map, ship, sound)? {
                return Ok(Some(command));
            }
        }

        search::ring_search(
            map,
            ship.position,
            ship.heading,
            &mut self.primary,
            &mut self.secondary,
        );
        if self.primary.is_empty() {
            std::mem::swap(&mut self.primary, &mut self.secondary);
        }

        if self.primary.is_empty() {
            if let Some(sound) = sound {
                if let Some(command) = self.retreat_anywhere(ship, sound)? {
                    return Ok(Some(command));
                }
            }
        }

        self.move_through_ring(ship)
    }

    /// Fires at `target` when a shot is affordable and the target lies on a
    /// compass line, turning toward that line when not yet facing it.
    fn return_fire(
        &self,
        ship: Ship,
        target: Option<Coordinates>,
    ) -> Result<Option<Command>, DecisionError> {
        let Some(target) = target else {
            return Ok(None);
        };
        let Some(shot) = self.affordable_shot(ship) else {
            return Ok(None);
        };

        let vector = difference_vector(ship.position, target);
        if vector.is_zero() {
            return Ok(None);
        }

        let line = approximate_direction(vector)?;
        if angle_between(vector, line.vector()) > self.config.firing_tolerance_radians {
            tracing::debug!(?target, ?line, "target is not on a firing line");
            return Ok(None);
        }

        Ok(Some(self.shoot_or_turn(ship, line, shot)))
    }

    /// Tries the ring candidates nearest first, or farthest first once the
    /// ship runs hot so that longer moves shed more heat.
    fn move_through_ring(&mut self, ship: Ship) -> Result<Option<Command>, DecisionError> {
        let running_hot = ship.heat >= self.config.heat_limit;
        if running_hot {
            self.primary.reverse();
        }
        self.first_reachable(ship)
    }

    fn retreat_safely(
        &mut self,
        map: &SafetyMap,
        ship: Ship,
        threat: Coordinates,
    ) -> Result<Option<Command>, DecisionError> {
        search::retreat_through_safe(
            map,
            ship.position,
            threat,
            &mut self.primary,
            &mut self.secondary,
        );
        self.primary.shuffle(&mut self.rng);
        self.secondary.shuffle(&mut self.rng);
        if self.primary.is_empty() {
            std::mem::swap(&mut self.primary, &mut self.secondary);
        }
        if self.primary.is_empty() {
            tracing::debug!(?threat, "no safe retreat available");
            return Ok(None);
        }

        self.first_reachable(ship)
    }

    fn retreat_anywhere(
        &mut self,
        ship: Ship,
        threat: Coordinates,
    ) -> Result<Option<Command>, DecisionError> {
        search::retreat_anywhere(ship.position, threat, &mut self.primary, &mut self.secondary);
        self.primary.shuffle(&mut self.rng);
        if self.primary.is_empty() {
            std::mem::swap(&mut self.primary, &mut self.secondary);
        }

        self.first_reachable(ship)
    }

    fn reposition_perpendicular(
        &mut self,
        map: &SafetyMap,
        ship: Ship,
        sound: Coordinates,
    ) -> Result<Option<Command>, DecisionError> {
        let vector = difference_vector(ship.position, sound);
        if vector.is_zero() {
            return Ok(None);
        }

        let toward = approximate_direction(vector)?;
        search::perpendicular_cells(map, ship.position, toward, &mut self.primary);
        self.first_reachable(ship)
    }

    fn first_reachable(&self, ship: Ship) -> Result<Option<Command>, DecisionError> {
        for &candidate in &self.primary {
            if let Some(command) = self.move_towards(ship, candidate)? {
                return Ok(Some(command));
            }
            tracing::debug!(?candidate, "candidate unreachable, trying another");
        }
        Ok(None)
    }

    /// Moves along the current heading toward `target`, or turns toward it.
    ///
    /// Targets off the eight compass lines cannot be reached in a straight
    /// move and are rejected.
    fn move_towards(
        &self,
        ship: Ship,
        target: Coordinates,
    ) -> Result<Option<Command>, DecisionError> {
        let vector = difference_vector(ship.position, target);
        let on_compass_line =
            vector.x() == 0 || vector.y() == 0 || vector.x().abs() == vector.y().abs();
        if vector.is_zero() || !on_compass_line {
            return Ok(None);
        }

        let direction = approximate_direction(vector)?;
        if direction == ship.heading {
            let distance = ship.position.chebyshev_distance(target).min(MAX_MOVE_DISTANCE);
            return Ok(Some(Command::Move { distance }));
        }

        Ok(Some(Command::Turn {
            direction: partial_turn(ship.heading, direction, self.turn_rate),
        }))
    }

    fn shoot_or_turn(&self, ship: Ship, line: CompassDirection, shot: Shot) -> Command {
        if line == ship.heading {
            Command::Shoot {
                speed: shot.speed(),
                mass: shot.mass(),
            }
        } else {
            Command::Turn {
                direction: partial_turn(ship.heading, line, self.turn_rate),
            }
        }
    }

    fn affordable_shot(&self, ship: Ship) -> Option<Shot> {
        self.planner
            .best_shot(ship.heat, self.config.max_heat, self.config.heat_limit)
    }

    fn random_command(
        &mut self,
        ship: Ship,
        target: Option<Coordinates>,
    ) -> Result<Command, DecisionError> {
        match self.rng.gen_range(0..3) {
            0 => Ok(Command::FALLBACK),
            1 => {
                let wanted = CompassDirection::from_index(self.rng.gen_range(0..8));
                Ok(Command::Turn {
                    direction: partial_turn(ship.heading, wanted, self.turn_rate),
                })
            }
            _ => {
                let Some(shot) = self.affordable_shot(ship) else {
                    return Ok(Command::FALLBACK);
                };
                let Some(vector) = target
                    .map(|target| difference_vector(ship.position, target))
                    .filter(|vector| !vector.is_zero())
                else {
                    return Ok(Command::FALLBACK);
                };

                if angle_between(vector, ship.heading.vector())
                    <= self.config.firing_tolerance_radians
                {
                    return Ok(Command::Shoot {
                        speed: shot.speed(),
                        mass: shot.mass(),
                    });
                }

                Ok(Command::Turn {
                    direction: partial_turn(
                        ship.heading,
                        approximate_direction(vector)?,
                        self.turn_rate,
                    ),
                })
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Ship {
    position: Coordinates,
    heading: CompassDirection,
    heat: i32,
}

fn angle_between(a: Coordinates, b: Coordinates) -> f32 {
    let a = Vec2::new(a.x() as f32, a.y() as f32).normalize_or_zero();
    let b = Vec2::new(b.x() as f32, b.y() as f32).normalize_or_zero();
    a.dot(b).clamp(-1.0, 1.0).acos()
}
