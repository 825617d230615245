#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Skirmish agent.
//!
//! This crate defines the data model that connects the adapters and the pure
//! systems. The wire adapter decodes server frames into a [`GameState`], the
//! safety map and tactics systems reduce that snapshot into a single
//! [`Command`], and the protocol adapter ships the command back to the
//! server. Nothing in here performs I/O.

use std::{
    fmt,
    ops::{Add, Mul, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod geometry;

/// Side length of the square battlefield, measured in cells.
pub const GRID_SIZE: usize = 30;

/// Largest number of cells a ship may travel in a single tick.
pub const MAX_MOVE_DISTANCE: u32 = 3;

/// Failures raised while reducing a tick snapshot into a command.
///
/// These are invariant violations: the tick that produced them is abandoned
/// and the protocol substitutes the fallback command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The snapshot grid does not have the fixed battlefield dimensions.
    #[error("expected a {GRID_SIZE}x{GRID_SIZE} grid, received {columns}x{rows}")]
    MalformedGrid {
        /// Number of rows present in the snapshot.
        rows: usize,
        /// Number of columns in the first mismatching row.
        columns: usize,
    },
    /// The snapshot does not contain the ship owned by this agent.
    #[error("own ship is missing from the snapshot")]
    MissingOwnShip,
    /// A direction was requested for a vector of length zero.
    #[error("cannot derive a compass direction from a zero vector")]
    ZeroVector,
}

/// Location of a grid cell, also used as a two-dimensional integer vector.
///
/// The origin sits in the top-left corner; `x` grows to the right and `y`
/// grows downward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coordinates {
    x: i32,
    y: i32,
}

impl Coordinates {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Reports whether both components are zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Number of king moves separating the two coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Straight-line distance between the two coordinates.
    #[must_use]
    pub fn euclidean_distance(self, other: Self) -> f64 {
        let delta = other - self;
        f64::from(delta.x).hypot(f64::from(delta.y))
    }

    /// Reports whether the coordinate addresses a cell of the battlefield.
    #[must_use]
    pub fn is_on_grid(&self) -> bool {
        self.grid_index().is_some()
    }

    /// Reports whether the coordinate lies on the outermost ring of cells.
    #[must_use]
    pub fn is_border(&self) -> bool {
        let last = GRID_SIZE as i32 - 1;
        self.is_on_grid() && (self.x == 0 || self.y == 0 || self.x == last || self.y == last)
    }

    /// Row-major index of the cell, or `None` when the coordinate is off-grid.
    #[must_use]
    pub fn grid_index(&self) -> Option<usize> {
        let x = usize::try_from(self.x).ok()?;
        let y = usize::try_from(self.y).ok()?;
        (x < GRID_SIZE && y < GRID_SIZE).then_some(y * GRID_SIZE + x)
    }
}

impl Add for Coordinates {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coordinates {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Coordinates {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<i32> for Coordinates {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// The eight compass headings, ordered clockwise starting at north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompassDirection {
    /// Toward decreasing `y`.
    North,
    /// Toward increasing `x` and decreasing `y`.
    NorthEast,
    /// Toward increasing `x`.
    East,
    /// Toward increasing `x` and increasing `y`.
    SouthEast,
    /// Toward increasing `y`.
    South,
    /// Toward decreasing `x` and increasing `y`.
    SouthWest,
    /// Toward decreasing `x`.
    West,
    /// Toward decreasing `x` and decreasing `y`.
    NorthWest,
}

const DIRECTION_VECTORS: [Coordinates; 8] = [
    Coordinates::new(0, -1),
    Coordinates::new(1, -1),
    Coordinates::new(1, 0),
    Coordinates::new(1, 1),
    Coordinates::new(0, 1),
    Coordinates::new(-1, 1),
    Coordinates::new(-1, 0),
    Coordinates::new(-1, -1),
];

const DIRECTION_ABBREVIATIONS: [&str; 8] = ["n", "ne", "e", "se", "s", "sw", "w", "nw"];

const DIRECTION_NAMES: [&str; 8] = [
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

impl CompassDirection {
    /// Every direction in clockwise order starting at north.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Position of the direction in clockwise order, north being zero.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Converts any integer into a direction, wrapping modulo eight.
    #[must_use]
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(8) as usize]
    }

    /// Direction reached after rotating clockwise by `steps` eighths of a
    /// circle. Negative steps rotate counter-clockwise.
    #[must_use]
    pub fn rotated(self, steps: i32) -> Self {
        Self::from_index(i32::from(self.index()) + steps)
    }

    /// Unit grid step travelled by a single move in this direction.
    #[must_use]
    pub const fn vector(self) -> Coordinates {
        DIRECTION_VECTORS[self as usize]
    }

    /// Lowercase abbreviation used on the wire (`n`, `ne`, ...).
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        DIRECTION_ABBREVIATIONS[self as usize]
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Raised when a string does not name a compass direction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown compass direction '{0}'")]
pub struct ParseDirectionError(pub String);

impl FromStr for CompassDirection {
    type Err = ParseDirectionError;

    /// Accepts abbreviations (`ne`) and full names (`northEast`) in any case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|direction| {
                let index = direction.index() as usize;
                DIRECTION_ABBREVIATIONS[index] == lowered || DIRECTION_NAMES[index] == lowered
            })
            .ok_or_else(|| ParseDirectionError(value.to_owned()))
    }
}

impl Serialize for CompassDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.abbreviation())
    }
}

impl<'de> Deserialize<'de> for CompassDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Cell payload identifying which entity a hit box belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitBoxData {
    /// Identifier of the entity that owns the hit box.
    pub entity_id: String,
}

/// State of a ship as reported in its centre cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipData {
    /// Identifier of the ship, `ship:<token>:<botName>`.
    pub id: String,
    /// Centre cell of the ship.
    pub position: Coordinates,
    /// Heading the ship is facing.
    pub direction: CompassDirection,
    /// Remaining health, when the server reveals it.
    #[serde(default)]
    pub health: Option<i32>,
    /// Accumulated heat, when the server reveals it.
    #[serde(default)]
    pub heat: Option<i32>,
}

impl ShipData {
    /// Accumulated heat, treating an unreported value as cold.
    #[must_use]
    pub fn heat_or_zero(&self) -> i32 {
        self.heat.unwrap_or(0)
    }
}

/// State of a projectile in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileData {
    /// Identifier of the projectile.
    pub id: String,
    /// Cell currently occupied by the projectile.
    pub position: Coordinates,
    /// Heading of travel.
    pub direction: CompassDirection,
    /// Cells travelled per tick.
    #[serde(default, alias = "velocity")]
    pub speed: Option<u32>,
    /// Mass of the projectile.
    #[serde(default)]
    pub mass: Option<u32>,
}

/// Contents of a single battlefield cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    /// Visible and unoccupied.
    Empty,
    /// Outside of the ship's vision.
    OutOfVision,
    /// Approximate enemy position revealed by sound.
    AudioSignature,
    /// Part of a ship's physical extent.
    HitBox(HitBoxData),
    /// Centre cell of a ship.
    Ship(ShipData),
    /// A projectile in flight.
    Projectile(ProjectileData),
}

/// Snapshot of the battlefield received once per tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    /// Server-side turn counter.
    pub turn_number: u64,
    /// Row-major cells: `game_map[y][x]`.
    pub game_map: Vec<Vec<Cell>>,
}

impl GameState {
    /// Returns the cell at the provided coordinates, if present.
    #[must_use]
    pub fn cell(&self, at: Coordinates) -> Option<&Cell> {
        let x = usize::try_from(at.x()).ok()?;
        let y = usize::try_from(at.y()).ok()?;
        self.game_map.get(y)?.get(x)
    }

    /// Checks that the map has the fixed battlefield dimensions.
    pub fn ensure_full_grid(&self) -> Result<(), DecisionError> {
        if self.game_map.len() != GRID_SIZE {
            return Err(DecisionError::MalformedGrid {
                rows: self.game_map.len(),
                columns: self.game_map.first().map_or(0, Vec::len),
            });
        }

        match self.game_map.iter().find(|row| row.len() != GRID_SIZE) {
            Some(row) => Err(DecisionError::MalformedGrid {
                rows: self.game_map.len(),
                columns: row.len(),
            }),
            None => Ok(()),
        }
    }

    /// Locates the centre cell of the ship with the given identifier.
    ///
    /// Hit box cells sharing the identifier are ignored.
    #[must_use]
    pub fn entity_coordinates(&self, entity_id: &str) -> Option<Coordinates> {
        self.game_map.iter().enumerate().find_map(|(y, row)| {
            row.iter().enumerate().find_map(|(x, cell)| match cell {
                Cell::Ship(ship) if ship.id == entity_id => {
                    Some(Coordinates::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
                }
                _ => None,
            })
        })
    }
}

/// Identifier of the ship controlled by this agent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnShipId(String);

impl OwnShipId {
    /// Derives the ship identifier the server assigns to the given credentials.
    #[must_use]
    pub fn from_credentials(token: &str, bot_name: &str) -> Self {
        Self(format!("ship:{token}:{bot_name}"))
    }

    /// Wraps an identifier verbatim.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reports whether the entity identifier refers to this agent's ship.
    ///
    /// Matching ignores ASCII case, as the server does not preserve it.
    #[must_use]
    pub fn matches(&self, entity_id: &str) -> bool {
        self.0.eq_ignore_ascii_case(entity_id)
    }

    /// Borrows the textual identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Danger classification of a single cell for the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SafetyValue {
    /// Out of vision; nothing is known.
    #[default]
    Unknown,
    /// Visible, empty and clear of every projected threat.
    Safe,
    /// Occupied or reachable by a projectile, or part of the border.
    InstantDanger,
    /// Reserved for threats expected after the next tick.
    ///
    /// Map construction never assigns this value; consumers still treat it
    /// as a second-choice destination.
    FutureDanger,
    /// Enemy ship or the padding around its hit box.
    Enemy,
    /// Part of this agent's ship.
    MyShip,
    /// Enemy position revealed by sound.
    Sound,
}

impl SafetyValue {
    /// Single character used when rendering a safety map.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Unknown => '?',
            Self::Safe => '0',
            Self::InstantDanger => 'X',
            Self::FutureDanger => 'x',
            Self::Enemy => 'E',
            Self::MyShip => 'M',
            Self::Sound => 'S',
        }
    }
}

/// Per-match constants announced when a game starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeamAiContext {
    tick_length_ms: u64,
    turn_rate: u32,
}

impl TeamAiContext {
    /// Creates a new match context.
    #[must_use]
    pub const fn new(tick_length_ms: u64, turn_rate: u32) -> Self {
        Self {
            tick_length_ms,
            turn_rate,
        }
    }

    /// Wall-clock length of a tick in milliseconds. Zero disables deadlines.
    #[must_use]
    pub const fn tick_length_ms(&self) -> u64 {
        self.tick_length_ms
    }

    /// Maximum number of compass steps a ship may rotate per tick.
    #[must_use]
    pub const fn turn_rate(&self) -> u32 {
        self.turn_rate
    }
}

/// The single action submitted in response to a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "lowercase")]
pub enum Command {
    /// Travel forward along the current heading.
    Move {
        /// Number of cells to travel, at most [`MAX_MOVE_DISTANCE`].
        distance: u32,
    },
    /// Rotate to face a new heading.
    Turn {
        /// Heading to face after the turn.
        direction: CompassDirection,
    },
    /// Fire a projectile along the current heading.
    Shoot {
        /// Cells the projectile travels per tick.
        speed: u32,
        /// Mass of the projectile.
        mass: u32,
    },
}

impl Command {
    /// Command submitted whenever no decision is available in time.
    pub const FALLBACK: Self = Self::Move { distance: 0 };
}

/// Component that turns tick snapshots into commands.
///
/// Implementations run on a worker thread while the protocol waits on a
/// deadline, hence the `Send + 'static` bound.
pub trait Decider: Send + 'static {
    /// Chooses the command answering `state`.
    fn decide(
        &mut self,
        state: &GameState,
        context: Option<&TeamAiContext>,
    ) -> Result<Command, DecisionError>;

    /// Discards every piece of per-match memory.
    fn reset(&mut self);
}
