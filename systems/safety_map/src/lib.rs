#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that classifies every battlefield cell by how dangerous it is
//! to occupy during the next tick.

use skirmish_core::{
    Cell, Coordinates, DecisionError, GameState, OwnShipId, ProjectileData, SafetyValue, ShipData,
    GRID_SIZE,
};

/// Per-tick danger classification of the whole battlefield.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyMap {
    cells: Vec<SafetyValue>,
}

impl SafetyMap {
    /// Creates a map with the border set to instant danger and every other
    /// cell unknown.
    #[must_use]
    pub fn new() -> Self {
        let mut cells = vec![SafetyValue::Unknown; GRID_SIZE * GRID_SIZE];
        for (index, cell) in cells.iter_mut().enumerate() {
            let at = Coordinates::new((index % GRID_SIZE) as i32, (index / GRID_SIZE) as i32);
            if at.is_border() {
                *cell = SafetyValue::InstantDanger;
            }
        }
        Self { cells }
    }

    /// Classification of the cell, or `None` when the coordinate is off-grid.
    #[must_use]
    pub fn get(&self, at: Coordinates) -> Option<SafetyValue> {
        at.grid_index().map(|index| self.cells[index])
    }

    /// Reports whether the cell exists and holds the provided classification.
    #[must_use]
    pub fn is(&self, at: Coordinates, value: SafetyValue) -> bool {
        self.get(at) == Some(value)
    }

    /// Renders the map as one line of glyphs per row.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = String::with_capacity(GRID_SIZE * (GRID_SIZE + 1));
        for (row_index, row) in self.cells.chunks(GRID_SIZE).enumerate() {
            if row_index > 0 {
                rendered.push('\n');
            }
            rendered.extend(row.iter().map(|value| value.glyph()));
        }
        rendered
    }

    fn set(&mut self, at: Coordinates, value: SafetyValue) {
        if at.is_border() {
            return;
        }
        if let Some(index) = at.grid_index() {
            self.cells[index] = value;
        }
    }
}

impl Default for SafetyMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything extracted from one snapshot, borrowed from the builder's
/// buffers until the next call to [`SafetyMapBuilder::build`].
#[derive(Clone, Copy, Debug)]
pub struct SafetyScan<'a> {
    /// Classified battlefield.
    pub map: &'a SafetyMap,
    /// Projectiles visible this tick.
    pub projectiles: &'a [ProjectileData],
    /// Cells covered by this agent's ship, centre included.
    pub own_hitboxes: &'a [Coordinates],
    /// Cells covered by the enemy ship, centre included when visible.
    pub enemy_hitboxes: &'a [Coordinates],
    /// This agent's ship.
    pub own_ship: &'a ShipData,
    /// The enemy ship when its centre is visible.
    pub enemy_ship: Option<&'a ShipData>,
    /// Enemy position revealed by sound this tick.
    pub sound_position: Option<Coordinates>,
    /// Whether any own hitbox sits on an instant danger cell.
    pub in_immediate_danger: bool,
    /// Whether any own hitbox sits on a future danger cell.
    pub in_future_danger: bool,
}

impl SafetyScan<'_> {
    /// Reports whether the enemy ship centre is visible this tick.
    #[must_use]
    pub fn enemy_visible(&self) -> bool {
        self.enemy_ship.is_some()
    }

    /// Reports whether the own ship overlaps any kind of danger.
    #[must_use]
    pub fn in_danger(&self) -> bool {
        self.in_immediate_danger || self.in_future_danger
    }
}

/// Builds a [`SafetyMap`] per tick while reusing every buffer it owns.
#[derive(Debug)]
pub struct SafetyMapBuilder {
    map: SafetyMap,
    stamps: Vec<u64>,
    round: u64,
    projectiles: Vec<ProjectileData>,
    own_hitboxes: Vec<Coordinates>,
    enemy_hitboxes: Vec<Coordinates>,
    own_ship: Option<ShipData>,
    enemy_ship: Option<ShipData>,
    sound_position: Option<Coordinates>,
}

impl SafetyMapBuilder {
    /// Creates a builder with a freshly initialised map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: SafetyMap::new(),
            stamps: vec![0; GRID_SIZE * GRID_SIZE],
            round: 0,
            projectiles: Vec::new(),
            own_hitboxes: Vec::new(),
            enemy_hitboxes: Vec::new(),
            own_ship: None,
            enemy_ship: None,
            sound_position: None,
        }
    }

    /// Classifies the snapshot from the perspective of `own_id`.
    ///
    /// Every interior cell is rewritten; the border keeps the instant danger
    /// classification it received at construction.
    pub fn build(
        &mut self,
        state: &GameState,
        own_id: &OwnShipId,
    ) -> Result<SafetyScan<'_>, DecisionError> {
        state.ensure_full_grid()?;

        self.round = self.round.wrapping_add(1).max(1);
        self.projectiles.clear();
        self.own_hitboxes.clear();
        self.enemy_hitboxes.clear();
        self.own_ship = None;
        self.enemy_ship = None;
        self.sound_position = None;

        let last = GRID_SIZE as i32 - 1;
        for x in 1..last {
            for y in 1..last {
                let at = Coordinates::new(x, y);
                match &state.game_map[y as usize][x as usize] {
                    Cell::AudioSignature => {
                        self.sound_position = Some(at);
                        self.claim(at, SafetyValue::Sound);
                    }
                    Cell::HitBox(hitbox) if own_id.matches(&hitbox.entity_id) => {
                        self.own_hitboxes.push(at);
                        self.claim(at, SafetyValue::MyShip);
                    }
                    Cell::HitBox(_) => {
                        self.enemy_hitboxes.push(at);
                        self.claim(at, SafetyValue::Enemy);
                        self.enemy_halo(at);
                    }
                    Cell::Projectile(projectile) => {
                        self.projectiles.push(projectile.clone());
                        self.claim(at, SafetyValue::InstantDanger);
                    }
                    Cell::Ship(ship) if own_id.matches(&ship.id) => {
                        self.own_ship = Some(ship.clone());
                        self.own_hitboxes.push(at);
                        self.claim(at, SafetyValue::MyShip);
                    }
                    Cell::Ship(ship) => {
                        self.enemy_ship = Some(ship.clone());
                        self.enemy_hitboxes.push(at);
                        self.claim(at, SafetyValue::Enemy);
                    }
                    Cell::Empty => self.fill_default(at, SafetyValue::Safe),
                    Cell::OutOfVision => self.fill_default(at, SafetyValue::Unknown),
                }
            }
        }

        for projectile in &self.projectiles {
            project_trajectory(
                &mut self.map,
                projectile.position,
                projectile.direction.vector(),
            );
        }

        let in_immediate_danger = self
            .own_hitboxes
            .iter()
            .any(|at| self.map.is(*at, SafetyValue::InstantDanger));
        let in_future_danger = self
            .own_hitboxes
            .iter()
            .any(|at| self.map.is(*at, SafetyValue::FutureDanger));

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                turn = state.turn_number,
                "safety map\n{}",
                self.map.render()
            );
        }

        let own_ship = self.own_ship.as_ref().ok_or(DecisionError::MissingOwnShip)?;
        tracing::debug!(
            turn = state.turn_number,
            projectiles = self.projectiles.len(),
            enemy_visible = self.enemy_ship.is_some(),
            in_immediate_danger,
            in_future_danger,
            "safety map built"
        );

        Ok(SafetyScan {
            map: &self.map,
            projectiles: &self.projectiles,
            own_hitboxes: &self.own_hitboxes,
            enemy_hitboxes: &self.enemy_hitboxes,
            own_ship,
            enemy_ship: self.enemy_ship.as_ref(),
            sound_position: self.sound_position,
            in_immediate_danger,
            in_future_danger,
        })
    }

    /// Most recently built map.
    #[must_use]
    pub fn map(&self) -> &SafetyMap {
        &self.map
    }

    fn claim(&mut self, at: Coordinates, value: SafetyValue) {
        if let Some(index) = at.grid_index() {
            self.stamps[index] = self.round;
        }
        self.map.set(at, value);
    }

    fn fill_default(&mut self, at: Coordinates, value: SafetyValue) {
        let claimed = at
            .grid_index()
            .is_some_and(|index| self.stamps[index] == self.round);
        if !claimed {
            self.map.set(at, value);
        }
    }

    fn enemy_halo(&mut self, center: Coordinates) {
        for neighbour in halo(center) {
            let Some(index) = neighbour.grid_index() else {
                continue;
            };
            let claimed = self.stamps[index] == self.round;
            if claimed && !self.map.is(neighbour, SafetyValue::Enemy) {
                continue;
            }
            self.claim(neighbour, SafetyValue::Enemy);
        }
    }
}

impl Default for SafetyMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn halo(center: Coordinates) -> impl Iterator<Item = Coordinates> {
    (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| center + Coordinates::new(dx, dy)))
}

/// Marks the projectile's cell and every cell it can reach, out to the edge
/// of the grid.
///
/// Cells within the projectile's speed and the cells it could reach on later
/// ticks are treated alike.
///
/// Reach cells take precedence over the own ship; enemy and sound markings
/// are never replaced. Padding around each reach cell replaces nothing but
/// safe and unknown cells.
fn project_trajectory(map: &mut SafetyMap, origin: Coordinates, step: Coordinates) {
    let mut cell = origin;
    while cell.is_on_grid() {
        if !matches!(
            map.get(cell),
            Some(SafetyValue::Enemy | SafetyValue::Sound)
        ) {
            map.set(cell, SafetyValue::InstantDanger);
        }

        for neighbour in halo(cell) {
            if !matches!(
                map.get(neighbour),
                Some(SafetyValue::Enemy | SafetyValue::Sound | SafetyValue::MyShip) | None
            ) {
                map.set(neighbour, SafetyValue::InstantDanger);
            }
        }

        cell = cell + step;
    }
}
