use skirmish_core::{
    Cell, CompassDirection, Coordinates, GameState, HitBoxData, OwnShipId, ProjectileData,
    SafetyValue, ShipData, GRID_SIZE,
};
use skirmish_system_safety_map::SafetyMapBuilder;

const OWN: &str = "ship:alpha:one";
const ENEMY: &str = "ship:beta:two";

fn open_state() -> GameState {
    GameState {
        turn_number: 7,
        game_map: vec![vec![Cell::Empty; GRID_SIZE]; GRID_SIZE],
    }
}

fn put(state: &mut GameState, x: i32, y: i32, cell: Cell) {
    state.game_map[y as usize][x as usize] = cell;
}

fn ship(id: &str, x: i32, y: i32, direction: CompassDirection) -> Cell {
    Cell::Ship(ShipData {
        id: id.to_owned(),
        position: Coordinates::new(x, y),
        direction,
        health: Some(10),
        heat: Some(0),
    })
}

fn hitbox(id: &str) -> Cell {
    Cell::HitBox(HitBoxData {
        entity_id: id.to_owned(),
    })
}

fn projectile(x: i32, y: i32, direction: CompassDirection, speed: u32) -> Cell {
    Cell::Projectile(ProjectileData {
        id: "projectile:1".to_owned(),
        position: Coordinates::new(x, y),
        direction,
        speed: Some(speed),
        mass: Some(1),
    })
}

fn surround(state: &mut GameState, id: &str, x: i32, y: i32, direction: CompassDirection) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put(state, x + dx, y + dy, hitbox(id));
        }
    }
    put(state, x, y, ship(id, x, y, direction));
}

#[test]
fn projectile_trajectory_endangers_own_hitbox() {
    let mut state = open_state();
    put(&mut state, 20, 20, ship(OWN, 20, 20, CompassDirection::North));
    put(&mut state, 12, 10, hitbox(OWN));
    put(&mut state, 10, 10, projectile(10, 10, CompassDirection::East, 2));

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    assert_eq!(
        scan.map.get(Coordinates::new(12, 10)),
        Some(SafetyValue::InstantDanger)
    );
    assert!(scan.in_immediate_danger);
    assert_eq!(scan.projectiles.len(), 1);
}

#[test]
fn projectile_reach_extends_to_the_border_with_padding() {
    let mut state = open_state();
    put(&mut state, 5, 25, ship(OWN, 5, 25, CompassDirection::North));
    put(&mut state, 10, 10, projectile(10, 10, CompassDirection::East, 1));

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    for x in 11..29 {
        for y in 9..=11 {
            assert_eq!(
                scan.map.get(Coordinates::new(x, y)),
                Some(SafetyValue::InstantDanger),
                "({x}, {y})"
            );
        }
    }
    assert_eq!(scan.map.get(Coordinates::new(11, 12)), Some(SafetyValue::Safe));
    assert!(!scan.in_danger());
}

#[test]
fn diagonal_trajectory_pads_around_its_final_border_cell() {
    let mut state = open_state();
    put(&mut state, 5, 5, ship(OWN, 5, 5, CompassDirection::North));
    put(&mut state, 10, 24, projectile(10, 24, CompassDirection::SouthEast, 1));

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    assert_eq!(
        scan.map.get(Coordinates::new(16, 28)),
        Some(SafetyValue::InstantDanger)
    );
    assert_eq!(
        scan.map.get(Coordinates::new(17, 28)),
        Some(SafetyValue::Safe)
    );
    assert_eq!(
        scan.map.get(Coordinates::new(15, 29)),
        Some(SafetyValue::InstantDanger)
    );
}

#[test]
fn projectile_marking_never_replaces_enemy_or_sound() {
    let mut state = open_state();
    put(&mut state, 5, 25, ship(OWN, 5, 25, CompassDirection::North));
    put(&mut state, 10, 10, projectile(10, 10, CompassDirection::East, 3));
    put(&mut state, 13, 10, Cell::AudioSignature);
    surround(&mut state, ENEMY, 20, 11, CompassDirection::West);

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    assert_eq!(scan.map.get(Coordinates::new(13, 10)), Some(SafetyValue::Sound));
    assert_eq!(scan.map.get(Coordinates::new(20, 10)), Some(SafetyValue::Enemy));
    assert_eq!(scan.map.get(Coordinates::new(18, 10)), Some(SafetyValue::Enemy));
    assert_eq!(scan.sound_position, Some(Coordinates::new(13, 10)));
}

#[test]
fn enemy_hitboxes_are_padded_and_survive_default_fill() {
    let mut state = open_state();
    put(&mut state, 5, 5, ship(OWN, 5, 5, CompassDirection::South));
    surround(&mut state, ENEMY, 15, 15, CompassDirection::North);

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    for y in 13..=17 {
        for x in 13..=17 {
            assert_eq!(
                scan.map.get(Coordinates::new(x, y)),
                Some(SafetyValue::Enemy),
                "({x}, {y})"
            );
        }
    }
    assert_eq!(scan.map.get(Coordinates::new(18, 15)), Some(SafetyValue::Safe));
    assert_eq!(scan.enemy_hitboxes.len(), 9);
    assert!(scan.enemy_visible());
    assert_eq!(
        scan.enemy_ship.map(|enemy| enemy.position),
        Some(Coordinates::new(15, 15))
    );
}

#[test]
fn border_cells_are_never_rewritten() {
    let mut state = open_state();
    put(&mut state, 15, 15, ship(OWN, 15, 15, CompassDirection::North));
    surround(&mut state, ENEMY, 2, 2, CompassDirection::North);

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    assert_eq!(
        scan.map.get(Coordinates::new(0, 1)),
        Some(SafetyValue::InstantDanger)
    );
    assert_eq!(
        scan.map.get(Coordinates::new(1, 0)),
        Some(SafetyValue::InstantDanger)
    );
    assert_eq!(scan.map.get(Coordinates::new(1, 1)), Some(SafetyValue::Enemy));
}

#[test]
fn classification_is_recomputed_every_tick() {
    let mut builder = SafetyMapBuilder::new();
    let own = OwnShipId::new(OWN);

    let mut first = open_state();
    put(&mut first, 5, 25, ship(OWN, 5, 25, CompassDirection::North));
    put(&mut first, 10, 10, projectile(10, 10, CompassDirection::East, 1));
    surround(&mut first, ENEMY, 20, 20, CompassDirection::North);
    let _ = builder.build(&first, &own).expect("own ship present");

    let mut second = open_state();
    put(&mut second, 5, 25, ship(OWN, 5, 25, CompassDirection::North));
    let scan = builder.build(&second, &own).expect("own ship present");

    assert_eq!(scan.map.get(Coordinates::new(15, 10)), Some(SafetyValue::Safe));
    assert_eq!(scan.map.get(Coordinates::new(20, 20)), Some(SafetyValue::Safe));
    assert!(scan.projectiles.is_empty());
    assert!(scan.enemy_hitboxes.is_empty());
    assert!(!scan.enemy_visible());
}

#[test]
fn future_danger_is_unreachable_by_construction() {
    let mut state = open_state();
    put(&mut state, 12, 12, ship(OWN, 12, 12, CompassDirection::North));
    put(&mut state, 3, 3, projectile(3, 3, CompassDirection::SouthEast, 3));
    put(&mut state, 20, 6, projectile(20, 6, CompassDirection::South, 1));
    put(&mut state, 8, 20, Cell::AudioSignature);
    put(&mut state, 25, 25, Cell::OutOfVision);
    surround(&mut state, ENEMY, 22, 14, CompassDirection::West);

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::new(OWN))
        .expect("own ship present");

    let rendered = scan.map.render();
    assert!(!rendered.contains(SafetyValue::FutureDanger.glyph()));
    assert!(!scan.in_future_danger);
    assert!(scan.in_immediate_danger);
}

#[test]
fn own_ship_matching_ignores_case() {
    let mut state = open_state();
    put(&mut state, 9, 9, ship("SHIP:Alpha:One", 9, 9, CompassDirection::West));

    let mut builder = SafetyMapBuilder::new();
    let scan = builder
        .build(&state, &OwnShipId::from_credentials("alpha", "one"))
        .expect("own ship present");

    assert_eq!(scan.own_ship.direction, CompassDirection::West);
    assert_eq!(scan.map.get(Coordinates::new(9, 9)), Some(SafetyValue::MyShip));
}
