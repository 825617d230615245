#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! JSON codec for the game server's `{ "eventType", "data" }` envelopes.
//!
//! Inbound frames are decoded into [`InboundEvent`] values carrying the core
//! data model; outbound events are encoded from [`OutboundEvent`]. Event type
//! and cell type names are matched without regard to ASCII case.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skirmish_core::{
    Cell, Command, CompassDirection, Coordinates, GameState, HitBoxData, ProjectileData, ShipData,
    TeamAiContext,
};

/// Errors raised while decoding or encoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame carried no text.
    #[error("received an empty frame")]
    EmptyFrame,
    /// The frame is not valid JSON or lacks the envelope fields.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The envelope names an event this client does not understand.
    #[error("unknown event type '{0}'")]
    UnknownEvent(String),
    /// A cell names a type outside the known set.
    #[error("unknown cell type '{0}'")]
    UnknownCellType(String),
    /// An entity carries a heading that names no compass direction.
    #[error("unknown compass direction '{0}'")]
    UnknownDirection(String),
    /// An event or cell payload is missing fields or has the wrong shape.
    #[error("invalid {context} payload: {source}")]
    InvalidPayload {
        /// Which payload failed to decode.
        context: &'static str,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A `gameTick` envelope arrived but its snapshot could not be decoded.
    ///
    /// The tick still expects an answer.
    #[error("undecodable game tick: {0}")]
    InvalidTick(#[source] Box<WireError>),
    /// An outbound event could not be serialised.
    #[error("failed to encode outbound event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Events sent by the game server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// The server accepted the credentials.
    AuthAck,
    /// A match is starting with the provided constants.
    StartGame(TeamAiContext),
    /// A new tick needs an answer.
    GameTick(GameState),
    /// The current match has finished.
    EndGame,
}

impl InboundEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthAck => "authAck",
            Self::StartGame(_) => "startGame",
            Self::GameTick(_) => "gameTick",
            Self::EndGame => "endGame",
        }
    }
}

/// Events sent by this client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Authentication request.
    Auth {
        /// Team token.
        token: String,
        /// Display name of the bot.
        bot_name: String,
    },
    /// Acknowledges a match start.
    StartAck,
    /// Answer to a tick.
    GameAction(Command),
    /// Acknowledges a match end.
    EndAck,
}

impl OutboundEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::StartAck => "startAck",
            Self::GameAction(_) => "gameAction",
            Self::EndAck => "endAck",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStartGame {
    tick_length: u64,
    turn_rate: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameState {
    turn_number: u64,
    game_map: Vec<Vec<RawCell>>,
}

#[derive(Deserialize)]
struct RawCell {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShip {
    id: String,
    position: Coordinates,
    direction: String,
    #[serde(default)]
    health: Option<i32>,
    #[serde(default)]
    heat: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjectile {
    id: String,
    position: Coordinates,
    direction: String,
    #[serde(default, alias = "velocity")]
    speed: Option<u32>,
    #[serde(default)]
    mass: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T: Serialize> {
    event_type: &'a str,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthData<'a> {
    token: &'a str,
    bot_name: &'a str,
}

#[derive(Serialize)]
struct EmptyData {}

/// Decodes one inbound text frame.
pub fn decode_event(frame: &str) -> Result<InboundEvent, WireError> {
    if frame.trim().is_empty() {
        return Err(WireError::EmptyFrame);
    }

    let envelope: RawEnvelope = serde_json::from_str(frame).map_err(WireError::Malformed)?;
    match envelope.event_type.to_ascii_lowercase().as_str() {
        "authack" => Ok(InboundEvent::AuthAck),
        "startgame" => {
            let start: RawStartGame = payload(envelope.data, "startGame")?;
            Ok(InboundEvent::StartGame(TeamAiContext::new(
                start.tick_length,
                start.turn_rate,
            )))
        }
        "gametick" => decode_tick(envelope.data)
            .map(InboundEvent::GameTick)
            .map_err(|cause| WireError::InvalidTick(Box::new(cause))),
        "endgame" => Ok(InboundEvent::EndGame),
        _ => Err(WireError::UnknownEvent(envelope.event_type)),
    }
}

/// Encodes one outbound event as a text frame.
pub fn encode_event(event: &OutboundEvent) -> Result<String, WireError> {
    let event_type = event.name();
    let encoded = match event {
        OutboundEvent::Auth { token, bot_name } => serde_json::to_string(&Envelope {
            event_type,
            data: AuthData { token, bot_name },
        }),
        OutboundEvent::GameAction(command) => serde_json::to_string(&Envelope {
            event_type,
            data: command,
        }),
        OutboundEvent::StartAck | OutboundEvent::EndAck => serde_json::to_string(&Envelope {
            event_type,
            data: EmptyData {},
        }),
    };
    encoded.map_err(WireError::Encode)
}

fn decode_tick(data: Value) -> Result<GameState, WireError> {
    let raw: RawGameState = payload(data, "gameTick")?;
    let game_map = raw
        .game_map
        .into_iter()
        .map(|row| row.into_iter().map(decode_cell).collect())
        .collect::<Result<Vec<Vec<Cell>>, WireError>>()?;
    Ok(GameState {
        turn_number: raw.turn_number,
        game_map,
    })
}

fn decode_cell(raw: RawCell) -> Result<Cell, WireError> {
    match raw.kind.to_ascii_lowercase().as_str() {
        "empty" => Ok(Cell::Empty),
        "outofvision" => Ok(Cell::OutOfVision),
        "audiosignature" => Ok(Cell::AudioSignature),
        "hitbox" => Ok(Cell::HitBox(payload::<HitBoxData>(raw.data, "hitBox")?)),
        "ship" => {
            let ship: RawShip = payload(raw.data, "ship")?;
            Ok(Cell::Ship(ShipData {
                id: ship.id,
                position: ship.position,
                direction: direction(&ship.direction)?,
                health: ship.health,
                heat: ship.heat,
            }))
        }
        "projectile" => {
            let projectile: RawProjectile = payload(raw.data, "projectile")?;
            Ok(Cell::Projectile(ProjectileData {
                id: projectile.id,
                position: projectile.position,
                direction: direction(&projectile.direction)?,
                speed: projectile.speed,
                mass: projectile.mass,
            }))
        }
        _ => Err(WireError::UnknownCellType(raw.kind)),
    }
}

fn payload<T: for<'de> Deserialize<'de>>(data: Value, context: &'static str) -> Result<T, WireError> {
    serde_json::from_value(data).map_err(|source| WireError::InvalidPayload { context, source })
}

fn direction(raw: &str) -> Result<CompassDirection, WireError> {
    raw.parse()
        .map_err(|_| WireError::UnknownDirection(raw.to_owned()))
}
