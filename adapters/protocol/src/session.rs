use std::time::Duration;

use skirmish_core::{Command, Decider, GameState, TeamAiContext};
use skirmish_wire::{decode_event, encode_event, InboundEvent, OutboundEvent, WireError};

use crate::{runner::DecisionRunner, ClientError, ClientState, Transport};

/// Credentials and timing parameters of a [`Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Team token presented during authentication.
    pub token: String,
    /// Display name presented during authentication.
    pub bot_name: String,
    /// Time reserved for transport latency, taken off half the tick length.
    pub safety_margin: Duration,
}

/// One connection to the game server.
///
/// Frames are handled strictly one after another. The only concurrent work
/// is the decision of the current tick, which runs on the blocking pool
/// while the session waits on the deadline.
pub struct Session<T, D, F> {
    transport: T,
    config: SessionConfig,
    state: ClientState,
    context: Option<TeamAiContext>,
    runner: DecisionRunner<D, F>,
}

impl<T, D, F> Session<T, D, F>
where
    T: Transport,
    D: Decider,
    F: FnMut() -> D,
{
    /// Creates a session over `transport`; `factory` builds deciders.
    pub fn new(transport: T, config: SessionConfig, factory: F) -> Self {
        Self {
            transport,
            config,
            state: ClientState::Unauthorized,
            context: None,
            runner: DecisionRunner::new(factory),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Constants of the running match, if any.
    #[must_use]
    pub fn context(&self) -> Option<&TeamAiContext> {
        self.context.as_ref()
    }

    /// Borrows the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Time a tick decision may take, or `None` when decisions run unbounded.
    #[must_use]
    pub fn tick_deadline(&self) -> Option<Duration> {
        let context = self.context.as_ref()?;
        if context.tick_length_ms() == 0 {
            return None;
        }
        let half_tick = Duration::from_millis(context.tick_length_ms() / 2);
        Some(half_tick.saturating_sub(self.config.safety_margin))
    }

    /// Sends the authentication request.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        tracing::info!(bot_name = %self.config.bot_name, "authenticating");
        let auth = OutboundEvent::Auth {
            token: self.config.token.clone(),
            bot_name: self.config.bot_name.clone(),
        };
        self.send(&auth).await
    }

    /// Authenticates and serves frames until the connection fails.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.connect().await?;
        loop {
            match self.transport.receive().await? {
                Some(frame) => self.handle_frame(&frame).await?,
                None => return Err(ClientError::ConnectionClosed),
            }
        }
    }

    /// Decodes and dispatches one inbound frame.
    ///
    /// Frames that cannot be decoded are logged and dropped, except ticks
    /// with an undecodable snapshot, which are answered with the fallback.
    /// Only transport and encoding failures are returned.
    pub async fn handle_frame(&mut self, frame: &str) -> Result<(), ClientError> {
        let event = match decode_event(frame) {
            Ok(event) => event,
            Err(WireError::InvalidTick(cause)) => {
                tracing::warn!(error = %cause, "undecodable tick, sending fallback");
                return self.send(&OutboundEvent::GameAction(Command::FALLBACK)).await;
            }
            Err(error) => {
                tracing::warn!(%error, "dropping inbound frame");
                return Ok(());
            }
        };

        match event {
            InboundEvent::AuthAck => {
                if self.state == ClientState::Unauthorized {
                    self.state = ClientState::Idle;
                    tracing::info!("authorization successful");
                }
                Ok(())
            }
            InboundEvent::StartGame(context) => self.start_game(context).await,
            InboundEvent::GameTick(state) => {
                let command = self.answer_tick(state).await;
                self.send(&OutboundEvent::GameAction(command)).await
            }
            InboundEvent::EndGame => self.end_game().await,
        }
    }

    async fn start_game(&mut self, context: TeamAiContext) -> Result<(), ClientError> {
        if self.state != ClientState::Idle {
            tracing::warn!(state = ?self.state, "ignoring game start outside of idle state");
            return Ok(());
        }

        tracing::info!(
            tick_length_ms = context.tick_length_ms(),
            turn_rate = context.turn_rate(),
            "game starting"
        );
        self.context = Some(context);
        self.runner.reset();
        self.state = ClientState::InGame;
        self.send(&OutboundEvent::StartAck).await
    }

    async fn end_game(&mut self) -> Result<(), ClientError> {
        if self.state != ClientState::InGame {
            tracing::warn!(state = ?self.state, "ignoring game end outside of a game");
            return Ok(());
        }

        tracing::info!("game finished");
        self.context = None;
        self.runner.reset();
        self.state = ClientState::Idle;
        self.send(&OutboundEvent::EndAck).await
    }

    async fn answer_tick(&mut self, state: GameState) -> Command {
        tracing::debug!(turn = state.turn_number, "tick received");
        match self.tick_deadline() {
            Some(deadline) => {
                self.runner
                    .decide_within(state, self.context, deadline)
                    .await
            }
            None => {
                self.runner
                    .decide_unbounded(&state, self.context.as_ref())
                    .await
            }
        }
    }

    async fn send(&mut self, event: &OutboundEvent) -> Result<(), ClientError> {
        let frame = encode_event(event).map_err(ClientError::Encode)?;
        tracing::debug!(event = event.name(), "sending frame");
        self.transport.send(frame).await?;
        Ok(())
    }
}
