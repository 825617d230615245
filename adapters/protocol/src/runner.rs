//! Deadline-bounded execution of a [`Decider`].
//!
//! The decider moves onto the blocking pool for the duration of one tick and
//! comes back with its verdict. When the deadline passes first, the worker
//! keeps the decider until it finishes; its late verdict is discarded and the
//! decider is reclaimed on a later tick.

use std::{
    any::Any,
    mem,
    panic::{self, AssertUnwindSafe},
    time::Duration,
};

use skirmish_core::{Command, DecisionError, Decider, GameState, TeamAiContext};
use tokio::task::JoinHandle;

enum Slot<D> {
    Ready(D),
    Busy(JoinHandle<Finished<D>>),
    Vacant,
}

struct Finished<D> {
    engine: Option<D>,
    outcome: Outcome,
}

enum Outcome {
    Decided(Command),
    Failed(DecisionError),
    Panicked(String),
}

/// Owns the decider and a factory that replaces it when it is lost.
pub(crate) struct DecisionRunner<D, F> {
    slot: Slot<D>,
    factory: F,
}

impl<D, F> DecisionRunner<D, F>
where
    D: Decider,
    F: FnMut() -> D,
{
    pub(crate) fn new(mut factory: F) -> Self {
        Self {
            slot: Slot::Ready(factory()),
            factory,
        }
    }

    /// Clears per-match memory, replacing a decider that is still busy.
    pub(crate) fn reset(&mut self) {
        self.slot = match mem::replace(&mut self.slot, Slot::Vacant) {
            Slot::Ready(mut engine) => {
                engine.reset();
                Slot::Ready(engine)
            }
            Slot::Busy(_abandoned) => {
                tracing::warn!("decision engine still busy, starting over with a fresh one");
                Slot::Ready((self.factory)())
            }
            Slot::Vacant => Slot::Ready((self.factory)()),
        };
    }

    /// Runs the decider on the calling thread without any time limit.
    pub(crate) async fn decide_unbounded(
        &mut self,
        state: &GameState,
        context: Option<&TeamAiContext>,
    ) -> Command {
        let Some(engine) = self.reclaim(true).await else {
            return Command::FALLBACK;
        };
        let finished = run(engine, state, context);
        self.settle(finished)
    }

    /// Runs the decider on the blocking pool and waits at most `deadline`.
    pub(crate) async fn decide_within(
        &mut self,
        state: GameState,
        context: Option<TeamAiContext>,
        deadline: Duration,
    ) -> Command {
        let Some(engine) = self.reclaim(false).await else {
            tracing::warn!("decision engine still busy with an earlier tick, sending fallback");
            return Command::FALLBACK;
        };

        let mut handle =
            tokio::task::spawn_blocking(move || run(engine, &state, context.as_ref()));
        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(finished)) => self.settle(finished),
            Ok(Err(error)) => {
                tracing::error!(%error, "decision worker failed");
                self.slot = Slot::Ready((self.factory)());
                Command::FALLBACK
            }
            Err(_) => {
                tracing::warn!(?deadline, "decision missed the tick deadline, sending fallback");
                self.slot = Slot::Busy(handle);
                Command::FALLBACK
            }
        }
    }

    async fn reclaim(&mut self, wait: bool) -> Option<D> {
        match mem::replace(&mut self.slot, Slot::Vacant) {
            Slot::Ready(engine) => Some(engine),
            Slot::Vacant => Some((self.factory)()),
            Slot::Busy(handle) if wait || handle.is_finished() => match handle.await {
                Ok(finished) => {
                    tracing::debug!("late decision discarded, engine reclaimed");
                    Some(finished.engine.unwrap_or_else(|| (self.factory)()))
                }
                Err(error) => {
                    tracing::error!(%error, "decision worker failed");
                    Some((self.factory)())
                }
            },
            Slot::Busy(handle) => {
                self.slot = Slot::Busy(handle);
                None
            }
        }
    }

    fn settle(&mut self, finished: Finished<D>) -> Command {
        let engine = finished.engine.unwrap_or_else(|| (self.factory)());
        self.slot = Slot::Ready(engine);

        match finished.outcome {
            Outcome::Decided(command) => command,
            Outcome::Failed(error) => {
                tracing::warn!(%error, "decision failed, sending fallback");
                Command::FALLBACK
            }
            Outcome::Panicked(message) => {
                tracing::error!(%message, "decision panicked, sending fallback");
                Command::FALLBACK
            }
        }
    }
}

fn run<D: Decider>(
    mut engine: D,
    state: &GameState,
    context: Option<&TeamAiContext>,
) -> Finished<D> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.decide(state, context))) {
        Ok(Ok(command)) => Finished {
            engine: Some(engine),
            outcome: Outcome::Decided(command),
        },
        Ok(Err(error)) => Finished {
            engine: Some(engine),
            outcome: Outcome::Failed(error),
        },
        Err(payload) => Finished {
            engine: None,
            outcome: Outcome::Panicked(panic_message(payload.as_ref())),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
