use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use serde_json::{json, Value};
use skirmish_core::{Command, DecisionError, Decider, GameState, TeamAiContext};
use skirmish_protocol::{ClientError, ClientState, Session, SessionConfig, Transport, TransportError};

#[derive(Default)]
struct MemoryTransport {
    inbound: VecDeque<String>,
    sent: Vec<String>,
}

impl MemoryTransport {
    fn with_frames(frames: impl IntoIterator<Item = String>) -> Self {
        Self {
            inbound: frames.into_iter().collect(),
            sent: Vec::new(),
        }
    }

    fn sent_json(&self) -> Vec<Value> {
        self.sent
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("sent frames are json"))
            .collect()
    }
}

impl Transport for MemoryTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sent.push(frame);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.pop_front())
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Answer(Command),
    Sleep(Duration, Command),
    Fail,
    Panic,
}

struct StubDecider {
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl Decider for StubDecider {
    fn decide(
        &mut self,
        _state: &GameState,
        _context: Option<&TeamAiContext>,
    ) -> Result<Command, DecisionError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Answer(command) => Ok(command),
            Behaviour::Sleep(pause, command) => {
                thread::sleep(pause);
                Ok(command)
            }
            Behaviour::Fail => Err(DecisionError::MissingOwnShip),
            Behaviour::Panic => panic!("decider exploded"),
        }
    }

    fn reset(&mut self) {
        let _ = self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    calls: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    built: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            resets: Arc::new(AtomicUsize::new(0)),
            built: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn session(
        &self,
        transport: MemoryTransport,
        behaviour: Behaviour,
    ) -> Session<MemoryTransport, StubDecider, impl FnMut() -> StubDecider> {
        let calls = Arc::clone(&self.calls);
        let resets = Arc::clone(&self.resets);
        let built = Arc::clone(&self.built);
        Session::new(
            transport,
            SessionConfig {
                token: "secret".to_owned(),
                bot_name: "Rusty".to_owned(),
                safety_margin: Duration::ZERO,
            },
            move || {
                let _ = built.fetch_add(1, Ordering::SeqCst);
                StubDecider {
                    behaviour,
                    calls: Arc::clone(&calls),
                    resets: Arc::clone(&resets),
                }
            },
        )
    }
}

fn frame(event_type: &str, data: Value) -> String {
    json!({ "eventType": event_type, "data": data }).to_string()
}

fn start(tick_length: u64) -> String {
    frame(
        "startGame",
        json!({ "tickLength": tick_length, "turnRate": 2 }),
    )
}

fn tick(turn: u64) -> String {
    frame(
        "gameTick",
        json!({ "turnNumber": turn, "gameMap": [[{ "type": "empty", "data": {} }]] }),
    )
}

fn fallback_action() -> Value {
    json!({
        "eventType": "gameAction",
        "data": { "action": "move", "payload": { "distance": 0 } },
    })
}

async fn authenticate(session: &mut Session<MemoryTransport, StubDecider, impl FnMut() -> StubDecider>) {
    session
        .handle_frame(&frame("authAck", json!({})))
        .await
        .expect("auth ack handled");
}

#[tokio::test]
async fn connect_sends_credentials() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::FALLBACK),
    );

    session.connect().await.expect("auth sent");

    assert_eq!(session.state(), ClientState::Unauthorized);
    assert_eq!(
        session.transport().sent_json(),
        vec![json!({
            "eventType": "auth",
            "data": { "token": "secret", "botName": "Rusty" },
        })]
    );
}

#[tokio::test]
async fn full_match_lifecycle_is_acknowledged() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::Shoot { speed: 2, mass: 3 }),
    );

    authenticate(&mut session).await;
    assert_eq!(session.state(), ClientState::Idle);

    session.handle_frame(&start(1000)).await.expect("start handled");
    assert_eq!(session.state(), ClientState::InGame);
    assert_eq!(session.context(), Some(&TeamAiContext::new(1000, 2)));
    assert_eq!(session.tick_deadline(), Some(Duration::from_millis(500)));

    session.handle_frame(&tick(1)).await.expect("tick handled");
    session.handle_frame(&frame("endGame", json!({}))).await.expect("end handled");
    assert_eq!(session.state(), ClientState::Idle);
    assert_eq!(session.context(), None);

    let sent = session.transport().sent_json();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], json!({ "eventType": "startAck", "data": {} }));
    assert_eq!(
        sent[1],
        json!({
            "eventType": "gameAction",
            "data": { "action": "shoot", "payload": { "speed": 2, "mass": 3 } },
        })
    );
    assert_eq!(sent[2], json!({ "eventType": "endAck", "data": {} }));
    assert_eq!(harness.resets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn out_of_state_events_are_ignored() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::FALLBACK),
    );

    session.handle_frame(&start(1000)).await.expect("start handled");
    assert_eq!(session.state(), ClientState::Unauthorized);

    authenticate(&mut session).await;
    session.handle_frame(&frame("endGame", json!({}))).await.expect("end handled");
    assert_eq!(session.state(), ClientState::Idle);

    authenticate(&mut session).await;
    assert_eq!(session.state(), ClientState::Idle);
    assert!(session.transport().sent.is_empty());
}

#[tokio::test]
async fn malformed_frames_are_dropped() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::FALLBACK),
    );

    for junk in ["", "not json", r#"{"eventType": "surrender", "data": {}}"#] {
        session.handle_frame(junk).await.expect("dropped quietly");
    }

    assert!(session.transport().sent.is_empty());
    assert_eq!(session.state(), ClientState::Unauthorized);
}

#[tokio::test]
async fn undecodable_tick_is_answered_with_fallback() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::Move { distance: 2 }),
    );
    authenticate(&mut session).await;
    session.handle_frame(&start(1000)).await.expect("start handled");

    let asteroid = frame(
        "gameTick",
        json!({ "turnNumber": 5, "gameMap": [[{ "type": "asteroid", "data": {} }]] }),
    );
    session.handle_frame(&asteroid).await.expect("tick handled");

    let actions: Vec<_> = session
        .transport()
        .sent_json()
        .into_iter()
        .filter(|frame| frame["eventType"] == "gameAction")
        .collect();
    assert_eq!(actions, vec![fallback_action()]);
    assert_eq!(harness.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ship_headings_with_full_names_reach_the_decider() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::Move { distance: 2 }),
    );

    let ship = json!({
        "type": "ship",
        "data": { "id": "ship:secret:Rusty", "position": { "x": 0, "y": 0 }, "direction": "northEast" },
    });
    let tick = frame("gameTick", json!({ "turnNumber": 1, "gameMap": [[ship]] }));
    session.handle_frame(&tick).await.expect("tick handled");

    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.transport().sent_json(),
        vec![json!({
            "eventType": "gameAction",
            "data": { "action": "move", "payload": { "distance": 2 } },
        })]
    );
}

#[tokio::test]
async fn ticks_without_context_are_answered_synchronously() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Answer(Command::Move { distance: 2 }),
    );

    assert_eq!(session.tick_deadline(), None);
    session.handle_frame(&tick(4)).await.expect("tick handled");

    assert_eq!(
        session.transport().sent_json(),
        vec![json!({
            "eventType": "gameAction",
            "data": { "action": "move", "payload": { "distance": 2 } },
        })]
    );
}

#[tokio::test]
async fn slow_decider_is_replaced_by_fallback_within_deadline() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Sleep(Duration::from_millis(50), Command::Move { distance: 3 }),
    );
    authenticate(&mut session).await;
    session.handle_frame(&start(1)).await.expect("start handled");
    assert_eq!(session.tick_deadline(), Some(Duration::ZERO));

    let began = Instant::now();
    session.handle_frame(&tick(1)).await.expect("tick handled");
    let elapsed = began.elapsed();

    let sent = session.transport().sent_json();
    let actions: Vec<_> = sent
        .iter()
        .filter(|frame| frame["eventType"] == "gameAction")
        .collect();
    assert_eq!(actions, vec![&fallback_action()]);
    assert!(
        elapsed < Duration::from_millis(50),
        "waited {elapsed:?} for a decision past its deadline"
    );
}

#[tokio::test]
async fn busy_decider_is_not_shared_and_is_reclaimed_later() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Sleep(Duration::from_millis(30), Command::Move { distance: 1 }),
    );
    authenticate(&mut session).await;
    session.handle_frame(&start(1)).await.expect("start handled");

    session.handle_frame(&tick(1)).await.expect("first tick");
    session.handle_frame(&tick(2)).await.expect("second tick");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);

    session.handle_frame(&tick(3)).await.expect("third tick");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.built.load(Ordering::SeqCst), 1);

    let actions: Vec<_> = session
        .transport()
        .sent_json()
        .into_iter()
        .filter(|frame| frame["eventType"] == "gameAction")
        .collect();
    assert_eq!(actions, vec![fallback_action(); 3]);
}

#[tokio::test]
async fn game_end_replaces_a_busy_decider() {
    let harness = Harness::new();
    let mut session = harness.session(
        MemoryTransport::default(),
        Behaviour::Sleep(Duration::from_millis(200), Command::Move { distance: 1 }),
    );
    authenticate(&mut session).await;
    session.handle_frame(&start(1)).await.expect("start handled");
    session.handle_frame(&tick(1)).await.expect("tick handled");

    session.handle_frame(&frame("endGame", json!({}))).await.expect("end handled");

    assert_eq!(harness.built.load(Ordering::SeqCst), 2);
    assert_eq!(session.state(), ClientState::Idle);
}

#[tokio::test]
async fn failing_and_panicking_deciders_yield_fallback() {
    for behaviour in [Behaviour::Fail, Behaviour::Panic] {
        let harness = Harness::new();
        let mut session = harness.session(MemoryTransport::default(), behaviour);
        authenticate(&mut session).await;
        session.handle_frame(&start(2000)).await.expect("start handled");

        session.handle_frame(&tick(1)).await.expect("tick handled");
        session.handle_frame(&tick(2)).await.expect("tick handled");

        let actions: Vec<_> = session
            .transport()
            .sent_json()
            .into_iter()
            .filter(|frame| frame["eventType"] == "gameAction")
            .collect();
        assert_eq!(actions, vec![fallback_action(), fallback_action()]);
        assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
    }
}

#[tokio::test]
async fn run_serves_frames_until_connection_closes() {
    let harness = Harness::new();
    let transport = MemoryTransport::with_frames([
        frame("authAck", json!({})),
        start(0),
        tick(1),
        frame("endGame", json!({})),
    ]);
    let mut session = harness.session(transport, Behaviour::Answer(Command::Move { distance: 1 }));

    let outcome = session.run().await;

    assert!(matches!(outcome, Err(ClientError::ConnectionClosed)));
    let event_types: Vec<_> = session
        .transport()
        .sent_json()
        .iter()
        .map(|frame| frame["eventType"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(event_types, ["auth", "startAck", "gameAction", "endAck"]);
}
