//! Lockstep netplay contract
//!
//! The server owns the canonical input stream. Each tick it waits for the
//! client's input, steps, and publishes `(tick, hash, inputs)`. The client
//! sends its input for a tick, waits for the server's record of that tick,
//! steps with the canonical inputs and checks its hash against the server's.
//!
//! Messages are JSON through a byte [`Transport`]; the session never blocks.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::controller::RemoteController;
use crate::error::NetError;
use crate::sim::{Action, GameState, NetMode};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetMessage {
    /// Client to server: the client's action for a tick
    ClientInput { tick: u64, action: Action },
    /// Server to client: canonical inputs for a tick and the resulting hash
    ServerTick {
        tick: u64,
        hash: u32,
        inputs: [Action; 2],
    },
    /// Server to client: full state to continue from after a desync
    Resync { state: Box<GameState> },
}

impl NetMessage {
    fn kind(&self) -> &'static str {
        match self {
            NetMessage::ClientInput { .. } => "client-input",
            NetMessage::ServerTick { .. } => "server-tick",
            NetMessage::Resync { .. } => "resync",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    message: NetMessage,
}

pub fn encode(message: &NetMessage) -> Result<Vec<u8>, NetError> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a> {
        version: u32,
        message: &'a NetMessage,
    }
    serde_json::to_vec(&EnvelopeRef {
        version: PROTOCOL_VERSION,
        message,
    })
    .map_err(NetError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<NetMessage, NetError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(NetError::Decode)?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(NetError::Version {
            expected: PROTOCOL_VERSION,
            got: envelope.version,
        });
    }
    Ok(envelope.message)
}

/// Non-blocking byte pipe to the peer
pub trait Transport {
    fn send(&mut self, bytes: Vec<u8>) -> Result<(), NetError>;
    /// Next queued message, `None` if nothing has arrived yet
    fn recv(&mut self) -> Result<Option<Vec<u8>>, NetError>;
}

/// In-process transport over `std::sync::mpsc`
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, bytes: Vec<u8>) -> Result<(), NetError> {
        self.tx.send(bytes).map_err(|_| NetError::Disconnected)
    }

    fn recv(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        match self.rx.try_recv() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(NetError::Disconnected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetRole {
    Server,
    Client,
}

impl NetRole {
    /// Player slot driven by this peer's own controller
    pub fn local_player(self) -> usize {
        match self {
            NetRole::Server => 0,
            NetRole::Client => 1,
        }
    }

    pub fn remote_player(self) -> usize {
        1 - self.local_player()
    }

    pub fn mode(self) -> NetMode {
        match self {
            NetRole::Server => NetMode::Server,
            NetRole::Client => NetMode::Client,
        }
    }

    fn name(self) -> &'static str {
        match self {
            NetRole::Server => "server",
            NetRole::Client => "client",
        }
    }
}

/// One peer's side of the lockstep link
pub struct NetSession {
    role: NetRole,
    transport: Box<dyn Transport>,
    timeout: Duration,
    waiting_since: Option<Instant>,
    /// Client: server hashes and canonical inputs by tick
    expected: BTreeMap<u64, (u32, [Action; 2])>,
    /// Client: tick whose local input has already gone out
    sent: Option<(u64, Action)>,
    resync: Option<Box<GameState>>,
}

impl NetSession {
    pub fn new(role: NetRole, transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            role,
            transport,
            timeout,
            waiting_since: None,
            expected: BTreeMap::new(),
            sent: None,
            resync: None,
        }
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    fn send(&mut self, message: &NetMessage) -> Result<(), NetError> {
        let bytes = encode(message)?;
        self.transport.send(bytes)
    }

    /// Drain the transport, routing the peer's inputs into `remote`
    pub fn pump(&mut self, remote: &mut RemoteController) -> Result<(), NetError> {
        while let Some(bytes) = self.transport.recv()? {
            let message = decode(&bytes)?;
            match (self.role, message) {
                (NetRole::Server, NetMessage::ClientInput { tick, action }) => {
                    remote.push(tick, action);
                }
                (NetRole::Client, NetMessage::ServerTick { tick, hash, inputs }) => {
                    remote.push(tick, inputs[self.role.remote_player()]);
                    self.expected.insert(tick, (hash, inputs));
                }
                (NetRole::Client, NetMessage::Resync { state }) => {
                    log::info!("resync snapshot received for tick {}", state.tick);
                    state.validate()?;
                    self.resync = Some(state);
                }
                (role, message) => {
                    return Err(NetError::Unexpected {
                        message: message.kind(),
                        role: role.name(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Client: local action for `tick`, if it was already sent
    pub fn sent_input(&self, tick: u64) -> Option<Action> {
        self.sent.filter(|(t, _)| *t == tick).map(|(_, a)| a)
    }

    /// Client: send the local action for `tick`
    pub fn send_input(&mut self, tick: u64, action: Action) -> Result<(), NetError> {
        self.send(&NetMessage::ClientInput { tick, action })?;
        self.sent = Some((tick, action));
        Ok(())
    }

    /// Client: canonical inputs the server recorded for `tick`
    pub fn canonical_inputs(&self, tick: u64) -> Option<[Action; 2]> {
        self.expected.get(&tick).map(|(_, inputs)| *inputs)
    }

    /// Server: publish the outcome of `tick`
    pub fn publish(&mut self, tick: u64, hash: u32, inputs: [Action; 2]) -> Result<(), NetError> {
        self.send(&NetMessage::ServerTick { tick, hash, inputs })
    }

    /// Server: send a full snapshot for the client to continue from
    pub fn send_resync(&mut self, state: &GameState) -> Result<(), NetError> {
        self.send(&NetMessage::Resync {
            state: Box::new(state.clone()),
        })
    }

    pub fn take_resync(&mut self) -> Option<Box<GameState>> {
        self.resync.take()
    }

    /// Client: compare the local hash after `tick` with the server's
    pub fn verify(&mut self, tick: u64, local: u32) -> Result<(), NetError> {
        self.expected = self.expected.split_off(&tick);
        let Some((remote, _)) = self.expected.remove(&tick) else {
            return Ok(());
        };
        if remote != local {
            return Err(NetError::Desync { tick, local, remote });
        }
        Ok(())
    }

    /// Note that `tick` is blocked on the peer; errors once the timeout passes
    pub fn wait(&mut self, tick: u64, now: Instant) -> Result<(), NetError> {
        let since = *self.waiting_since.get_or_insert(now);
        let waited = now.saturating_duration_since(since);
        if waited > self.timeout {
            return Err(NetError::ConnectionLost {
                tick,
                waited_ms: waited.as_millis(),
            });
        }
        Ok(())
    }

    /// Peer data arrived; stop the wait clock
    pub fn arrived(&mut self) {
        self.waiting_since = None;
    }

    /// Forget per-tick bookkeeping older than `tick` (after a resync)
    pub fn rebase(&mut self, tick: u64) {
        self.expected = self.expected.split_off(&tick);
        self.sent = None;
        self.waiting_since = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::SnapshotError;
    use crate::sim::AssetTables;

    fn session_pair() -> (NetSession, NetSession) {
        let (a, b) = ChannelTransport::pair();
        (
            NetSession::new(NetRole::Server, Box::new(a), DEFAULT_TIMEOUT),
            NetSession::new(NetRole::Client, Box::new(b), DEFAULT_TIMEOUT),
        )
    }

    #[test]
    fn test_encode_decode_message() {
        let msg = NetMessage::ServerTick {
            tick: 9,
            hash: 0xdead_beef,
            inputs: [Action::PUNCH, Action::LEFT | Action::UP],
        };
        let bytes = encode(&msg).unwrap();
        match decode(&bytes).unwrap() {
            NetMessage::ServerTick { tick, hash, inputs } => {
                assert_eq!(tick, 9);
                assert_eq!(hash, 0xdead_beef);
                assert_eq!(inputs, [Action::PUNCH, Action::LEFT | Action::UP]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let bytes = br#"{"version":99,"message":{"ClientInput":{"tick":0,"action":"PUNCH"}}}"#;
        assert!(matches!(
            decode(bytes),
            Err(NetError::Version { expected: 1, got: 99 })
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(decode(b"not json"), Err(NetError::Decode(_))));
    }

    #[test]
    fn test_client_input_reaches_server() {
        let (mut server, mut client) = session_pair();
        client.send_input(4, Action::KICK).unwrap();
        assert_eq!(client.sent_input(4), Some(Action::KICK));
        assert_eq!(client.sent_input(5), None);

        let mut remote = RemoteController::new();
        server.pump(&mut remote).unwrap();
        assert!(remote.has_input(4));
        assert_eq!(remote.tick(4), Action::KICK);
    }

    #[test]
    fn test_server_tick_verified_by_client() {
        let (mut server, mut client) = session_pair();
        server.publish(0, 111, [Action::LEFT, Action::RIGHT]).unwrap();
        server.publish(1, 222, [Action::empty(), Action::empty()]).unwrap();

        let mut remote = RemoteController::new();
        client.pump(&mut remote).unwrap();
        assert_eq!(remote.tick(0), Action::LEFT);
        assert_eq!(client.canonical_inputs(0), Some([Action::LEFT, Action::RIGHT]));
        assert!(client.verify(0, 111).is_ok());
        assert!(matches!(
            client.verify(1, 223),
            Err(NetError::Desync {
                tick: 1,
                local: 223,
                remote: 222
            })
        ));
    }

    #[test]
    fn test_wrong_direction_message_rejected() {
        // A server talking to another server
        let (a, b) = ChannelTransport::pair();
        let mut s1 = NetSession::new(NetRole::Server, Box::new(a), DEFAULT_TIMEOUT);
        let mut s2 = NetSession::new(NetRole::Server, Box::new(b), DEFAULT_TIMEOUT);
        s1.publish(0, 1, [Action::empty(); 2]).unwrap();
        let mut remote = RemoteController::new();
        assert!(matches!(s2.pump(&mut remote), Err(NetError::Unexpected { .. })));
    }

    #[test]
    fn test_resync_snapshot_reaches_client() {
        let (mut server, mut client) = session_pair();
        let state = GameState::new(5, [0, 1], Arc::new(AssetTables::builtin()));
        server.send_resync(&state).unwrap();
        client.pump(&mut RemoteController::new()).unwrap();
        assert_eq!(client.take_resync().map(|s| s.next_id()), Some(3));
        assert!(client.take_resync().is_none());
    }

    #[test]
    fn test_bad_resync_snapshot_rejected() {
        let (mut server, mut client) = session_pair();
        let mut state = GameState::new(5, [0, 1], Arc::new(AssetTables::builtin()));
        let id = state.players[1].har.unwrap();
        state.object_mut(id).unwrap().har_mut().unwrap().player = 7;
        server.send_resync(&state).unwrap();

        let result = client.pump(&mut RemoteController::new());
        assert!(matches!(
            result,
            Err(NetError::BadSnapshot(SnapshotError::NoSuchPlayer { player: 7, .. }))
        ));
        assert!(client.take_resync().is_none());
    }

    #[test]
    fn test_wait_times_out() {
        let (a, _b) = ChannelTransport::pair();
        let mut session = NetSession::new(NetRole::Client, Box::new(a), Duration::from_millis(100));
        let start = Instant::now();
        assert!(session.wait(3, start).is_ok());
        assert!(session.wait(3, start + Duration::from_millis(50)).is_ok());
        assert!(matches!(
            session.wait(3, start + Duration::from_millis(150)),
            Err(NetError::ConnectionLost { tick: 3, .. })
        ));
        session.arrived();
        assert!(session.wait(4, start + Duration::from_millis(150)).is_ok());
    }

    #[test]
    fn test_dropped_peer_disconnects() {
        let (a, b) = ChannelTransport::pair();
        let mut session = NetSession::new(NetRole::Server, Box::new(a), DEFAULT_TIMEOUT);
        drop(b);
        let mut remote = RemoteController::new();
        assert!(matches!(session.pump(&mut remote), Err(NetError::Disconnected)));
    }
}
