use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::session::{DisconnectReason, Phase, SessionAction, SessionEvent, SessionMachine};
use super::socket::{DatagramSocket, UdpDatagramSocket};
use crate::core::{Error, ProtocolVersion, Result, SessionConfig, MAX_PACKET_SIZE};
use crate::profile::{DeviceProfile, ProfileBuilder};
use crate::protocol::packet::HEADER_LEN;
use crate::protocol::{Command, CommandCodec, RawCommand};
use crate::state::{ChangedPaths, DeviceState, StateReader};

/// Largest datagram the 11-bit length field can describe
const RECV_BUFFER_LEN: usize = 0x800;

/// Capacity of the outbound request queue
const REQUEST_QUEUE: usize = 64;

/// One applied command and the paths it changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    /// Record tag of the command, e.g. `PrgI`
    pub command: String,
    pub paths: ChangedPaths,
}

type ChangeListener = Arc<dyn Fn(&StateChange) + Send + Sync>;
type DisconnectListener = Box<dyn FnOnce(&DisconnectReason) + Send>;

#[derive(Default)]
struct DisconnectSlot {
    reason: Option<DisconnectReason>,
    listeners: Vec<DisconnectListener>,
}

/// State shared between the session handle and its driver task
struct Shared {
    state: StateReader,
    profile: OnceLock<Arc<DeviceProfile>>,
    version: AtomicU32,
    events: broadcast::Sender<StateChange>,
    listeners: Mutex<Vec<ChangeListener>>,
    disconnect: Mutex<DisconnectSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn notify(&self, change: StateChange) {
        let listeners: Vec<ChangeListener> = lock(&self.listeners).clone();
        for listener in &listeners {
            listener(&change);
        }
        // No subscribers is fine
        let _ = self.events.send(change);
    }

    fn disconnected(&self, reason: DisconnectReason) {
        let listeners = {
            let mut slot = lock(&self.disconnect);
            if slot.reason.is_some() {
                return;
            }
            slot.reason = Some(reason.clone());
            std::mem::take(&mut slot.listeners)
        };
        for listener in listeners {
            listener(&reason);
        }
    }
}

enum Request {
    Send {
        payload: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Resolves once the device acknowledges the packet carrying a send, or
/// fails if the session ends first.
#[derive(Debug)]
pub struct PendingAck {
    rx: oneshot::Receiver<Result<()>>,
}

impl Future for PendingAck {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(Error::Disconnected)))
    }
}

/// Handle on a live switcher session.
///
/// A background task owns the socket, the transport state machine and the
/// single writer of the state tree. Dropping the handle closes the session.
pub struct Session {
    shared: Arc<Shared>,
    requests: mpsc::Sender<Request>,
    phase: watch::Receiver<Phase>,
}

impl Session {
    /// Connects to a device over UDP and waits for the handshake to finish
    pub async fn connect(addr: SocketAddr, config: SessionConfig) -> Result<Session> {
        config.validate()?;
        let socket = UdpDatagramSocket::connect(config.bind_addr, addr, config.recv_buffer_size).await?;
        info!(device = %addr, "connecting to switcher");
        Self::connect_with_socket(Arc::new(socket), config).await
    }

    /// Runs a session over any datagram socket
    pub async fn connect_with_socket(socket: Arc<dyn DatagramSocket>, config: SessionConfig) -> Result<Session> {
        config.validate()?;
        let machine = SessionMachine::new(config.clone());
        let session = Self::start(socket, config, machine)?;
        session.wait_live().await?;
        Ok(session)
    }

    fn start(socket: Arc<dyn DatagramSocket>, config: SessionConfig, mut machine: SessionMachine) -> Result<Session> {
        let (events, _) = broadcast::channel(config.event_capacity);
        let shared = Arc::new(Shared {
            state: StateReader::new(),
            profile: OnceLock::new(),
            version: AtomicU32::new(ProtocolVersion::default().0),
            events,
            listeners: Mutex::new(Vec::new()),
            disconnect: Mutex::new(DisconnectSlot::default()),
        });
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (phase_tx, phase_rx) = watch::channel(machine.phase());

        machine.connect(Instant::now())?;
        let driver = Driver {
            shared: shared.clone(),
            socket,
            machine,
            requests: requests_rx,
            phase: phase_tx,
            codec: CommandCodec::default(),
            profile: Some(ProfileBuilder::new()),
            pending: HashMap::new(),
        };
        tokio::spawn(driver.run());

        Ok(Session {
            shared,
            requests: requests_tx,
            phase: phase_rx,
        })
    }

    async fn wait_live(&self) -> Result<()> {
        let mut phase = self.phase.clone();
        let reached = phase
            .wait_for(|p| matches!(p, Phase::Live | Phase::Disconnected))
            .await
            .map(|p| *p);
        match reached {
            Ok(Phase::Live) => Ok(()),
            _ => Err(self.disconnect_error()),
        }
    }

    fn disconnect_error(&self) -> Error {
        lock(&self.shared.disconnect)
            .reason
            .as_ref()
            .map_or(Error::Disconnected, DisconnectReason::to_error)
    }

    /// Sends one command
    pub async fn send(&self, command: impl Into<Command>) -> Result<PendingAck> {
        self.send_all(&[command.into()]).await
    }

    /// Sends several commands in one packet. Encoding problems are reported
    /// here; the returned future reports delivery.
    pub async fn send_all(&self, commands: &[Command]) -> Result<PendingAck> {
        if self.phase() != Phase::Live {
            return Err(self.disconnect_error_or_not_live());
        }
        let payload = CommandCodec::new(self.protocol_version()).encode_payload(commands)?;
        if HEADER_LEN + payload.len() > MAX_PACKET_SIZE {
            return Err(Error::encoding(format!(
                "{} bytes of commands do not fit in one packet",
                payload.len()
            )));
        }

        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Send { payload, reply })
            .await
            .map_err(|_| Error::Disconnected)?;
        Ok(PendingAck { rx })
    }

    fn disconnect_error_or_not_live(&self) -> Error {
        match self.phase() {
            Phase::Disconnecting | Phase::Disconnected => Error::Disconnected,
            phase => Error::transport(format!("session is {:?}, not live", phase)),
        }
    }

    /// Registers a callback run on the receive path for every applied
    /// command that changed something. It must return quickly.
    pub fn on_state_changed(&self, callback: impl Fn(&StateChange) + Send + Sync + 'static) {
        lock(&self.shared.listeners).push(Arc::new(callback));
    }

    /// Registers a callback run once when the session ends. Runs
    /// immediately if it already has.
    pub fn on_disconnected(&self, callback: impl FnOnce(&DisconnectReason) + Send + 'static) {
        let reason = {
            let mut slot = lock(&self.shared.disconnect);
            match &slot.reason {
                Some(reason) => reason.clone(),
                None => {
                    slot.listeners.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&reason);
    }

    /// Subscribes to state changes as a channel
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.shared.events.subscribe()
    }

    /// Copy of the current state tree
    pub fn state(&self) -> DeviceState {
        self.shared.state.snapshot()
    }

    /// Shared reader for the state tree
    pub fn state_reader(&self) -> StateReader {
        self.shared.state.clone()
    }

    /// Profile derived from the handshake; set before `connect` returns
    pub fn profile(&self) -> Option<Arc<DeviceProfile>> {
        self.shared.profile.get().cloned()
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion(self.shared.version.load(Ordering::Acquire))
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Why the session ended, once it has
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        lock(&self.shared.disconnect).reason.clone()
    }

    /// Closes the session and waits for the driver to finish. Safe to call
    /// more than once.
    pub async fn disconnect(&self) {
        let _ = self.requests.send(Request::Close).await;
        let mut phase = self.phase.clone();
        let _ = phase.wait_for(|p| *p == Phase::Disconnected).await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.requests.try_send(Request::Close);
    }
}

/// Background task owning one session's I/O
struct Driver {
    shared: Arc<Shared>,
    socket: Arc<dyn DatagramSocket>,
    machine: SessionMachine,
    requests: mpsc::Receiver<Request>,
    phase: watch::Sender<Phase>,
    codec: CommandCodec,
    profile: Option<ProfileBuilder>,
    pending: HashMap<u16, oneshot::Sender<Result<()>>>,
}

impl Driver {
    async fn run(mut self) {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            self.flush().await;
            if self.machine.phase() == Phase::Disconnected {
                break;
            }

            let deadline = self.machine.poll_deadline().map(tokio::time::Instant::from_std);
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Send { payload, reply }) => {
                        match self.machine.send(payload, Instant::now()) {
                            Ok(id) => {
                                self.pending.insert(id, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Some(Request::Close) | None => self.machine.close(),
                },
                received = self.socket.recv(&mut buf) => match received {
                    Ok(n) => self.machine.receive(&buf[..n], Instant::now()),
                    Err(e) if self.is_transient(&e) => {
                        debug!(error = %e, "device not reachable yet, hello will be resent");
                    }
                    Err(e) => {
                        let _ = self.machine.handle(SessionEvent::SocketFailed(e.to_string()), Instant::now());
                    }
                },
                _ = timer => self.machine.tick(Instant::now()),
            }
        }

        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(Error::Disconnected));
        }
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            if let Request::Send { reply, .. } = request {
                let _ = reply.send(Err(Error::Disconnected));
            }
        }
        debug!("session driver stopped");
    }

    /// `ConnectionRefused` (ICMP port unreachable) before the device has
    /// accepted the hello; the hello timer and handshake deadline cover it.
    fn is_transient(&self, e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::ConnectionRefused && self.machine.phase() == Phase::Connecting
    }

    /// Carries out everything the machine asked for
    async fn flush(&mut self) {
        while let Some(action) = self.machine.poll_action() {
            match action {
                SessionAction::Transmit(datagram) => {
                    match self.socket.send(&datagram).await {
                        Ok(()) => {}
                        Err(e) if self.is_transient(&e) => {
                            debug!(error = %e, "device not reachable yet, hello will be resent");
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to send datagram");
                            let _ = self.machine.handle(SessionEvent::SocketFailed(e.to_string()), Instant::now());
                        }
                    }
                }
                SessionAction::Deliver(records) => self.deliver(&records),
                SessionAction::Acknowledged(id) => {
                    if let Some(reply) = self.pending.remove(&id) {
                        let _ = reply.send(Ok(()));
                    }
                }
                SessionAction::SendFailed(id) => {
                    if let Some(reply) = self.pending.remove(&id) {
                        let _ = reply.send(Err(Error::Disconnected));
                    }
                }
                SessionAction::PhaseChanged(phase) => {
                    self.phase.send_replace(phase);
                }
                SessionAction::Disconnected(reason) => {
                    info!(%reason, "session ended");
                    self.shared.disconnected(reason);
                }
            }
        }
    }

    /// Decodes one packet's records, feeds the profile during the
    /// handshake and applies them to the tree. The session goes live only
    /// once the initialization-complete marker has been applied here.
    fn deliver(&mut self, records: &[RawCommand]) {
        let commands = match self.codec.decode_payload(records) {
            Ok(commands) => commands,
            Err(e) => {
                warn!(error = %e, records = records.len(), "dropping undecodable packet");
                return;
            }
        };
        self.shared.version.store(self.codec.version().0, Ordering::Release);

        let mut handshake_done = false;
        if let Some(builder) = self.profile.as_mut() {
            for command in &commands {
                builder.observe(command);
                if command.is_init_complete() {
                    handshake_done = true;
                    break;
                }
            }
        }
        if handshake_done {
            if let Some(builder) = self.profile.take() {
                let _ = self.shared.profile.set(builder.finish_shared());
            }
        }

        let changes: Vec<StateChange> = {
            let mut state = self.shared.state.write();
            commands
                .iter()
                .filter_map(|command| {
                    let paths = state.apply(command);
                    (!paths.is_empty()).then(|| StateChange {
                        command: command.name_str(),
                        paths,
                    })
                })
                .collect()
        };
        for change in changes {
            self.shared.notify(change);
        }
        if handshake_done {
            self.machine.init_complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::socket::MemorySocket;
    use crate::protocol::commands::{
        InitComplete, ProductId, ProgramInput, SetProgramInput, Topology, Version,
    };
    use crate::protocol::{ConnectCode, Packet, PacketFlags, PacketHeader, RecordCodec};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, task};

    const DEVICE_SESSION: u16 = 0x8001;

    struct FakeDevice {
        socket: MemorySocket,
        next_id: u16,
    }

    impl FakeDevice {
        fn new(socket: MemorySocket) -> Self {
            FakeDevice { socket, next_id: 1 }
        }

        async fn recv(&self) -> Packet {
            let mut buf = [0u8; RECV_BUFFER_LEN];
            let n = timeout(Duration::from_secs(2), self.socket.recv(&mut buf))
                .await
                .expect("device timed out")
                .unwrap();
            Packet::decode(&buf[..n]).unwrap()
        }

        /// Next packet that is not a bare acknowledgement
        async fn recv_data(&self) -> Packet {
            loop {
                let packet = self.recv().await;
                if packet.header.flags != PacketFlags::ACK_REPLY {
                    return packet;
                }
            }
        }

        async fn accept(&mut self) {
            let hello = self.recv().await;
            assert_eq!(hello.connect_code(), Some(ConnectCode::Request));
            let reply = Packet::hello(hello.header.session_id, ConnectCode::Accepted);
            self.socket.send(&reply.encode().unwrap()).await.unwrap();
            // Skip connect requests resent before our reply landed
            while !self.recv().await.header.flags.contains(PacketFlags::ACK_REPLY) {}
        }

        async fn push(&mut self, commands: &[Command]) {
            let payload = CommandCodec::new(ProtocolVersion::V8_0)
                .encode_payload(commands)
                .unwrap();
            self.push_payload(payload).await;
        }

        async fn push_records(&mut self, records: &[RawCommand]) {
            let payload = RecordCodec::new().join(records).unwrap();
            self.push_payload(payload).await;
        }

        async fn push_payload(&mut self, payload: Bytes) {
            let packet = Packet {
                header: PacketHeader {
                    flags: PacketFlags::ACK_REQUEST,
                    session_id: DEVICE_SESSION,
                    packet_id: self.next_id,
                    ..PacketHeader::default()
                },
                payload,
            };
            self.next_id += 1;
            self.socket.send(&packet.encode().unwrap()).await.unwrap();
        }

        async fn ack(&self, id: u16) {
            let packet = Packet::ack(DEVICE_SESSION, id);
            self.socket.send(&packet.encode().unwrap()).await.unwrap();
        }

        /// Accepts the hello and sends the device description, everything
        /// up to the state dump
        async fn describe(&mut self) {
            self.accept().await;
            self.push(&[
                Version { version: ProtocolVersion::V8_0 }.into(),
                ProductId {
                    name: "Test Switcher".into(),
                    model: Some(1),
                }
                .into(),
                Topology {
                    mix_effects: 2,
                    multiviewers: Some(1),
                    talkback_channels: Some(0),
                    camera_control: Some(false),
                    advanced_chroma_keyers: Some(false),
                    ..Topology::default()
                }
                .into(),
            ])
            .await;
        }

        async fn handshake(&mut self) {
            self.describe().await;
            self.push(&[
                ProgramInput { mix_effect: 0, source: 1 }.into(),
                ProgramInput { mix_effect: 1, source: 2 }.into(),
                InitComplete.into(),
            ])
            .await;
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_millis(500),
            hello_interval: Duration::from_millis(100),
            keepalive_timeout: Duration::from_secs(5),
            retransmit_interval: Duration::from_millis(50),
            max_retransmits: 3,
            ..SessionConfig::default()
        }
    }

    async fn connected() -> (Session, FakeDevice) {
        let (client, device) = MemorySocket::pair();
        let device = tokio::spawn(async move {
            let mut device = FakeDevice::new(device);
            device.handshake().await;
            device
        });
        let session = Session::connect_with_socket(Arc::new(client), config()).await.unwrap();
        (session, device.await.unwrap())
    }

    #[tokio::test]
    async fn test_connect_builds_state_and_profile() {
        let (session, _device) = connected().await;
        assert_eq!(session.phase(), Phase::Live);
        assert_eq!(session.protocol_version(), ProtocolVersion::V8_0);

        let state = session.state();
        assert_eq!(state.video.mix_effects[&1].program_input, 2);
        assert_eq!(state.info.product_name.as_deref(), Some("Test Switcher"));

        let profile = session.profile().unwrap();
        assert_eq!(profile.mix_effects, 2);
        assert!(!profile.super_source);
    }

    #[tokio::test]
    async fn test_send_resolves_on_ack() {
        let (session, device) = connected().await;
        let mut pending = session
            .send(SetProgramInput { mix_effect: 0, source: 3 })
            .await
            .unwrap();

        let packet = device.recv_data().await;
        assert!(packet.header.flags.contains(PacketFlags::ACK_REQUEST));
        {
            let mut waiting = task::spawn(&mut pending);
            assert_pending!(waiting.poll());
        }
        let records = RecordCodec::new().split(&packet.payload).unwrap();
        assert_eq!(&records[0].name, b"CPgI");

        device.ack(packet.header.packet_id).await;
        timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let (session, mut device) = connected().await;
        let mut events = session.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        session.on_state_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        device.push(&[ProgramInput { mix_effect: 1, source: 5 }.into()]).await;
        let change = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert_eq!(change.command, "PrgI");
        assert!(change.paths.contains("video.mixEffects.1.programInput"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state().video.mix_effects[&1].program_input, 5);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (session, device) = connected().await;
        let pending = session
            .send(SetProgramInput { mix_effect: 0, source: 3 })
            .await
            .unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        session.on_disconnected(move |reason| {
            assert_eq!(*reason, DisconnectReason::Closed);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.phase(), Phase::Disconnected);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(session.disconnect_reason(), Some(DisconnectReason::Closed));
        assert!(matches!(pending.await, Err(Error::Disconnected)));
        assert!(matches!(
            session.send(SetProgramInput { mix_effect: 0, source: 1 }).await,
            Err(Error::Disconnected)
        ));

        // Late registration still fires exactly once
        let late = Arc::new(AtomicUsize::new(0));
        let counter = late.clone();
        session.on_disconnected(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(late.load(Ordering::SeqCst), 1);

        // The device saw the data packet then the disconnect
        let first = device.recv_data().await;
        assert!(first.header.flags.contains(PacketFlags::ACK_REQUEST));
        let close = loop {
            let packet = device.recv_data().await;
            if packet.connect_code().is_some() {
                break packet;
            }
        };
        assert_eq!(close.connect_code(), Some(ConnectCode::Disconnect));
    }

    /// Fails the first `refusals` receives with `ConnectionRefused`
    struct RefusingSocket {
        inner: MemorySocket,
        refusals: AtomicUsize,
    }

    impl DatagramSocket for RefusingSocket {
        fn send<'a>(&'a self, datagram: &'a [u8]) -> futures::future::BoxFuture<'a, io::Result<()>> {
            self.inner.send(datagram)
        }

        fn recv<'a>(&'a self, buf: &'a mut [u8]) -> futures::future::BoxFuture<'a, io::Result<usize>> {
            let refuse = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refuse {
                Box::pin(async { Err::<usize, _>(io::Error::from(io::ErrorKind::ConnectionRefused)) })
            } else {
                self.inner.recv(buf)
            }
        }
    }

    #[tokio::test]
    async fn test_refused_before_accept_keeps_connecting() {
        let (client, device) = MemorySocket::pair();
        let socket = RefusingSocket {
            inner: client,
            refusals: AtomicUsize::new(3),
        };
        let device = tokio::spawn(async move {
            let mut device = FakeDevice::new(device);
            device.handshake().await;
            device
        });
        let session = Session::connect_with_socket(Arc::new(socket), config()).await.unwrap();
        let _device = device.await.unwrap();
        assert_eq!(session.phase(), Phase::Live);
        assert!(session.disconnect_reason().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_marker_packet_keeps_handshaking() {
        let (client, device) = MemorySocket::pair();
        let device = tokio::spawn(async move {
            let mut device = FakeDevice::new(device);
            device.describe().await;
            device
                .push_records(&[
                    RawCommand::new(*b"PrgI", vec![0]),
                    RawCommand::new(*b"InCm", vec![0, 0, 0, 0]),
                ])
                .await;
            device
        });
        let result = Session::connect_with_socket(Arc::new(client), config()).await;
        let _device = device.await.unwrap();
        assert!(matches!(result, Err(Error::HandshakeTimeout)));
    }

    #[tokio::test]
    async fn test_marker_after_undecodable_packet_goes_live() {
        let (client, device) = MemorySocket::pair();
        let device = tokio::spawn(async move {
            let mut device = FakeDevice::new(device);
            device.describe().await;
            device
                .push_records(&[
                    RawCommand::new(*b"PrgI", vec![0]),
                    RawCommand::new(*b"InCm", vec![0, 0, 0, 0]),
                ])
                .await;
            device
                .push(&[ProgramInput { mix_effect: 0, source: 4 }.into(), InitComplete.into()])
                .await;
            device
        });
        let session = Session::connect_with_socket(Arc::new(client), config()).await.unwrap();
        let _device = device.await.unwrap();
        assert_eq!(session.phase(), Phase::Live);
        let profile = session.profile().expect("profile is set once live");
        assert_eq!(profile.product_name.as_deref(), Some("Test Switcher"));
        assert_eq!(session.state().video.mix_effects[&0].program_input, 4);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (client, _device) = MemorySocket::pair();
        let result = Session::connect_with_socket(Arc::new(client), config()).await;
        assert!(matches!(result, Err(Error::HandshakeTimeout)));
    }

    #[tokio::test]
    async fn test_retransmit_exhaustion_fails_send() {
        let (session, _device) = connected().await;
        let pending = session
            .send(SetProgramInput { mix_effect: 0, source: 3 })
            .await
            .unwrap();
        let result = timeout(Duration::from_secs(2), pending).await.unwrap();
        assert!(matches!(result, Err(Error::Disconnected)));
        assert_eq!(
            session.disconnect_reason(),
            Some(DisconnectReason::RetransmitExhausted)
        );
    }
}
