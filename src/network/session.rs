//! Reliable session state machine.
//!
//! [`SessionMachine`] holds every piece of transport state (sequence
//! counters, in-flight packets, the reorder buffer, timers) but performs no
//! I/O. The owner feeds it [`SessionEvent`]s with the current instant and
//! drains [`SessionAction`]s: datagrams to transmit, records to deliver,
//! acknowledgement outcomes and phase transitions.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::core::{Error, Result, SessionConfig, PACKET_ID_SPACE};
use crate::protocol::packet::{ConnectCode, Packet, PacketFlags, PacketHeader};
use crate::protocol::record::{RawCommand, RecordCodec};
use crate::util::{is_before, next_packet_id, packet_id_distance};

/// First packet id either side uses after the hello exchange
const FIRST_PACKET_ID: u16 = 1;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Connecting,
    Handshaking,
    Live,
    Disconnecting,
    Disconnected,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Disconnecting | Phase::Disconnected)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Closed locally
    Closed,
    /// The device sent a disconnect
    RemoteClosed,
    /// The device refused the connect request
    Refused,
    HandshakeTimeout,
    KeepaliveTimeout,
    /// An outbound packet ran out of retransmit attempts
    RetransmitExhausted,
    /// The socket failed
    SocketError(String),
}

impl DisconnectReason {
    /// Error reported to callers waiting on the session
    pub fn to_error(&self) -> Error {
        match self {
            DisconnectReason::HandshakeTimeout => Error::HandshakeTimeout,
            DisconnectReason::KeepaliveTimeout => Error::KeepaliveTimeout,
            DisconnectReason::Closed => Error::Disconnected,
            other => Error::transport(other.to_string()),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed => write!(f, "closed"),
            DisconnectReason::RemoteClosed => write!(f, "closed by device"),
            DisconnectReason::Refused => write!(f, "connection refused by device"),
            DisconnectReason::HandshakeTimeout => write!(f, "handshake timed out"),
            DisconnectReason::KeepaliveTimeout => write!(f, "keepalive timed out"),
            DisconnectReason::RetransmitExhausted => write!(f, "retransmit attempts exhausted"),
            DisconnectReason::SocketError(e) => write!(f, "socket error: {}", e),
        }
    }
}

/// Input to the machine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Start the hello exchange
    Connect,
    /// A datagram arrived from the device
    Datagram(Bytes),
    /// The deadline from [`SessionMachine::poll_deadline`] passed
    Tick,
    /// Send a payload of command records reliably
    Send(Bytes),
    /// The owner decoded and applied the initialization-complete marker
    InitComplete,
    /// Close the session
    Close,
    /// The socket failed
    SocketFailed(String),
}

/// Output of the machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write this datagram to the socket
    Transmit(Bytes),
    /// Records of one packet, in sequence order
    Deliver(Vec<RawCommand>),
    /// The device acknowledged an outbound packet
    Acknowledged(u16),
    /// An outbound packet will never be acknowledged
    SendFailed(u16),
    PhaseChanged(Phase),
    /// Reported exactly once per session
    Disconnected(DisconnectReason),
}

#[derive(Debug)]
struct InFlight {
    id: u16,
    packet: Packet,
    sent_at: Instant,
    retransmits: u32,
}

/// Transport state of one session
#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    phase: Phase,
    /// Id used for the hello exchange
    hello_session_id: u16,
    /// Id assigned by the device once the hello is accepted
    session_id: Option<u16>,
    next_local_id: u16,
    next_remote_id: u16,
    in_flight: VecDeque<InFlight>,
    reorder: HashMap<u16, Bytes>,
    started_at: Option<Instant>,
    next_hello: Option<Instant>,
    last_received: Option<Instant>,
    records: RecordCodec,
    actions: VecDeque<SessionAction>,
}

impl SessionMachine {
    /// Creates a machine with a random hello session id
    pub fn new(config: SessionConfig) -> Self {
        let id = rand::thread_rng().gen_range(1..PACKET_ID_SPACE);
        Self::with_session_id(config, id)
    }

    pub fn with_session_id(config: SessionConfig, hello_session_id: u16) -> Self {
        SessionMachine {
            config,
            phase: Phase::Connecting,
            hello_session_id,
            session_id: None,
            next_local_id: FIRST_PACKET_ID,
            next_remote_id: FIRST_PACKET_ID,
            in_flight: VecDeque::new(),
            reorder: HashMap::new(),
            started_at: None,
            next_hello: None,
            last_received: None,
            records: RecordCodec::new(),
            actions: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Session id assigned by the device, once known
    pub fn session_id(&self) -> Option<u16> {
        self.session_id
    }

    /// Number of outbound packets awaiting acknowledgement
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Next queued action
    pub fn poll_action(&mut self) -> Option<SessionAction> {
        self.actions.pop_front()
    }

    /// Feeds one event. Returns the packet id allocated for
    /// [`SessionEvent::Send`], `None` for every other event.
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Result<Option<u16>> {
        match event {
            SessionEvent::Connect => self.connect(now).map(|_| None),
            SessionEvent::Datagram(datagram) => {
                self.receive(&datagram, now);
                Ok(None)
            }
            SessionEvent::Tick => {
                self.tick(now);
                Ok(None)
            }
            SessionEvent::Send(payload) => self.send(payload, now).map(Some),
            SessionEvent::InitComplete => {
                self.init_complete();
                Ok(None)
            }
            SessionEvent::Close => {
                self.close();
                Ok(None)
            }
            SessionEvent::SocketFailed(e) => {
                self.terminate(DisconnectReason::SocketError(e));
                Ok(None)
            }
        }
    }

    /// Sends the connect request and arms the handshake deadline
    pub fn connect(&mut self, now: Instant) -> Result<()> {
        if self.started_at.is_some() {
            return Err(Error::transport("session already started"));
        }
        debug!(session = self.hello_session_id, "sending connect request");
        self.started_at = Some(now);
        self.send_hello(now);
        Ok(())
    }

    fn send_hello(&mut self, now: Instant) {
        self.transmit(Packet::hello(self.hello_session_id, ConnectCode::Request));
        self.next_hello = Some(now + self.config.hello_interval);
    }

    /// Earliest instant a [`SessionEvent::Tick`] is needed
    pub fn poll_deadline(&self) -> Option<Instant> {
        if self.phase.is_terminal() {
            return None;
        }
        let mut deadlines: Vec<Instant> = Vec::new();
        if matches!(self.phase, Phase::Connecting | Phase::Handshaking) {
            if let Some(started) = self.started_at {
                deadlines.push(started + self.config.handshake_timeout);
            }
        }
        if self.phase == Phase::Connecting {
            deadlines.extend(self.next_hello);
        }
        if let Some(last) = self.last_received {
            deadlines.push(last + self.config.keepalive_timeout);
        }
        deadlines.extend(
            self.in_flight
                .iter()
                .map(|p| p.sent_at + self.config.retransmit_interval),
        );
        deadlines.into_iter().min()
    }

    /// Processes one inbound datagram. Malformed or foreign datagrams are
    /// dropped with a warning.
    pub fn receive(&mut self, datagram: &[u8], now: Instant) {
        if self.phase.is_terminal() {
            trace!(len = datagram.len(), "datagram after close ignored");
            return;
        }
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, len = datagram.len(), "dropping malformed datagram");
                return;
            }
        };
        let header = packet.header;
        trace!(
            flags = header.flags.0,
            session = header.session_id,
            id = header.packet_id,
            ack = header.ack_id,
            len = header.length,
            "received datagram"
        );

        if header.flags.contains(PacketFlags::HELLO) {
            self.receive_hello(&packet, now);
            return;
        }

        match self.session_id {
            None if self.phase == Phase::Handshaking => {
                debug!(session = header.session_id, "device assigned session id");
                self.session_id = Some(header.session_id);
            }
            None => {
                warn!(session = header.session_id, "dropping data packet before connect was accepted");
                return;
            }
            Some(id) if id != header.session_id => {
                warn!(expected = id, session = header.session_id, "dropping datagram for foreign session");
                return;
            }
            Some(_) => {}
        }
        self.last_received = Some(now);

        if header.flags.contains(PacketFlags::ACK_REPLY) {
            self.acknowledge(header.ack_id);
        }
        if header.flags.contains(PacketFlags::RETRANSMIT_REQUEST) {
            self.resend_from(header.resend_from, now);
        }
        if header.flags.contains(PacketFlags::ACK_REQUEST) {
            self.sequence(header.packet_id, packet.payload);
        }
    }

    fn receive_hello(&mut self, packet: &Packet, now: Instant) {
        match (self.phase, packet.connect_code()) {
            (Phase::Connecting, Some(ConnectCode::Accepted)) => {
                self.last_received = Some(now);
                self.next_hello = None;
                self.transmit(Packet::ack(packet.header.session_id, 0));
                self.set_phase(Phase::Handshaking);
            }
            (Phase::Handshaking, Some(ConnectCode::Accepted)) => {
                // Our acknowledgement was lost
                self.transmit(Packet::ack(packet.header.session_id, 0));
            }
            (Phase::Connecting, Some(ConnectCode::Refused)) => {
                self.terminate(DisconnectReason::Refused);
            }
            (_, Some(ConnectCode::Disconnect)) => {
                self.terminate(DisconnectReason::RemoteClosed);
            }
            (phase, code) => {
                warn!(?phase, ?code, "ignoring unexpected hello");
            }
        }
    }

    fn sequence(&mut self, id: u16, payload: Bytes) {
        let expected = self.next_remote_id;
        if id == expected {
            self.deliver(payload);
            self.next_remote_id = next_packet_id(id);
            while let Some(buffered) = self.reorder.remove(&self.next_remote_id) {
                let buffered_id = self.next_remote_id;
                trace!(id = buffered_id, "delivering buffered packet");
                self.deliver(buffered);
                self.next_remote_id = next_packet_id(buffered_id);
            }
            self.ack_contiguous();
        } else if is_before(id, expected) {
            trace!(id, expected, "duplicate packet dropped");
            self.ack_contiguous();
        } else {
            let ahead = packet_id_distance(expected, id) as usize;
            if ahead <= self.config.reorder_window && self.reorder.len() < self.config.reorder_window {
                trace!(id, expected, "buffering out-of-order packet");
                self.reorder.entry(id).or_insert(payload);
            } else {
                warn!(id, expected, "packet beyond reorder window dropped");
            }
            if let Some(session) = self.session_id {
                self.transmit(Packet::retransmit_request(session, expected));
            }
        }
    }

    fn ack_contiguous(&mut self) {
        let last = (self.next_remote_id + PACKET_ID_SPACE - 1) % PACKET_ID_SPACE;
        if let Some(session) = self.session_id {
            self.transmit(Packet::ack(session, last));
        }
    }

    fn deliver(&mut self, payload: Bytes) {
        if payload.is_empty() {
            return;
        }
        let records = match self.records.split(&payload) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "dropping packet with malformed command records");
                return;
            }
        };
        self.actions.push_back(SessionAction::Deliver(records));
    }

    /// Marks the handshake burst as fully applied. Moves `Handshaking` to
    /// `Live`; ignored in any other phase.
    pub fn init_complete(&mut self) {
        if self.phase == Phase::Handshaking {
            self.set_phase(Phase::Live);
        } else {
            trace!(phase = ?self.phase, "init complete outside handshake ignored");
        }
    }

    /// Reliably sends a payload of command records. Fails fast unless the
    /// session is live.
    pub fn send(&mut self, payload: Bytes, now: Instant) -> Result<u16> {
        match self.phase {
            Phase::Live => {}
            Phase::Disconnecting | Phase::Disconnected => return Err(Error::Disconnected),
            phase => return Err(Error::transport(format!("session is {:?}, not live", phase))),
        }
        let session_id = self.session_id.ok_or_else(|| Error::transport("no session id"))?;
        let id = self.next_local_id;
        let packet = Packet {
            header: PacketHeader {
                flags: PacketFlags::ACK_REQUEST,
                session_id,
                packet_id: id,
                ..PacketHeader::default()
            },
            payload,
        };
        let datagram = packet.encode()?;
        self.next_local_id = next_packet_id(id);
        trace!(id, len = datagram.len(), "sending packet");
        self.actions.push_back(SessionAction::Transmit(datagram));
        self.in_flight.push_back(InFlight {
            id,
            packet,
            sent_at: now,
            retransmits: 0,
        });
        Ok(id)
    }

    fn acknowledge(&mut self, ack_id: u16) {
        while let Some(front) = self.in_flight.front() {
            if front.id == ack_id || is_before(front.id, ack_id) {
                let id = front.id;
                self.in_flight.pop_front();
                trace!(id, "packet acknowledged");
                self.actions.push_back(SessionAction::Acknowledged(id));
            } else {
                break;
            }
        }
    }

    fn resend_from(&mut self, from: u16, now: Instant) {
        debug!(from, "device requested retransmit");
        let mut resend = Vec::new();
        for entry in self.in_flight.iter_mut() {
            if !is_before(entry.id, from) {
                entry.sent_at = now;
                resend.push(Self::retransmission(&entry.packet));
            }
        }
        for packet in resend {
            self.transmit(packet);
        }
    }

    fn retransmission(packet: &Packet) -> Packet {
        let mut packet = packet.clone();
        packet.header.flags.insert(PacketFlags::RETRANSMIT);
        packet
    }

    /// Handles timers: hello resends, handshake and keepalive deadlines and
    /// outbound retransmission.
    pub fn tick(&mut self, now: Instant) {
        if self.phase.is_terminal() {
            return;
        }
        if let Some(started) = self.started_at {
            if matches!(self.phase, Phase::Connecting | Phase::Handshaking)
                && now >= started + self.config.handshake_timeout
            {
                self.terminate(DisconnectReason::HandshakeTimeout);
                return;
            }
        }
        if self.phase == Phase::Connecting {
            if let Some(next) = self.next_hello {
                if now >= next {
                    trace!("resending connect request");
                    self.send_hello(now);
                }
            }
        }
        if let Some(last) = self.last_received {
            if now >= last + self.config.keepalive_timeout {
                self.terminate(DisconnectReason::KeepaliveTimeout);
                return;
            }
        }

        let interval = self.config.retransmit_interval;
        let max = self.config.max_retransmits;
        let exhausted = self
            .in_flight
            .iter()
            .find(|entry| now >= entry.sent_at + interval && entry.retransmits >= max)
            .map(|entry| (entry.id, entry.retransmits));
        if let Some((id, attempts)) = exhausted {
            warn!(id, attempts, "packet never acknowledged");
            self.terminate(DisconnectReason::RetransmitExhausted);
            return;
        }

        let mut resend = Vec::new();
        for entry in self.in_flight.iter_mut() {
            if now < entry.sent_at + interval {
                continue;
            }
            entry.retransmits += 1;
            entry.sent_at = now;
            trace!(id = entry.id, attempt = entry.retransmits, "retransmitting packet");
            resend.push(Self::retransmission(&entry.packet));
        }
        for packet in resend {
            self.transmit(packet);
        }
    }

    /// Closes the session. Only the first terminal transition has any effect.
    pub fn close(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        if self.started_at.is_some() {
            let session = self.session_id.unwrap_or(self.hello_session_id);
            self.transmit(Packet::hello(session, ConnectCode::Disconnect));
        }
        self.terminate(DisconnectReason::Closed);
    }

    fn terminate(&mut self, reason: DisconnectReason) {
        if self.phase.is_terminal() {
            return;
        }
        match reason {
            DisconnectReason::Closed => debug!("session closed"),
            ref other => error!(reason = %other, "session terminated"),
        }
        self.set_phase(Phase::Disconnecting);
        for entry in self.in_flight.drain(..) {
            self.actions.push_back(SessionAction::SendFailed(entry.id));
        }
        self.reorder.clear();
        self.next_hello = None;
        self.last_received = None;
        self.actions.push_back(SessionAction::Disconnected(reason));
        self.set_phase(Phase::Disconnected);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "session phase changed");
            self.phase = phase;
            self.actions.push_back(SessionAction::PhaseChanged(phase));
        }
    }

    fn transmit(&mut self, packet: Packet) {
        match packet.encode() {
            Ok(datagram) => self.actions.push_back(SessionAction::Transmit(datagram)),
            Err(e) => warn!(error = %e, "failed to encode control packet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HELLO_ID: u16 = 0x1234;
    const SESSION: u16 = 0x8123;

    fn config() -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_secs(5),
            hello_interval: Duration::from_secs(1),
            keepalive_timeout: Duration::from_secs(3),
            retransmit_interval: Duration::from_millis(100),
            max_retransmits: 3,
            reorder_window: 8,
            ..SessionConfig::default()
        }
    }

    fn drain(machine: &mut SessionMachine) -> Vec<SessionAction> {
        std::iter::from_fn(|| machine.poll_action()).collect()
    }

    fn transmitted(actions: &[SessionAction]) -> Vec<Packet> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Transmit(bytes) => Some(Packet::decode(bytes).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn delivered(actions: &[SessionAction]) -> Vec<RawCommand> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Deliver(records) => Some(records.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn device_hello(code: ConnectCode) -> Bytes {
        Packet::hello(HELLO_ID, code).encode().unwrap()
    }

    fn device_packet(id: u16, records: &[RawCommand]) -> Bytes {
        Packet {
            header: PacketHeader {
                flags: PacketFlags::ACK_REQUEST,
                session_id: SESSION,
                packet_id: id,
                ..PacketHeader::default()
            },
            payload: RecordCodec::new().join(records).unwrap(),
        }
        .encode()
        .unwrap()
    }

    fn device_ack(ack_id: u16) -> Bytes {
        Packet::ack(SESSION, ack_id).encode().unwrap()
    }

    fn prg(source: u16) -> RawCommand {
        let [hi, lo] = source.to_be_bytes();
        RawCommand::new(*b"PrgI", vec![0, 0, hi, lo])
    }

    fn init_complete() -> RawCommand {
        RawCommand::new(*b"InCm", vec![0, 0, 0, 0])
    }

    fn handshaking(now: Instant) -> SessionMachine {
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        machine.receive(&device_hello(ConnectCode::Accepted), now);
        drain(&mut machine);
        machine
    }

    fn live(now: Instant) -> SessionMachine {
        let mut machine = handshaking(now);
        machine.receive(&device_packet(1, &[init_complete()]), now);
        machine.init_complete();
        assert_eq!(machine.phase(), Phase::Live);
        drain(&mut machine);
        machine
    }

    #[test]
    fn test_connect_sends_hello_request() {
        let now = Instant::now();
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        let packets = transmitted(&drain(&mut machine));
        assert_eq!(packets.len(), 1);
        assert!(packets[0].header.flags.contains(PacketFlags::HELLO));
        assert_eq!(packets[0].header.session_id, HELLO_ID);
        assert_eq!(packets[0].connect_code(), Some(ConnectCode::Request));
        assert!(machine.connect(now).is_err());
    }

    #[test]
    fn test_hello_resent_until_accepted() {
        let now = Instant::now();
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        drain(&mut machine);

        assert_eq!(machine.poll_deadline(), Some(now + Duration::from_secs(1)));
        machine.tick(now + Duration::from_secs(1));
        let packets = transmitted(&drain(&mut machine));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].connect_code(), Some(ConnectCode::Request));
    }

    #[test]
    fn test_handshake_reaches_live_on_init_complete() {
        let now = Instant::now();
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        drain(&mut machine);

        machine.receive(&device_hello(ConnectCode::Accepted), now);
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::PhaseChanged(Phase::Handshaking)));
        let packets = transmitted(&actions);
        assert!(packets[0].header.flags.contains(PacketFlags::ACK_REPLY));

        machine.receive(&device_packet(1, &[prg(1)]), now);
        assert_eq!(machine.phase(), Phase::Handshaking);
        assert_eq!(machine.session_id(), Some(SESSION));
        let actions = drain(&mut machine);
        assert_eq!(delivered(&actions), vec![prg(1)]);
        let acks = transmitted(&actions);
        assert_eq!(acks[0].header.ack_id, 1);
        assert_eq!(acks[0].header.session_id, SESSION);

        // Delivering the marker is not enough; the owner confirms it applied
        machine.receive(&device_packet(2, &[init_complete()]), now);
        let actions = drain(&mut machine);
        assert_eq!(delivered(&actions), vec![init_complete()]);
        assert_eq!(machine.phase(), Phase::Handshaking);

        machine.handle(SessionEvent::InitComplete, now).unwrap();
        assert_eq!(drain(&mut machine), vec![SessionAction::PhaseChanged(Phase::Live)]);
        assert_eq!(machine.phase(), Phase::Live);

        machine.init_complete();
        assert!(drain(&mut machine).is_empty());
    }

    #[test]
    fn test_init_complete_before_accept_ignored() {
        let now = Instant::now();
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        drain(&mut machine);
        machine.init_complete();
        assert_eq!(machine.phase(), Phase::Connecting);
        assert!(drain(&mut machine).is_empty());
    }

    #[test]
    fn test_refused_connection() {
        let now = Instant::now();
        let mut machine = SessionMachine::with_session_id(config(), HELLO_ID);
        machine.connect(now).unwrap();
        machine.receive(&device_hello(ConnectCode::Refused), now);
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::Refused)));
        assert_eq!(machine.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_duplicate_packet_dropped_and_reacked() {
        let now = Instant::now();
        let mut machine = handshaking(now);
        machine.receive(&device_packet(1, &[prg(1)]), now);
        machine.receive(&device_packet(2, &[prg(2)]), now);
        drain(&mut machine);

        machine.receive(&device_packet(1, &[prg(1)]), now);
        let actions = drain(&mut machine);
        assert!(delivered(&actions).is_empty());
        let acks = transmitted(&actions);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].header.ack_id, 2);
    }

    #[test]
    fn test_out_of_order_resequenced() {
        let now = Instant::now();
        let packets: Vec<(u16, RawCommand)> = (1..=5).map(|id| (id, prg(id * 10))).collect();

        let mut in_order = handshaking(now);
        for (id, record) in &packets {
            in_order.receive(&device_packet(*id, &[record.clone()]), now);
        }
        let expected = delivered(&drain(&mut in_order));

        let mut shuffled = handshaking(now);
        for index in [2usize, 0, 4, 3, 1] {
            let (id, record) = &packets[index];
            shuffled.receive(&device_packet(*id, &[record.clone()]), now);
        }
        let actions = drain(&mut shuffled);
        assert_eq!(delivered(&actions), expected);

        // The first arrival (id 3) must have triggered a retransmit request for 1
        let requests: Vec<_> = transmitted(&actions)
            .into_iter()
            .filter(|p| p.header.flags.contains(PacketFlags::RETRANSMIT_REQUEST))
            .collect();
        assert!(!requests.is_empty());
        assert_eq!(requests[0].header.resend_from, 1);
    }

    #[test]
    fn test_gap_never_delivers_early() {
        let now = Instant::now();
        let mut machine = handshaking(now);
        machine.receive(&device_packet(2, &[prg(2)]), now);
        assert!(delivered(&drain(&mut machine)).is_empty());
        machine.receive(&device_packet(1, &[prg(1)]), now);
        assert_eq!(delivered(&drain(&mut machine)), vec![prg(1), prg(2)]);
    }

    #[test]
    fn test_packet_beyond_window_dropped() {
        let now = Instant::now();
        let mut machine = handshaking(now);
        machine.receive(&device_packet(1 + 20, &[prg(21)]), now);
        drain(&mut machine);
        for id in 1..=20 {
            machine.receive(&device_packet(id, &[prg(id)]), now);
        }
        let records = delivered(&drain(&mut machine));
        assert_eq!(records.len(), 20);
        assert_eq!(records.last(), Some(&prg(20)));
    }

    #[test]
    fn test_malformed_datagrams_dropped() {
        let now = Instant::now();
        let mut machine = live(now);

        machine.receive(&[0x08, 0x0c, 0x00], now);
        let mut wrong_length = device_packet(2, &[prg(2)]).to_vec();
        wrong_length.push(0);
        machine.receive(&wrong_length, now);
        let foreign = Packet::ack(0x8999, 1).encode().unwrap();
        machine.receive(&foreign, now);
        assert!(drain(&mut machine).is_empty());
        assert_eq!(machine.phase(), Phase::Live);

        machine.receive(&device_packet(2, &[prg(2)]), now);
        assert_eq!(delivered(&drain(&mut machine)), vec![prg(2)]);
    }

    #[test]
    fn test_malformed_records_acked_but_not_delivered() {
        let now = Instant::now();
        let mut machine = live(now);
        let packet = Packet {
            header: PacketHeader {
                flags: PacketFlags::ACK_REQUEST,
                session_id: SESSION,
                packet_id: 2,
                ..PacketHeader::default()
            },
            payload: Bytes::from_static(&[0x00, 0x20, 0x00, 0x00, b'P', b'r', b'g', b'I']),
        };
        machine.receive(&packet.encode().unwrap(), now);
        let actions = drain(&mut machine);
        assert!(delivered(&actions).is_empty());
        assert_eq!(transmitted(&actions)[0].header.ack_id, 2);
        assert_eq!(machine.phase(), Phase::Live);
    }

    #[test]
    fn test_send_acknowledged() {
        let now = Instant::now();
        let mut machine = live(now);
        let payload = RecordCodec::new().join([&prg(3)]).unwrap();

        let first = machine.send(payload.clone(), now).unwrap();
        let second = machine.send(payload, now).unwrap();
        assert_eq!((first, second), (1, 2));
        let packets = transmitted(&drain(&mut machine));
        assert!(packets[0].header.flags.contains(PacketFlags::ACK_REQUEST));
        assert_eq!(packets[1].header.packet_id, 2);
        assert_eq!(machine.in_flight(), 2);

        machine.receive(&device_ack(2), now);
        let actions = drain(&mut machine);
        assert_eq!(
            actions,
            vec![SessionAction::Acknowledged(1), SessionAction::Acknowledged(2)]
        );
        assert_eq!(machine.in_flight(), 0);
    }

    #[test]
    fn test_retransmit_then_exhaustion() {
        let now = Instant::now();
        let mut machine = live(now);
        let id = machine.send(Bytes::new(), now).unwrap();
        drain(&mut machine);

        let mut t = now;
        for attempt in 1..=3 {
            t += Duration::from_millis(100);
            // Keep the device side alive so only the retransmit limit matters
            machine.receive(&device_packet(1 + attempt, &[]), t);
            drain(&mut machine);
            machine.tick(t);
            let packets = transmitted(&drain(&mut machine));
            assert_eq!(packets.len(), 1, "attempt {}", attempt);
            assert!(packets[0].header.flags.contains(PacketFlags::RETRANSMIT));
            assert_eq!(packets[0].header.packet_id, id);
        }

        t += Duration::from_millis(100);
        machine.tick(t);
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::SendFailed(id)));
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::RetransmitExhausted)));
        assert_eq!(machine.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_device_retransmit_request() {
        let now = Instant::now();
        let mut machine = live(now);
        for _ in 0..3 {
            machine.send(Bytes::new(), now).unwrap();
        }
        drain(&mut machine);

        let request = Packet::retransmit_request(SESSION, 2).encode().unwrap();
        machine.receive(&request, now);
        let ids: Vec<u16> = transmitted(&drain(&mut machine))
            .iter()
            .map(|p| p.header.packet_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_handshake_timeout() {
        let now = Instant::now();
        let mut machine = handshaking(now);
        machine.tick(now + Duration::from_secs(5));
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::HandshakeTimeout)));
    }

    #[test]
    fn test_keepalive_timeout() {
        let now = Instant::now();
        let mut machine = live(now);
        machine.tick(now + Duration::from_secs(2));
        assert_eq!(machine.phase(), Phase::Live);
        machine.tick(now + Duration::from_secs(3));
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::KeepaliveTimeout)));
        assert!(machine.poll_deadline().is_none());
    }

    #[test]
    fn test_send_fails_fast_when_not_live() {
        let now = Instant::now();
        let mut machine = handshaking(now);
        assert!(matches!(machine.send(Bytes::new(), now), Err(Error::Transport(_))));
        machine.close();
        assert!(matches!(machine.send(Bytes::new(), now), Err(Error::Disconnected)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let now = Instant::now();
        let mut machine = live(now);
        let id = machine.send(Bytes::new(), now).unwrap();
        drain(&mut machine);

        machine.close();
        machine.close();
        machine.handle(SessionEvent::SocketFailed("gone".into()), now).unwrap();
        machine.tick(now + Duration::from_secs(60));

        let actions = drain(&mut machine);
        let disconnects = actions
            .iter()
            .filter(|a| matches!(a, SessionAction::Disconnected(_)))
            .count();
        assert_eq!(disconnects, 1);
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::Closed)));
        let failed = actions
            .iter()
            .filter(|a| **a == SessionAction::SendFailed(id))
            .count();
        assert_eq!(failed, 1);
        let packets = transmitted(&actions);
        assert_eq!(packets[0].connect_code(), Some(ConnectCode::Disconnect));
    }

    #[test]
    fn test_remote_disconnect() {
        let now = Instant::now();
        let mut machine = live(now);
        machine.receive(&Packet::hello(SESSION, ConnectCode::Disconnect).encode().unwrap(), now);
        let actions = drain(&mut machine);
        assert!(actions.contains(&SessionAction::Disconnected(DisconnectReason::RemoteClosed)));
    }

    #[test]
    fn test_packet_ids_wrap() {
        let now = Instant::now();
        let mut machine = live(now);
        machine.next_remote_id = 0x7FFF;
        machine.receive(&device_packet(0, &[prg(0)]), now);
        machine.receive(&device_packet(0x7FFF, &[prg(0x7FFF)]), now);
        assert_eq!(delivered(&drain(&mut machine)), vec![prg(0x7FFF), prg(0)]);
    }
}
