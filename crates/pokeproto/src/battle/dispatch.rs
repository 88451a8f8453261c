//! # Inbound Dispatch
//!
//! The coordinator's one blocking wait. A single `select!` covers decoded
//! datagrams, local player commands, retransmission failures and an optional
//! deadline. Side traffic (ACKs, chat, spectator joins, late handshake and
//! setup repeats) is handled inline and the wait resumes; only what the
//! caller asked for, or something that ends the match, wakes it.
//!
//! ## Design
//!
//! - Every turn message from the opponent is ACKed, duplicates included,
//!   but dispatched once per `(peer, kind, sequence)`
//! - A new turn message from the opponent proves it received our previous
//!   one, so anything still pending is settled
//! - Turn messages that arrive before the caller wants them are stashed,
//!   not dropped

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use crossbeam_channel::{at, never, select, Receiver, Sender};
use pokeproto_networking::{
    ChatMessage, ChatOrigin, CommunicationMode, Inbound, Message, MessageKind, NetError, PeerDescriptor, Relay,
    SequenceNumber,
};

use super::link::BattleLink;
use super::notice::BattleNotice;
use super::session::{BattleEvent, BattleSession};
use super::setup::SetupExchange;
use crate::chat::{ChatDeduper, ChatLine, StickerTable};
use crate::error::{BattleError, BattleResult};
use crate::input::PlayerCommand;

/// What the caller is waiting for.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Want<'a> {
    kinds: &'a [MessageKind],
    moves: bool,
    setup: bool,
}

impl<'a> Want<'a> {
    /// Only terminal events.
    pub(crate) const NOTHING: Want<'static> = Want {
        kinds: &[],
        moves: false,
        setup: false,
    };

    /// Setup progress.
    pub(crate) const SETUP: Want<'static> = Want {
        kinds: &[],
        moves: false,
        setup: true,
    };

    /// A local move selection.
    pub(crate) const MOVE: Want<'static> = Want {
        kinds: &[],
        moves: true,
        setup: false,
    };

    /// Turn messages of the given kinds.
    pub(crate) const fn kinds(kinds: &'a [MessageKind]) -> Self {
        Self {
            kinds,
            moves: false,
            setup: false,
        }
    }

    fn wants_kind(&self, kind: MessageKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Why a wait returned.
#[derive(Debug)]
pub(crate) enum Wake {
    /// A wanted turn message from the opponent.
    Turn(Message),
    /// The local player picked a move.
    Move {
        /// Move slot.
        index: usize,
        /// Boost requested.
        boost: bool,
    },
    /// The opponent ended the match.
    GameOver {
        /// Winning trainer.
        winner: String,
        /// Losing trainer.
        loser: String,
    },
    /// The setup exchange moved forward.
    Setup,
    /// The local player quit.
    Forfeit,
    /// The deadline passed.
    Timeout,
}

enum Signal {
    Inbound(Option<Inbound>),
    Command(Option<PlayerCommand>),
    Failure(Option<SequenceNumber>),
    Deadline,
}

/// Socket-side state of a running match.
pub(crate) struct Dispatcher {
    link: BattleLink,
    trainer: String,
    opponent: PeerDescriptor,
    seed: u64,
    relay: Relay,
    setup: SetupExchange,
    commands: Receiver<PlayerCommand>,
    failures: Receiver<SequenceNumber>,
    queued_moves: VecDeque<(usize, bool)>,
    stash: VecDeque<Message>,
    defense_armed: bool,
    stickers: StickerTable,
    chats: ChatDeduper,
    seen_turns: HashSet<(SocketAddr, MessageKind, SequenceNumber)>,
    notices: Option<Sender<BattleNotice>>,
    events: Vec<BattleEvent>,
}

impl Dispatcher {
    pub(crate) fn new(
        link: BattleLink,
        trainer: String,
        opponent: PeerDescriptor,
        seed: u64,
        relay: Relay,
        setup: SetupExchange,
        commands: Receiver<PlayerCommand>,
    ) -> Self {
        let failures = link.failures().clone();
        Self {
            link,
            trainer,
            opponent,
            seed,
            relay,
            setup,
            commands,
            failures,
            queued_moves: VecDeque::new(),
            stash: VecDeque::new(),
            defense_armed: false,
            stickers: StickerTable::default(),
            chats: ChatDeduper::new(),
            seen_turns: HashSet::new(),
            notices: None,
            events: Vec::new(),
        }
    }

    pub(crate) fn set_stickers(&mut self, stickers: StickerTable) {
        self.stickers = stickers;
    }

    pub(crate) fn set_notices(&mut self, notices: Sender<BattleNotice>) {
        self.notices = Some(notices);
    }

    pub(crate) const fn link(&self) -> &BattleLink {
        &self.link
    }

    pub(crate) const fn setup(&self) -> &SetupExchange {
        &self.setup
    }

    pub(crate) const fn opponent(&self) -> &PeerDescriptor {
        &self.opponent
    }

    pub(crate) fn set_mode(&mut self, mode: CommunicationMode) {
        self.relay.set_mode(mode);
    }

    /// Publishes a notice. A closed UI is not an error.
    pub(crate) fn notify(&self, notice: BattleNotice) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(notice);
        }
    }

    /// Moves side-channel events into the session log.
    pub(crate) fn drain_events(&mut self, session: &mut BattleSession) {
        for event in self.events.drain(..) {
            session.record(event);
        }
    }

    /// Hands over events recorded while no session exists.
    pub(crate) fn take_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether a defense boost is armed.
    pub(crate) const fn defense_armed(&self) -> bool {
        self.defense_armed
    }

    /// Disarms the defense boost.
    pub(crate) fn disarm_defense(&mut self) {
        self.defense_armed = false;
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Sends a turn message reliably, mirrored per the relay policy.
    pub(crate) fn send_turn(&self, message: Message) -> BattleResult<SequenceNumber> {
        let kind = message.kind();
        let to = self.opponent.addr();
        let sequence = self.relay.send_reliable(self.link.channel(), message, to)?;
        tracing::debug!(%kind, seq = sequence, %to, "turn message sent");
        Ok(sequence)
    }

    fn send_setup_messages(&self, messages: Vec<Message>) -> BattleResult<()> {
        for message in messages {
            tracing::debug!(kind = %message.kind(), to = %self.opponent.addr(), "setup message sent");
            self.relay
                .send_unreliable(self.link.transport(), &message, self.opponent.addr())?;
        }
        Ok(())
    }

    /// Sends the opening setup messages.
    pub(crate) fn open_setup(&mut self) -> BattleResult<()> {
        let messages = self.setup.opening();
        self.send_setup_messages(messages)
    }

    /// Resends our setup after a timeout.
    pub(crate) fn resend_setup(&self) -> BattleResult<()> {
        tracing::warn!(to = %self.opponent.addr(), "peer setup overdue, resending");
        self.send_setup_messages(self.setup.resend())
    }

    fn send_chat(&mut self, text: &str) -> BattleResult<()> {
        let message = ChatMessage {
            sender_name: self.trainer.clone(),
            content: self.stickers.compose(text),
            sequence_number: self.link.channel().next_sequence_number(),
        };
        // Our own line may come back through a relay
        self.chats.first_sighting(&message);

        let raw = Message::ChatMessage(message.clone()).encode();
        let route = self.relay.route_chat(ChatOrigin::Local);
        self.relay
            .deliver_chat(self.link.transport(), &raw, &route, self.opponent.addr())?;
        tracing::debug!(seq = message.sequence_number, spectators = route.spectators.len(), "chat sent");

        let line = ChatLine::from_message(&message, &self.stickers);
        self.events.push(BattleEvent::Chat {
            sender: line.sender,
            text: line.text,
        });
        Ok(())
    }

    /// Waits until every pending reliable send is acknowledged or `deadline`
    /// passes. Errors end the wait; the match is over either way.
    pub(crate) fn flush(&mut self, deadline: Instant) {
        while self.link.channel().pending_count() > 0 {
            match self.wait(Want::NOTHING, Some(deadline)) {
                Ok(Wake::Timeout) => {
                    tracing::warn!(pending = self.link.channel().pending_count(), "gave up waiting for ACKs");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "flush interrupted");
                    return;
                }
            }
        }
    }

    /// Drops spectators and pending sends after a fatal error.
    pub(crate) fn abandon(&mut self) {
        self.relay.clear_spectators();
        self.link.channel().clear();
    }

    /// Stops the sweeper and the reader.
    pub(crate) fn close(&mut self) {
        self.link.close();
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Blocks until something in `want` happens, the opponent ends the
    /// match, the player quits, or `deadline` passes.
    pub(crate) fn wait(&mut self, want: Want<'_>, deadline: Option<Instant>) -> BattleResult<Wake> {
        loop {
            if want.moves {
                if let Some((index, boost)) = self.queued_moves.pop_front() {
                    return Ok(Wake::Move { index, boost });
                }
            }
            if let Some(position) = self.stash.iter().position(|m| want.wants_kind(m.kind())) {
                if let Some(message) = self.stash.remove(position) {
                    return Ok(Wake::Turn(message));
                }
            }

            let timer = deadline.map_or_else(never, at);
            let signal = select! {
                recv(self.link.inbound()) -> inbound => Signal::Inbound(inbound.ok()),
                recv(self.commands) -> command => Signal::Command(command.ok()),
                recv(self.failures) -> failed => Signal::Failure(failed.ok()),
                recv(timer) -> _ => Signal::Deadline,
            };

            match signal {
                Signal::Inbound(None) => return Err(BattleError::LinkClosed),
                Signal::Inbound(Some(Inbound::Fault(reason))) => {
                    return Err(NetError::Io(io::Error::new(io::ErrorKind::Other, reason)).into());
                }
                Signal::Inbound(Some(Inbound::Message { message, raw, from })) => {
                    if let Some(wake) = self.on_message(message, &raw, from, want)? {
                        return Ok(wake);
                    }
                }
                Signal::Command(None) => {
                    tracing::debug!("player input closed");
                    self.commands = never();
                }
                Signal::Command(Some(command)) => {
                    if let Some(wake) = self.on_command(command, want)? {
                        return Ok(wake);
                    }
                }
                Signal::Failure(Some(sequence)) => {
                    tracing::warn!(seq = sequence, "reliable send exhausted its retries");
                    return Err(BattleError::SendFailed { sequence });
                }
                Signal::Failure(None) => self.failures = never(),
                Signal::Deadline => return Ok(Wake::Timeout),
            }
        }
    }

    fn on_command(&mut self, command: PlayerCommand, want: Want<'_>) -> BattleResult<Option<Wake>> {
        match command {
            PlayerCommand::SelectMove { index, boost } => {
                if want.moves {
                    return Ok(Some(Wake::Move { index, boost }));
                }
                tracing::debug!(index, boost, "move queued for our next turn");
                self.queued_moves.push_back((index, boost));
            }
            PlayerCommand::Chat(text) => self.send_chat(&text)?,
            PlayerCommand::ArmDefenseBoost => {
                self.defense_armed = true;
                self.notify(BattleNotice::DefenseArmed);
            }
            PlayerCommand::Quit => return Ok(Some(Wake::Forfeit)),
        }
        Ok(None)
    }

    fn on_message(
        &mut self,
        message: Message,
        raw: &[u8],
        from: SocketAddr,
        want: Want<'_>,
    ) -> BattleResult<Option<Wake>> {
        if from == self.opponent.addr() {
            return self.on_opponent_message(message, raw, from, want);
        }

        match message {
            Message::SpectatorRequest { name } => self.admit_spectator(name, from),
            Message::FindingHost if self.relay.is_host() => {
                let transport = self.link.transport();
                let reply = Message::IAmHosting {
                    name: self.trainer.clone(),
                    ip: transport.local_addr().ip().to_string(),
                    port: transport.local_addr().port(),
                };
                transport.send_message(&reply, from)?;
            }
            Message::HandshakeRequest { name } if self.relay.is_host() => {
                tracing::info!(joiner = %name, %from, "already in a match, rejecting");
                self.link.transport().send_message(&Message::HandshakeRejected, from)?;
            }
            Message::ChatMessage(chat) if self.relay.spectators().contains(from) => {
                self.on_chat(chat, raw, ChatOrigin::Spectator(from))?;
            }
            other => tracing::trace!(kind = %other.kind(), %from, "ignored"),
        }
        Ok(None)
    }

    fn on_opponent_message(
        &mut self,
        message: Message,
        raw: &[u8],
        from: SocketAddr,
        want: Want<'_>,
    ) -> BattleResult<Option<Wake>> {
        let kind = message.kind();
        match message {
            Message::Ack { ack_number } => {
                if self.link.channel().receive_ack(ack_number) {
                    tracing::trace!(seq = ack_number, "ack");
                }
                Ok(None)
            }
            Message::BattleSetup(setup) => {
                let receipt = self.setup.on_peer_setup(setup);
                if receipt.first {
                    self.relay.mirror(self.link.transport(), raw, None);
                } else {
                    tracing::debug!("duplicate peer setup");
                }
                self.send_setup_messages(receipt.replies)?;
                Ok(want.setup.then_some(Wake::Setup))
            }
            Message::CommMode { mode } => {
                let replies = self.setup.on_comm_mode(mode);
                if let Some(known) = self.setup.mode() {
                    self.relay.set_mode(known);
                }
                self.send_setup_messages(replies)?;
                Ok(want.setup.then_some(Wake::Setup))
            }
            Message::HandshakeRequest { .. } if self.relay.is_host() => {
                // Our HANDSHAKE_RESPONSE was lost
                self.link
                    .transport()
                    .send_message(&Message::HandshakeResponse { seed: self.seed }, from)?;
                Ok(None)
            }
            Message::ChatMessage(chat) => {
                self.on_chat(chat, raw, ChatOrigin::Opponent)?;
                Ok(None)
            }
            message if kind.is_turn_message() => self.on_turn_message(message, raw, from, want),
            other => {
                tracing::trace!(kind = %other.kind(), "ignored from opponent");
                Ok(None)
            }
        }
    }

    fn on_turn_message(
        &mut self,
        message: Message,
        raw: &[u8],
        from: SocketAddr,
        want: Want<'_>,
    ) -> BattleResult<Option<Wake>> {
        let kind = message.kind();
        let Some(sequence) = message.sequence_number() else {
            return Err(NetError::Unsequenced(kind.as_str()).into());
        };
        self.link.channel().send_ack(sequence, from)?;

        if !self.seen_turns.insert((from, kind, sequence)) {
            tracing::debug!(%kind, seq = sequence, "duplicate, re-acked");
            return Ok(None);
        }
        tracing::debug!(%kind, seq = sequence, %from, "turn message received");

        // The opponent only sends its next turn message after receiving ours
        if self.link.channel().pending_count() > 0 {
            tracing::trace!(pending = self.link.channel().pending_count(), "settled by reply");
            self.link.channel().clear();
        }
        self.relay.relay_from_opponent(self.link.transport(), &message, raw);

        if let Message::GameOver { winner, loser, .. } = message {
            return Ok(Some(Wake::GameOver { winner, loser }));
        }
        if want.wants_kind(kind) {
            return Ok(Some(Wake::Turn(message)));
        }
        tracing::debug!(%kind, seq = sequence, "stashed until wanted");
        self.stash.push_back(message);
        Ok(None)
    }

    fn on_chat(&mut self, chat: ChatMessage, raw: &[u8], origin: ChatOrigin) -> BattleResult<()> {
        if !self.chats.first_sighting(&chat) {
            return Ok(());
        }
        let route = self.relay.route_chat(origin);
        self.relay
            .deliver_chat(self.link.transport(), raw, &route, self.opponent.addr())?;

        let line = ChatLine::from_message(&chat, &self.stickers);
        tracing::debug!(sender = %line.sender, relayed = route.spectators.len(), "chat received");
        self.events.push(BattleEvent::Chat {
            sender: line.sender.clone(),
            text: line.text.clone(),
        });
        self.notify(BattleNotice::Chat(line));
        Ok(())
    }

    fn admit_spectator(&mut self, name: Option<String>, from: SocketAddr) {
        let name = name.unwrap_or_else(|| "spectator".to_string());
        if !self.relay.add_spectator(PeerDescriptor::remote(name.clone(), from)) {
            return;
        }

        // Late spectators still need both combatants
        let transport = self.link.transport();
        let known = self.setup.own_setup().into_iter().chain(self.setup.peer_setup().cloned());
        for setup in known {
            if let Err(e) = transport.send_message(&Message::BattleSetup(setup), from) {
                tracing::warn!(to = %from, error = %e, "setup catch-up failed");
            }
        }

        self.events.push(BattleEvent::SpectatorJoined { name: name.clone() });
        self.notify(BattleNotice::SpectatorJoined { name });
    }
}
