//! # Spectator Observer
//!
//! A read-only view of someone else's match. The host mirrors
//! spectator-visible traffic from both sides; the view turns it into
//! displayable events and keeps a running picture of both combatants.
//!
//! ## Design
//!
//! - Only datagrams from the host are observed
//! - Both peers number their messages from 1, so a sequence number alone
//!   does not identify a message; duplicates are recognised by kind, turn
//!   and exact bytes
//! - Chat is the only thing a spectator sends, and only to the host

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use crossbeam_channel::{never, select, Receiver, Sender};
use pokeproto_core::Roster;
use pokeproto_networking::{
    request_spectate, ChatMessage, CommunicationMode, Inbound, Inbox, Message, MessageKind, NetError,
    SequenceNumber, UdpTransport,
};

use crate::chat::{ChatDeduper, ChatLine, StickerTable};
use crate::error::{BattleError, BattleResult};
use crate::input::PlayerCommand;

/// One combatant as far as the spectator knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombatantSnapshot {
    /// Roster name.
    pub pokemon: String,
    /// Last known HP; `None` until a roster lookup or a report provides it.
    pub hp: Option<u32>,
}

/// Something worth showing a spectator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpectatorEvent {
    /// The host announced the fan-out mode.
    ModeAnnounced(CommunicationMode),
    /// A combatant was announced.
    CombatantJoined {
        /// Roster name.
        pokemon: String,
        /// Starting HP, when the local roster knows the species.
        hp: Option<u32>,
    },
    /// The attacker picked a move.
    MoveAnnounced {
        /// Move name.
        move_name: String,
        /// Special-attack boost requested.
        boosted: bool,
    },
    /// The defender answered.
    DefenseAnnounced {
        /// Special-defense boost spent.
        boosted: bool,
    },
    /// The attacker's computed result.
    TurnReported {
        /// Status text from the report.
        status: String,
        /// Attacking combatant.
        attacker: String,
        /// Damage dealt.
        damage: u32,
        /// Defender's HP after the hit.
        defender_hp: u32,
    },
    /// The defender agreed.
    Confirmed,
    /// The defender disagreed.
    Disputed {
        /// Attacking combatant.
        attacker: String,
        /// Move used.
        move_used: String,
        /// The defender's damage figure.
        damage: u32,
        /// The defender's HP figure.
        defender_hp: u32,
    },
    /// A chat line.
    Chat(ChatLine),
    /// The match ended.
    GameOver {
        /// Winning trainer.
        winner: String,
        /// Losing trainer.
        loser: String,
    },
}

impl fmt::Display for SpectatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeAnnounced(mode) => write!(f, "Communication mode: {mode}"),
            Self::CombatantJoined { pokemon, hp: Some(hp) } => write!(f, "{pokemon} enters the battle ({hp} HP)"),
            Self::CombatantJoined { pokemon, hp: None } => write!(f, "{pokemon} enters the battle"),
            Self::MoveAnnounced { move_name, boosted } => {
                write!(f, "Attack: {move_name}")?;
                if *boosted {
                    f.write_str(" (boosted)")?;
                }
                Ok(())
            }
            Self::DefenseAnnounced { boosted: true } => f.write_str("Defender braces with a boost"),
            Self::DefenseAnnounced { boosted: false } => f.write_str("Defender ready"),
            Self::TurnReported { status, defender_hp, .. } => write!(f, "{status} (defender HP {defender_hp})"),
            Self::Confirmed => f.write_str("Result confirmed"),
            Self::Disputed {
                attacker,
                move_used,
                damage,
                defender_hp,
            } => write!(
                f,
                "Result disputed: {attacker}'s {move_used} computed as {damage} damage, defender HP {defender_hp}"
            ),
            Self::Chat(line) => write!(f, "{line}"),
            Self::GameOver { winner, loser } => write!(f, "=== GAME OVER === {winner} defeated {loser}"),
        }
    }
}

/// Turns mirrored datagrams into [`SpectatorEvent`]s.
#[derive(Debug)]
pub struct SpectatorView {
    host: SocketAddr,
    stickers: StickerTable,
    roster: Roster,
    mode: Option<CommunicationMode>,
    combatants: Vec<CombatantSnapshot>,
    reports: u32,
    seen: HashSet<(MessageKind, u32, Vec<u8>)>,
    chats: ChatDeduper,
    result: Option<(String, String)>,
}

impl SpectatorView {
    /// Creates a view of the match hosted at `host`.
    #[must_use]
    pub fn new(host: SocketAddr, stickers: StickerTable, roster: Roster) -> Self {
        Self {
            host,
            stickers,
            roster,
            mode: None,
            combatants: Vec::with_capacity(2),
            reports: 0,
            seen: HashSet::new(),
            chats: ChatDeduper::new(),
            result: None,
        }
    }

    /// The host being watched.
    #[must_use]
    pub const fn host(&self) -> SocketAddr {
        self.host
    }

    /// Sticker table used for chat.
    #[must_use]
    pub const fn stickers(&self) -> &StickerTable {
        &self.stickers
    }

    /// Fan-out mode, once announced.
    #[must_use]
    pub const fn mode(&self) -> Option<CommunicationMode> {
        self.mode
    }

    /// Combatants announced so far, in announcement order.
    #[must_use]
    pub fn combatants(&self) -> &[CombatantSnapshot] {
        &self.combatants
    }

    /// Reports observed so far.
    #[must_use]
    pub const fn turns_reported(&self) -> u32 {
        self.reports
    }

    /// Winner and loser, once the match ended.
    #[must_use]
    pub fn result(&self) -> Option<(&str, &str)> {
        self.result.as_ref().map(|(w, l)| (w.as_str(), l.as_str()))
    }

    /// Whether `GAME_OVER` was seen.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.result.is_some()
    }

    /// Marks our own chat line as seen so a relayed copy is not shown twice.
    pub fn note_own_chat(&mut self, message: &ChatMessage) {
        self.chats.first_sighting(message);
    }

    /// Observes one datagram. Returns an event when it is new and worth
    /// showing.
    pub fn observe(&mut self, message: &Message, raw: &[u8], from: SocketAddr) -> Option<SpectatorEvent> {
        if from != self.host {
            tracing::trace!(%from, kind = %message.kind(), "not from the host, ignored");
            return None;
        }

        if let Message::ChatMessage(chat) = message {
            if !self.chats.first_sighting(chat) {
                return None;
            }
            return Some(SpectatorEvent::Chat(ChatLine::from_message(chat, &self.stickers)));
        }

        let kind = message.kind();
        if !kind.is_spectator_visible() {
            return None;
        }
        let turn = if kind == MessageKind::BattleSetup || kind == MessageKind::CommMode {
            0
        } else {
            self.reports
        };
        if !self.seen.insert((kind, turn, raw.to_vec())) {
            tracing::trace!(%kind, "duplicate mirror");
            return None;
        }

        match message {
            Message::CommMode { mode } => {
                self.mode = Some(*mode);
                Some(SpectatorEvent::ModeAnnounced(*mode))
            }
            Message::BattleSetup(setup) => {
                if self.mode.is_none() {
                    self.mode = Some(setup.communication_mode);
                }
                let hp = self.roster.lookup(&setup.pokemon_name).ok().map(|c| c.current_hp());
                self.combatants.push(CombatantSnapshot {
                    pokemon: setup.pokemon_name.clone(),
                    hp,
                });
                Some(SpectatorEvent::CombatantJoined {
                    pokemon: setup.pokemon_name.clone(),
                    hp,
                })
            }
            Message::AttackAnnounce {
                move_name,
                attack_boost,
                ..
            } => Some(SpectatorEvent::MoveAnnounced {
                move_name: move_name.clone(),
                boosted: *attack_boost,
            }),
            Message::DefenseAnnounce { defense_boost, .. } => Some(SpectatorEvent::DefenseAnnounced {
                boosted: *defense_boost,
            }),
            Message::CalculationReport(report) => {
                self.reports += 1;
                self.track_report(&report.attacker, report.remaining_health, report.defender_hp_remaining);
                Some(SpectatorEvent::TurnReported {
                    status: report.status_message.clone(),
                    attacker: report.attacker.clone(),
                    damage: report.damage_dealt,
                    defender_hp: report.defender_hp_remaining,
                })
            }
            Message::CalculationConfirm { .. } => Some(SpectatorEvent::Confirmed),
            Message::ResolutionRequest(request) => Some(SpectatorEvent::Disputed {
                attacker: request.attacker.clone(),
                move_used: request.move_used.clone(),
                damage: request.damage_dealt,
                defender_hp: request.defender_hp_remaining,
            }),
            Message::GameOver { winner, loser, .. } => {
                self.result = Some((winner.clone(), loser.clone()));
                Some(SpectatorEvent::GameOver {
                    winner: winner.clone(),
                    loser: loser.clone(),
                })
            }
            _ => None,
        }
    }

    fn track_report(&mut self, attacker: &str, attacker_hp: u32, defender_hp: u32) {
        let Some(index) = self
            .combatants
            .iter()
            .position(|c| c.pokemon.eq_ignore_ascii_case(attacker))
        else {
            return;
        };
        self.combatants[index].hp = Some(attacker_hp);
        if let Some(defender) = self.combatants.iter_mut().enumerate().find(|(i, _)| *i != index) {
            defender.1.hp = Some(defender_hp);
        }
    }
}

/// A spectator's connection to one host.
pub struct SpectatorSession {
    transport: UdpTransport,
    inbox: Inbox,
    name: String,
    view: SpectatorView,
    commands: Receiver<PlayerCommand>,
    events: Option<Sender<SpectatorEvent>>,
    next_chat: SequenceNumber,
}

impl SpectatorSession {
    /// Wraps a socket and its reader. Call [`SpectatorSession::join`] before
    /// [`SpectatorSession::run`].
    #[must_use]
    pub fn new(
        transport: UdpTransport,
        inbox: Inbox,
        name: impl Into<String>,
        view: SpectatorView,
        commands: Receiver<PlayerCommand>,
    ) -> Self {
        Self {
            transport,
            inbox,
            name: name.into(),
            view,
            commands,
            events: None,
            next_chat: 1,
        }
    }

    /// Publishes events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: Sender<SpectatorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sends the join request.
    ///
    /// # Errors
    ///
    /// Socket errors from the first request.
    pub fn join(&self) -> BattleResult<()> {
        request_spectate(&self.transport, self.view.host(), &self.name)?;
        Ok(())
    }

    fn emit(&self, event: SpectatorEvent) {
        tracing::debug!(%event, "spectator event");
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn send_chat(&mut self, text: &str) -> BattleResult<()> {
        let message = ChatMessage {
            sender_name: self.name.clone(),
            content: self.view.stickers().compose(text),
            sequence_number: self.next_chat,
        };
        self.next_chat += 1;
        self.view.note_own_chat(&message);
        self.transport
            .send_message(&Message::ChatMessage(message.clone()), self.view.host())?;
        self.emit(SpectatorEvent::Chat(ChatLine::from_message(&message, self.view.stickers())));
        Ok(())
    }

    /// Watches until `GAME_OVER` or until the local player quits. Returns the
    /// final view.
    ///
    /// # Errors
    ///
    /// [`BattleError::LinkClosed`] when the reader stops, socket errors.
    pub fn run(mut self) -> BattleResult<SpectatorView> {
        tracing::info!(host = %self.view.host(), name = %self.name, "spectating");
        let inbound = self.inbox.receiver().clone();
        let mut commands = self.commands.clone();

        loop {
            select! {
                recv(inbound) -> received => match received {
                    Ok(Inbound::Message { message, raw, from }) => {
                        if let Some(event) = self.view.observe(&message, &raw, from) {
                            self.emit(event);
                            if self.view.is_over() {
                                break;
                            }
                        }
                    }
                    Ok(Inbound::Fault(reason)) => {
                        return Err(NetError::Io(io::Error::new(io::ErrorKind::Other, reason)).into());
                    }
                    Err(_) => return Err(BattleError::LinkClosed),
                },
                recv(commands) -> command => match command {
                    Ok(PlayerCommand::Chat(text)) => self.send_chat(&text)?,
                    Ok(PlayerCommand::Quit) => {
                        tracing::info!("stopped watching");
                        break;
                    }
                    Ok(other) => tracing::debug!(?other, "spectators cannot play"),
                    Err(_) => commands = never(),
                },
            }
        }

        self.inbox.stop();
        Ok(self.view)
    }
}
