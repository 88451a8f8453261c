//! # Message Catalog
//!
//! One variant per wire kind, each carrying only its valid fields.
//!
//! ## Design
//!
//! - [`Message::to_record`] emits fields in catalog order
//! - [`Message::from_record`] accepts any order, ignores unknown fields, and
//!   fails with [`NetError::MissingField`] when a required one is absent
//! - Boost flags on the announce messages are optional and read as `false`
//!   when missing

use std::fmt;

use super::codec::{self, Fields, WireRecord};
use crate::error::{NetError, NetResult};
use crate::relay::CommunicationMode;

/// Sequence number attached to reliable and chat messages.
pub type SequenceNumber = u32;

/// The closed set of wire kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// Joiner/spectator looking for hosts.
    FindingHost,
    /// Host answering discovery.
    IAmHosting,
    /// Joiner asking to pair.
    HandshakeRequest,
    /// Host accepting, with the session seed.
    HandshakeResponse,
    /// Host refusing.
    HandshakeRejected,
    /// Third party asking to observe.
    SpectatorRequest,
    /// Combatant and boost allocation.
    BattleSetup,
    /// Host announcing the fan-out policy.
    CommMode,
    /// Attacker's move choice.
    AttackAnnounce,
    /// Defender's acknowledgement of the attack.
    DefenseAnnounce,
    /// Attacker's authoritative computation.
    CalculationReport,
    /// Defender agrees with the report.
    CalculationConfirm,
    /// Defender disagrees with the report.
    ResolutionRequest,
    /// Match ended.
    GameOver,
    /// Text or sticker chat.
    ChatMessage,
    /// Receipt for a reliable message.
    Ack,
}

impl MessageKind {
    /// Every kind, in catalog order.
    pub const ALL: [Self; 16] = [
        Self::FindingHost,
        Self::IAmHosting,
        Self::HandshakeRequest,
        Self::HandshakeResponse,
        Self::HandshakeRejected,
        Self::SpectatorRequest,
        Self::BattleSetup,
        Self::CommMode,
        Self::AttackAnnounce,
        Self::DefenseAnnounce,
        Self::CalculationReport,
        Self::CalculationConfirm,
        Self::ResolutionRequest,
        Self::GameOver,
        Self::ChatMessage,
        Self::Ack,
    ];

    /// Exact wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindingHost => "FINDING_HOST",
            Self::IAmHosting => "I_AM_HOSTING",
            Self::HandshakeRequest => "HANDSHAKE_REQUEST",
            Self::HandshakeResponse => "HANDSHAKE_RESPONSE",
            Self::HandshakeRejected => "HANDSHAKE_REJECTED",
            Self::SpectatorRequest => "SPECTATOR_REQUEST",
            Self::BattleSetup => "BATTLE_SETUP",
            Self::CommMode => "COMM_MODE",
            Self::AttackAnnounce => "ATTACK_ANNOUNCE",
            Self::DefenseAnnounce => "DEFENSE_ANNOUNCE",
            Self::CalculationReport => "CALCULATION_REPORT",
            Self::CalculationConfirm => "CALCULATION_CONFIRM",
            Self::ResolutionRequest => "RESOLUTION_REQUEST",
            Self::GameOver => "GAME_OVER",
            Self::ChatMessage => "CHAT_MESSAGE",
            Self::Ack => "ACK",
        }
    }

    /// Parses a wire token. Tokens are case-sensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == token)
    }

    /// Turn messages travel over the reliable channel and are ACKed.
    #[must_use]
    pub const fn is_turn_message(self) -> bool {
        matches!(
            self,
            Self::AttackAnnounce
                | Self::DefenseAnnounce
                | Self::CalculationReport
                | Self::CalculationConfirm
                | Self::ResolutionRequest
                | Self::GameOver
        )
    }

    /// Kinds the host mirrors to spectators. Chat has its own routing.
    #[must_use]
    pub const fn is_spectator_visible(self) -> bool {
        self.is_turn_message() || matches!(self, Self::BattleSetup | Self::CommMode)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combatant and boost allocation announced after pairing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleSetup {
    /// Fan-out policy (authoritative only from the host).
    pub communication_mode: CommunicationMode,
    /// Roster name of the sender's combatant.
    pub pokemon_name: String,
    /// Special-attack boosts allocated.
    pub special_attack_uses: u8,
    /// Special-defense boosts allocated.
    pub special_defense_uses: u8,
}

/// The attacker's computed turn outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalculationReport {
    /// Attacking combatant's name.
    pub attacker: String,
    /// Move used.
    pub move_used: String,
    /// Attacker's HP.
    pub remaining_health: u32,
    /// Damage dealt.
    pub damage_dealt: u32,
    /// Defender's HP after the hit.
    pub defender_hp_remaining: u32,
    /// Human-readable summary.
    pub status_message: String,
    /// Reliable sequence number.
    pub sequence_number: SequenceNumber,
}

/// The defender's own computation, sent instead of a confirm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// Attacking combatant's name.
    pub attacker: String,
    /// Move used.
    pub move_used: String,
    /// Damage as computed by the defender.
    pub damage_dealt: u32,
    /// Defender's HP as computed by the defender.
    pub defender_hp_remaining: u32,
    /// Reliable sequence number.
    pub sequence_number: SequenceNumber,
}

/// Chat payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatContent {
    /// Plain text.
    Text(String),
    /// Sticker token (or an opaque payload from peers that send one).
    Sticker(String),
}

/// A chat line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Display name of the author.
    pub sender_name: String,
    /// Payload.
    pub content: ChatContent,
    /// Per-sender sequence number, used for de-duplication.
    pub sequence_number: SequenceNumber,
}

/// A typed protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Discovery probe.
    FindingHost,
    /// Discovery answer.
    IAmHosting {
        /// Host display name.
        name: String,
        /// Host address as the host sees it.
        ip: String,
        /// Host port.
        port: u16,
    },
    /// Pairing request.
    HandshakeRequest {
        /// Joiner display name.
        name: String,
    },
    /// Pairing accepted.
    HandshakeResponse {
        /// Shared random seed.
        seed: u64,
    },
    /// Pairing refused.
    HandshakeRejected,
    /// Observer join request.
    SpectatorRequest {
        /// Observer display name, when given.
        name: Option<String>,
    },
    /// Combatant announcement.
    BattleSetup(BattleSetup),
    /// Fan-out policy announcement.
    CommMode {
        /// Selected policy.
        mode: CommunicationMode,
    },
    /// Attacker's move.
    AttackAnnounce {
        /// Move name.
        move_name: String,
        /// Attacker spends a special-attack boost.
        attack_boost: bool,
        /// Reliable sequence number.
        sequence_number: SequenceNumber,
    },
    /// Defender ready.
    DefenseAnnounce {
        /// Defender spends a special-defense boost.
        defense_boost: bool,
        /// Reliable sequence number.
        sequence_number: SequenceNumber,
    },
    /// Attacker's computation.
    CalculationReport(CalculationReport),
    /// Defender agrees.
    CalculationConfirm {
        /// Reliable sequence number.
        sequence_number: SequenceNumber,
    },
    /// Defender disagrees.
    ResolutionRequest(ResolutionRequest),
    /// Match ended.
    GameOver {
        /// Winning trainer.
        winner: String,
        /// Losing trainer.
        loser: String,
        /// Reliable sequence number.
        sequence_number: SequenceNumber,
    },
    /// Chat line.
    ChatMessage(ChatMessage),
    /// Receipt.
    Ack {
        /// Sequence number being acknowledged.
        ack_number: SequenceNumber,
    },
}

impl Message {
    /// The kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::FindingHost => MessageKind::FindingHost,
            Self::IAmHosting { .. } => MessageKind::IAmHosting,
            Self::HandshakeRequest { .. } => MessageKind::HandshakeRequest,
            Self::HandshakeResponse { .. } => MessageKind::HandshakeResponse,
            Self::HandshakeRejected => MessageKind::HandshakeRejected,
            Self::SpectatorRequest { .. } => MessageKind::SpectatorRequest,
            Self::BattleSetup(_) => MessageKind::BattleSetup,
            Self::CommMode { .. } => MessageKind::CommMode,
            Self::AttackAnnounce { .. } => MessageKind::AttackAnnounce,
            Self::DefenseAnnounce { .. } => MessageKind::DefenseAnnounce,
            Self::CalculationReport(_) => MessageKind::CalculationReport,
            Self::CalculationConfirm { .. } => MessageKind::CalculationConfirm,
            Self::ResolutionRequest(_) => MessageKind::ResolutionRequest,
            Self::GameOver { .. } => MessageKind::GameOver,
            Self::ChatMessage(_) => MessageKind::ChatMessage,
            Self::Ack { .. } => MessageKind::Ack,
        }
    }

    /// Sequence number, for kinds that carry one.
    #[must_use]
    pub const fn sequence_number(&self) -> Option<SequenceNumber> {
        match self {
            Self::AttackAnnounce { sequence_number, .. }
            | Self::DefenseAnnounce { sequence_number, .. }
            | Self::CalculationConfirm { sequence_number }
            | Self::GameOver { sequence_number, .. }
            | Self::CalculationReport(CalculationReport { sequence_number, .. })
            | Self::ResolutionRequest(ResolutionRequest { sequence_number, .. })
            | Self::ChatMessage(ChatMessage { sequence_number, .. }) => Some(*sequence_number),
            _ => None,
        }
    }

    /// Stamps a sequence number. Returns false for kinds without one.
    pub fn set_sequence_number(&mut self, sequence: SequenceNumber) -> bool {
        match self {
            Self::AttackAnnounce { sequence_number, .. }
            | Self::DefenseAnnounce { sequence_number, .. }
            | Self::CalculationConfirm { sequence_number }
            | Self::GameOver { sequence_number, .. }
            | Self::CalculationReport(CalculationReport { sequence_number, .. })
            | Self::ResolutionRequest(ResolutionRequest { sequence_number, .. })
            | Self::ChatMessage(ChatMessage { sequence_number, .. }) => {
                *sequence_number = sequence;
                true
            }
            _ => false,
        }
    }

    /// Converts to a wire record, fields in catalog order.
    #[must_use]
    pub fn to_record(&self) -> WireRecord {
        let record = WireRecord::new(self.kind().as_str());
        match self {
            Self::FindingHost | Self::HandshakeRejected => record,
            Self::IAmHosting { name, ip, port } => record
                .with("name", name.as_str())
                .with("ip", ip.as_str())
                .with("port", u32::from(*port)),
            Self::HandshakeRequest { name } => record.with("name", name.as_str()),
            Self::HandshakeResponse { seed } => {
                record.with("seed", i64::try_from(*seed).unwrap_or(i64::MAX))
            }
            Self::SpectatorRequest { name } => match name {
                Some(name) => record.with("name", name.as_str()),
                None => record,
            },
            Self::BattleSetup(setup) => record
                .with("communication_mode", setup.communication_mode.as_token())
                .with("pokemon_name", setup.pokemon_name.as_str())
                .with("special_attack_uses", u32::from(setup.special_attack_uses))
                .with("special_defense_uses", u32::from(setup.special_defense_uses)),
            Self::CommMode { mode } => record.with("cmode", mode.as_token()),
            Self::AttackAnnounce {
                move_name,
                attack_boost,
                sequence_number,
            } => record
                .with("move_name", move_name.as_str())
                .with("sequence_number", *sequence_number)
                .with("attack_boost", *attack_boost),
            Self::DefenseAnnounce {
                defense_boost,
                sequence_number,
            } => record
                .with("sequence_number", *sequence_number)
                .with("defense_boost", *defense_boost),
            Self::CalculationReport(report) => record
                .with("attacker", report.attacker.as_str())
                .with("move_used", report.move_used.as_str())
                .with("remaining_health", report.remaining_health)
                .with("damage_dealt", report.damage_dealt)
                .with("defender_hp_remaining", report.defender_hp_remaining)
                .with("status_message", report.status_message.as_str())
                .with("sequence_number", report.sequence_number),
            Self::CalculationConfirm { sequence_number } => {
                record.with("sequence_number", *sequence_number)
            }
            Self::ResolutionRequest(request) => record
                .with("attacker", request.attacker.as_str())
                .with("move_used", request.move_used.as_str())
                .with("damage_dealt", request.damage_dealt)
                .with("defender_hp_remaining", request.defender_hp_remaining)
                .with("sequence_number", request.sequence_number),
            Self::GameOver {
                winner,
                loser,
                sequence_number,
            } => record
                .with("winner", winner.as_str())
                .with("loser", loser.as_str())
                .with("sequence_number", *sequence_number),
            Self::ChatMessage(chat) => {
                let record = record.with("sender_name", chat.sender_name.as_str());
                let record = match &chat.content {
                    ChatContent::Text(text) => record
                        .with("content_type", "TEXT")
                        .with("message_text", text.as_str()),
                    ChatContent::Sticker(data) => record
                        .with("content_type", "STICKER")
                        .with("sticker_data", data.as_str()),
                };
                record.with("sequence_number", chat.sequence_number)
            }
            Self::Ack { ack_number } => record.with("ack_number", *ack_number),
        }
    }

    /// Builds a typed message from a decoded record.
    ///
    /// # Errors
    ///
    /// [`NetError::UnknownKind`] for tokens outside the catalog,
    /// [`NetError::MissingField`] or [`NetError::InvalidField`] when a
    /// required field is absent or out of range.
    pub fn from_record(record: &WireRecord) -> NetResult<Self> {
        let kind = MessageKind::from_token(&record.message_type)
            .ok_or_else(|| NetError::UnknownKind(record.message_type.clone()))?;
        let f = FieldReader {
            kind,
            fields: &record.fields,
        };

        Ok(match kind {
            MessageKind::FindingHost => Self::FindingHost,
            MessageKind::IAmHosting => Self::IAmHosting {
                name: f.text("name")?,
                ip: f.text("ip")?,
                port: f.number("port")?,
            },
            MessageKind::HandshakeRequest => Self::HandshakeRequest {
                name: f.text("name")?,
            },
            MessageKind::HandshakeResponse => Self::HandshakeResponse {
                seed: f.number("seed")?,
            },
            MessageKind::HandshakeRejected => Self::HandshakeRejected,
            MessageKind::SpectatorRequest => Self::SpectatorRequest {
                name: record.fields.text("name"),
            },
            MessageKind::BattleSetup => Self::BattleSetup(BattleSetup {
                communication_mode: f.mode("communication_mode")?,
                pokemon_name: f.text("pokemon_name")?,
                special_attack_uses: f.number("special_attack_uses")?,
                special_defense_uses: f.number("special_defense_uses")?,
            }),
            MessageKind::CommMode => Self::CommMode {
                mode: f.mode("cmode")?,
            },
            MessageKind::AttackAnnounce => Self::AttackAnnounce {
                move_name: f.text("move_name")?,
                attack_boost: record.fields.flag("attack_boost").unwrap_or(false),
                sequence_number: f.number("sequence_number")?,
            },
            MessageKind::DefenseAnnounce => Self::DefenseAnnounce {
                defense_boost: record.fields.flag("defense_boost").unwrap_or(false),
                sequence_number: f.number("sequence_number")?,
            },
            MessageKind::CalculationReport => Self::CalculationReport(CalculationReport {
                attacker: f.text("attacker")?,
                move_used: f.text("move_used")?,
                remaining_health: f.number("remaining_health")?,
                damage_dealt: f.number("damage_dealt")?,
                defender_hp_remaining: f.number("defender_hp_remaining")?,
                status_message: f.text("status_message")?,
                sequence_number: f.number("sequence_number")?,
            }),
            MessageKind::CalculationConfirm => Self::CalculationConfirm {
                sequence_number: f.number("sequence_number")?,
            },
            MessageKind::ResolutionRequest => Self::ResolutionRequest(ResolutionRequest {
                attacker: f.text("attacker")?,
                move_used: f.text("move_used")?,
                damage_dealt: f.number("damage_dealt")?,
                defender_hp_remaining: f.number("defender_hp_remaining")?,
                sequence_number: f.number("sequence_number")?,
            }),
            MessageKind::GameOver => Self::GameOver {
                winner: f.text("winner")?,
                loser: f.text("loser")?,
                sequence_number: f.number("sequence_number")?,
            },
            MessageKind::ChatMessage => {
                let content_type = f.text("content_type")?;
                let content = if content_type.eq_ignore_ascii_case("STICKER") {
                    ChatContent::Sticker(f.text("sticker_data")?)
                } else {
                    ChatContent::Text(f.text("message_text")?)
                };
                Self::ChatMessage(ChatMessage {
                    sender_name: f.text("sender_name")?,
                    content,
                    sequence_number: f.number("sequence_number")?,
                })
            }
            MessageKind::Ack => Self::Ack {
                ack_number: f.number("ack_number")?,
            },
        })
    }

    /// Encodes to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&self.to_record())
    }

    /// Decodes wire bytes into a typed message.
    ///
    /// # Errors
    ///
    /// See [`Message::from_record`].
    pub fn decode(bytes: &[u8]) -> NetResult<Self> {
        Self::from_record(&codec::decode(bytes))
    }
}

/// Required-field accessors bound to one record.
struct FieldReader<'a> {
    kind: MessageKind,
    fields: &'a Fields,
}

impl FieldReader<'_> {
    fn missing(&self, field: &'static str) -> NetError {
        NetError::MissingField {
            kind: self.kind.as_str(),
            field,
        }
    }

    fn invalid(&self, field: &'static str) -> NetError {
        NetError::InvalidField {
            kind: self.kind.as_str(),
            field,
        }
    }

    fn text(&self, field: &'static str) -> NetResult<String> {
        self.fields.text(field).ok_or_else(|| self.missing(field))
    }

    fn number<T: TryFrom<i64>>(&self, field: &'static str) -> NetResult<T> {
        let raw = self
            .fields
            .get(field)
            .ok_or_else(|| self.missing(field))?
            .as_integer()
            .ok_or_else(|| self.invalid(field))?;
        T::try_from(raw).map_err(|_| self.invalid(field))
    }

    fn mode(&self, field: &'static str) -> NetResult<CommunicationMode> {
        let token = self.text(field)?;
        CommunicationMode::from_token(&token).ok_or_else(|| self.invalid(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_token(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_token("attack_announce"), None);
    }

    #[test]
    fn test_turn_kinds() {
        assert!(MessageKind::GameOver.is_turn_message());
        assert!(!MessageKind::ChatMessage.is_turn_message());
        assert!(!MessageKind::Ack.is_turn_message());
        assert!(MessageKind::BattleSetup.is_spectator_visible());
        assert!(!MessageKind::HandshakeRequest.is_spectator_visible());
    }

    #[test]
    fn test_report_wire_order() {
        let message = Message::CalculationReport(CalculationReport {
            attacker: "Charizard".into(),
            move_used: "Fire Attack".into(),
            remaining_health: 78,
            damage_dealt: 40,
            defender_hp_remaining: 39,
            status_message: "Charizard used Fire Attack!".into(),
            sequence_number: 5,
        });
        let text = String::from_utf8(message.encode()).unwrap();
        assert_eq!(
            text,
            "message_type: CALCULATION_REPORT\n\
             attacker: Charizard\n\
             move_used: Fire Attack\n\
             remaining_health: 78\n\
             damage_dealt: 40\n\
             defender_hp_remaining: 39\n\
             status_message: Charizard used Fire Attack!\n\
             sequence_number: 5\n"
        );
        assert_eq!(Message::decode(text.as_bytes()).unwrap(), message);
    }

    #[test]
    fn test_missing_field_is_named() {
        let err = Message::decode(b"message_type: ATTACK_ANNOUNCE\nsequence_number: 2\n").unwrap_err();
        assert!(matches!(
            err,
            NetError::MissingField {
                kind: "ATTACK_ANNOUNCE",
                field: "move_name"
            }
        ));
    }

    #[test]
    fn test_unknown_kind() {
        let err = Message::decode(b"message_type: TELEPORT\n").unwrap_err();
        assert!(matches!(err, NetError::UnknownKind(token) if token == "TELEPORT"));
    }

    #[test]
    fn test_boost_flags_default_to_false() {
        let message = Message::decode(b"message_type: ATTACK_ANNOUNCE\nmove_name: Tackle\nsequence_number: 1\n").unwrap();
        assert_eq!(
            message,
            Message::AttackAnnounce {
                move_name: "Tackle".into(),
                attack_boost: false,
                sequence_number: 1
            }
        );
    }

    #[test]
    fn test_numeric_name_survives() {
        let message = Message::HandshakeRequest { name: "2024".into() };
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn test_sequence_stamping() {
        let mut message = Message::CalculationConfirm { sequence_number: 0 };
        assert!(message.set_sequence_number(11));
        assert_eq!(message.sequence_number(), Some(11));

        let mut ack = Message::Ack { ack_number: 3 };
        assert!(!ack.set_sequence_number(4));
        assert_eq!(ack.sequence_number(), None);
    }

    #[test]
    fn test_negative_sequence_is_invalid() {
        let err = Message::decode(b"message_type: CALCULATION_CONFIRM\nsequence_number: -4\n").unwrap_err();
        assert!(matches!(err, NetError::InvalidField { field: "sequence_number", .. }));
    }

    #[test]
    fn test_sticker_chat() {
        let message = Message::decode(
            b"message_type: CHAT_MESSAGE\nsender_name: Ash\ncontent_type: STICKER\nsticker_data: /gg\nsequence_number: 2\n",
        )
        .unwrap();
        assert_eq!(
            message,
            Message::ChatMessage(ChatMessage {
                sender_name: "Ash".into(),
                content: ChatContent::Sticker("/gg".into()),
                sequence_number: 2
            })
        );
    }
}
