//! # Turn Coordinator
//!
//! Drives one match from setup to game over for one peer.
//!
//! ## Design
//!
//! The two sides alternate roles. The attacker announces a move, the defender
//! answers with its boost election, and then both compute the damage from the
//! same seeded draw. The attacker reports its numbers and the defender either
//! confirms them or sends its own in a `RESOLUTION_REQUEST`.
//!
//! ```text
//! ATTACKER                              DEFENDER
//!   |-- ATTACK_ANNOUNCE ------------------>|
//!   |<-------------------- DEFENSE_ANNOUNCE|
//!   |   (both draw and compute)            |
//!   |-- CALCULATION_REPORT --------------->|
//!   |<---------- CALCULATION_CONFIRM or ---|
//!   |<---------- RESOLUTION_REQUEST -------|
//! ```
//!
//! The coordinator owns the session state and never shares it; everything
//! that touches the socket lives in the dispatcher.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use pokeproto_core::{calculate_damage, status_message, DamageInput, DamageOutcome, Move, Roster};
use pokeproto_networking::{
    CalculationReport, CommunicationMode, Message, MessageKind, Pairing, PeerDescriptor, Relay, ResolutionRequest,
};

use super::dispatch::{Dispatcher, Wake, Want};
use super::link::BattleLink;
use super::notice::BattleNotice;
use super::resolution::{Discrepancy, FlagOnlyPolicy, Resolution, ResolutionPolicy};
use super::session::{BattleEvent, BattleOutcome, BattleSession, Lifecycle, Participant, Side, TurnRecord};
use super::setup::{resolve_setup, LocalSetup, SetupExchange};
use crate::chat::StickerTable;
use crate::error::{BattleError, BattleResult};
use crate::input::PlayerCommand;

/// Wait before resending our setup.
pub const SETUP_RESEND: Duration = Duration::from_secs(1);

/// Setup sends before giving up.
pub const SETUP_ATTEMPTS: u32 = 10;

const ANNOUNCE_REPLY: &[MessageKind] = &[MessageKind::DefenseAnnounce];
const REPORT_REPLY: &[MessageKind] = &[MessageKind::CalculationConfirm, MessageKind::ResolutionRequest];
const ATTACK: &[MessageKind] = &[MessageKind::AttackAnnounce];
const REPORT: &[MessageKind] = &[MessageKind::CalculationReport];

/// How one turn ended.
enum TurnEnd {
    /// Next turn.
    Continue,
    /// The local player quit.
    Forfeit,
    /// The opponent sent `GAME_OVER`.
    GameOver { winner: String, loser: String },
}

/// Where the setup phase left the match.
enum SetupEnd {
    /// Both combatants known, turns can start.
    Ready(BattleSession),
    /// The opponent conceded before setup finished.
    Over(BattleOutcome),
}

/// Runs one match for one peer.
pub struct TurnCoordinator {
    wire: Dispatcher,
    side: Side,
    local: LocalSetup,
    opponent: PeerDescriptor,
    seed: u64,
    roster: Roster,
    policy: Box<dyn ResolutionPolicy>,
    linger: Duration,
    forfeit_pending: bool,
}

impl TurnCoordinator {
    /// Host side of a paired match. Spectators admitted during pairing are
    /// carried over.
    #[must_use]
    pub fn host(
        link: BattleLink,
        local: LocalSetup,
        pairing: Pairing,
        mode: CommunicationMode,
        roster: Roster,
        commands: Receiver<PlayerCommand>,
    ) -> Self {
        let relay = Relay::host(mode, pairing.spectators);
        let setup = SetupExchange::host(local.clone(), mode);
        Self::build(link, Side::Host, local, pairing.joiner, pairing.seed, relay, setup, roster, commands)
    }

    /// Joiner side of a paired match. The mode arrives with the host's setup.
    #[must_use]
    pub fn joiner(
        link: BattleLink,
        local: LocalSetup,
        host: PeerDescriptor,
        seed: u64,
        roster: Roster,
        commands: Receiver<PlayerCommand>,
    ) -> Self {
        let relay = Relay::joiner(CommunicationMode::PeerToPeer);
        let setup = SetupExchange::joiner(local.clone());
        Self::build(link, Side::Joiner, local, host, seed, relay, setup, roster, commands)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        link: BattleLink,
        side: Side,
        local: LocalSetup,
        opponent: PeerDescriptor,
        seed: u64,
        relay: Relay,
        setup: SetupExchange,
        roster: Roster,
        commands: Receiver<PlayerCommand>,
    ) -> Self {
        let config = link.channel().config();
        let linger = config.timeout * (config.max_retries + 2);
        let wire = Dispatcher::new(
            link,
            local.trainer.clone(),
            opponent.clone(),
            seed,
            relay,
            setup,
            commands,
        );
        Self {
            wire,
            side,
            local,
            opponent,
            seed,
            roster,
            policy: Box::new(FlagOnlyPolicy),
            linger,
            forfeit_pending: false,
        }
    }

    /// Replaces the discrepancy policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn ResolutionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Publishes [`BattleNotice`]s on `notices`.
    #[must_use]
    pub fn with_notices(mut self, notices: Sender<BattleNotice>) -> Self {
        self.wire.set_notices(notices);
        self
    }

    /// Uses `stickers` for outgoing tokens and incoming glyphs.
    #[must_use]
    pub fn with_stickers(mut self, stickers: StickerTable) -> Self {
        self.wire.set_stickers(stickers);
        self
    }

    /// This peer's side.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Plays the match to the end.
    ///
    /// # Errors
    ///
    /// Setup failures, retransmission failures, a closed link and
    /// discrepancies the policy refused to settle. The link is closed and the
    /// spectator list dropped in every case.
    pub fn run(mut self) -> BattleResult<BattleOutcome> {
        let result = self
            .exchange_setup()
            .and_then(|end| match end {
                SetupEnd::Over(outcome) => Ok(outcome),
                SetupEnd::Ready(mut session) => self.play(&mut session).map_err(|e| {
                    session.abort();
                    e
                }),
            });

        if let Err(e) = &result {
            tracing::error!(error = %e, side = %self.side, "battle aborted");
            self.wire.abandon();
        }
        self.wire.close();
        result
    }

    // =========================================================================
    // Setup
    // =========================================================================

    fn exchange_setup(&mut self) -> BattleResult<SetupEnd> {
        let local_combatant = self.local.combatant(&self.roster)?;
        self.wire.open_setup()?;

        let mut attempts = 1;
        let mut deadline = Instant::now() + SETUP_RESEND;
        while !self.wire.setup().is_complete() {
            match self.wire.wait(Want::SETUP, Some(deadline))? {
                Wake::Timeout => {
                    if attempts >= SETUP_ATTEMPTS {
                        return Err(BattleError::SetupTimeout { attempts });
                    }
                    attempts += 1;
                    self.wire.resend_setup()?;
                    deadline = Instant::now() + SETUP_RESEND;
                }
                Wake::Forfeit => {
                    // Conceded once the opponent can be told
                    self.forfeit_pending = true;
                }
                Wake::GameOver { winner, loser } => {
                    return Ok(SetupEnd::Over(self.conceded_during_setup(winner, loser)));
                }
                Wake::Setup | Wake::Turn(_) | Wake::Move { .. } => {}
            }
        }

        let (Some(peer_setup), Some(mode)) = (self.wire.setup().peer_setup().cloned(), self.wire.setup().mode())
        else {
            return Err(BattleError::LinkClosed);
        };
        self.wire.set_mode(mode);
        let opponent_combatant = resolve_setup(&self.roster, &peer_setup)?;

        let transport = self.wire.link().transport().clone();
        let local = Participant::new(
            PeerDescriptor::local(self.local.trainer.clone(), transport),
            local_combatant,
        );
        let opponent = Participant::new(self.opponent.clone(), opponent_combatant);
        let mut session = BattleSession::new(self.side, local, opponent, self.seed, mode);
        self.wire.drain_events(&mut session);
        session.begin();

        self.wire.notify(BattleNotice::Started {
            opponent: self.opponent.name().to_string(),
            opponent_pokemon: session.opponent().combatant.name().to_string(),
            mode,
            seed: self.seed,
        });
        Ok(SetupEnd::Ready(session))
    }

    /// The opponent's `GAME_OVER` beat its `BATTLE_SETUP` here. It is already
    /// acked, so it will not be sent again.
    fn conceded_during_setup(&mut self, winner: String, loser: String) -> BattleOutcome {
        tracing::info!(%winner, %loser, "opponent conceded during setup");
        let mut log = self.wire.take_events();
        log.push(BattleEvent::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        });
        self.wire.notify(BattleNotice::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        });
        BattleOutcome {
            winner,
            loser,
            turns: 0,
            forfeit: true,
            log,
        }
    }

    // =========================================================================
    // Turns
    // =========================================================================

    fn play(&mut self, session: &mut BattleSession) -> BattleResult<BattleOutcome> {
        if self.forfeit_pending {
            return self.concede(session, true);
        }
        loop {
            let end = if session.is_local_turn() {
                self.attack(session)?
            } else {
                self.defend(session)?
            };
            self.wire.drain_events(session);

            match end {
                TurnEnd::Continue => {}
                TurnEnd::Forfeit => return self.concede(session, true),
                TurnEnd::GameOver { winner, loser } => return Ok(self.finish_remote(session, winner, loser)),
            }

            if session.local().combatant.is_fainted() {
                return self.concede(session, false);
            }
            if session.opponent().combatant.is_fainted() {
                return self.await_game_over(session);
            }
        }
    }

    fn attack(&mut self, session: &mut BattleSession) -> BattleResult<TurnEnd> {
        let (used_move, attack_boost) = match self.choose_move(session)? {
            Ok(choice) => choice,
            Err(end) => return Ok(end),
        };

        self.wire.send_turn(Message::AttackAnnounce {
            move_name: used_move.name.clone(),
            attack_boost,
            sequence_number: 0,
        })?;
        session.transition(Lifecycle::AwaitingDefense);

        let defense_boost = match self.wire.wait(Want::kinds(ANNOUNCE_REPLY), None)? {
            Wake::Turn(Message::DefenseAnnounce { defense_boost, .. }) => {
                let opponent = &mut session.participant_mut(self.side.other()).combatant;
                defense_boost && used_move.is_special() && opponent.boosts_mut().spend_defense()
            }
            other => return Ok(self.interrupted(other)),
        };

        let outcome = self.compute(session, self.side, &used_move, attack_boost, defense_boost);
        let defender_hp = session
            .participant_mut(self.side.other())
            .combatant
            .apply_damage(outcome.damage);
        let status = status_message(
            &session.local().combatant,
            &session.opponent().combatant,
            &used_move,
            &outcome,
        );

        let attacker = session.local().combatant.name().to_string();
        self.wire.send_turn(Message::CalculationReport(CalculationReport {
            attacker: attacker.clone(),
            move_used: used_move.name.clone(),
            remaining_health: session.local().combatant.current_hp(),
            damage_dealt: outcome.damage,
            defender_hp_remaining: defender_hp,
            status_message: status.clone(),
            sequence_number: 0,
        }))?;
        session.transition(Lifecycle::AwaitingConfirm);

        let mut record = TurnRecord {
            number: session.turn_number(),
            attacker_side: self.side,
            attacker,
            move_used: used_move.name.clone(),
            damage: outcome.damage,
            defender_hp,
            status,
        };

        match self.wire.wait(Want::kinds(REPORT_REPLY), None)? {
            Wake::Turn(Message::CalculationConfirm { .. }) => {
                tracing::debug!(turn = record.number, "report confirmed");
            }
            Wake::Turn(Message::ResolutionRequest(request)) => {
                self.on_resolution_request(session, &mut record, &request)?;
            }
            Wake::GameOver { winner, loser } => {
                // The defender only concedes after agreeing with our report
                self.close_turn(session, record);
                return Ok(TurnEnd::GameOver { winner, loser });
            }
            other => return Ok(self.interrupted(other)),
        }

        self.close_turn(session, record);
        Ok(TurnEnd::Continue)
    }

    /// Waits for a valid move selection. The inner `Err` ends the turn early.
    fn choose_move(&mut self, session: &mut BattleSession) -> BattleResult<Result<(Move, bool), TurnEnd>> {
        loop {
            let combatant = &session.local().combatant;
            self.wire.notify(BattleNotice::YourTurn {
                moves: combatant.moves().to_vec(),
                hp: combatant.current_hp(),
                opponent_hp: session.opponent().combatant.current_hp(),
                attack_boosts: combatant.boosts().special_attack_uses(),
                defense_boosts: combatant.boosts().special_defense_uses(),
            });

            let (index, boost) = match self.wire.wait(Want::MOVE, None)? {
                Wake::Move { index, boost } => (index, boost),
                other => return Ok(Err(self.interrupted(other))),
            };

            let local = &mut session.participant_mut(self.side).combatant;
            let used_move = match local.move_at(index) {
                Ok(found) => found.clone(),
                Err(e) => {
                    self.wire.notify(BattleNotice::InvalidMove { reason: e.to_string() });
                    continue;
                }
            };
            let attack_boost = boost && used_move.is_special() && local.boosts_mut().spend_attack();
            if boost && !attack_boost {
                tracing::debug!(move_name = %used_move.name, "boost not applied");
            }
            tracing::info!(turn = session.turn_number(), move_name = %used_move.name, attack_boost, "attacking");
            return Ok(Ok((used_move, attack_boost)));
        }
    }

    fn on_resolution_request(
        &mut self,
        session: &mut BattleSession,
        record: &mut TurnRecord,
        request: &ResolutionRequest,
    ) -> BattleResult<()> {
        let discrepancy = Discrepancy {
            turn: record.number,
            attacker: record.attacker.clone(),
            move_used: record.move_used.clone(),
            attacker_damage: record.damage,
            attacker_defender_hp: record.defender_hp,
            defender_damage: request.damage_dealt,
            defender_hp: request.defender_hp_remaining,
        };
        session.record(BattleEvent::Discrepancy(discrepancy.clone()));
        self.wire.notify(BattleNotice::Discrepancy(discrepancy.clone()));

        match self.policy.on_resolution_request(&discrepancy) {
            Resolution::Abort => Err(BattleError::ResolutionRequested(discrepancy)),
            Resolution::AcceptReported => {
                session
                    .participant_mut(self.side.other())
                    .combatant
                    .set_hp(request.defender_hp_remaining);
                record.damage = request.damage_dealt;
                record.defender_hp = session.opponent().combatant.current_hp();
                Ok(())
            }
            Resolution::AcceptLocal => Ok(()),
        }
    }

    fn defend(&mut self, session: &mut BattleSession) -> BattleResult<TurnEnd> {
        self.wire.notify(BattleNotice::OpponentTurn {
            opponent: self.opponent.name().to_string(),
        });

        let (move_name, announced_boost) = match self.wire.wait(Want::kinds(ATTACK), None)? {
            Wake::Turn(Message::AttackAnnounce {
                move_name,
                attack_boost,
                ..
            }) => (move_name, attack_boost),
            other => return Ok(self.interrupted(other)),
        };

        let attacker = &mut session.participant_mut(self.side.other()).combatant;
        let used_move = attacker.find_move(&move_name)?.clone();
        let attack_boost = announced_boost && used_move.is_special() && attacker.boosts_mut().spend_attack();

        let defense_boost = if used_move.is_special() && self.wire.defense_armed() {
            self.wire.disarm_defense();
            session.participant_mut(self.side).combatant.boosts_mut().spend_defense()
        } else {
            false
        };
        tracing::info!(turn = session.turn_number(), move_name = %used_move.name, attack_boost, defense_boost, "defending");

        self.wire.send_turn(Message::DefenseAnnounce {
            defense_boost,
            sequence_number: 0,
        })?;
        session.transition(Lifecycle::AwaitingReport);

        let outcome = self.compute(session, self.side.other(), &used_move, attack_boost, defense_boost);
        let expected_hp = session.local().combatant.current_hp().saturating_sub(outcome.damage);

        let report = match self.wire.wait(Want::kinds(REPORT), None)? {
            Wake::Turn(Message::CalculationReport(report)) => report,
            other => return Ok(self.interrupted(other)),
        };
        session
            .participant_mut(self.side.other())
            .combatant
            .set_hp(report.remaining_health);

        let mut record = TurnRecord {
            number: session.turn_number(),
            attacker_side: self.side.other(),
            attacker: report.attacker.clone(),
            move_used: report.move_used.clone(),
            damage: report.damage_dealt,
            defender_hp: report.defender_hp_remaining,
            status: report.status_message.clone(),
        };

        if report.damage_dealt == outcome.damage && report.defender_hp_remaining == expected_hp {
            session.participant_mut(self.side).combatant.set_hp(expected_hp);
            self.wire
                .send_turn(Message::CalculationConfirm { sequence_number: 0 })?;
        } else {
            self.on_local_discrepancy(session, &mut record, &outcome, expected_hp)?;
        }

        self.close_turn(session, record);
        Ok(TurnEnd::Continue)
    }

    fn on_local_discrepancy(
        &mut self,
        session: &mut BattleSession,
        record: &mut TurnRecord,
        outcome: &DamageOutcome,
        expected_hp: u32,
    ) -> BattleResult<()> {
        let discrepancy = Discrepancy {
            turn: record.number,
            attacker: record.attacker.clone(),
            move_used: record.move_used.clone(),
            attacker_damage: record.damage,
            attacker_defender_hp: record.defender_hp,
            defender_damage: outcome.damage,
            defender_hp: expected_hp,
        };
        self.wire.send_turn(Message::ResolutionRequest(ResolutionRequest {
            attacker: record.attacker.clone(),
            move_used: record.move_used.clone(),
            damage_dealt: outcome.damage,
            defender_hp_remaining: expected_hp,
            sequence_number: 0,
        }))?;
        session.record(BattleEvent::Discrepancy(discrepancy.clone()));
        self.wire.notify(BattleNotice::Discrepancy(discrepancy.clone()));

        match self.policy.on_local_discrepancy(&discrepancy) {
            Resolution::Abort => {
                // Let the request reach the attacker before tearing down
                self.wire.flush(Instant::now() + self.linger);
                Err(BattleError::CalculationDiscrepancy(discrepancy))
            }
            Resolution::AcceptReported => {
                session
                    .participant_mut(self.side)
                    .combatant
                    .set_hp(record.defender_hp);
                Ok(())
            }
            Resolution::AcceptLocal => {
                session.participant_mut(self.side).combatant.set_hp(expected_hp);
                record.damage = outcome.damage;
                record.defender_hp = expected_hp;
                Ok(())
            }
        }
    }

    /// One draw from the shared source, then the damage formula.
    fn compute(
        &self,
        session: &mut BattleSession,
        attacker: Side,
        used_move: &Move,
        attack_boost: bool,
        defense_boost: bool,
    ) -> DamageOutcome {
        let draw = session.next_draw();
        let outcome = calculate_damage(&DamageInput {
            attacker: &session.participant(attacker).combatant,
            defender: &session.participant(attacker.other()).combatant,
            used_move,
            attack_boost,
            defense_boost,
            draw,
        });
        tracing::debug!(
            turn = session.turn_number(),
            draw,
            damage = outcome.damage,
            effectiveness = outcome.effectiveness,
            "damage computed"
        );
        outcome
    }

    fn close_turn(&self, session: &mut BattleSession, record: TurnRecord) {
        let status = record.status.clone();
        session.complete_turn(record);
        self.wire.notify(BattleNotice::TurnResolved {
            status,
            hp: session.local().combatant.current_hp(),
            opponent_hp: session.opponent().combatant.current_hp(),
        });
    }

    /// Maps a wake that cut a turn short to how the turn ended.
    fn interrupted(&self, wake: Wake) -> TurnEnd {
        match wake {
            Wake::Forfeit => TurnEnd::Forfeit,
            Wake::GameOver { winner, loser } => TurnEnd::GameOver { winner, loser },
            other => {
                // Only reachable when a wait is given a deadline it did not expect
                tracing::warn!(wake = ?other, side = %self.side, "unexpected wake, treating as forfeit");
                TurnEnd::Forfeit
            }
        }
    }

    // =========================================================================
    // Ending
    // =========================================================================

    fn concede(&mut self, session: &mut BattleSession, forfeit: bool) -> BattleResult<BattleOutcome> {
        let winner = session.opponent().trainer().to_string();
        let loser = session.local().trainer().to_string();
        tracing::info!(%winner, %loser, forfeit, "conceding");

        self.wire.send_turn(Message::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
            sequence_number: 0,
        })?;
        self.wire.flush(Instant::now() + self.linger);
        self.wire.drain_events(session);

        self.wire.notify(BattleNotice::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        });
        Ok(session.finish(winner, loser, forfeit))
    }

    fn await_game_over(&mut self, session: &mut BattleSession) -> BattleResult<BattleOutcome> {
        let deadline = Instant::now() + self.linger;
        loop {
            match self.wire.wait(Want::NOTHING, Some(deadline))? {
                Wake::GameOver { winner, loser } => return Ok(self.finish_remote(session, winner, loser)),
                Wake::Timeout => {
                    tracing::warn!("opponent fainted but sent no GAME_OVER");
                    let winner = session.local().trainer().to_string();
                    let loser = session.opponent().trainer().to_string();
                    self.wire.notify(BattleNotice::GameOver {
                        winner: winner.clone(),
                        loser: loser.clone(),
                    });
                    return Ok(session.finish(winner, loser, false));
                }
                Wake::Forfeit => tracing::debug!("already won, quit ignored"),
                Wake::Setup | Wake::Turn(_) | Wake::Move { .. } => {}
            }
        }
    }

    fn finish_remote(&mut self, session: &mut BattleSession, winner: String, loser: String) -> BattleOutcome {
        let forfeit = !session.local().combatant.is_fainted() && !session.opponent().combatant.is_fainted();
        self.wire.drain_events(session);
        self.wire.notify(BattleNotice::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        });
        session.finish(winner, loser, forfeit)
    }
}
