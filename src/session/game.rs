//! Game session between two matched players
//!
//! A session introduces the players, then plays rounds until a vote fails:
//! roles are drawn, the Game Master picks a subject, the Guesser asks up to
//! `max_questions` questions, the result is announced and both players vote
//! on another round. A failed receive ends the session; a failed send is
//! logged and play carries on.

use crate::decision::{DecisionCollector, VoteOutcome};
use crate::error::{GameError, GameResult};
use crate::matchmaking::Matchmaker;
use crate::metrics::MetricsCollector;
use crate::player::PlayerHandle;
use crate::session::messages;
use crate::session::roles::{RoleAssigner, RoleMap};
use crate::session::state::{RoundRecord, SessionState};
use crate::types::{Answer, Decision, PlayerId, Role, SessionEndReason, SessionId};
use crate::utils::{current_timestamp, generate_session_id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where players go once their session is over
#[async_trait]
pub trait SessionExit: Send + Sync {
    /// Hand a healthy player back to the main menu
    async fn return_to_menu(&self, player: PlayerHandle);

    /// Tear down a player whose channel failed
    async fn disconnect(&self, player: PlayerHandle);
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub matchmaker: Matchmaker,
    pub collector: DecisionCollector,
    pub assigner: Arc<dyn RoleAssigner>,
    pub exit: Arc<dyn SessionExit>,
    pub metrics_collector: Arc<MetricsCollector>,
    /// Questions allowed per round
    pub max_questions: u32,
}

/// What a finished session reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub players: [PlayerId; 2],
    pub rounds: Vec<RoundRecord>,
    pub end_reason: SessionEndReason,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn rounds_played(&self) -> usize {
        self.rounds.len()
    }

    /// Winning player of each round, in order
    pub fn winners(&self) -> Vec<PlayerId> {
        self.rounds.iter().map(RoundRecord::winner_id).collect()
    }
}

/// A running session for one pair of players
pub struct GameSession {
    id: SessionId,
    players: [PlayerHandle; 2],
    state: SessionState,
    /// Players whose channel failed during the session
    failed: [bool; 2],
    rounds: Vec<RoundRecord>,
    started_at: DateTime<Utc>,
    context: SessionContext,
}

impl GameSession {
    pub fn new(first: PlayerHandle, second: PlayerHandle, context: SessionContext) -> Self {
        Self {
            id: generate_session_id(),
            players: [first, second],
            state: SessionState::Intro,
            failed: [false, false],
            rounds: Vec::new(),
            started_at: current_timestamp(),
            context,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Play rounds until the players stop, then hand them to the exit hook
    pub async fn run(mut self) -> SessionSummary {
        info!(
            "Session {} started - players: '{}' ({}), '{}' ({})",
            self.id,
            self.players[0].name(),
            self.players[0].id(),
            self.players[1].name(),
            self.players[1].id()
        );
        self.context.metrics_collector.record_session_started();

        self.introduce().await;
        let end_reason = self.play_rounds().await;
        self.terminate(end_reason).await
    }

    async fn introduce(&self) {
        let [first, second] = &self.players;
        first.send_best_effort(&messages::matched(&second.name())).await;
        second.send_best_effort(&messages::matched(&first.name())).await;
    }

    async fn play_rounds(&mut self) -> SessionEndReason {
        loop {
            if let Err(e) = self.state.advance(SessionState::RoleAssign) {
                error!("Session {}: {}", self.id, e);
                return SessionEndReason::Aborted;
            }

            let number = self.rounds.len() as u32 + 1;
            let roles = RoleMap::draw(
                &self.players[0],
                &self.players[1],
                self.context.assigner.as_ref(),
            );

            match self.play_round(number, &roles).await {
                Ok(record) => {
                    self.context
                        .metrics_collector
                        .record_round_finished(record.winner, record.questions_asked);
                    self.rounds.push(record);
                }
                Err(GameError::Transport { player, message }) => {
                    warn!(
                        "Session {} round {} aborted - player {} unreachable: {}",
                        self.id, number, player, message
                    );
                    self.mark_failed(player);
                    return SessionEndReason::Disconnected { player_id: player };
                }
                Err(e) => {
                    error!("Session {} round {} aborted: {}", self.id, number, e);
                    return SessionEndReason::Aborted;
                }
            }

            if let Err(e) = self.state.advance(SessionState::Vote) {
                error!("Session {}: {}", self.id, e);
                return SessionEndReason::Aborted;
            }

            for player in &self.players {
                player.send_best_effort(messages::PLAY_AGAIN).await;
            }
            let outcome = self
                .context
                .collector
                .collect(&self.players[0], &self.players[1])
                .await;

            for decision in outcome.decisions {
                self.context.metrics_collector.record_vote(decision);
            }
            info!(
                "Session {} vote - {}: {}, {}: {}",
                self.id,
                self.players[0].id(),
                outcome.decisions[0].as_str(),
                self.players[1].id(),
                outcome.decisions[1].as_str()
            );

            if !outcome.continue_play {
                return self.vote_end_reason(&outcome);
            }
        }
    }

    /// One round from subject selection to the announced result
    async fn play_round(&mut self, number: u32, roles: &RoleMap) -> GameResult<RoundRecord> {
        let max_questions = self.context.max_questions;
        let game_master = roles.player(Role::GameMaster).clone();
        let guesser = roles.player(Role::Guesser).clone();

        info!(
            "Session {} round {} - game master: {}, guesser: {}",
            self.id,
            number,
            game_master.id(),
            guesser.id()
        );
        for role in [Role::GameMaster, Role::Guesser] {
            let opponent = roles.player(role.opposite()).name();
            send_to(roles, role, &messages::role_announcement(number, role, &opponent)).await;
        }

        self.state.advance(SessionState::SubjectSelect)?;
        let subject = game_master
            .prompt_non_empty(messages::SUBJECT_PROMPT)
            .await?;
        debug!("Session {} round {} subject chosen", self.id, number);
        send_to(roles, Role::Guesser, &messages::subject_chosen(max_questions)).await;

        self.state.advance(SessionState::QaLoop)?;
        let mut questions_asked = 0u32;
        let winner = loop {
            if questions_asked >= max_questions {
                break Role::GameMaster;
            }

            send_to(roles, Role::GameMaster, &messages::awaiting_question(&guesser.name())).await;
            let question = guesser
                .prompt_non_empty(&messages::question_prompt(questions_asked + 1, max_questions))
                .await?;
            questions_asked += 1;

            send_to(
                roles,
                Role::GameMaster,
                &messages::question_relay(questions_asked, &question),
            )
            .await;
            let answer = read_answer(&game_master).await?;
            send_to(roles, Role::Guesser, &messages::answer_relay(answer)).await;

            debug!(
                "Session {} round {} question {}/{} answered {}",
                self.id, number, questions_asked, max_questions, answer
            );
            if answer == Answer::Correct {
                break Role::Guesser;
            }
        };

        self.state.advance(SessionState::RoundResolution)?;
        let winner_name = roles.player(winner).name();
        let result = messages::round_result(number, &winner_name, winner, &subject);
        send_to(roles, Role::GameMaster, &result).await;
        send_to(roles, Role::Guesser, &result).await;

        info!(
            "Session {} round {} finished - winner: {} ({}), questions: {}",
            self.id,
            number,
            winner,
            roles.player(winner).id(),
            questions_asked
        );

        Ok(RoundRecord {
            number,
            game_master: game_master.id(),
            guesser: guesser.id(),
            subject,
            questions_asked,
            winner,
        })
    }

    fn vote_end_reason(&mut self, outcome: &VoteOutcome) -> SessionEndReason {
        let mut disconnected = None;
        for (index, decision) in outcome.decisions.iter().enumerate() {
            if *decision == Decision::Disconnected {
                self.failed[index] = true;
                disconnected.get_or_insert(self.players[index].id());
            }
        }

        if let Some(player_id) = disconnected {
            SessionEndReason::Disconnected { player_id }
        } else if outcome.scheduling_failed {
            SessionEndReason::SchedulingFailed
        } else if outcome.decisions.contains(&Decision::Decline) {
            SessionEndReason::Declined
        } else {
            SessionEndReason::VoteTimedOut
        }
    }

    fn mark_failed(&mut self, player_id: PlayerId) {
        for (index, player) in self.players.iter().enumerate() {
            if player.id() == player_id {
                self.failed[index] = true;
            }
        }
    }

    async fn terminate(mut self, end_reason: SessionEndReason) -> SessionSummary {
        if let Err(e) = self.state.advance(SessionState::Terminated) {
            warn!("Session {}: {}", self.id, e);
        }

        let farewell = messages::session_over(&end_reason);
        for (index, player) in self.players.iter().enumerate() {
            if !self.failed[index] && !player.send_best_effort(farewell).await {
                self.failed[index] = true;
            }
        }

        for player in &self.players {
            self.context.matchmaker.release(player.id());
        }

        let ended_at = current_timestamp();
        let duration = (ended_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.context
            .metrics_collector
            .record_session_ended(end_reason.as_str(), duration);
        info!(
            "Session {} ended - reason: {}, rounds: {}, duration: {:.1}s",
            self.id,
            end_reason.as_str(),
            self.rounds.len(),
            duration
        );

        for (index, player) in self.players.iter().enumerate() {
            if self.failed[index] {
                self.context.exit.disconnect(player.clone()).await;
            } else {
                self.context.exit.return_to_menu(player.clone()).await;
            }
        }

        SessionSummary {
            session_id: self.id,
            players: [self.players[0].id(), self.players[1].id()],
            rounds: self.rounds,
            end_reason,
            started_at: self.started_at,
            ended_at,
        }
    }
}

/// Send to whoever holds `role` this round
async fn send_to(roles: &RoleMap, role: Role, message: &str) -> bool {
    roles.player(role).send_best_effort(message).await
}

/// Prompt the Game Master until a valid answer code arrives
async fn read_answer(game_master: &PlayerHandle) -> GameResult<Answer> {
    loop {
        game_master.send_best_effort(messages::ANSWER_PROMPT).await;
        let input = game_master.receive().await?;
        match Answer::parse(&input) {
            Some(answer) => return Ok(answer),
            None => {
                debug!("Invalid answer '{}' from {}", input, game_master.id());
                game_master.send_best_effort(messages::INVALID_ANSWER).await;
            }
        }
    }
}
