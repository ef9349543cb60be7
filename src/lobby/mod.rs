//! Connection lifecycle outside of a game
//!
//! The lobby logs players in, runs the main menu, hands players to the
//! matchmaker, starts sessions for matched pairs and takes players back when
//! a session ends. It is the `MatchHandler` and `SessionExit` used in
//! production.

pub mod login;
pub mod menu;

pub use login::{login, USERNAME_PROMPT, WELCOME_BANNER};
pub use menu::{MenuChoice, GOODBYE, MAIN_MENU, MENU_PROMPT, RENAME_PROMPT};

use crate::channel::PlayerChannel;
use crate::config::GameSettings;
use crate::decision::DecisionCollector;
use crate::error::{GameError, GameResult};
use crate::matchmaking::{MatchHandler, Matchmaker};
use crate::metrics::MetricsCollector;
use crate::player::{PlayerHandle, PlayerRegistry};
use crate::session::{GameSession, RandomRoleAssigner, RoleAssigner, SessionContext, SessionExit};
use crate::utils::current_timestamp;
use crate::worker::WorkerPool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sent when the worker pool cannot take a player's next task
pub const SERVER_BUSY: &str = "Server is busy, please try again later.";

/// How a connection or menu task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionOutcome {
    /// The connection dropped before a username arrived
    LoginFailed,
    /// The player was paired and handed to a session
    Matched,
    /// The player chose to leave
    Exited,
    /// The player's channel failed
    Disconnected,
}

/// Login, menu and session hand-off for every connected player
#[derive(Clone)]
pub struct Lobby {
    registry: Arc<PlayerRegistry>,
    matchmaker: Matchmaker,
    pool: WorkerPool,
    collector: DecisionCollector,
    assigner: Arc<dyn RoleAssigner>,
    metrics_collector: Arc<MetricsCollector>,
    max_questions: u32,
}

impl Lobby {
    pub fn new(
        game: &GameSettings,
        registry: Arc<PlayerRegistry>,
        matchmaker: Matchmaker,
        pool: WorkerPool,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let collector = DecisionCollector::new(
            pool.clone(),
            Duration::from_secs(game.vote_timeout_seconds),
        );

        Self {
            registry,
            matchmaker,
            pool,
            collector,
            assigner: Arc::new(RandomRoleAssigner),
            metrics_collector,
            max_questions: game.max_questions,
        }
    }

    /// Replace the coin used for role assignment
    pub fn with_role_assigner(mut self, assigner: Arc<dyn RoleAssigner>) -> Self {
        self.assigner = assigner;
        self
    }

    pub fn registry(&self) -> Arc<PlayerRegistry> {
        self.registry.clone()
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Drive a fresh connection through login and the main menu
    pub async fn handle_connection(&self, channel: Arc<dyn PlayerChannel>) -> ConnectionOutcome {
        let peer = channel.peer();

        let player = match login(channel.clone()).await {
            Ok(player) => player,
            Err(e) => {
                info!("Login aborted - peer: {}, error: {}", peer, e);
                channel.close().await;
                return ConnectionOutcome::LoginFailed;
            }
        };

        if let Err(e) = self.registry.add(player.clone()) {
            warn!("Could not register player {}: {}", player.id(), e);
            player.disconnect().await;
            return ConnectionOutcome::Disconnected;
        }
        self.metrics_collector.record_player_connected();

        self.run_menu(player).await
    }

    /// Show the main menu until the player is matched, leaves or drops
    pub async fn run_menu(&self, player: PlayerHandle) -> ConnectionOutcome {
        loop {
            player.send_best_effort(MAIN_MENU).await;

            let choice = match self.read_choice(&player).await {
                Ok(choice) => choice,
                Err(e) => {
                    info!("Player {} dropped at the menu: {}", player.id(), e);
                    self.disconnect_player(player).await;
                    return ConnectionOutcome::Disconnected;
                }
            };

            match choice {
                MenuChoice::Play => match self.matchmaker.enqueue(player.clone()).await {
                    Ok(_) => return self.await_match(player).await,
                    Err(e) if e.is_transport() => {
                        info!("Player {} dropped while queueing: {}", player.id(), e);
                        self.disconnect_player(player).await;
                        return ConnectionOutcome::Disconnected;
                    }
                    Err(e) => warn!("Could not queue player {}: {}", player.id(), e),
                },
                MenuChoice::ChangeUsername => match player.prompt_non_empty(RENAME_PROMPT).await {
                    Ok(name) => {
                        info!(
                            "Player {} renamed - from: '{}', to: '{}'",
                            player.id(),
                            player.name(),
                            name
                        );
                        player.set_name(name);
                    }
                    Err(e) => {
                        info!("Player {} dropped while renaming: {}", player.id(), e);
                        self.disconnect_player(player).await;
                        return ConnectionOutcome::Disconnected;
                    }
                },
                MenuChoice::Exit => {
                    player.send_best_effort(GOODBYE).await;
                    self.disconnect_player(player).await;
                    return ConnectionOutcome::Exited;
                }
            }
        }
    }

    /// Watch a queued player's connection until the matchmaker pairs them.
    /// Input sent while waiting is discarded. A dropped connection takes the
    /// player out of the queue so nobody is matched with it.
    async fn await_match(&self, player: PlayerHandle) -> ConnectionOutcome {
        let Some(matched) = self.matchmaker.match_signal(player.id()) else {
            return ConnectionOutcome::Matched;
        };

        loop {
            tokio::select! {
                biased;
                _ = matched.cancelled() => return ConnectionOutcome::Matched,
                input = player.receive() => match input {
                    Ok(input) => {
                        debug!("Ignoring input '{}' from waiting player {}", input, player.id());
                    }
                    Err(e) => {
                        // Already paired: the session will see the failure itself
                        if self.matchmaker.withdraw(player.id()).is_none() {
                            return ConnectionOutcome::Matched;
                        }
                        info!("Player {} dropped while waiting: {}", player.id(), e);
                        self.disconnect_player(player).await;
                        return ConnectionOutcome::Disconnected;
                    }
                },
            }
        }
    }

    /// Prompt until the player picks a valid menu entry
    async fn read_choice(&self, player: &PlayerHandle) -> GameResult<MenuChoice> {
        loop {
            player.send_best_effort(MENU_PROMPT).await;
            let input = player.receive().await?;
            if let Some(choice) = MenuChoice::parse(&input) {
                return Ok(choice);
            }
            debug!("Invalid menu input '{}' from player {}", input, player.id());
        }
    }

    /// Remove a player from every collection and close its channel
    pub async fn disconnect_player(&self, player: PlayerHandle) {
        self.matchmaker.withdraw(player.id());
        self.matchmaker.release(player.id());

        match self.registry.remove(player.id()) {
            Ok(Some(_)) => self.metrics_collector.record_player_disconnected(),
            Ok(None) => debug!("Player {} was not registered", player.id()),
            Err(e) => warn!("Failed to remove player {}: {}", player.id(), e),
        }

        player.disconnect().await;
        info!(
            "Player '{}' ({}) disconnected after {}s - connected players: {}",
            player.name(),
            player.id(),
            (current_timestamp() - player.connected_at()).num_seconds(),
            self.registry.len()
        );
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            matchmaker: self.matchmaker.clone(),
            collector: self.collector.clone(),
            assigner: self.assigner.clone(),
            exit: Arc::new(self.clone()),
            metrics_collector: self.metrics_collector.clone(),
            max_questions: self.max_questions,
        }
    }
}

#[async_trait]
impl MatchHandler for Lobby {
    async fn on_match(&self, first: PlayerHandle, second: PlayerHandle) -> GameResult<()> {
        let session = GameSession::new(first, second, self.session_context());
        let session_id = session.id();

        match self
            .pool
            .submit(&format!("session:{}", session_id), session.run())
        {
            Ok(_handle) => {
                debug!("Session {} scheduled", session_id);
                Ok(())
            }
            Err(e) => {
                self.metrics_collector.record_pool_rejection("session");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SessionExit for Lobby {
    async fn return_to_menu(&self, player: PlayerHandle) {
        let lobby = self.clone();
        let menu_player = player.clone();
        let submitted = self.pool.submit(&format!("menu:{}", player.id()), async move {
            lobby.run_menu(menu_player).await
        });

        if let Err(e) = submitted {
            warn!(
                "Could not return player {} to the menu: {}",
                player.id(),
                e
            );
            if let GameError::Scheduling { .. } = e {
                self.metrics_collector.record_pool_rejection("menu");
            }
            player.send_best_effort(SERVER_BUSY).await;
            self.disconnect_player(player).await;
        }
    }

    async fn disconnect(&self, player: PlayerHandle) {
        self.disconnect_player(player).await;
    }
}
