//! Test fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twenty_questions::channel::{memory_pair, MemoryClient, PlayerChannel};
use twenty_questions::config::GameSettings;
use twenty_questions::error::GameResult;
use twenty_questions::lobby::{Lobby, MAIN_MENU, MENU_PROMPT, WELCOME_BANNER};
use twenty_questions::matchmaking::{MatchHandler, Matchmaker, Membership, WAITING_NOTICE};
use twenty_questions::metrics::MetricsCollector;
use twenty_questions::player::{PlayerHandle, PlayerRegistry};
use twenty_questions::session::RoleAssigner;
use twenty_questions::types::PlayerId;
use twenty_questions::worker::{PoolConfig, WorkerPool};

/// Upper bound for any single wait in the integration tests
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Coin that always lands the same way: `FixedCoin(true)` makes the first
/// matched player the Game Master of every round
pub struct FixedCoin(pub bool);

impl RoleAssigner for FixedCoin {
    fn first_is_game_master(&self) -> bool {
        self.0
    }
}

/// Match handler that records pairs instead of starting sessions and checks
/// queue invariants at every dispatch
pub struct RecordingHandler {
    matchmaker: Matchmaker,
    pairs: mpsc::UnboundedSender<(PlayerId, PlayerId)>,
    violations: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(matchmaker: Matchmaker) -> (Arc<Self>, mpsc::UnboundedReceiver<(PlayerId, PlayerId)>) {
        let (pairs, receiver) = mpsc::unbounded_channel();
        let handler = Arc::new(Self {
            matchmaker,
            pairs,
            violations: AtomicUsize::new(0),
        });
        (handler, receiver)
    }

    /// Dispatches that observed a player both waiting and active
    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchHandler for RecordingHandler {
    async fn on_match(&self, first: PlayerHandle, second: PlayerHandle) -> GameResult<()> {
        let snapshot = self.matchmaker.snapshot();
        let active: HashSet<PlayerId> = snapshot.active.iter().copied().collect();
        let overlap = snapshot.waiting.iter().any(|id| active.contains(id));

        let both_active = [first.id(), second.id()]
            .iter()
            .all(|id| self.matchmaker.membership(*id) == Membership::Active);

        if overlap || !both_active {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }

        let _ = self.pairs.send((first.id(), second.id()));
        Ok(())
    }
}

/// Lobby and matchmaker wired the way the service wires them
pub struct TestServer {
    pub lobby: Lobby,
    pub pool: WorkerPool,
    pub metrics: Arc<MetricsCollector>,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Start a server whose first matched player is always the Game Master
    pub fn start() -> Self {
        Self::with_settings(GameSettings::default(), PoolConfig::default())
    }

    pub fn with_settings(game: GameSettings, pool_config: PoolConfig) -> Self {
        let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let pool = WorkerPool::new(pool_config);
        let matchmaker = Matchmaker::with_metrics(Duration::from_millis(10), metrics.clone());
        let lobby = Lobby::new(
            &game,
            Arc::new(PlayerRegistry::new()),
            matchmaker.clone(),
            pool.clone(),
            metrics.clone(),
        )
        .with_role_assigner(Arc::new(FixedCoin(true)));

        let shutdown = CancellationToken::new();
        let handler: Arc<dyn MatchHandler> = Arc::new(lobby.clone());
        let loop_shutdown = shutdown.clone();
        tokio::spawn(async move { matchmaker.run(handler, loop_shutdown).await });

        Self {
            lobby,
            pool,
            metrics,
            shutdown,
        }
    }

    /// Open an in-memory connection handled like an accepted socket
    pub fn connect(&self, label: &str) -> MemoryClient {
        let (channel, client) = memory_pair(label);
        let channel: Arc<dyn PlayerChannel> = Arc::new(channel);
        let lobby = self.lobby.clone();

        self.pool
            .submit(&format!("connection:{}", label), async move {
                lobby.handle_connection(channel).await
            })
            .expect("connection task scheduled");
        client
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        self.lobby.matchmaker()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Log in as `name` and choose Play, returning once the waiting notice arrives
pub async fn login_and_queue(client: &mut MemoryClient, name: &str) {
    let transcript = client.reply(name).await.expect("username prompt");
    assert_eq!(transcript[0], WELCOME_BANNER);

    let transcript = client.reply("1").await.expect("menu prompt");
    assert_eq!(transcript, vec![MAIN_MENU, MENU_PROMPT]);

    let notice = client.recv_timeout(TEST_TIMEOUT).await;
    assert_eq!(notice.as_deref(), Some(WAITING_NOTICE));
}

/// Wait until `condition` holds, polling every few milliseconds
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
