//! Concurrency tests for the matchmaker
//!
//! Many players queue at once while the pairing loop runs. Every player must
//! end up in exactly one pair and no player may ever be seen both waiting and
//! active. Players who drop while queued must not stay in the queue.

mod fixtures;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use twenty_questions::channel::{memory_pair, MemoryClient};
use twenty_questions::matchmaking::{MatchHandler, Matchmaker, Membership};
use twenty_questions::player::{Player, PlayerHandle};
use twenty_questions::types::PlayerId;

use fixtures::{eventually, login_and_queue, RecordingHandler, TestServer, TEST_TIMEOUT};

fn create_players(count: usize) -> (Vec<PlayerHandle>, Vec<MemoryClient>) {
    (0..count)
        .map(|i| {
            let name = format!("player_{}", i);
            let (channel, client) = memory_pair(name.clone());
            (Player::new(name, Arc::new(channel)), client)
        })
        .unzip()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_pairs_everyone_once() {
    const PLAYERS: usize = 200;

    let matchmaker = Matchmaker::new(Duration::from_millis(5));
    let (handler, mut pairs) = RecordingHandler::new(matchmaker.clone());
    let shutdown = CancellationToken::new();

    let loop_handle = {
        let matchmaker = matchmaker.clone();
        let handler: Arc<dyn MatchHandler> = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { matchmaker.run(handler, shutdown).await })
    };

    let (players, _clients) = create_players(PLAYERS);
    let mut tasks = Vec::new();
    for player in players.clone() {
        let matchmaker = matchmaker.clone();
        tasks.push(tokio::spawn(async move { matchmaker.enqueue(player).await }));
    }
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let mut seen: HashSet<PlayerId> = HashSet::new();
    for _ in 0..PLAYERS / 2 {
        let (first, second) = tokio::time::timeout(TEST_TIMEOUT, pairs.recv())
            .await
            .expect("pair in time")
            .expect("handler alive");
        assert_ne!(first, second);
        assert!(seen.insert(first), "{} paired twice", first);
        assert!(seen.insert(second), "{} paired twice", second);
    }

    assert_eq!(seen.len(), PLAYERS);
    assert_eq!(handler.violations(), 0);

    let stats = matchmaker.stats();
    assert_eq!(stats.pairs_made, (PLAYERS / 2) as u64);
    assert_eq!(stats.players_waiting, 0);
    assert_eq!(stats.players_active, PLAYERS);

    shutdown.cancel();
    loop_handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_release_and_requeue_under_load() {
    const PLAYERS: usize = 40;
    const ROUNDS: usize = 5;

    let matchmaker = Matchmaker::new(Duration::from_millis(5));
    let (handler, mut pairs) = RecordingHandler::new(matchmaker.clone());
    let shutdown = CancellationToken::new();
    {
        let matchmaker = matchmaker.clone();
        let handler: Arc<dyn MatchHandler> = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { matchmaker.run(handler, shutdown).await });
    }

    let (players, _clients) = create_players(PLAYERS);
    for player in &players {
        matchmaker.enqueue(player.clone()).await.unwrap();
    }

    // Every finished pair goes straight back into the queue, like players
    // choosing Play again after a session
    for _ in 0..ROUNDS {
        for _ in 0..PLAYERS / 2 {
            let (first, second) = tokio::time::timeout(TEST_TIMEOUT, pairs.recv())
                .await
                .expect("pair in time")
                .expect("handler alive");

            for id in [first, second] {
                assert_eq!(matchmaker.membership(id), Membership::Active);
                assert!(matchmaker.release(id));
                let player = players
                    .iter()
                    .find(|p| p.id() == id)
                    .expect("known player")
                    .clone();
                let matchmaker = matchmaker.clone();
                tokio::spawn(async move { matchmaker.enqueue(player).await });
            }
        }
    }

    assert_eq!(handler.violations(), 0);
    // Players requeued in the last round may already be paired again
    assert!(matchmaker.stats().pairs_made >= (ROUNDS * PLAYERS / 2) as u64);
    shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_players_dropping_while_queued_are_never_left_waiting() {
    const PLAYERS: usize = 40;

    let server = TestServer::start();
    let mut tasks = Vec::new();
    for i in 0..PLAYERS {
        let mut client = server.connect(&format!("player_{}", i));
        tasks.push(tokio::spawn(async move {
            let name = format!("player_{}", i);
            login_and_queue(&mut client, &name).await;
            if i % 2 == 0 {
                client.disconnect();
                None
            } else {
                Some(client)
            }
        }));
    }

    let mut live = Vec::new();
    for result in futures::future::join_all(tasks).await {
        if let Some(client) = result.unwrap() {
            live.push(client);
        }
    }

    // A dropped player may only remain registered while bound to a session
    // that has not noticed the drop yet; nobody dropped is left waiting
    let registry = server.lobby.registry();
    let matchmaker = server.matchmaker().clone();
    let dropped_waiting = || {
        matchmaker.snapshot().waiting.iter().any(|id| {
            registry
                .get(*id)
                .map(|player| is_dropped(&player.name()))
                .unwrap_or(true)
        })
    };
    eventually(|| !dropped_waiting()).await;

    let snapshot = matchmaker.snapshot();
    let active: HashSet<PlayerId> = snapshot.active.iter().copied().collect();
    assert!(snapshot.waiting.iter().all(|id| !active.contains(id)));
    assert!(registry.len() >= live.len());
    assert!(snapshot.waiting.len() + snapshot.active.len() <= PLAYERS);
}

fn is_dropped(name: &str) -> bool {
    name.trim_start_matches("player_")
        .parse::<usize>()
        .map(|i| i % 2 == 0)
        .unwrap_or(false)
}
