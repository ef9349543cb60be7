//! Integration tests for the game server
//!
//! These tests drive the whole system the way clients do:
//! - Login, menu and queueing through the lobby
//! - FIFO pairing and complete sessions
//! - Disconnects and vote timeouts ending a session
//! - The TCP listener, including turning clients away when saturated

mod fixtures;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use twenty_questions::channel::frame_codec;
use twenty_questions::config::GameSettings;
use twenty_questions::lobby::{
    GOODBYE, MAIN_MENU, MENU_PROMPT, SERVER_BUSY, USERNAME_PROMPT, WELCOME_BANNER,
};
use twenty_questions::matchmaking::Membership;
use twenty_questions::server::GameListener;
use twenty_questions::session::messages::{self, ANSWER_PROMPT, SUBJECT_PROMPT};
use twenty_questions::types::Role;
use twenty_questions::worker::PoolConfig;

use fixtures::{eventually, login_and_queue, TestServer, TEST_TIMEOUT};

fn contains(transcript: &[String], needle: &str) -> bool {
    transcript.iter().any(|message| message.contains(needle))
}

#[tokio::test]
async fn test_complete_session_through_lobby() {
    let server = TestServer::start();
    let mut alice = server.connect("alice");
    let mut bob = server.connect("bob");

    login_and_queue(&mut alice, "alice").await;
    login_and_queue(&mut bob, "bob").await;

    // alice queued first and the fixed coin makes her the Game Master
    let transcript = alice.reply("dog").await.unwrap();
    assert!(contains(&transcript, &messages::matched("bob")));
    assert!(contains(
        &transcript,
        &messages::role_announcement(1, Role::GameMaster, "bob")
    ));
    assert_eq!(transcript.last().unwrap(), SUBJECT_PROMPT);

    let transcript = bob.reply("Is it a dog?").await.unwrap();
    assert!(contains(&transcript, &messages::matched("alice")));
    assert!(contains(&transcript, &messages::subject_chosen(20)));
    assert_eq!(transcript.last().unwrap(), &messages::question_prompt(1, 20));

    let transcript = alice.reply("c").await.unwrap();
    assert!(contains(&transcript, "Question 1: Is it a dog?"));
    assert_eq!(transcript.last().unwrap(), ANSWER_PROMPT);

    let transcript = bob.until_prompt().await.unwrap();
    assert!(contains(&transcript, "Answer: CORRECT"));
    assert!(contains(
        &transcript,
        "bob (Guesser) wins round 1! The subject was: dog"
    ));
    assert!(contains(&transcript, messages::PLAY_AGAIN));

    // alice declines; bob never answers
    let transcript = alice.reply("n").await.unwrap();
    assert!(contains(&transcript, "The subject was: dog"));

    for client in [&mut alice, &mut bob] {
        let transcript = client.until_prompt().await.unwrap();
        assert!(contains(&transcript, "chose not to continue"));
        assert_eq!(transcript[transcript.len() - 2], MAIN_MENU);
        assert_eq!(transcript.last().unwrap(), MENU_PROMPT);
    }

    let matchmaker = server.matchmaker().clone();
    eventually(|| matchmaker.stats().players_active == 0).await;
    assert_eq!(matchmaker.stats().pairs_made, 1);

    // Both players can still use the menu after the session
    alice.send("3");
    bob.send("3");
    assert_eq!(alice.recv().await.as_deref(), Some(GOODBYE));
    assert_eq!(bob.recv().await.as_deref(), Some(GOODBYE));

    let registry = server.lobby.registry();
    eventually(|| registry.is_empty()).await;
}

#[tokio::test]
async fn test_players_are_paired_in_arrival_order() {
    let server = TestServer::start();
    let mut clients = Vec::new();

    for name in ["p1", "p2", "p3", "p4"] {
        let mut client = server.connect(name);
        login_and_queue(&mut client, name).await;
        clients.push(client);
    }

    // The match announcement is the first thing each player hears
    let expected = [("p1", "p2"), ("p3", "p4")];
    for (index, (first, second)) in expected.iter().enumerate() {
        let message = clients[index * 2].recv_timeout(TEST_TIMEOUT).await;
        assert_eq!(message, Some(messages::matched(second)));

        let message = clients[index * 2 + 1].recv_timeout(TEST_TIMEOUT).await;
        assert_eq!(message, Some(messages::matched(first)));
    }

    assert_eq!(server.matchmaker().stats().pairs_made, 2);
    assert!(server.matchmaker().snapshot().waiting.is_empty());
}

#[tokio::test]
async fn test_disconnect_mid_round_returns_opponent_to_menu() {
    let server = TestServer::start();
    let mut alice = server.connect("alice");
    let mut bob = server.connect("bob");

    login_and_queue(&mut alice, "alice").await;
    login_and_queue(&mut bob, "bob").await;

    alice.reply("cat").await.unwrap();
    bob.until_prompt().await.unwrap();
    bob.disconnect();

    let transcript = alice.until_prompt().await.unwrap();
    assert!(contains(&transcript, "Your opponent disconnected"));
    assert_eq!(transcript.last().unwrap(), MENU_PROMPT);

    let registry = server.lobby.registry();
    eventually(|| registry.len() == 1).await;
    assert_eq!(server.matchmaker().stats().players_active, 0);
}

#[tokio::test]
async fn test_vote_timeout_ends_session() {
    let game = GameSettings {
        max_questions: 1,
        vote_timeout_seconds: 1,
    };
    let server = TestServer::with_settings(game, PoolConfig::default());
    let mut alice = server.connect("alice");
    let mut bob = server.connect("bob");

    login_and_queue(&mut alice, "alice").await;
    login_and_queue(&mut bob, "bob").await;

    alice.reply("moon").await.unwrap();
    bob.reply("Is it big?").await.unwrap();
    alice.reply("y").await.unwrap();

    // The single question is used up, so the Game Master wins
    let transcript = bob.until_prompt().await.unwrap();
    assert!(contains(
        &transcript,
        "alice (Game Master) wins round 1! The subject was: moon"
    ));

    alice.until_prompt().await.unwrap();

    // Neither player votes
    let started = tokio::time::Instant::now();
    for client in [&mut alice, &mut bob] {
        let transcript = client.until_prompt().await.unwrap();
        assert!(contains(&transcript, "No decision within the time limit"));
        assert_eq!(transcript.last().unwrap(), MENU_PROMPT);
    }
    assert!(started.elapsed() < TEST_TIMEOUT);

    let matchmaker = server.matchmaker().clone();
    eventually(|| matchmaker.snapshot().active.is_empty()).await;
}

#[tokio::test]
async fn test_rejoin_queue_after_session() {
    let server = TestServer::start();
    let mut alice = server.connect("alice");
    let mut bob = server.connect("bob");

    login_and_queue(&mut alice, "alice").await;
    login_and_queue(&mut bob, "bob").await;

    alice.reply("tree").await.unwrap();
    bob.reply("Is it a tree?").await.unwrap();
    alice.reply("c").await.unwrap();
    alice.reply("n").await.unwrap();
    bob.until_prompt().await.unwrap();

    // Back at the menu, alice queues again and waits alone
    alice.until_prompt().await.unwrap();
    alice.send("1");
    let notice = alice.recv_timeout(TEST_TIMEOUT).await;
    assert_eq!(
        notice.as_deref(),
        Some(twenty_questions::matchmaking::WAITING_NOTICE)
    );

    let matchmaker = server.matchmaker().clone();
    eventually(|| matchmaker.snapshot().waiting.len() == 1).await;
    let snapshot = matchmaker.snapshot();
    assert_eq!(
        server.matchmaker().membership(snapshot.waiting[0]),
        Membership::Waiting
    );
}

#[tokio::test]
async fn test_player_dropping_while_waiting_is_not_matched() {
    let server = TestServer::start();
    let mut alice = server.connect("alice");
    login_and_queue(&mut alice, "alice").await;

    let matchmaker = server.matchmaker().clone();
    eventually(|| matchmaker.snapshot().waiting.len() == 1).await;
    alice.disconnect();

    let registry = server.lobby.registry();
    eventually(|| registry.is_empty()).await;
    assert!(matchmaker.snapshot().waiting.is_empty());

    // The next two arrivals are paired with each other
    let mut bob = server.connect("bob");
    let mut carol = server.connect("carol");
    login_and_queue(&mut bob, "bob").await;
    login_and_queue(&mut carol, "carol").await;

    assert_eq!(
        bob.recv_timeout(TEST_TIMEOUT).await,
        Some(messages::matched("carol"))
    );
    assert_eq!(
        carol.recv_timeout(TEST_TIMEOUT).await,
        Some(messages::matched("bob"))
    );
    assert_eq!(matchmaker.stats().pairs_made, 1);
}

async fn next_frame(framed: &mut Framed<TcpStream, LengthDelimitedCodec>) -> Option<String> {
    let frame = tokio::time::timeout(TEST_TIMEOUT, framed.next())
        .await
        .expect("frame in time")?;
    Some(String::from_utf8(frame.unwrap().to_vec()).unwrap())
}

async fn start_listener(server: &TestServer) -> (std::net::SocketAddr, CancellationToken) {
    let listener = GameListener::bind(
        "127.0.0.1:0",
        server.lobby.clone(),
        server.pool.clone(),
        server.metrics.clone(),
    )
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    tokio::spawn(listener.run(shutdown.clone()));
    (addr, shutdown)
}

#[tokio::test]
async fn test_tcp_login_and_exit() {
    let server = TestServer::start();
    let (addr, shutdown) = start_listener(&server).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(stream, frame_codec());

    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(WELCOME_BANNER));
    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(USERNAME_PROMPT));
    framed.send(Bytes::from_static(b"carol")).await.unwrap();

    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(MAIN_MENU));
    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(MENU_PROMPT));
    framed.send(Bytes::from_static(b"3")).await.unwrap();

    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(GOODBYE));
    assert_eq!(next_frame(&mut framed).await, None);

    let registry = server.lobby.registry();
    eventually(|| registry.is_empty()).await;
    shutdown.cancel();
}

#[tokio::test]
async fn test_tcp_client_turned_away_when_pool_saturated() {
    let server = TestServer::with_settings(
        GameSettings::default(),
        PoolConfig {
            max_workers: 1,
            max_queued: 0,
        },
    );
    let blocker = server
        .pool
        .submit("blocker", std::future::pending::<()>())
        .unwrap();
    let (addr, shutdown) = start_listener(&server).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(stream, frame_codec());

    assert_eq!(next_frame(&mut framed).await.as_deref(), Some(SERVER_BUSY));
    assert_eq!(next_frame(&mut framed).await, None);
    assert!(server.lobby.registry().is_empty());
    assert!(server.pool.stats().rejected >= 1);

    blocker.cancel();
    shutdown.cancel();
}
