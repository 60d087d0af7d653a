//! Gateway Integration Tests
//!
//! Each test starts its own gateway on an ephemeral port with an in-memory
//! message store; no external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use chrono::Utc;
use im_common::ForwardMode;
use im_core::{Message, MessageStatus, MessageType};
use integration_tests::*;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite};

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestGateway::start().await.expect("Failed to start gateway");
    let response = server.get("/health").await.expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

async fn rejected_status(url: String) -> u16 {
    match connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("upgrade should have been rejected"),
    }
}

#[tokio::test]
async fn test_missing_user_id_is_rejected() {
    let server = TestGateway::start().await.unwrap();
    let url = format!("ws://{}{}", server.addr, server.gateway.config().gateway.path);
    assert_eq!(rejected_status(url).await, 400);

    assert_eq!(rejected_status(server.ws_url("", None)).await, 400);
    assert_eq!(server.gateway.get_online_count(), 0);
}

#[tokio::test]
async fn test_bad_platform_id_is_rejected() {
    let server = TestGateway::start().await.unwrap();
    let url = format!(
        "ws://{}{}?user_id=u1&platform_id=desktop",
        server.addr,
        server.gateway.config().gateway.path
    );
    assert_eq!(rejected_status(url).await, 400);
}

#[tokio::test]
async fn test_default_platform_is_used() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("default");
    let (_ws, _) = connect_async(server.ws_url(&user, None)).await.unwrap();

    let default_platform = server.gateway.config().gateway.default_platform_id;
    assert!(
        wait_until(|| server
            .gateway
            .manager()
            .get_state(&user)
            .online_platforms
            == vec![default_platform])
        .await
    );
}

// ============================================================================
// Message flow
// ============================================================================

#[tokio::test]
async fn test_text_message_is_forwarded_and_stored() {
    let server = TestGateway::start().await.unwrap();
    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut ws2 = server.connect(&u2, 1).await.unwrap();
    assert_eq!(server.gateway.get_online_count(), 2);

    send_text(&mut ws1, &text_message(&u2, "hello")).await.unwrap();

    let received = recv_message(&mut ws2).await.unwrap();
    assert_eq!(received.msg_type(), MessageType::Text);
    assert_eq!(received.from(), u1);
    assert_eq!(received.to(), u2);
    assert_eq!(received.platform(), 1);
    assert_eq!(received.payload(), b"hello");
    assert!(!received.id().is_zero());

    assert!(wait_until(|| server.store.len() == 1).await);
    let record = &server.store.records()[0];
    assert_eq!(record.id, received.id());
    assert_eq!(record.from_id, u1);
    assert_eq!(record.to_id, u2);
    assert_eq!(record.content, "hello");
    assert_eq!(record.status, MessageStatus::Sent);
}

#[tokio::test]
async fn test_compressed_binary_frames_are_accepted() {
    let server = TestGateway::start().await.unwrap();
    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut ws2 = server.connect(&u2, 2).await.unwrap();

    let outgoing = Message::new(server.gateway.ids(), MessageType::Image, &u1, &u2, 1, vec![0xFF_u8, 0xD8, 0xFF]);
    send_binary(&mut ws1, &outgoing).await.unwrap();

    let received = recv_message(&mut ws2).await.unwrap();
    assert_ne!(received.id(), outgoing.id());
    assert_eq!(received.payload(), &[0xFF_u8, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_client_ids_are_replaced() {
    let server = TestGateway::start().await.unwrap();
    let (alice, bob, carol) = (unique_user("alice"), unique_user("bob"), unique_user("carol"));
    let mut ws_alice = server.connect(&alice, 1).await.unwrap();
    let mut ws_bob = server.connect(&bob, 1).await.unwrap();
    let mut ws_carol = server.connect(&carol, 1).await.unwrap();

    for (ws, body) in [(&mut ws_alice, "from alice"), (&mut ws_bob, "from bob")] {
        let mut msg = text_message(&carol, body);
        msg["header"]["id"] = "42".into();
        send_text(ws, &msg).await.unwrap();
    }

    let first = recv_message(&mut ws_carol).await.unwrap();
    let second = recv_message(&mut ws_carol).await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_ne!(first.id().into_inner(), 42);
    assert_ne!(second.id().into_inner(), 42);

    assert!(wait_until(|| server.store.len() == 2).await);
}

#[tokio::test]
async fn test_messages_reach_every_platform() {
    let server = TestGateway::start().await.unwrap();
    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut web = server.connect(&u2, 1).await.unwrap();
    let mut mobile = server.connect(&u2, 2).await.unwrap();

    let state = server.gateway.manager().get_state(&u2);
    assert_eq!(state.online_platforms, vec![1, 2]);
    assert_eq!(server.gateway.get_online_count(), 2);

    send_text(&mut ws1, &text_message(&u2, "both")).await.unwrap();
    assert_eq!(recv_message(&mut web).await.unwrap().payload(), b"both");
    assert_eq!(recv_message(&mut mobile).await.unwrap().payload(), b"both");
}

#[tokio::test]
async fn test_message_to_offline_user_is_still_stored() {
    let server = TestGateway::start().await.unwrap();
    let u1 = unique_user("u1");
    let mut ws1 = server.connect(&u1, 1).await.unwrap();

    send_text(&mut ws1, &text_message("nobody", "later")).await.unwrap();

    assert!(wait_until(|| server.store.len() == 1).await);
    assert_eq!(server.store.records()[0].to_id, "nobody");
}

#[tokio::test]
async fn test_system_messages_are_stored_not_forwarded() {
    let server = TestGateway::start().await.unwrap();
    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut ws2 = server.connect(&u2, 1).await.unwrap();

    send_text(&mut ws1, &client_message("system", &u2, "notice")).await.unwrap();
    assert!(wait_until(|| server.store.len() == 1).await);

    // Nothing but control frames should arrive
    assert!(
        tokio::time::timeout(Duration::from_millis(200), recv_message(&mut ws2))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_forwarding_works_without_store() {
    let server = TestGateway::start_without_store().await.unwrap();
    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut ws2 = server.connect(&u2, 1).await.unwrap();

    send_text(&mut ws1, &text_message(&u2, "first")).await.unwrap();
    send_text(&mut ws1, &text_message(&u2, "second")).await.unwrap();

    // The store stage fails each time; the connection stays up
    assert_eq!(recv_message(&mut ws2).await.unwrap().payload(), b"first");
    assert_eq!(recv_message(&mut ws2).await.unwrap().payload(), b"second");
    assert!(server.gateway.is_user_online(&u1));
}

#[tokio::test]
async fn test_broker_forward_mode() {
    let mut config = test_config();
    config.broker.forward_mode = ForwardMode::Broker;
    let server = TestGateway::start_with_config(config).await.unwrap();

    let (u1, u2) = (unique_user("u1"), unique_user("u2"));
    let mut ws1 = server.connect(&u1, 1).await.unwrap();
    let mut ws2 = server.connect(&u2, 1).await.unwrap();

    send_text(&mut ws1, &text_message(&u2, "via broker")).await.unwrap();

    let received = recv_message(&mut ws2).await.unwrap();
    assert_eq!(received.from(), u1);
    assert_eq!(received.payload(), b"via broker");
    assert!(wait_until(|| server.store.len() == 1).await);
    assert_eq!(server.gateway.broker().pending("message_forward"), 0);
}

// ============================================================================
// Heartbeats
// ============================================================================

#[tokio::test]
async fn test_heartbeat_updates_liveness() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("beat");
    let mut ws = server.connect(&user, 1).await.unwrap();

    let before = Utc::now();
    tokio::time::sleep(Duration::from_millis(5)).await;
    send_text(&mut ws, &heartbeat_message()).await.unwrap();

    assert!(
        wait_until(|| server
            .gateway
            .get_user_heartbeat_status(&user, 1)
            .is_ok_and(|seen| seen > before))
        .await
    );
    let seen = server.gateway.get_user_heartbeat_status(&user, 1).unwrap();
    assert!(Utc::now() - seen < chrono::Duration::seconds(2));

    // Heartbeats never reach the chain
    assert!(server.store.is_empty());
    assert!(server.gateway.get_user_heartbeat_status(&user, 9).is_err());
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let mut config = test_config();
    config.heartbeat.interval = Duration::from_millis(100);
    config.heartbeat.timeout = Duration::from_millis(300);
    let server = TestGateway::start_with_config(config).await.unwrap();

    let user = unique_user("silent");
    let mut ws = server.connect(&user, 1).await.unwrap();

    expect_closed(&mut ws).await.unwrap();
    assert!(wait_until(|| !server.gateway.is_user_online(&user)).await);
}

#[tokio::test]
async fn test_heartbeating_client_stays_connected() {
    let mut config = test_config();
    config.heartbeat.interval = Duration::from_millis(100);
    config.heartbeat.timeout = Duration::from_millis(300);
    let server = TestGateway::start_with_config(config).await.unwrap();

    let user = unique_user("alive");
    let mut ws = server.connect(&user, 1).await.unwrap();

    for _ in 0..8 {
        send_text(&mut ws, &heartbeat_message()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(server.gateway.is_user_online(&user));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_closed_client_goes_offline() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("leaver");
    let mut ws = server.connect(&user, 1).await.unwrap();
    assert!(server.gateway.is_user_online(&user));

    ws.close(None).await.unwrap();

    assert!(wait_until(|| !server.gateway.is_user_online(&user)).await);
    assert_eq!(server.gateway.get_online_count(), 0);
}

#[tokio::test]
async fn test_dropped_client_goes_offline() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("dropper");
    let ws = server.connect(&user, 1).await.unwrap();

    drop(ws);

    assert!(wait_until(|| !server.gateway.is_user_online(&user)).await);
}

#[tokio::test]
async fn test_one_platform_leaving_keeps_user_online() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("multi");
    let mut web = server.connect(&user, 1).await.unwrap();
    let _mobile = server.connect(&user, 2).await.unwrap();

    web.close(None).await.unwrap();

    assert!(wait_until(|| server.gateway.manager().get_state(&user).online_platforms == vec![2]).await);
    assert!(server.gateway.is_user_online(&user));
}

#[tokio::test]
async fn test_reconnect_replaces_old_connection() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("twice");
    let mut first = server.connect(&user, 1).await.unwrap();
    let first_id = server.gateway.manager().get_conn(&user, 1).unwrap().id().to_string();

    let mut second = connect_async(server.ws_url(&user, Some(1))).await.unwrap().0;
    expect_closed(&mut first).await.unwrap();

    assert!(
        wait_until(|| server
            .gateway
            .manager()
            .get_conn(&user, 1)
            .is_some_and(|conn| conn.id() != first_id && conn.state().is_connected()))
        .await
    );
    assert_eq!(server.gateway.get_online_count(), 1);

    let msg = Message::new(server.gateway.ids(), MessageType::System, "server", &user, 0, "still here");
    server.gateway.send_to_platform(&user, 1, &msg).await.unwrap();
    assert_eq!(recv_message(&mut second).await.unwrap().payload(), b"still here");
}

#[tokio::test]
async fn test_broadcast_reaches_everyone() {
    let server = TestGateway::start().await.unwrap();
    let mut clients = Vec::new();
    for i in 0..3 {
        clients.push(server.connect(&unique_user("crowd"), i).await.unwrap());
    }

    let msg = Message::new(server.gateway.ids(), MessageType::System, "server", "", 0, "maintenance");
    assert!(server.gateway.broadcast(&msg).await.is_empty());

    for ws in &mut clients {
        assert_eq!(recv_message(ws).await.unwrap().payload(), b"maintenance");
    }
}

#[tokio::test]
async fn test_send_to_unknown_platform() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("lonely");
    let _ws = server.connect(&user, 1).await.unwrap();

    let msg = Message::new(server.gateway.ids(), MessageType::System, "server", &user, 0, "x");
    let err = server.gateway.send_to_platform(&user, 2, &msg).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(server.gateway.send_to_all_platforms("ghost", &msg).await.is_empty());
}

#[tokio::test]
async fn test_stop_closes_clients() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("stopper");
    let mut ws = server.connect(&user, 1).await.unwrap();

    server.gateway.stop().await.unwrap();

    expect_closed(&mut ws).await.unwrap();
    assert!(wait_until(|| server.gateway.get_online_count() == 0).await);
    assert!(server.gateway.broker().is_closed());
}

#[tokio::test]
async fn test_parent_cancellation_closes_clients() {
    let server = TestGateway::start().await.unwrap();
    let user = unique_user("parent");
    let mut ws = server.connect(&user, 1).await.unwrap();

    server.cancel();

    expect_closed(&mut ws).await.unwrap();
    assert!(wait_until(|| !server.gateway.is_user_online(&user)).await);
}
