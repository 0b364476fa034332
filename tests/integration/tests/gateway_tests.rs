//! Gateway protocol tests over real sockets
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use concord_core::Snowflake;
use integration_tests::{
    test_config, GatewayClient, TestServer, ALICE_TOKEN, BOB_TOKEN, BOT_TOKEN,
    LOUNGE_ID,
};
use serde_json::{json, Value};

const ALICE_ID: Snowflake = Snowflake::new(100_000_000_000_000_001);

/// Poll until the condition holds, for at most two seconds
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_hello_advertises_interval() {
    let server = TestServer::start().await.unwrap();
    let client = server.connect().await.unwrap();

    let interval = client.hello["d"]["heartbeat_interval"].as_u64().unwrap();
    assert!((40_000..=42_000).contains(&interval));
    assert!(client.hello["d"]["_trace"].is_array());
}

#[tokio::test]
async fn test_identify_ready() {
    let server = TestServer::start().await.unwrap();
    let (_client, ready) = server.identify(ALICE_TOKEN).await.unwrap();

    assert_eq!(ready["s"], 1);
    let d = &ready["d"];
    assert_eq!(d["v"], 6);
    assert_eq!(d["user"]["username"], "alice");
    assert_eq!(d["user"]["email"], "alice@example.com");
    assert_eq!(d["session_id"].as_str().unwrap().len(), 32);
    assert_eq!(d["shard"], json!([0, 1]));

    let guilds = d["guilds"].as_array().unwrap();
    assert_eq!(guilds.len(), 1);
    assert_eq!(guilds[0]["id"], LOUNGE_ID);
    assert_eq!(guilds[0]["large"], false);
    assert_eq!(guilds[0]["members"].as_array().unwrap().len(), 4);

    assert_eq!(d["relationships"].as_array().unwrap().len(), 2);
    assert_eq!(d["user_settings"]["theme"], "dark");
}

#[tokio::test]
async fn test_non_integer_version_uses_default() {
    let server = TestServer::start().await.unwrap();
    let client = GatewayClient::connect(&server.ws_url("v=latest"), false).await;
    assert!(client.is_ok());
}

#[tokio::test]
async fn test_msgpack_identify() {
    let server = TestServer::start().await.unwrap();
    let mut client = GatewayClient::connect(&server.ws_url("v=6&encoding=msgpack"), true)
        .await
        .unwrap();
    assert_eq!(client.hello["op"], 10);

    client
        .send(2, json!({"token": ALICE_TOKEN, "properties": {}}))
        .await
        .unwrap();
    let ready = client.expect_event("READY").await.unwrap();
    assert_eq!(ready["d"]["user"]["id"], "100000000000000001");

    client.send(1, json!(1)).await.unwrap();
    assert_eq!(client.expect_message().await.unwrap()["op"], 11);
}

#[tokio::test]
async fn test_bot_receives_guild_creates() {
    let server = TestServer::start().await.unwrap();
    let (mut client, ready) = server.identify(BOT_TOKEN).await.unwrap();

    assert_eq!(ready["d"]["guilds"], json!([{"id": LOUNGE_ID, "unavailable": true}]));
    assert!(ready["d"].get("relationships").is_none());

    let guild = client.expect_event("GUILD_CREATE").await.unwrap();
    assert_eq!(guild["s"], 2);
    assert_eq!(guild["d"]["id"], LOUNGE_ID);
    assert_eq!(guild["d"]["channels"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_user_account_cannot_shard() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect().await.unwrap();
    client
        .send(2, json!({"token": ALICE_TOKEN, "properties": {}, "shard": [0, 2]}))
        .await
        .unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4010));
}

#[tokio::test]
async fn test_protocol_violations_close() {
    let server = TestServer::start().await.unwrap();

    let mut client = server.connect().await.unwrap();
    client.send(2, json!({"token": "wrong", "properties": {}})).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4004));

    let mut client = server.connect().await.unwrap();
    client.send(3, json!({"status": "idle", "afk": false})).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4003));

    let mut client = server.connect().await.unwrap();
    client.send(5, json!({})).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4001));

    let mut client = server.connect().await.unwrap();
    client.send_text("not json").await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4002));

    let mut client = server.connect().await.unwrap();
    client
        .send_text(format!("{{\"op\":1,\"d\":\"{}\"}}", "x".repeat(5000)))
        .await
        .unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4002));
}

#[tokio::test]
async fn test_heartbeat_ack() {
    let server = TestServer::start().await.unwrap();
    let (mut client, _) = server.identify(ALICE_TOKEN).await.unwrap();

    client.send(1, json!(1)).await.unwrap();
    let ack = client.expect_message().await.unwrap();
    assert_eq!(ack["op"], 11);
}

#[tokio::test]
async fn test_silent_client_is_closed() {
    let mut config = test_config();
    config.heartbeat.min_interval_ms = 100;
    config.heartbeat.max_interval_ms = 100;
    config.heartbeat.grace_ms = 100;
    let server = TestServer::start_with_config(config).await.unwrap();

    let mut client = server.connect().await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), Some(4000));
}

#[tokio::test]
async fn test_presence_fan_out() {
    let server = TestServer::start().await.unwrap();
    let (mut bob, _) = server.identify(BOB_TOKEN).await.unwrap();
    let (alice, _) = server.identify(ALICE_TOKEN).await.unwrap();

    let online = bob.expect_event("PRESENCE_UPDATE").await.unwrap();
    assert_eq!(online["d"]["user"]["id"], "100000000000000001");
    assert_eq!(online["d"]["guild_id"], LOUNGE_ID);
    assert_eq!(online["d"]["status"], "online");

    alice.close().await.unwrap();
    let offline = bob.expect_event("PRESENCE_UPDATE").await.unwrap();
    assert_eq!(offline["d"]["status"], "offline");
}

#[tokio::test]
async fn test_status_update_reaches_guild() {
    let server = TestServer::start().await.unwrap();
    let (mut bob, _) = server.identify(BOB_TOKEN).await.unwrap();
    let (mut alice, _) = server.identify(ALICE_TOKEN).await.unwrap();
    bob.expect_event("PRESENCE_UPDATE").await.unwrap();

    alice
        .send(3, json!({"status": "dnd", "afk": false, "game": {"name": "chess", "type": 0}}))
        .await
        .unwrap();
    let update = bob.expect_event("PRESENCE_UPDATE").await.unwrap();
    assert_eq!(update["d"]["status"], "dnd");
    assert_eq!(update["d"]["game"]["name"], "chess");
}

#[tokio::test]
async fn test_resume_replays_missed_events() {
    let server = TestServer::start().await.unwrap();
    let (mut bob, _) = server.identify(BOB_TOKEN).await.unwrap();
    let (alice, ready) = server.identify(ALICE_TOKEN).await.unwrap();
    let session_id = ready["d"]["session_id"].as_str().unwrap().to_string();
    bob.expect_event("PRESENCE_UPDATE").await.unwrap();

    alice.close().await.unwrap();
    let state = server.state.clone();
    wait_until(|| state.presence().global(ALICE_ID).status.is_offline()).await;
    bob.expect_event("PRESENCE_UPDATE").await.unwrap();

    // missed while detached; bob sees his own update once per guild
    bob.send(3, json!({"status": "idle", "afk": false})).await.unwrap();
    bob.expect_event("PRESENCE_UPDATE").await.unwrap();
    bob.expect_event("PRESENCE_UPDATE").await.unwrap();

    let mut resumed = server.connect().await.unwrap();
    resumed
        .send(6, json!({"token": ALICE_TOKEN, "session_id": session_id, "seq": 1}))
        .await
        .unwrap();

    let replace = resumed.expect_event("PRESENCES_REPLACE").await.unwrap();
    let presences = replace["d"].as_array().unwrap();
    assert_eq!(presences.len(), 2);
    assert!(presences
        .iter()
        .any(|p| p["user"]["id"] == "100000000000000002" && p["status"] == "idle"));
    assert_eq!(replace["s"], 4);

    let done = resumed.expect_event("RESUMED").await.unwrap();
    assert_eq!(done["s"], 5);

    // back online for everyone, including the resumed session itself
    let online = resumed.expect_event("PRESENCE_UPDATE").await.unwrap();
    assert_eq!(online["d"]["status"], "online");
    assert_eq!(online["s"], 6);
    let seen = bob.expect_event("PRESENCE_UPDATE").await.unwrap();
    assert_eq!(seen["d"]["status"], "online");
}

#[tokio::test]
async fn test_resume_takes_over_live_connection() {
    let server = TestServer::start().await.unwrap();
    let (mut zombie, ready) = server.identify(ALICE_TOKEN).await.unwrap();
    let session_id = ready["d"]["session_id"].as_str().unwrap().to_string();

    let mut fresh = server.connect().await.unwrap();
    fresh
        .send(6, json!({"token": ALICE_TOKEN, "session_id": session_id, "seq": 1}))
        .await
        .unwrap();
    let resumed = fresh.expect_event("RESUMED").await.unwrap();
    assert_eq!(resumed["s"], 2);

    assert_eq!(zombie.expect_close().await.unwrap(), Some(4000));

    // the session survives the old connection's cleanup
    fresh.send(1, json!(2)).await.unwrap();
    assert_eq!(fresh.expect_message().await.unwrap()["op"], 11);
    assert!(server.state.registry().is_online(ALICE_ID));
}

#[tokio::test]
async fn test_resume_with_wrong_token_is_invalid() {
    let server = TestServer::start().await.unwrap();
    let (_alice, ready) = server.identify(ALICE_TOKEN).await.unwrap();
    let session_id = ready["d"]["session_id"].as_str().unwrap().to_string();

    let mut intruder = server.connect().await.unwrap();
    intruder
        .send(6, json!({"token": BOB_TOKEN, "session_id": session_id, "seq": 1}))
        .await
        .unwrap();

    let invalid = intruder.expect_message().await.unwrap();
    assert_eq!(invalid["op"], 9);
    assert_eq!(invalid["d"], false);
    assert_eq!(intruder.expect_close().await.unwrap(), Some(4000));
    // a token mismatch leaves the session alone
    assert!(server.state.registry().get(&session_id).is_some());
}

#[tokio::test]
async fn test_resume_ahead_of_server_is_invalid_sequence() {
    let server = TestServer::start().await.unwrap();
    let (mut alice, ready) = server.identify(ALICE_TOKEN).await.unwrap();
    let session_id = ready["d"]["session_id"].as_str().unwrap().to_string();

    let mut client = server.connect().await.unwrap();
    client
        .send(6, json!({"token": ALICE_TOKEN, "session_id": session_id, "seq": 50}))
        .await
        .unwrap();
    let invalid = client.expect_message().await.unwrap();
    assert_eq!(invalid["op"], 9);
    assert_eq!(invalid["d"], false);
    assert_eq!(client.expect_close().await.unwrap(), Some(4007));

    // the session is gone and its holder is closed
    assert!(server.state.registry().get(&session_id).is_none());
    assert_eq!(alice.expect_close().await.unwrap(), Some(4000));
}

#[tokio::test]
async fn test_expired_session_cannot_resume() {
    let mut config = test_config();
    config.session.resume_window_secs = 0;
    config.session.janitor_interval_secs = 1;
    let server = TestServer::start_with_config(config).await.unwrap();

    let (alice, ready) = server.identify(ALICE_TOKEN).await.unwrap();
    let session_id = ready["d"]["session_id"].as_str().unwrap().to_string();
    alice.close().await.unwrap();

    let state = server.state.clone();
    let id = session_id.clone();
    for _ in 0..300 {
        if state.registry().get(&id).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(state.registry().get(&session_id).is_none());

    let mut client = server.connect().await.unwrap();
    client
        .send(6, json!({"token": ALICE_TOKEN, "session_id": session_id, "seq": 1}))
        .await
        .unwrap();
    assert_eq!(client.expect_message().await.unwrap()["op"], 9);
    assert_eq!(client.expect_close().await.unwrap(), Some(4000));
}

#[tokio::test]
async fn test_request_guild_members() {
    let server = TestServer::start().await.unwrap();
    let (mut client, _) = server.identify(ALICE_TOKEN).await.unwrap();

    client
        .send(8, json!({"guild_id": LOUNGE_ID, "query": "", "limit": 2}))
        .await
        .unwrap();
    let chunk = client.expect_event("GUILD_MEMBERS_CHUNK").await.unwrap();
    assert_eq!(chunk["d"]["guild_id"], LOUNGE_ID);
    assert_eq!(chunk["d"]["members"].as_array().unwrap().len(), 2);

    client
        .send(8, json!({"guild_id": LOUNGE_ID, "query": "car", "limit": 0}))
        .await
        .unwrap();
    let chunk = client.expect_event("GUILD_MEMBERS_CHUNK").await.unwrap();
    let members = chunk["d"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user"]["username"], "carol");
}

#[tokio::test]
async fn test_guild_sync() {
    let server = TestServer::start().await.unwrap();
    let (mut client, _) = server.identify(ALICE_TOKEN).await.unwrap();

    // the second guild is not alice's and is skipped
    client
        .send(12, json!([LOUNGE_ID, "200000000000000002"]))
        .await
        .unwrap();
    let sync = client.expect_event("GUILD_SYNC").await.unwrap();
    assert_eq!(sync["d"]["id"], LOUNGE_ID);
    assert_eq!(sync["d"]["members"].as_array().unwrap().len(), 1);

    // nothing else was queued before the ack
    client.send(1, Value::Null).await.unwrap();
    assert_eq!(client.expect_message().await.unwrap()["op"], 11);
}

#[tokio::test]
async fn test_disconnect_detaches_session() {
    let server = TestServer::start().await.unwrap();
    let (client, _) = server.identify(ALICE_TOKEN).await.unwrap();
    client.close().await.unwrap();

    let state = server.state.clone();
    wait_until(|| !state.registry().is_online(ALICE_ID)).await;
    // detached, still resumable
    assert_eq!(state.registry().len(), 1);
}
