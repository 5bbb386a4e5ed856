// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Integration tests for the connection manager over a scripted transport.
//!
//! Timing-sensitive behavior (heartbeats, backoff schedule) runs under
//! tokio's paused clock, so every assertion is deterministic.

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{FakeTransport, RecordingSink, Scripted, init_logging, settle};
use serde_json::json;
use tidelink_client::{
    ClientError, ConnectOptions, ConnectionManager, ConnectionState, CredentialKind,
    CredentialStore, EventKind, FocusState, ManagerConfig, MemoryCredentials,
};
use tidelink_network::NetworkError;

fn manager_over(
    transport: Arc<FakeTransport>,
) -> (ConnectionManager, Arc<MemoryCredentials>, Arc<RecordingSink>) {
    let credentials = Arc::new(MemoryCredentials::new());
    let sink = Arc::new(RecordingSink::default());
    let manager = ConnectionManager::with_parts(
        ManagerConfig::default(),
        credentials.clone(),
        transport,
        sink.clone(),
    );
    (manager, credentials, sink)
}

fn counting(counter: Arc<AtomicUsize>) -> tidelink_client::MessageHandler {
    Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn open_connection_heartbeats_every_25s() {
    init_logging();
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    let connection = manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    assert_eq!(connection.state, ConnectionState::Open);

    tokio::time::sleep(Duration::from_millis(75_000)).await;
    settle().await;

    let sent = transport.session(0).drain_texts();
    assert_eq!(sent, vec![r#"{"type":4}"#; 3]);

    let status = manager.status("room1").unwrap();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn abrupt_close_follows_backoff_schedule() {
    let transport = FakeTransport::scripted([Scripted::Open, Scripted::Fail, Scripted::Fail]);
    let (manager, _, _) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();

    transport
        .session(0)
        .close(Some(NetworkError::Stream("abrupt".to_string())));
    settle().await;
    assert_eq!(
        manager.status("room1").unwrap().state,
        ConnectionState::ReconnectPending
    );

    // Attempt 1 fires 1000ms after the drop, attempt 2 another 2000ms later.
    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(transport.open_count(), 2);
    tokio::time::sleep(Duration::from_millis(2_050)).await;
    assert_eq!(transport.open_count(), 3);

    let times = transport.open_times();
    assert_eq!(times[1] - times[0], Duration::from_millis(1_000));
    assert_eq!(times[2] - times[1], Duration::from_millis(2_000));
}

#[tokio::test(start_paused = true)]
async fn retries_exhaust_after_five_attempts() {
    let transport = FakeTransport::scripted([
        Scripted::Open,
        Scripted::Fail,
        Scripted::Fail,
        Scripted::Fail,
        Scripted::Fail,
        Scripted::Fail,
    ]);
    let (manager, _, _) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    transport.session(0).close(None);

    // Full schedule: 1s + 2s + 4s + 8s + 10s = 25s.
    tokio::time::sleep(Duration::from_millis(30_000)).await;
    settle().await;

    assert_eq!(transport.open_count(), 6);
    let status = manager.status("room1").unwrap();
    assert_eq!(status.state, ConnectionState::Closed);
    assert_eq!(status.reconnect_attempts, 5);

    // No sixth attempt is ever scheduled.
    tokio::time::sleep(Duration::from_millis(60_000)).await;
    assert_eq!(transport.open_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn close_during_reconnect_pending_cancels_timer() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    transport.session(0).close(None);
    settle().await;

    manager.close("room1");

    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.open_count(), 1);
    assert!(manager.status("room1").is_none());

    // Idempotent: closing again is a no-op.
    manager.close("room1");
}

#[tokio::test(start_paused = true)]
async fn duplicate_concurrent_connect_is_rejected() {
    let transport = FakeTransport::scripted([Scripted::Hang]);
    let (manager, _, _) = manager_over(transport.clone());

    let racing = manager.clone();
    let first = tokio::spawn(async move {
        racing
            .connect("room1", "ws://host/chat", ConnectOptions::default())
            .await
    });
    settle().await;

    let second = manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await;
    assert!(matches!(second, Err(ClientError::AlreadyConnecting(_))));
    assert_eq!(transport.open_count(), 1);

    first.abort();
}

#[tokio::test(start_paused = true)]
async fn connect_on_open_id_reuses_session() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    let reused = manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();

    assert_eq!(reused.state, ConnectionState::Open);
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn credential_is_reresolved_on_each_attempt() {
    let transport = FakeTransport::scripted([]);
    let (manager, credentials, _) = manager_over(transport.clone());
    credentials.set(CredentialKind::ApiKey, "key-1");

    let options = ConnectOptions {
        credential: Some(CredentialKind::ApiKey),
        params: vec![("room".to_string(), "r1".to_string())],
        ..Default::default()
    };
    manager
        .connect("room1", "ws://host/chat", options)
        .await
        .unwrap();
    assert_eq!(
        transport.open_urls()[0],
        "ws://host/chat?apiKey=key-1&room=r1"
    );

    // Token rotates while the connection is down; the retry must embed the
    // fresh value.
    credentials.set(CredentialKind::ApiKey, "key-2");
    transport.session(0).close(None);
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    assert_eq!(transport.open_count(), 2);
    assert!(transport.open_urls()[1].contains("apiKey=key-2"));
}

#[tokio::test(start_paused = true)]
async fn missing_credential_refuses_to_open() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    let options = ConnectOptions {
        credential: Some(CredentialKind::ApiKey),
        ..Default::default()
    };
    let result = manager.connect("room1", "ws://host/chat", options).await;

    assert!(matches!(result, Err(ClientError::MissingCredential(_))));
    assert_eq!(transport.open_count(), 0);
    assert_eq!(manager.status("room1").unwrap().state, ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_clears_credential_without_retry() {
    let transport = FakeTransport::scripted([Scripted::FailAuth]);
    let (manager, credentials, _) = manager_over(transport.clone());
    credentials.set(CredentialKind::ApiKey, "stale");

    let options = ConnectOptions {
        credential: Some(CredentialKind::ApiKey),
        ..Default::default()
    };
    let result = manager.connect("room1", "ws://host/chat", options).await;

    assert!(matches!(result, Err(ref e) if e.is_auth()));
    assert_eq!(credentials.get(CredentialKind::ApiKey), None);

    tokio::time::sleep(Duration::from_millis(30_000)).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.status("room1").unwrap().state, ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn identify_payload_is_first_on_the_wire() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    let options = ConnectOptions {
        identify: Some(json!({ "userName": "ada" })),
        ..Default::default()
    };
    manager
        .connect("room1", "ws://host/chat", options)
        .await
        .unwrap();
    manager.send("room1", r#"{"content":"hello"}"#);
    settle().await;

    let sent = transport.session(0).drain_texts();
    assert_eq!(sent.len(), 2);
    let first: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(first["type"], 1);
    assert_eq!(first["data"]["userName"], "ada");
    assert_eq!(sent[1], r#"{"content":"hello"}"#);
}

#[tokio::test(start_paused = true)]
async fn send_on_absent_connection_is_logged_noop() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport);
    manager.send("ghost", "payload");
}

#[tokio::test(start_paused = true)]
async fn pause_suppresses_chat_but_not_wallet_traffic() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());
    let count = Arc::new(AtomicUsize::new(0));
    manager.subscribe(EventKind::Message, None, counting(count.clone()));

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    let session = transport.session(0);

    manager.pause_delivery("room1");
    session.frame(r#"{"type":"msg","data":{"content":"hidden"}}"#);
    session.frame(r#"{"type":"wallets","data":{"balance":3}}"#);
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    manager.resume_delivery("room1");
    session.frame(r#"{"type":"msg","data":{"content":"visible"}}"#);
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_dropped_silently() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());
    let count = Arc::new(AtomicUsize::new(0));
    manager.subscribe(EventKind::Message, None, counting(count.clone()));

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    transport.session(0).frame("{definitely not json");
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(
        manager.status("room1").unwrap().state,
        ConnectionState::Open
    );
}

#[tokio::test(start_paused = true)]
async fn blurred_surface_raises_notifications() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, sink) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    manager.set_focus("room1", FocusState::Blurred);

    let session = transport.session(0);
    session.frame(r#"{"type":"msg","data":{"content":"one"}}"#);
    session.frame(r#"{"type":"msg","data":{"content":"two"}}"#);
    settle().await;

    // The second notification replaced the first.
    assert_eq!(sink.raised.lock().unwrap().len(), 2);
    assert_eq!(sink.cancelled.lock().unwrap().len(), 1);

    manager.set_focus("room1", FocusState::Focused);
    session.frame(r#"{"type":"msg","data":{"content":"three"}}"#);
    settle().await;
    assert_eq!(sink.raised.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn close_all_tears_down_every_connection() {
    let transport = FakeTransport::scripted([]);
    let (manager, _, _) = manager_over(transport.clone());

    manager
        .connect("room1", "ws://host/chat", ConnectOptions::default())
        .await
        .unwrap();
    manager
        .connect("room2", "ws://host/wallet", ConnectOptions::default())
        .await
        .unwrap();

    manager.close_all();

    assert!(manager.status("room1").is_none());
    assert!(manager.status("room2").is_none());

    // No reconnects fire for manually closed connections.
    tokio::time::sleep(Duration::from_millis(20_000)).await;
    assert_eq!(transport.open_count(), 2);
}
