//! Peers against a real broker on an ephemeral port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use framecast_client::{
    ClientOptions, ConnectionState, LifecycleHooks, PeerClient, ReconnectPolicy, SendOptions,
};
use framecast_core::{NotificationRecord, NotificationType};
use framecast_server::auth::AppRegistry;
use framecast_server::metrics::detached_handle;
use framecast_server::{Broker, FramecastServer, ServerConfig, ServerHandle};
use framecast_settings::AppPermission;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

async fn start_on(port: u16) -> (FramecastServer, ServerHandle) {
    start_with(port, None).await
}

async fn start_with(port: u16, apps: Option<AppRegistry>) -> (FramecastServer, ServerHandle) {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    let broker = Arc::new(Broker::new(config.history_capacity).with_app_registry(apps));
    let server = FramecastServer::new(config, broker, detached_handle());
    let handle = server.listen().await.unwrap();
    (server, handle)
}

fn options(handle: &ServerHandle) -> ClientOptions {
    ClientOptions {
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_attempts: None,
            ..ReconnectPolicy::default()
        },
        ..ClientOptions::new(format!("http://127.0.0.1:{}", handle.port()))
    }
}

async fn connected(app_id: &str, opts: ClientOptions, hooks: LifecycleHooks) -> PeerClient {
    let client = PeerClient::init(app_id, opts, hooks).unwrap();
    assert!(
        client.wait_for_state(ConnectionState::Connected, WAIT).await,
        "{app_id} did not connect"
    );
    client
}

fn channel_listener(client: &PeerClient) -> mpsc::UnboundedReceiver<NotificationRecord> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _disposer = client.on_notification(move |record| {
        let _ = tx.send(record.clone());
    });
    rx
}

async fn next_titled(
    rx: &mut mpsc::UnboundedReceiver<NotificationRecord>,
    title: &str,
) -> NotificationRecord {
    tokio::time::timeout(WAIT, async {
        loop {
            let record = rx.recv().await.expect("listener channel closed");
            if record.title == title {
                return record;
            }
        }
    })
    .await
    .expect("notification not delivered")
}

#[tokio::test]
async fn order_placed_reaches_every_peer() {
    let (server, handle) = start_on(0).await;
    let a = connected("appA", options(&handle), LifecycleHooks::new()).await;
    let b = connected("appB", options(&handle), LifecycleHooks::new()).await;
    let c = connected("appC", options(&handle), LifecycleHooks::new()).await;
    let mut b_rx = channel_listener(&b);
    let mut c_rx = channel_listener(&c);

    let sent = a
        .send_notification(
            "Order Placed",
            "Order #100",
            "success",
            SendOptions {
                source_id: Some("100".into()),
                ..SendOptions::default()
            },
        )
        .await
        .expect("publish failed");
    assert_eq!(sent.title, "Order Placed");
    assert_eq!(sent.kind, NotificationType::Success);
    assert_eq!(sent.source, "appA");
    assert_eq!(sent.source_id, "100");

    let at_b = next_titled(&mut b_rx, "Order Placed").await;
    let at_c = next_titled(&mut c_rx, "Order Placed").await;
    assert_eq!(at_b.id, sent.id);
    assert_eq!(at_c.id, sent.id);
    assert_eq!(b.unread_count(), 1);

    assert_eq!(server.broker().history_len(), 1);
    let history = a.fetch_history().await.unwrap();
    assert_eq!(history[0].id, sent.id);

    for client in [&a, &b, &c] {
        client.disconnect().await;
    }
    server.shutdown(handle).await;
}

#[tokio::test]
async fn late_peer_gets_history_replay() {
    let (server, handle) = start_on(0).await;
    let a = connected("appA", options(&handle), LifecycleHooks::new()).await;
    for title in ["first", "second"] {
        let _ = a
            .send_notification(title, "d", "info", SendOptions::default())
            .await
            .unwrap();
    }

    let late = PeerClient::init(
        "appLate",
        ClientOptions {
            auto_connect: false,
            ..options(&handle)
        },
        LifecycleHooks::new(),
    )
    .unwrap();
    let mut rx = channel_listener(&late);
    late.connect().unwrap();

    assert_eq!(next_titled(&mut rx, "first").await.title, "first");
    assert_eq!(next_titled(&mut rx, "second").await.title, "second");
    let titles: Vec<_> = late.notifications().into_iter().map(|e| e.record.title).collect();
    assert_eq!(titles, ["second", "first"]);

    a.disconnect().await;
    late.disconnect().await;
    server.shutdown(handle).await;
}

#[tokio::test]
async fn peer_reconnects_after_broker_restart() {
    let (server, handle) = start_on(0).await;
    let port = handle.port();

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();
    let (drop_tx, mut drop_rx) = mpsc::unbounded_channel();
    let hooks = LifecycleHooks::new()
        .on_connect(move || {
            let _ = conn_tx.send(());
        })
        .on_disconnect(move || {
            let _ = drop_tx.send(());
        });
    let client = PeerClient::init("appA", options(&handle), hooks).unwrap();
    tokio::time::timeout(WAIT, conn_rx.recv()).await.unwrap().unwrap();

    server.shutdown(handle).await;
    tokio::time::timeout(WAIT, drop_rx.recv()).await.unwrap().unwrap();

    let (server, handle) = start_on(port).await;
    tokio::time::timeout(WAIT, conn_rx.recv()).await.unwrap().unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let record = client
        .send_notification("after restart", "d", "info", SendOptions::default())
        .await
        .unwrap();
    assert_eq!(record.source, "appA");
    assert_eq!(server.broker().history_len(), 1);

    client.disconnect().await;
    server.shutdown(handle).await;
}

#[tokio::test]
async fn disposed_listener_stops_receiving() {
    let (server, handle) = start_on(0).await;
    let a = connected("appA", options(&handle), LifecycleHooks::new()).await;
    let b = connected("appB", options(&handle), LifecycleHooks::new()).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let disposer = b.on_notification(move |r| {
        let _ = tx.send(r.title.clone());
    });
    let mut keep = channel_listener(&b);

    let _ = a.send_notification("one", "d", "info", SendOptions::default()).await.unwrap();
    let _ = next_titled(&mut keep, "one").await;
    assert_eq!(rx.recv().await.as_deref(), Some("one"));

    assert!(disposer.dispose());
    let _ = a.send_notification("two", "d", "info", SendOptions::default()).await.unwrap();
    let _ = next_titled(&mut keep, "two").await;
    assert!(rx.try_recv().is_err());

    a.disconnect().await;
    b.disconnect().await;
    server.shutdown(handle).await;
}

#[tokio::test]
async fn rejected_key_exhausts_reconnects_and_falls_back() {
    let mut apps = AppRegistry::new();
    apps.insert(
        "good-key",
        "appA",
        vec![AppPermission::Publish, AppPermission::Subscribe],
    );
    let (server, handle) = start_with(0, Some(apps)).await;

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let hooks = LifecycleHooks::new().on_connect(move || {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    });
    let opts = ClientOptions {
        api_key: Some("bad-key".into()),
        fallback_mode: true,
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(40),
            max_attempts: Some(2),
            ..ReconnectPolicy::default()
        },
        ..options(&handle)
    };
    let client = PeerClient::init("appA", opts, hooks).unwrap();

    let deadline = tokio::time::Instant::now() + WAIT;
    while !client.is_polling() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(client.is_polling(), "client never fell back to polling");
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_ne!(client.state(), ConnectionState::Connected);

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let hooks = LifecycleHooks::new().on_connect(move || {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    });
    let opts = ClientOptions {
        api_key: Some("good-key".into()),
        ..options(&handle)
    };
    let accepted = connected("appA", opts, hooks).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert!(!accepted.is_polling());

    client.disconnect().await;
    accepted.disconnect().await;
    server.shutdown(handle).await;
}
