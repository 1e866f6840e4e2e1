//! Two peers and a monitor over real sockets on localhost.

use std::time::Duration;

use duet::prelude::*;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn free_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn builder(role: Role, x_addr: &str, o_addr: &str) -> PeerBuilder {
    Peer::builder()
        .role(role)
        .endpoint(Role::X, x_addr)
        .endpoint(Role::O, o_addr)
        .sync_timeout(Duration::from_millis(500))
        .reconnect_interval(Duration::from_millis(20))
}

async fn event(handle: &mut PeerHandle) -> PeerEvent {
    timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("timed out waiting for an event")
        .expect("peer stopped")
}

async fn play(mover: &mut PeerHandle, other: &mut PeerHandle, text: &str) {
    mover.submit(text).await.unwrap();
    assert!(matches!(event(other).await, PeerEvent::CellMarked { .. }));
    assert!(matches!(event(mover).await, PeerEvent::CellMarked { .. }));
}

#[tokio::test]
async fn test_game_over_websockets_with_monitor() {
    let (x_addr, o_addr) = (free_port(), free_port());

    let mut x = builder(Role::X, &x_addr, &o_addr)
        .connect()
        .await
        .unwrap()
        .spawn();
    let mut o = builder(Role::O, &x_addr, &o_addr)
        .connect()
        .await
        .unwrap()
        .spawn();

    let config = builder(Role::X, &x_addr, &o_addr).config().clone();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();
    let monitor = tokio::spawn(async move { Monitor::new().run(&config, monitor_tx).await });

    assert!(matches!(event(&mut x).await, PeerEvent::Synchronized { .. }));
    assert!(matches!(event(&mut o).await, PeerEvent::Synchronized { .. }));
    // Let every subscription attach before the first move.
    tokio::time::sleep(Duration::from_millis(200)).await;

    play(&mut x, &mut o, "0,0").await;
    play(&mut o, &mut x, "1,0").await;
    play(&mut x, &mut o, "1,1").await;
    play(&mut o, &mut x, "2,0").await;

    x.submit("2,2").await.unwrap();
    let won = PeerEvent::Finished(Outcome::Winner(Role::X));
    event(&mut o).await;
    assert_eq!(event(&mut o).await, won);
    event(&mut x).await;
    assert_eq!(event(&mut x).await, won);
    assert_eq!(x.board(), o.board());

    let outcome = timeout(Duration::from_secs(5), monitor)
        .await
        .expect("monitor did not finish")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Some(Outcome::Winner(Role::X)));

    let mut marked = 0;
    while let Ok(event) = monitor_rx.try_recv() {
        if matches!(event, PeerEvent::CellMarked { .. }) {
            marked += 1;
        }
    }
    assert_eq!(marked, 5);

    x.join().await;
    o.join().await;
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let x_addr = free_port();
    let held = tokio::net::TcpListener::bind(&x_addr).await.unwrap();

    let result = builder(Role::X, &x_addr, &free_port()).connect().await;
    assert!(matches!(
        result,
        Err(DuetError::Transport(duet::transport::TransportError::BindFailed(_)))
    ));
    drop(held);
}

#[tokio::test]
async fn test_opponent_publisher_closing_disconnects() {
    let (x_addr, o_addr) = (free_port(), free_port());
    let opponent = duet::transport::Publisher::bind(&o_addr).await.unwrap();

    let mut x = builder(Role::X, &x_addr, &o_addr)
        .connect()
        .await
        .unwrap()
        .spawn();
    for _ in 0..100 {
        if opponent.subscriber_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(opponent.subscriber_count(), 1);

    opponent.close();
    let reason = loop {
        if let PeerEvent::Disconnected { reason } = event(&mut x).await {
            break reason;
        }
    };
    assert!(reason.contains("connection closed"), "{reason}");
    assert!(o_addr.ends_with(reason.rsplit(':').next().unwrap()));

    x.join().await;
}

#[tokio::test]
async fn test_monitor_ends_quietly_when_both_publishers_close() {
    let (x_addr, o_addr) = (free_port(), free_port());
    let x_pub = duet::transport::Publisher::bind(&x_addr).await.unwrap();
    let o_pub = duet::transport::Publisher::bind(&o_addr).await.unwrap();

    let config = builder(Role::X, &x_addr, &o_addr).config().clone();
    let (tx, _rx) = mpsc::unbounded_channel();
    let monitor = tokio::spawn(async move { Monitor::new().run(&config, tx).await });
    for _ in 0..100 {
        if x_pub.subscriber_count() > 0 && o_pub.subscriber_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    x_pub.close();
    o_pub.close();
    let outcome = timeout(Duration::from_secs(5), monitor)
        .await
        .expect("monitor did not stop")
        .unwrap();
    assert!(matches!(outcome, Ok(None)));
}
