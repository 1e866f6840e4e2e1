//! Integration tests for the WebSocket pub/sub transport.
//!
//! These spin up a real publisher on a random local port and attach
//! subscribers to it, so frames actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use duet_transport::{Frame, Publisher, Subscriber};

    const RETRY: Duration = Duration::from_millis(10);

    async fn recv_within(sub: &mut Subscriber) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("recv should not error")
    }

    /// Subscriber sessions start in a spawned task on the publisher side,
    /// so give the fan-out a moment to register the new receiver.
    async fn wait_for_subscribers(publisher: &Publisher, n: usize) {
        for _ in 0..100 {
            if publisher.subscriber_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscribers never attached");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let publisher = Publisher::bind("127.0.0.1:0").await.expect("should bind");
        let addr = publisher.local_addr().to_string();

        let mut sub = Subscriber::connect(&addr, Vec::new(), RETRY).await;
        wait_for_subscribers(&publisher, 1).await;

        publisher.publish(&Frame::new("X", "1,1")).unwrap();
        publisher.publish(&Frame::new("ok", "1,1")).unwrap();

        assert_eq!(recv_within(&mut sub).await, Some(Frame::new("X", "1,1")));
        assert_eq!(recv_within(&mut sub).await, Some(Frame::new("ok", "1,1")));
    }

    #[tokio::test]
    async fn test_subscriber_filters_topics() {
        let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
        let addr = publisher.local_addr().to_string();

        let mut sub = Subscriber::connect(&addr, vec!["end".to_string()], RETRY).await;
        wait_for_subscribers(&publisher, 1).await;

        publisher.publish(&Frame::new("X", "0,0")).unwrap();
        publisher.publish(&Frame::new("error", "It is not your turn")).unwrap();
        publisher.publish(&Frame::new("end", "Draw")).unwrap();

        let frame = recv_within(&mut sub).await.unwrap();
        assert_eq!(frame.topic, "end");
        assert_eq!(frame.payload, b"Draw");
    }

    #[tokio::test]
    async fn test_fanout_to_every_subscriber() {
        let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
        let addr = publisher.local_addr().to_string();

        let mut a = Subscriber::connect(&addr, Vec::new(), RETRY).await;
        let mut b = Subscriber::connect(&addr, Vec::new(), RETRY).await;
        wait_for_subscribers(&publisher, 2).await;

        publisher.publish(&Frame::new("O", "2,2")).unwrap();

        assert_eq!(recv_within(&mut a).await, Some(Frame::new("O", "2,2")));
        assert_eq!(recv_within(&mut b).await, Some(Frame::new("O", "2,2")));
    }

    #[tokio::test]
    async fn test_subscriber_retries_until_publisher_binds() {
        // Reserve a free port, release it, then bind the publisher late.
        let spare = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = spare.local_addr().unwrap().to_string();
        drop(spare);

        let connecting = {
            let addr = addr.clone();
            tokio::spawn(async move { Subscriber::connect(&addr, Vec::new(), RETRY).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let publisher = Publisher::bind(&addr).await.expect("port should still be free");
        let mut sub = tokio::time::timeout(Duration::from_secs(5), connecting)
            .await
            .expect("subscriber should connect once publisher is up")
            .unwrap();
        assert_eq!(sub.remote(), addr);
        wait_for_subscribers(&publisher, 1).await;

        publisher.publish(&Frame::new("state_request", "O")).unwrap();
        assert_eq!(
            recv_within(&mut sub).await,
            Some(Frame::new("state_request", "O"))
        );
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_publisher_closes() {
        let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
        let addr = publisher.local_addr().to_string();

        let mut sub = Subscriber::connect(&addr, Vec::new(), RETRY).await;
        wait_for_subscribers(&publisher, 1).await;

        publisher.close();

        assert_eq!(recv_within(&mut sub).await, None);
        assert!(publisher.publish(&Frame::new("X", "0,0")).is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let publisher = Publisher::bind("127.0.0.1:0").await.unwrap();
        assert_eq!(publisher.subscriber_count(), 0);
        publisher
            .publish(&Frame::new("state_request", "X"))
            .expect("publishing into the void is not an error");
    }
}
