// Unit tests for the in-process bus
// Tests fan-out order, own-frame suppression, and detaching

use crate::transport::LocalBus;

use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

/// More frames than any fixed-size ring would hold for a reader that is not reading.
const BURST: usize = 5000;

/// **VALUE**: Verifies a reader that falls far behind still gets every frame.
///
/// **WHY THIS MATTERS**: A request that is skipped never gets a response, and a
/// skipped commit leaves a replica out of step with the canonical store.
///
/// **BUG THIS CATCHES**: Would catch:
/// - A bounded bus dropping the oldest frames once a reader lags
/// - Frames reordered between publisher and reader
/// - The publisher receiving its own frames back
#[tokio::test]
async fn given_idle_reader_when_burst_published_then_every_frame_arrives_in_order() {
    // GIVEN: A publisher and a reader that does not read yet
    let bus = LocalBus::new();
    let (publisher, mut own) = bus.connect().split();
    let (_reader_tx, mut reader) = bus.connect().split();

    // WHEN: The publisher sends a burst and the bus has time to fan it out
    for n in 0..BURST {
        publisher.send(n.to_string()).expect("send");
    }
    tokio::time::sleep(QUIET).await;

    // THEN: The reader gets all of it, in order
    for n in 0..BURST {
        let frame = tokio::time::timeout(WAIT, reader.recv())
            .await
            .expect("reader timed out")
            .expect("bus open")
            .expect("no transport error");
        assert_eq!(frame, n.to_string());
    }

    // THEN: Nothing came back to the publisher
    assert!(tokio::time::timeout(QUIET, own.recv()).await.is_err());
}

/// **VALUE**: Verifies a dropped participant stops counting as a peer.
///
/// **BUG THIS CATCHES**: Would catch closed queues staying on the bus forever and
/// every later publish paying for them.
#[tokio::test]
async fn given_dropped_channel_when_peer_count_then_participant_is_gone() {
    let bus = LocalBus::new();
    let kept = bus.connect();
    let dropped = bus.connect();
    assert_eq!(bus.peer_count(), 2);

    drop(dropped);

    let deadline = tokio::time::Instant::now() + WAIT;
    while bus.peer_count() != 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bus.peer_count(), 1);
    drop(kept);
}
