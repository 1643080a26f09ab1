use std::{
    io,
    net::UdpSocket,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use statsd_client::{DeliveryError, Endpoint, ErrorHandler, StatsdClient, Transport, WireLine};

const WAIT: Duration = Duration::from_secs(5);

/// Transport that records every line it is asked to send.
#[derive(Clone, Default)]
struct Recording {
    sent: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl Transport for Recording {
    fn send(&self, line: &str) -> io::Result<()> {
        self.sent.lock().push(line.to_string());
        Ok(())
    }
}

/// Transport that announces each line, then blocks until the gate is opened or closed.
#[derive(Clone)]
struct Gated {
    entered: Sender<String>,
    gate: Receiver<()>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Gated {
    fn new() -> (Self, Receiver<String>, Sender<()>) {
        let (entered, entered_rx) = unbounded();
        let (gate_tx, gate) = bounded(0);
        (Gated { entered, gate, sent: Arc::default() }, entered_rx, gate_tx)
    }
}

impl Transport for Gated {
    fn send(&self, line: &str) -> io::Result<()> {
        let _ = self.entered.send(line.to_string());
        let _ = self.gate.recv();
        self.sent.lock().push(line.to_string());
        Ok(())
    }
}

/// Transport whose every send fails.
#[derive(Clone, Default)]
struct Failing {
    attempts: Arc<AtomicUsize>,
}

impl Transport for Failing {
    fn send(&self, _: &str) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

/// Error handler that counts each kind of failure.
#[derive(Clone, Default)]
struct Counting {
    queue_full: Arc<AtomicUsize>,
    enqueue_failed: Arc<AtomicUsize>,
    send_failed: Arc<AtomicUsize>,
}

impl ErrorHandler for Counting {
    fn handle_error(&self, error: &DeliveryError, _: &WireLine, _: &Endpoint) {
        let counter = match error {
            DeliveryError::QueueFull => &self.queue_full,
            DeliveryError::EnqueueFailed => &self.enqueue_failed,
            DeliveryError::SendFailed(_) => &self.send_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn synchronous_send_happens_before_return() {
    let transport = Recording::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_transport(transport.clone())
        .build()
        .expect("failed to build client");

    assert!(client.incr("x"));
    assert_eq!(transport.sent(), vec!["x:1|c"]);
}

#[test]
fn synchronous_full_rate_emits_one_unsuffixed_line_each() {
    let transport = Recording::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_transport(transport.clone())
        .build()
        .expect("failed to build client");

    for rate in [1.0, 1.01, 10.0] {
        assert!(client.count_sampled("full", 1, rate));
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|line| line == "full:1|c"));
}

#[test]
fn sampled_out_emissions_touch_nothing() {
    let transport = Recording::default();
    let handler = Counting::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_transport(transport.clone())
        .with_error_handler(handler.clone())
        .build()
        .expect("failed to build client");

    let accepted = (0..10_000).filter(|_| client.count_sampled("rare", 1, 0.01)).count();

    assert_eq!(transport.sent().len(), accepted);
    assert!(transport.sent().iter().all(|line| line == "rare:1|c|@0.010000"));
    assert_eq!(handler.queue_full.load(Ordering::SeqCst), 0);
    assert_eq!(handler.send_failed.load(Ordering::SeqCst), 0);
}

#[test]
fn synchronous_send_failures_are_reported_once_each() {
    let handler = Counting::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_transport(Failing::default())
        .with_error_handler(handler.clone())
        .build()
        .expect("failed to build client");

    for expected in 1..=3 {
        assert!(!client.incr("lost"));
        assert_eq!(handler.send_failed.load(Ordering::SeqCst), expected);
    }
    assert_eq!(handler.enqueue_failed.load(Ordering::SeqCst), 0);
    assert_eq!(handler.queue_full.load(Ordering::SeqCst), 0);
}

#[test]
fn queued_send_failures_are_reported_once_each() {
    const LINES: usize = 5;

    init_tracing();
    let transport = Failing::default();
    let handler = Counting::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_queue_capacity(LINES)
        .with_transport(transport.clone())
        .with_error_handler(handler.clone())
        .build()
        .expect("failed to build client");

    // Accepted, since acceptance only means the line was queued.
    for i in 0..LINES {
        assert!(client.count("lost", i as i64));
    }

    assert!(wait_until(|| transport.attempts.load(Ordering::SeqCst) == LINES));
    assert!(wait_until(|| handler.send_failed.load(Ordering::SeqCst) == LINES));
    assert_eq!(handler.enqueue_failed.load(Ordering::SeqCst), 0);
    assert_eq!(handler.queue_full.load(Ordering::SeqCst), 0);
}

#[test]
fn over_capacity_offers_are_rejected_once_each() {
    const CAPACITY: usize = 4;
    const OVERFLOW: usize = 3;

    let (transport, entered, gate) = Gated::new();
    let handler = Counting::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_queue_capacity(CAPACITY)
        .with_offer_timeout(Duration::from_millis(10))
        .with_transport(transport.clone())
        .with_error_handler(handler.clone())
        .build()
        .expect("failed to build client");

    // Park the forwarder inside the transport so nothing else drains.
    assert!(client.incr("parked"));
    assert_eq!(entered.recv_timeout(WAIT).unwrap(), "parked:1|c");

    for i in 0..CAPACITY {
        assert!(client.count("queued", i as i64));
        assert!(client.queued_len() <= CAPACITY);
    }

    for _ in 0..OVERFLOW {
        assert!(!client.incr("overflow"));
        assert_eq!(client.queued_len(), CAPACITY);
    }
    assert_eq!(handler.queue_full.load(Ordering::SeqCst), OVERFLOW);
    assert_eq!(handler.enqueue_failed.load(Ordering::SeqCst), 0);

    // Let everything through, in order.
    drop(gate);
    assert!(wait_until(|| transport.sent.lock().len() == CAPACITY + 1));
    assert_eq!(
        *transport.sent.lock(),
        vec!["parked:1|c", "queued:0|c", "queued:1|c", "queued:2|c", "queued:3|c"]
    );
}

#[test]
fn shutdown_discards_undelivered_lines() {
    let (transport, entered, gate) = Gated::new();
    let handler = Counting::default();
    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_queue_capacity(16)
        .with_transport(transport.clone())
        .with_error_handler(handler.clone())
        .build()
        .expect("failed to build client");

    assert!(client.incr("in-flight"));
    entered.recv_timeout(WAIT).unwrap();
    for _ in 0..10 {
        assert!(client.incr("pending"));
    }

    client.shutdown();
    client.shutdown();

    // Rejected straight away, even though the forwarder is still busy with the in-flight line.
    for expected in 1..=3 {
        assert!(!client.incr("late"));
        assert_eq!(handler.enqueue_failed.load(Ordering::SeqCst), expected);
    }
    gate.send(()).unwrap();

    let dequeued = 1 + entered.try_iter().count();
    assert!(transport.sent.lock().len() <= dequeued);
    assert_eq!(transport.sent.lock().first().map(String::as_str), Some("in-flight:1|c"));
}

#[test]
fn concurrent_producers_share_one_forwarder() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let transport = Recording::default();
    let client = Arc::new(
        StatsdClient::builder()
            .with_host("127.0.0.1")
            .with_queue_capacity(64)
            .with_offer_timeout(Duration::from_secs(1))
            .with_transport(transport.clone())
            .build()
            .expect("failed to build client"),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || (0..PER_THREAD).filter(|i| client.count(&format!("t{t}"), *i as i64)).count())
        })
        .collect();
    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert!(wait_until(|| transport.sent.lock().len() == accepted));

    // Each producer's lines arrive in the order they were enqueued.
    let sent = transport.sent();
    for t in 0..THREADS {
        let prefix = format!("t{t}:");
        let values: Vec<i64> = sent
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(|rest| rest.trim_end_matches("|c").parse().unwrap())
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn queued_udp_end_to_end() {
    init_tracing();
    let receiver = UdpSocket::bind("127.0.0.1:0").expect("failed to bind receiver");
    receiver.set_read_timeout(Some(WAIT)).expect("failed to set read timeout");
    let port = receiver.local_addr().unwrap().port();

    let client = StatsdClient::builder()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_queue_capacity(8)
        .build()
        .expect("failed to build client");

    assert!(client.count("ka.p", 2));
    assert!(client.time("kb", 15));
    assert!(client.gauge("kg", -2));

    let mut buf = [0u8; 128];
    let mut received = Vec::new();
    for _ in 0..3 {
        let len = receiver.recv(&mut buf).expect("failed to receive");
        received.push(String::from_utf8_lossy(&buf[..len]).into_owned());
    }
    assert_eq!(received, vec!["ka.p:2|c", "kb:15|ms", "kg:-2|g"]);

    client.shutdown();
}
