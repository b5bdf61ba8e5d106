mod support;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use herald::{Herald, PackError};
use support::{
    schema, wait_until, EchoTransport, Ping, Pong, ScriptedTransport, TimedEchoTransport,
};

#[test]
fn response_callback_runs_on_echoed_send() {
    let herald: Herald<EchoTransport> = Herald::new(schema());
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = received.clone();
    herald
        .send_with_callback(&Ping { seq: 7 }, move |echoed: &Ping| {
            sink.lock().unwrap().push(echoed.seq);
        })
        .expect("send should succeed");

    assert_eq!(*received.lock().unwrap(), vec![7]);
}

#[test]
fn response_callback_is_consumed_after_one_arrival() {
    let herald: Herald<EchoTransport> = Herald::new(schema());
    let responses = Arc::new(AtomicUsize::new(0));

    let counter = responses.clone();
    herald
        .send_with_callback(&Ping { seq: 1 }, move |_: &Ping| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("send should succeed");
    herald.send(&Ping { seq: 2 }).expect("send should succeed");

    assert_eq!(responses.load(Ordering::SeqCst), 1);
}

#[test]
fn sent_frames_reach_the_transport_intact() {
    let transport = ScriptedTransport::default();
    let peer = transport.peer();
    let herald = Herald::with_transport(transport, schema());

    herald.send(&Ping { seq: 42 }).expect("send should succeed");

    let frames = peer.sent_frames();
    assert_eq!(frames.len(), 1);
    let envelope = herald::unwrap(&schema(), &frames[0]).expect("frame should unwrap");
    let ping = envelope
        .payload()
        .as_any()
        .downcast_ref::<Ping>()
        .expect("payload should be a Ping");
    assert_eq!(ping.seq, 42);
}

#[test]
fn sending_an_unregistered_payload_fails_loudly() {
    struct Stranger;
    let herald: Herald<ScriptedTransport> = Herald::new(schema());

    assert!(matches!(
        herald.send(&Stranger),
        Err(PackError::PayloadNotRegistered { .. })
    ));
}

#[test]
fn response_before_timeout_discards_the_timeout() {
    let herald: Herald<EchoTransport> = Herald::new(schema());
    let responded = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));

    let response_flag = responded.clone();
    let timeout_flag = timed_out.clone();
    herald
        .send_with_callback_and_timeout(
            &Ping { seq: 3 },
            move |_: &Ping| response_flag.store(true, Ordering::SeqCst),
            Duration::from_millis(30),
            move || timeout_flag.store(true, Ordering::SeqCst),
        )
        .expect("send should succeed");

    assert!(responded.load(Ordering::SeqCst));
    assert!(!wait_until(Duration::from_millis(120), || {
        timed_out.load(Ordering::SeqCst)
    }));
}

#[test]
fn timeout_fires_when_the_response_never_arrives() {
    let herald: Herald<ScriptedTransport> = Herald::new(schema());
    let responded = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));

    let response_flag = responded.clone();
    let timeout_flag = timed_out.clone();
    herald
        .send_with_callback_and_timeout(
            &Ping { seq: 4 },
            move |_: &Pong| response_flag.store(true, Ordering::SeqCst),
            Duration::from_millis(20),
            move || timeout_flag.store(true, Ordering::SeqCst),
        )
        .expect("send should succeed");

    assert!(wait_until(Duration::from_secs(2), || {
        timed_out.load(Ordering::SeqCst)
    }));
    assert!(!responded.load(Ordering::SeqCst));
}

#[test]
fn slow_echo_loses_the_race_and_the_late_response_is_dropped() {
    let transport = TimedEchoTransport::new(Duration::from_millis(150));
    let herald = Herald::with_transport(transport, schema());
    let responded = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));

    let response_flag = responded.clone();
    let timeout_flag = timed_out.clone();
    herald
        .send_with_callback_and_timeout(
            &Ping { seq: 5 },
            move |_: &Ping| response_flag.store(true, Ordering::SeqCst),
            Duration::from_millis(20),
            move || timeout_flag.store(true, Ordering::SeqCst),
        )
        .expect("send should succeed");

    assert!(wait_until(Duration::from_secs(2), || {
        timed_out.load(Ordering::SeqCst)
    }));
    // Let the delayed echo arrive; its callback slot is already gone.
    assert!(!wait_until(Duration::from_millis(300), || {
        responded.load(Ordering::SeqCst)
    }));
}

#[test]
fn fast_echo_wins_the_race_against_a_generous_timeout() {
    let transport = TimedEchoTransport::new(Duration::from_millis(20));
    let herald = Herald::with_transport(transport, schema());
    let responded = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));

    let response_flag = responded.clone();
    let timeout_flag = timed_out.clone();
    herald
        .send_with_callback_and_timeout(
            &Ping { seq: 6 },
            move |_: &Ping| response_flag.store(true, Ordering::SeqCst),
            Duration::from_secs(5),
            move || timeout_flag.store(true, Ordering::SeqCst),
        )
        .expect("send should succeed");

    assert!(wait_until(Duration::from_secs(2), || {
        responded.load(Ordering::SeqCst)
    }));
    assert!(!timed_out.load(Ordering::SeqCst));
}

#[test]
fn zero_timeout_consumes_the_response_slot_before_a_late_arrival() {
    // The firing and arrival paths race hardest when the deadline is
    // already due at scheduling time, so run many rounds.
    for round in 0..500 {
        let transport = ScriptedTransport::default();
        let peer = transport.peer();
        let herald = Herald::with_transport(transport, schema());
        let responded = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        let response_flag = responded.clone();
        let timeout_flag = timed_out.clone();
        herald
            .send_with_callback_and_timeout(
                &Ping { seq: round },
                move |_: &Pong| response_flag.store(true, Ordering::SeqCst),
                Duration::ZERO,
                move || timeout_flag.store(true, Ordering::SeqCst),
            )
            .expect("send should succeed");

        assert!(wait_until(Duration::from_secs(2), || {
            timed_out.load(Ordering::SeqCst)
        }));
        // The request already timed out; a late response must find its
        // one-shot callback gone, not run it as a second outcome.
        peer.deliver(&herald::pack(&schema(), &Pong { seq: round }).unwrap());
        assert!(
            !responded.load(Ordering::SeqCst),
            "both callbacks of one request ran"
        );
    }
}

#[test]
fn cancelled_timeouts_never_fire() {
    let herald: Herald<ScriptedTransport> = Herald::new(schema());
    let timeouts = Arc::new(AtomicUsize::new(0));

    for seq in 0..3 {
        let counter = timeouts.clone();
        herald
            .send_with_callback_and_timeout(
                &Ping { seq },
                |_: &Pong| {},
                Duration::from_millis(30),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
            .expect("send should succeed");
    }
    herald.cancel_timeouts_for::<Pong>();

    assert!(!wait_until(Duration::from_millis(150), || {
        timeouts.load(Ordering::SeqCst) > 0
    }));
}

#[test]
fn custom_serialization_transforms_the_wire_bytes_both_ways() {
    fn scramble(bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|b| b ^ 0x5A).collect()
    }

    let transport = EchoTransport::default();
    let peer = transport.peer();
    let herald = Herald::with_transport(transport, schema());
    herald.set_custom_serialization(|frame| scramble(&frame));
    herald.set_custom_deserialization(scramble);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    herald
        .send_with_callback(&Ping { seq: 9 }, move |ping: &Ping| {
            sink.lock().unwrap().push(ping.seq);
        })
        .expect("send should succeed");

    assert_eq!(*received.lock().unwrap(), vec![9]);
    // The bytes on the wire must not be a plain frame.
    let frames = peer.sent_frames();
    assert_eq!(frames.len(), 1);
    assert!(herald::unwrap(&schema(), &frames[0]).is_err());
    assert_eq!(
        frames[0],
        scramble(&herald::pack(&schema(), &Ping { seq: 9 }).unwrap())
    );
}

#[test]
fn clearing_custom_serialization_restores_plain_frames() {
    let transport = ScriptedTransport::default();
    let peer = transport.peer();
    let herald = Herald::with_transport(transport, schema());

    herald.set_custom_serialization(|mut frame| {
        frame.push(0xAA);
        frame
    });
    herald.send(&Ping { seq: 1 }).expect("send should succeed");
    herald.clear_custom_serialization();
    herald.send(&Ping { seq: 1 }).expect("send should succeed");

    let frames = peer.sent_frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].len(), frames[1].len() + 1);
    assert!(herald::unwrap(&schema(), &frames[1]).is_ok());
}
