mod common;

use cncstream_communication::channel::framing::BATCH_RESPONSE;
use cncstream_communication::communication::loopback;
use cncstream_communication::{BatchChannel, BatchState};
use cncstream_core::ControllerError;
use common::{next_line, post, run_to_done};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn read_until_state<S: cncstream_communication::ByteStream>(
    channel: &mut BatchChannel<S>,
    state: BatchState,
) {
    for _ in 0..1000 {
        if channel.state() == state {
            return;
        }
        assert_eq!(channel.read(), None);
    }
    panic!("never reached {}", state);
}

#[test]
fn test_end_to_end_hello() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

    read_until_state(&mut channel, BatchState::WritingPostHeader);
    assert_eq!(channel.content_size(), 5);
    channel.handle();
    assert_eq!(channel.state(), BatchState::ReadingData);
    assert_eq!(peer.received_string(), BATCH_RESPONSE);

    let body: Vec<u8> = (0..5).filter_map(|_| channel.read()).collect();
    assert_eq!(body, b"hello");
    assert_eq!(channel.read(), None);
    assert_eq!(channel.state(), BatchState::ReadingRequestHeader);

    // Same connection serves the next request
    peer.send(post("G0 X1\n"));
    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G0 X1"));
    channel.ack(Ok(()));
    assert!(!channel.is_done());
    assert_eq!(peer.shutdown_count(), 0);
}

#[test]
fn test_ack_gates_lines() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post("G0 X1\nG0 X2\n"));

    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G0 X1"));
    assert!(channel.need_ack());
    for _ in 0..10 {
        channel.handle();
        assert_eq!(channel.poll_line(), None);
        assert_eq!(channel.read(), None);
        assert_eq!(channel.peek(), None);
        assert_eq!(channel.available(), 0);
    }

    channel.ack(Ok(()));
    assert!(!channel.need_ack());
    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G0 X2"));
}

#[test]
fn test_ack_error_aborts() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post("G0 X1\nG0 X2\n"));

    assert!(next_line(&mut channel, 100).is_some());
    assert_eq!(channel.state(), BatchState::ReadingData);
    channel.ack(Err(ControllerError::Code { code: 20 }));

    assert!(run_to_done(&mut channel, 5));
    assert!(channel.is_aborted());
    assert_eq!(channel.state(), BatchState::Finished);
    assert_eq!(channel.failure(), Some(&ControllerError::Code { code: 20 }));
    assert_eq!(peer.shutdown_count(), 1);
}

#[test]
fn test_finishing_waits_for_ack() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post("G0 X1\n"));

    assert!(next_line(&mut channel, 100).is_some());
    channel.abort();
    for _ in 0..5 {
        channel.handle();
    }
    assert_eq!(channel.state(), BatchState::Finishing);
    assert_eq!(peer.shutdown_count(), 0);

    channel.ack(Ok(()));
    channel.handle();
    assert!(channel.is_done());
    assert_eq!(peer.shutdown_count(), 1);

    // Aborting a finished channel only sets the flag
    channel.abort();
    channel.handle();
    assert_eq!(channel.state(), BatchState::Finished);
    assert_eq!(peer.shutdown_count(), 1);
}

#[test]
fn test_line_spans_requests() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post("G1 X"));
    assert_eq!(next_line(&mut channel, 100), None);
    peer.send(post("10 F300\n"));
    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G1 X10 F300"));
}

#[test]
fn test_pipelined_requests_are_not_swallowed() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(format!("{}{}", post("G0 X1\n"), post("G0 X2\n")));

    let mut lines = Vec::new();
    while let Some(line) = next_line(&mut channel, 200) {
        lines.push(line);
        channel.ack(Ok(()));
    }
    assert_eq!(lines, vec!["G0 X1", "G0 X2"]);
    assert_eq!(peer.received_string(), BATCH_RESPONSE.repeat(2));
}

#[test]
fn test_preflight_then_post() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send("OPTIONS / HTTP/1.1\r\nOrigin: http://cnc\r\n\r\n");

    read_until_state(&mut channel, BatchState::WritingRequestHeader);
    channel.handle();
    assert_eq!(channel.state(), BatchState::ReadingPostHeader);
    assert_eq!(peer.received_string(), BATCH_RESPONSE);

    peer.send(post("M3 S1000\n"));
    assert_eq!(next_line(&mut channel, 200).as_deref(), Some("M3 S1000"));
    assert_eq!(peer.received_string(), BATCH_RESPONSE);
}

#[test]
fn test_disconnect_between_requests_is_graceful() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post("G0 X1\n"));
    assert!(next_line(&mut channel, 100).is_some());
    channel.ack(Ok(()));
    peer.close();

    assert!(run_to_done(&mut channel, 10));
    assert!(!channel.is_aborted());
}

#[test]
fn test_disconnect_mid_body_aborts() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send("POST / HTTP/1.1\r\nContent-Length: 20\r\n\r\nG0 X1");
    assert_eq!(next_line(&mut channel, 100), None);
    peer.close();

    assert!(run_to_done(&mut channel, 10));
    assert!(channel.is_aborted());
    assert_eq!(peer.shutdown_count(), 1);
}

#[test]
fn test_long_header_line_is_skipped() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    let junk = "a".repeat(300);
    peer.send(format!(
        "POST / HTTP/1.1\r\nX-Junk: {}\r\nContent-Length: 4\r\n\r\nG4\r\n",
        junk
    ));
    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G4"));
    assert_eq!(channel.content_size(), 4);
}

#[test]
fn test_line_overflow_aborts() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.send(post(&format!("{}\n", "X".repeat(300))));

    assert_eq!(next_line(&mut channel, 100), None);
    assert!(channel.is_aborted());
    assert_eq!(
        channel.failure(),
        Some(&ControllerError::LineOverflow { length: 255 })
    );
    assert!(run_to_done(&mut channel, 5));
}

#[test]
fn test_truncated_response_keeps_streaming() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    peer.set_write_limit(Some(4));
    peer.send(post("G0 X1\n"));

    assert_eq!(next_line(&mut channel, 100).as_deref(), Some("G0 X1"));
    assert_eq!(peer.received_string(), "HTTP");
    assert_eq!(channel.state(), BatchState::ReadingData);
    assert!(!channel.is_aborted());
    assert_eq!(peer.shutdown_count(), 0);
}

#[test]
fn test_write_is_discarded() {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    assert_eq!(channel.write(b"ok\r\n"), 0);
    assert!(peer.received().is_empty());
}

fn collect_lines(chunks: &[&[u8]]) -> (Vec<String>, BTreeSet<u64>) {
    let (stream, peer) = loopback::pair();
    let mut channel = BatchChannel::new("batch", stream);
    let mut lines = Vec::new();
    let mut sizes = BTreeSet::new();
    let mut tick = |channel: &mut BatchChannel<_>| {
        channel.handle();
        if channel.state() == BatchState::ReadingData {
            sizes.insert(channel.content_size());
        }
        if let Some(line) = channel.poll_line() {
            lines.push(line);
            channel.ack(Ok(()));
        }
    };
    for chunk in chunks {
        peer.send(chunk);
        for _ in 0..4 {
            tick(&mut channel);
        }
    }
    for _ in 0..200 {
        tick(&mut channel);
    }
    (lines, sizes)
}

proptest! {
    #[test]
    fn test_chunking_does_not_change_result(cuts in prop::collection::vec(1usize..24, 1..40)) {
        let wire = format!(
            "{}{}{}",
            post("G21\nG90\n"),
            post("G0 X1 Y2\nG1 Z-0.5 F100\n"),
            post("M5\n")
        )
        .into_bytes();

        let (expected, expected_sizes) = collect_lines(&[wire.as_slice()]);

        let mut chunks = Vec::new();
        let mut rest = wire.as_slice();
        let mut sizes = cuts.iter().cycle();
        while !rest.is_empty() {
            let size = (*sizes.next().unwrap()).min(rest.len());
            let (head, tail) = rest.split_at(size);
            chunks.push(head);
            rest = tail;
        }
        let (lines, sizes) = collect_lines(&chunks);

        prop_assert_eq!(&lines, &expected);
        prop_assert_eq!(&sizes, &expected_sizes);
        prop_assert_eq!(lines.len(), 5);
    }
}
