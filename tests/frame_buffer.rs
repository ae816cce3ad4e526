//! Frame buffer integration tests.
//!
//! These drive the producer/consumer protocol from real threads; every
//! blocking expectation is checked with a bounded `recv_timeout`.

use std::{
    ops::Range,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use clipcut::{CutError, DEFAULT_CAPACITY, Entry, Frame, FrameBuffer, PushOutcome};

const BLOCKED: Duration = Duration::from_millis(150);
const RELEASED: Duration = Duration::from_secs(5);

fn frame(pts: i64, footprint: u64) -> Entry<()> {
    Entry::Data(Frame::new(pts, (), footprint))
}

fn filled(capacity: u64, time_base: f64, timestamps: Range<i64>) -> FrameBuffer<()> {
    let buffer = FrameBuffer::new(capacity);
    buffer.set_time_base(time_base).expect("time base");
    for pts in timestamps {
        assert_eq!(buffer.push(frame(pts, 10)), PushOutcome::Enqueued);
    }
    buffer
}

fn timestamps(window: &[Arc<Frame<()>>]) -> Vec<i64> {
    window.iter().map(|frame| frame.pts).collect()
}

#[test]
fn default_capacity_is_four_gigabytes() {
    let buffer: FrameBuffer<()> = FrameBuffer::default();
    assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
    assert_eq!(DEFAULT_CAPACITY, 4_000_000_000);
    assert!(buffer.is_empty());
}

#[test]
fn zero_capacity_is_clamped() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(0);
    assert_eq!(buffer.capacity(), 1);
}

#[test]
fn time_base_must_be_positive_and_finite() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(100);
    for invalid in [0.0, -0.04, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            buffer.set_time_base(invalid),
            Err(CutError::InvalidTimeBase(_))
        ));
    }
    buffer.set_time_base(0.04).expect("valid time base");
    assert!(matches!(
        buffer.set_time_base(0.04),
        Err(CutError::TimeBaseAlreadySet)
    ));
}

#[test]
fn time_base_rejected_once_frames_are_buffered() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(100);
    buffer.push(frame(0, 10));
    assert!(matches!(
        buffer.set_time_base(0.04),
        Err(CutError::TimeBaseAfterFrames)
    ));
    assert_eq!(buffer.len(), 1);
}

#[test]
fn window_bounds_are_inclusive() {
    let buffer = filled(1_000, 0.25, 0..12);
    buffer.push(Entry::EndOfStream);

    let window = buffer.get_sequence(0.5, 1.5).expect("window");
    assert_eq!(timestamps(&window), vec![2, 3, 4, 5, 6]);
}

#[test]
fn window_evicts_frames_before_start() {
    let buffer = filled(1_000, 1.0, 0..6);

    let window = buffer.get_sequence(2.0, 3.0).expect("window");
    assert_eq!(timestamps(&window), vec![2, 3]);
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.footprint(), 40);
}

#[test]
fn returned_frames_stay_buffered() {
    let buffer = filled(1_000, 1.0, 0..6);

    let first = buffer.get_sequence(1.0, 2.0).expect("first");
    let second = buffer.get_sequence(1.0, 2.0).expect("second");
    assert_eq!(timestamps(&first), timestamps(&second));
    assert_eq!(buffer.len(), 5);
}

#[test]
fn no_eviction_after_end_of_stream() {
    let buffer = filled(1_000, 1.0, 0..4);
    buffer.push(Entry::EndOfStream);

    let window = buffer.get_sequence(2.0, 3.0).expect("window");
    assert_eq!(timestamps(&window), vec![2, 3]);
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.footprint(), 40);
}

#[test]
fn window_past_end_of_stream_is_empty() {
    let buffer = filled(1_000, 1.0, 0..4);
    buffer.push(Entry::EndOfStream);

    let window = buffer.get_sequence(10.0, 11.0).expect("window");
    assert!(window.is_empty());
}

#[test]
fn duplicate_end_of_stream_is_discarded() {
    let buffer = filled(1_000, 1.0, 0..2);
    assert_eq!(buffer.push(Entry::EndOfStream), PushOutcome::Enqueued);
    assert_eq!(buffer.push(Entry::EndOfStream), PushOutcome::Discarded);
    assert_eq!(buffer.push(frame(9, 10)), PushOutcome::Discarded);
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.footprint(), 20);
    assert!(buffer.has_ended());
}

#[test]
fn oversized_frame_admitted_into_empty_buffer() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(10);
    assert_eq!(buffer.push(frame(0, 100)), PushOutcome::Enqueued);
    assert_eq!(buffer.footprint(), 100);
}

#[test]
fn push_blocks_until_eviction_frees_space() {
    let buffer = filled(30, 1.0, 0..3);
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            let outcome = buffer.push(frame(3, 10));
            sender.send(outcome).expect("send");
        });

        assert!(receiver.recv_timeout(BLOCKED).is_err(), "push should block");
        assert_eq!(buffer.footprint(), 30);

        let window = buffer.get_sequence(2.0, 2.0).expect("window");
        assert_eq!(timestamps(&window), vec![2]);

        let outcome = receiver.recv_timeout(RELEASED).expect("push released");
        assert_eq!(outcome, PushOutcome::Enqueued);
    });

    assert_eq!(buffer.len(), 2);
    assert!(buffer.footprint() <= buffer.capacity());
}

#[test]
fn signal_finish_releases_blocked_push() {
    let buffer = filled(10, 1.0, 0..1);
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            sender.send(buffer.push(frame(1, 10))).expect("send");
        });

        assert!(receiver.recv_timeout(BLOCKED).is_err(), "push should block");
        buffer.signal_finish();

        let outcome = receiver.recv_timeout(RELEASED).expect("push released");
        assert_eq!(outcome, PushOutcome::Discarded);
    });

    assert!(buffer.is_finished());
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.footprint(), 10);
    assert_eq!(buffer.push(frame(2, 1)), PushOutcome::Discarded);
}

#[test]
fn consumer_waits_for_tail_to_reach_window_end() {
    let buffer = filled(1_000, 1.0, 0..2);
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            let window = buffer.get_sequence(0.0, 2.0).map(|window| timestamps(&window));
            sender.send(window).expect("send");
        });

        assert!(receiver.recv_timeout(BLOCKED).is_err(), "read should block");
        buffer.push(frame(2, 10));

        let window = receiver.recv_timeout(RELEASED).expect("read released");
        assert_eq!(window.expect("window"), vec![0, 1, 2]);
    });
}

#[test]
fn consumer_on_empty_buffer_released_by_end_of_stream() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(100);
    buffer.set_time_base(1.0).expect("time base");
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            let window = buffer.get_sequence(0.0, 1.0).map(|window| window.len());
            sender.send(window).expect("send");
        });

        assert!(receiver.recv_timeout(BLOCKED).is_err(), "read should block");
        buffer.push(Entry::EndOfStream);

        let window = receiver.recv_timeout(RELEASED).expect("read released");
        assert_eq!(window.expect("window"), 0);
    });
}

#[test]
fn failure_wakes_waiting_consumer() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(100);
    buffer.set_time_base(1.0).expect("time base");
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            sender.send(buffer.get_sequence(0.0, 1.0)).expect("send");
        });

        assert!(receiver.recv_timeout(BLOCKED).is_err(), "read should block");
        buffer.fail("corrupt packet");
        buffer.fail("second failure is ignored");

        let result = receiver.recv_timeout(RELEASED).expect("read released");
        match result {
            Err(CutError::Decode(reason)) => assert_eq!(reason, "corrupt packet"),
            other => panic!("expected a decode error, got {other:?}"),
        }
    });
    assert!(buffer.is_finished());
}

#[test]
fn eviction_keeps_footprint_bounded() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(50);
    buffer.set_time_base(1.0).expect("time base");

    thread::scope(|scope| {
        scope.spawn(|| {
            for pts in 0..200 {
                buffer.push(frame(pts, 10));
            }
            buffer.push(Entry::EndOfStream);
        });

        for start in (0..200).step_by(10) {
            let window = buffer
                .get_sequence(start as f64, start as f64 + 2.0)
                .expect("window");
            assert_eq!(timestamps(&window), vec![start, start + 1, start + 2]);
            assert!(buffer.footprint() <= buffer.capacity());
        }
        buffer.signal_finish();
    });
}

#[test]
fn window_larger_than_capacity_fails_instead_of_waiting() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(30);
    buffer.set_time_base(1.0).expect("time base");
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(|| {
            for pts in 0..10 {
                buffer.push(frame(pts, 10));
            }
            buffer.push(Entry::EndOfStream);
        });
        scope.spawn(|| {
            sender.send(buffer.get_sequence(0.0, 5.0)).expect("send");
        });

        let result = receiver.recv_timeout(RELEASED).expect("read returned");
        match result {
            Err(CutError::WindowExceedsCapacity {
                start,
                end,
                capacity,
            }) => {
                assert_eq!((start, end), (0.0, 5.0));
                assert_eq!(capacity, 30);
            }
            other => panic!("expected a capacity error, got {other:?}"),
        }
        assert_eq!(buffer.footprint(), 30);
        buffer.signal_finish();
    });
}

#[test]
fn window_filling_capacity_exactly_still_completes() {
    let buffer: FrameBuffer<()> = FrameBuffer::new(30);
    buffer.set_time_base(1.0).expect("time base");

    thread::scope(|scope| {
        scope.spawn(|| {
            for pts in 0..10 {
                buffer.push(frame(pts, 10));
            }
            buffer.push(Entry::EndOfStream);
        });

        let first = buffer.get_sequence(0.0, 2.0).expect("first window");
        assert_eq!(timestamps(&first), vec![0, 1, 2]);
        let second = buffer.get_sequence(5.0, 7.0).expect("second window");
        assert_eq!(timestamps(&second), vec![5, 6, 7]);
        buffer.signal_finish();
    });
}
