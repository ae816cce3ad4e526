//! Bounded, time-windowed frame buffer shared by the decoder and the task
//! processor.
//!
//! [`FrameBuffer`] is the single point of synchronization between exactly
//! one producer (the decoder thread) and one consumer (the task processor).
//! It applies backpressure so the producer cannot run arbitrarily far ahead,
//! and serves blocking window reads keyed by presentation time, evicting
//! frames that no later window can need.
//!
//! All state lives behind one [`Mutex`] and one [`Condvar`]. Waits are never
//! timed: they are resolved by new data, by space being freed, or by an
//! explicit [`signal_finish`](FrameBuffer::signal_finish) /
//! [`fail`](FrameBuffer::fail).
//!
//! # Example
//!
//! ```
//! use clipcut::{Entry, Frame, FrameBuffer};
//!
//! let buffer = FrameBuffer::new(1_000);
//! buffer.set_time_base(0.5)?;
//! for pts in 0..5 {
//!     buffer.push(Entry::Data(Frame::new(pts, (), 10)));
//! }
//! buffer.push(Entry::EndOfStream);
//!
//! let window = buffer.get_sequence(0.5, 1.5)?;
//! let timestamps: Vec<i64> = window.iter().map(|frame| frame.pts).collect();
//! assert_eq!(timestamps, vec![1, 2, 3]);
//! # Ok::<(), clipcut::CutError>(())
//! ```

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::{
    error::CutError,
    frame::{Entry, Frame},
};

/// Default capacity in footprint units (about 4 GB of decoded pictures).
pub const DEFAULT_CAPACITY: u64 = 4_000_000_000;

/// Result of a [`FrameBuffer::push`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The entry was appended to the buffer.
    Enqueued,
    /// The entry was dropped: shutdown was requested, or the stream had
    /// already ended.
    Discarded,
}

enum Slot<P> {
    Frame(Arc<Frame<P>>),
    End,
}

struct State<P> {
    queue: VecDeque<Slot<P>>,
    footprint: u64,
    time_base: Option<f64>,
    finished: bool,
    failure: Option<String>,
    /// Footprint of the frame a blocked `push` is waiting to admit.
    pending: Option<u64>,
}

impl<P> State<P> {
    fn seconds(&self, pts: i64) -> f64 {
        pts as f64 * self.time_base.unwrap_or(1.0)
    }

    fn has_ended(&self) -> bool {
        matches!(self.queue.back(), Some(Slot::End))
    }

    fn tail_seconds(&self) -> Option<f64> {
        match self.queue.back() {
            Some(Slot::Frame(frame)) => Some(self.seconds(frame.pts)),
            _ => None,
        }
    }

    fn head_before(&self, start: f64) -> bool {
        match self.queue.front() {
            Some(Slot::Frame(frame)) => self.seconds(frame.pts) < start,
            _ => false,
        }
    }

    fn would_block(&self, size: u64, capacity: u64) -> bool {
        self.footprint.saturating_add(size) > capacity && !self.queue.is_empty() && !self.finished
    }

    /// Whether the producer is parked in `push` with no space being freed.
    fn producer_stalled(&self, capacity: u64) -> bool {
        self.pending
            .is_some_and(|size| self.would_block(size, capacity))
    }

    fn check_failure(&self) -> Result<(), CutError> {
        match &self.failure {
            Some(reason) => Err(CutError::Decode(reason.clone())),
            None => Ok(()),
        }
    }
}

/// A bounded FIFO of decoded frames with time-windowed reads.
///
/// Frames are owned by the buffer from [`push`](FrameBuffer::push) until
/// they are evicted by a later window whose start has advanced past them,
/// or until the buffer is dropped. [`get_sequence`](FrameBuffer::get_sequence)
/// hands out shared [`Arc`] handles and never removes the frames it returns.
pub struct FrameBuffer<P> {
    state: Mutex<State<P>>,
    update: Condvar,
    capacity: u64,
}

impl<P> Debug for FrameBuffer<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.lock();
        f.debug_struct("FrameBuffer")
            .field("len", &state.queue.len())
            .field("footprint", &state.footprint)
            .field("capacity", &self.capacity)
            .field("time_base", &state.time_base)
            .field("ended", &state.has_ended())
            .field("finished", &state.finished)
            .finish()
    }
}

impl<P> FrameBuffer<P> {
    /// Create an empty buffer admitting at most `capacity` footprint units.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: u64) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                footprint: 0,
                time_base: None,
                finished: false,
                failure: None,
                pending: None,
            }),
            update: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while<'a>(
        &self,
        guard: MutexGuard<'a, State<P>>,
        condition: impl FnMut(&mut State<P>) -> bool,
    ) -> MutexGuard<'a, State<P>> {
        self.update
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish the ticks-to-seconds conversion factor.
    ///
    /// Must be called once, before any frame is pushed or requested. Until
    /// it is set, timestamps are treated as seconds.
    ///
    /// # Errors
    ///
    /// - [`CutError::InvalidTimeBase`] if `seconds_per_tick` is not a
    ///   positive finite number.
    /// - [`CutError::TimeBaseAlreadySet`] on a second call.
    /// - [`CutError::TimeBaseAfterFrames`] once anything has been pushed.
    pub fn set_time_base(&self, seconds_per_tick: f64) -> Result<(), CutError> {
        if !seconds_per_tick.is_finite() || seconds_per_tick <= 0.0 {
            return Err(CutError::InvalidTimeBase(seconds_per_tick));
        }
        let mut state = self.lock();
        if state.time_base.is_some() {
            return Err(CutError::TimeBaseAlreadySet);
        }
        if !state.queue.is_empty() {
            return Err(CutError::TimeBaseAfterFrames);
        }
        state.time_base = Some(seconds_per_tick);
        log::debug!("Frame buffer time base set to {seconds_per_tick} s/tick");
        Ok(())
    }

    /// Append an entry to the tail of the buffer.
    ///
    /// The end-of-stream marker is always admitted immediately. A data frame
    /// blocks while admitting it would exceed the capacity, unless the buffer
    /// is empty (a single oversized frame is always admitted) or shutdown has
    /// been requested. If shutdown was requested, the frame is discarded
    /// without touching the footprint.
    ///
    /// Every admitted entry wakes all waiters.
    pub fn push(&self, entry: Entry<P>) -> PushOutcome {
        let mut state = self.lock();

        let frame = match entry {
            Entry::Data(frame) => frame,
            Entry::EndOfStream => {
                if state.has_ended() {
                    log::warn!("Ignoring duplicate end-of-stream marker");
                    return PushOutcome::Discarded;
                }
                state.queue.push_back(Slot::End);
                self.update.notify_all();
                return PushOutcome::Enqueued;
            }
        };

        if state.has_ended() {
            log::warn!("Discarding frame pts={} pushed after end of stream", frame.pts);
            return PushOutcome::Discarded;
        }

        let size = frame.footprint;
        let capacity = self.capacity;
        if state.would_block(size, capacity) {
            state.pending = Some(size);
            self.update.notify_all();
            state = self.wait_while(state, |state| state.would_block(size, capacity));
            state.pending = None;
        }

        let outcome = if state.finished {
            PushOutcome::Discarded
        } else {
            state.queue.push_back(Slot::Frame(Arc::new(frame)));
            state.footprint = state.footprint.saturating_add(size);
            PushOutcome::Enqueued
        };
        self.update.notify_all();
        outcome
    }

    /// Return every buffered frame whose timestamp lies in `[start, end]`
    /// seconds, in arrival order.
    ///
    /// Blocks until the buffer is non-empty, evicts frames older than
    /// `start` (unless the stream has already ended), then blocks until the
    /// tail has reached `end` or the stream has ended. Returned frames stay
    /// in the buffer and may be served again by a later window that does not
    /// start past them.
    ///
    /// An empty result means the window lies beyond the stream, or its frames
    /// were already evicted.
    ///
    /// # Errors
    ///
    /// - [`CutError::Decode`] if the producer reported a failure via
    ///   [`fail`](FrameBuffer::fail).
    /// - [`CutError::WindowExceedsCapacity`] if the producer is blocked on a
    ///   full buffer while the tail is still short of `end`. Nothing before
    ///   `start` is left to evict, so the window can never complete.
    pub fn get_sequence(&self, start: f64, end: f64) -> Result<Vec<Arc<Frame<P>>>, CutError> {
        let mut state = self.lock();

        loop {
            state = self.wait_while(state, |state| {
                state.queue.is_empty() && state.failure.is_none()
            });
            state.check_failure()?;
            if state.has_ended() || !state.head_before(start) {
                break;
            }
            if let Some(Slot::Frame(evicted)) = state.queue.pop_front() {
                state.footprint = state.footprint.saturating_sub(evicted.footprint);
            }
            self.update.notify_all();
        }

        let capacity = self.capacity;
        let short_of_end = |state: &State<P>| {
            !state.has_ended() && state.tail_seconds().is_some_and(|tail| tail < end)
        };
        state = self.wait_while(state, |state| {
            state.failure.is_none() && short_of_end(state) && !state.producer_stalled(capacity)
        });
        state.check_failure()?;
        if short_of_end(&*state) && state.producer_stalled(capacity) {
            log::error!(
                "Window {start:.3}-{end:.3} s needs more than the buffer capacity of {capacity}"
            );
            return Err(CutError::WindowExceedsCapacity {
                start,
                end,
                capacity,
            });
        }

        let mut sequence = Vec::new();
        for slot in &state.queue {
            let Slot::Frame(frame) = slot else {
                break;
            };
            let seconds = state.seconds(frame.pts);
            if seconds < start {
                continue;
            }
            if seconds > end {
                break;
            }
            sequence.push(Arc::clone(frame));
        }
        Ok(sequence)
    }

    /// Request shutdown and wake every waiter.
    ///
    /// A producer blocked in [`push`](FrameBuffer::push) returns immediately
    /// and discards its pending frame; later data frames are discarded too.
    pub fn signal_finish(&self) {
        let mut state = self.lock();
        state.finished = true;
        self.update.notify_all();
    }

    /// Record a producer failure, request shutdown and wake every waiter.
    ///
    /// Subsequent [`get_sequence`](FrameBuffer::get_sequence) calls return
    /// [`CutError::Decode`] with `reason`. Only the first failure is kept.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        if state.failure.is_none() {
            state.failure = Some(reason.into());
        }
        state.finished = true;
        self.update.notify_all();
    }

    /// Number of entries currently held, including the end marker.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Sum of the footprints of the buffered frames.
    pub fn footprint(&self) -> u64 {
        self.lock().footprint
    }

    /// The fixed capacity in footprint units.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether shutdown has been requested.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Whether the end-of-stream marker has been pushed.
    pub fn has_ended(&self) -> bool {
        self.lock().has_ended()
    }
}

impl<P> Default for FrameBuffer<P> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
