//! The decode side of the pipeline.
//!
//! A [`FrameSource`] yields decoded frames one unit of work at a time;
//! [`produce`] is the producer loop that drains a source into a
//! [`FrameBuffer`], polling a [`CancellationToken`] between units.

use crate::{
    buffer::{FrameBuffer, PushOutcome},
    error::CutError,
    frame::{Entry, Frame},
    progress::CancellationToken,
};

/// A forward-only stream of decoded frames.
///
/// Implemented by [`VideoDecoder`](crate::VideoDecoder) for real media and by
/// in-memory sources in tests.
pub trait FrameSource: Send {
    /// The picture type carried by produced frames.
    type Payload: Send + Sync;

    /// Seconds per timestamp tick of the produced frames.
    fn time_base(&self) -> f64;

    /// Perform one unit of decode work and return the frames it produced,
    /// in presentation order (possibly none).
    ///
    /// Returns `Ok(None)` once the source is exhausted; any frames still held
    /// inside the decoder must have been returned by earlier calls.
    fn decode_next(&mut self) -> Result<Option<Vec<Frame<Self::Payload>>>, CutError>;
}

/// Counters reported by [`produce`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Units of decode work performed.
    pub units: u64,
    /// Frames admitted into the buffer.
    pub frames_enqueued: u64,
    /// Frames dropped because shutdown was requested.
    pub frames_discarded: u64,
    /// Whether the loop stopped because of cancellation rather than
    /// exhaustion of the source.
    pub cancelled: bool,
}

/// Marks the buffer as failed if the producer unwinds without finishing.
struct FailOnDrop<'a, P> {
    buffer: &'a FrameBuffer<P>,
    armed: bool,
}

impl<P> Drop for FailOnDrop<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.fail("decoder stopped unexpectedly");
        }
    }
}

/// Drain `source` into `buffer` until it is exhausted or `token` is
/// cancelled, then push exactly one end-of-stream marker.
///
/// Cancellation is only observed between units of work. On a decode error
/// the buffer is marked failed (waking the consumer) and the error is
/// returned.
pub fn produce<S: FrameSource>(
    source: &mut S,
    buffer: &FrameBuffer<S::Payload>,
    token: &CancellationToken,
) -> Result<ProducerStats, CutError> {
    let mut guard = FailOnDrop {
        buffer,
        armed: true,
    };
    let mut stats = ProducerStats::default();

    loop {
        if token.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        let frames = match source.decode_next() {
            Ok(Some(frames)) => frames,
            Ok(None) => break,
            Err(error) => {
                log::error!("Decoding failed: {error}");
                buffer.fail(match &error {
                    CutError::Decode(reason) => reason.clone(),
                    other => other.to_string(),
                });
                guard.armed = false;
                return Err(error);
            }
        };
        stats.units += 1;
        for frame in frames {
            match buffer.push(Entry::Data(frame)) {
                PushOutcome::Enqueued => stats.frames_enqueued += 1,
                PushOutcome::Discarded => stats.frames_discarded += 1,
            }
        }
    }

    buffer.push(Entry::EndOfStream);
    guard.armed = false;
    log::info!(
        "Decoding finished: {} frames buffered, {} discarded{}",
        stats.frames_enqueued,
        stats.frames_discarded,
        if stats.cancelled { " (stopped early)" } else { "" },
    );
    Ok(stats)
}
