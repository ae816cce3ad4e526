//! Decoded frames and the entries that flow through the frame buffer.
//!
//! A [`Frame`] is a decoded picture tagged with its presentation timestamp
//! and a footprint estimate used for capacity accounting. [`Entry`] wraps a
//! frame or the end-of-stream marker so both travel through the same queue.

use ffmpeg_next::frame::Video as VideoFrame;

/// Footprint assigned to frames whose line sizes are unknown.
pub const FALLBACK_FOOTPRINT: u64 = 1000;

/// A decoded picture with its presentation timestamp.
///
/// `pts` is expressed in the source's native time base; the
/// [`FrameBuffer`](crate::FrameBuffer) converts it to seconds.
#[derive(Debug, Clone)]
pub struct Frame<P> {
    /// Presentation timestamp in source ticks.
    pub pts: i64,
    /// The picture data.
    pub payload: P,
    /// Heuristic size estimate, used only for capacity accounting.
    pub footprint: u64,
}

impl<P> Frame<P> {
    /// Create a frame with an explicit footprint.
    pub fn new(pts: i64, payload: P, footprint: u64) -> Self {
        Self {
            pts,
            payload,
            footprint,
        }
    }
}

impl Frame<VideoFrame> {
    /// Wrap a decoded FFmpeg frame, estimating its footprint from the frame
    /// geometry.
    pub fn from_video(pts: i64, payload: VideoFrame) -> Self {
        let footprint = video_footprint(&payload);
        Self {
            pts,
            payload,
            footprint,
        }
    }
}

/// One element of the frame buffer.
#[derive(Debug)]
pub enum Entry<P> {
    /// A decoded frame.
    Data(Frame<P>),
    /// No further frames will arrive.
    EndOfStream,
}

/// Estimate the memory held by a decoded video frame.
///
/// Sums the line sizes of every data plane and multiplies by the frame
/// height. Frames reporting no geometry count as [`FALLBACK_FOOTPRINT`].
pub fn video_footprint(frame: &VideoFrame) -> u64 {
    // The safe accessors stop at the first empty plane; read all line sizes.
    let line_total: u64 = unsafe {
        (*frame.as_ptr())
            .linesize
            .iter()
            .map(|&size| u64::from(size.unsigned_abs()))
            .sum()
    };
    footprint_from_geometry(line_total, frame.height())
}

pub(crate) fn footprint_from_geometry(line_total: u64, height: u32) -> u64 {
    let mut size = line_total;
    if height > 0 {
        size = size.saturating_mul(u64::from(height));
    }
    if size == 0 { FALLBACK_FOOTPRINT } else { size }
}
