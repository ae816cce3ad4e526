//! # clipcut
//!
//! Cut many time-bounded clips out of one continuously decoded video source.
//!
//! A long source is decoded exactly once, on a dedicated thread, into a
//! bounded [`FrameBuffer`]. A batch of cut tasks (id, destination, start ms,
//! end ms) is worked through in order: each task reads its window out of the
//! buffer, re-encodes it into its own file, and is recorded in a report once
//! the file is finalized. Frames older than the current window are evicted,
//! and the decoder blocks when the buffer is full, so the whole decoded
//! stream never has to fit in memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clipcut::{CutOptions, cut_files};
//!
//! // tasks.txt:
//! //   1 intro.mp4   0     4000
//! //   2 scene.mp4   12500 18000
//! let summary = cut_files(
//!     "input.mp4",
//!     "scale=640:-2",
//!     "tasks.txt",
//!     "report.txt",
//!     &CutOptions::default(),
//! )?;
//! println!("{} clips, {} frames", summary.tasks_completed, summary.frames_encoded);
//! # Ok::<(), clipcut::CutError>(())
//! ```
//!
//! ## Ordering
//!
//! Tasks must be sorted by non-decreasing start time. Each window evicts
//! every frame before its start, so a later task starting earlier may find
//! nothing left and fail with [`CutError::EmptyWindow`].
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system, with the
//! encoder named in [`EncoderOptions`] (`libx264` by default) available.

pub mod buffer;
pub mod configuration;
mod conversion;
pub mod decoder;
pub mod encode;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod report;
pub mod source;
pub mod task;

pub use buffer::{DEFAULT_CAPACITY, FrameBuffer, PushOutcome};
pub use configuration::CutOptions;
pub use decoder::VideoDecoder;
pub use encode::{ClipEncoder, ClipSession, ClipWriter, EncodeSession, EncoderOptions};
pub use error::CutError;
pub use ffmpeg::FfmpegLogLevel;
pub use frame::{Entry, FALLBACK_FOOTPRINT, Frame, video_footprint};
pub use pipeline::{Cutter, cut_files};
pub use processor::{BatchSummary, TaskProcessor};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use report::ReportWriter;
pub use source::{FrameSource, ProducerStats, produce};
pub use task::{Task, TaskReader};
