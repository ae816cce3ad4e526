//! Error types for the `clipcut` crate.
//!
//! This module defines [`CutError`], the unified error type returned by every
//! fallible operation in the crate. Every error is fatal to the batch it
//! occurs in; nothing is retried.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `clipcut` operations.
///
/// Variants carry enough context (source location, task line, destination)
/// to diagnose the problem from the message alone.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CutError {
    /// The source could not be opened, has no usable video stream, or the
    /// decoder / filter graph could not be set up.
    #[error("Failed to initialise decoding of {source_location}: {reason}")]
    Initialization {
        /// The source location passed to [`crate::VideoDecoder::open`].
        source_location: String,
        /// Underlying reason the setup failed.
        reason: String,
    },

    /// The task or report file could not be opened.
    #[error("Failed to open {path}: {source}")]
    FileOpen {
        /// Path of the file that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        source: IoError,
    },

    /// A task line is malformed.
    #[error("Bad task format on line {line}: {reason}")]
    TaskFormat {
        /// 1-based line number within the task file.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// No buffered frames fall inside the requested window.
    #[error(
        "No frames found for task {id} ({destination}) in interval {start_ms}-{end_ms} ms"
    )]
    EmptyWindow {
        /// Task id.
        id: u64,
        /// Task destination name.
        destination: String,
        /// Window start in milliseconds.
        start_ms: u64,
        /// Window end in milliseconds.
        end_ms: u64,
    },

    /// Decoding aborted after the producer had started.
    #[error("Decoder error: {0}")]
    Decode(String),

    /// A clip could not be encoded or written.
    #[error("Failed to encode {destination}: {reason}")]
    Encode {
        /// Destination of the clip being written.
        destination: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The ticks-to-seconds factor is not a positive finite number.
    #[error("Invalid time base: {0}")]
    InvalidTimeBase(f64),

    /// The ticks-to-seconds factor was set more than once.
    #[error("Time base has already been set")]
    TimeBaseAlreadySet,

    /// The time base was set after frames had already been buffered.
    #[error("Time base must be set before any frame is buffered")]
    TimeBaseAfterFrames,

    /// A window spans more frames than the buffer can hold at once.
    #[error(
        "Window {start:.3}-{end:.3} s does not fit in a frame buffer of capacity {capacity}; \
         raise the capacity or split the task"
    )]
    WindowExceedsCapacity {
        /// Window start in seconds.
        start: f64,
        /// Window end in seconds.
        end: f64,
        /// Buffer capacity in footprint units.
        capacity: u64,
    },

    /// The batch was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading tasks or writing the report.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for CutError {
    fn from(error: FfmpegError) -> Self {
        CutError::FfmpegError(error.to_string())
    }
}
