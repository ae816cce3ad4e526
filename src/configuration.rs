//! Batch configuration.
//!
//! [`CutOptions`] is a builder that threads buffer sizing, encoder settings,
//! report mode, progress callbacks and cancellation through a batch without
//! polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use clipcut::{CancellationToken, CutOptions, EncoderOptions};
//!
//! let token = CancellationToken::new();
//! let options = CutOptions::new()
//!     .with_buffer_capacity(512 * 1024 * 1024)
//!     .with_encoder(EncoderOptions::default().fps(30))
//!     .with_append_report(true)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::{
    buffer::DEFAULT_CAPACITY,
    encode::EncoderOptions,
    progress::{CancellationToken, NoOpProgress, ProgressCallback},
};

/// Configuration for a cutting batch.
///
/// A default-constructed value uses a 4 GB frame buffer, the `libx264`
/// encoder with the `slow` preset at 25 fps, a truncated report file, no
/// progress callback and no cancellation.
#[derive(Clone)]
pub struct CutOptions {
    /// Frame buffer capacity in footprint units.
    pub(crate) buffer_capacity: u64,
    /// Settings for the FFmpeg clip encoder.
    pub(crate) encoder: EncoderOptions,
    /// Append to an existing report instead of truncating it.
    pub(crate) append_report: bool,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token checked between tasks. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for CutOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CutOptions")
            .field("buffer_capacity", &self.buffer_capacity)
            .field("encoder", &self.encoder)
            .field("append_report", &self.append_report)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for CutOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CutOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            encoder: EncoderOptions::default(),
            append_report: false,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the frame buffer capacity in footprint units (roughly bytes of
    /// decoded picture data). Clamped to a minimum of 1.
    ///
    /// A single frame larger than the capacity is still admitted when the
    /// buffer is empty.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: u64) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Set the encoder options used for every clip.
    #[must_use]
    pub fn with_encoder(mut self, encoder: EncoderOptions) -> Self {
        self.encoder = encoder;
        self
    }

    /// Append to the report file instead of truncating it.
    #[must_use]
    pub fn with_append_report(mut self, append: bool) -> Self {
        self.append_report = append;
        self
    }

    /// Attach a progress callback, invoked once per completed clip.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the batch stops before the next task
    /// and returns [`CutError::Cancelled`](crate::CutError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured buffer capacity.
    pub fn buffer_capacity(&self) -> u64 {
        self.buffer_capacity
    }

    /// The configured encoder options.
    pub fn encoder(&self) -> &EncoderOptions {
        &self.encoder
    }
}
