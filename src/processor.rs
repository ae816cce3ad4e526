//! Sequential task extraction.
//!
//! [`TaskProcessor`] consumes tasks in file order. For each one it requests
//! the task's window from the [`FrameBuffer`], encodes every returned frame
//! into a fresh clip, finalizes the clip and only then appends the task to the
//! report. Tasks never overlap: the buffer's eviction floor only moves
//! forward, so a concurrent request could evict frames another still needs.
//!
//! Tasks are expected in non-decreasing start order. Out-of-order tasks are
//! processed as given (and logged), which means a window starting below an
//! earlier task's start may find its frames already evicted.

use std::{
    io::Write,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    buffer::FrameBuffer,
    configuration::CutOptions,
    encode::{ClipSession, ClipWriter},
    error::CutError,
    progress::{CancellationToken, NoOpProgress, ProgressCallback, ProgressInfo},
    report::ReportWriter,
    task::Task,
};

/// Totals for a completed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Tasks encoded and recorded in the report.
    pub tasks_completed: u64,
    /// Frames submitted across all clips.
    pub frames_encoded: u64,
    /// Wall-clock duration of the batch.
    pub elapsed: Duration,
}

/// Drives a [`ClipWriter`] from a stream of tasks, one task at a time.
pub struct TaskProcessor<W> {
    writer: W,
    progress: Arc<dyn ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl<W> TaskProcessor<W> {
    /// Create a processor that opens clips through `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Create a processor using the progress callback and cancellation token
    /// from `options`.
    pub fn with_options(writer: W, options: &CutOptions) -> Self {
        Self {
            writer,
            progress: Arc::clone(&options.progress),
            cancellation: options.cancellation.clone(),
        }
    }

    /// Attach a progress callback, invoked after each reported task.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token, checked before each task.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Process every task in order, recording each completed one in
    /// `report`.
    ///
    /// Stops at the first error; tasks already recorded stay in the report.
    ///
    /// # Errors
    ///
    /// - Any error yielded by `tasks` (e.g. [`CutError::TaskFormat`]).
    /// - [`CutError::EmptyWindow`] if a task's window has no frames.
    /// - [`CutError::Decode`] if the producer failed.
    /// - Encoder and report I/O errors.
    /// - [`CutError::Cancelled`] if the cancellation token fired.
    pub fn run<P, I, O>(
        &self,
        tasks: I,
        buffer: &FrameBuffer<P>,
        report: &mut ReportWriter<O>,
    ) -> Result<BatchSummary, CutError>
    where
        W: ClipWriter<P>,
        I: IntoIterator<Item = Result<Task, CutError>>,
        O: Write,
    {
        let started = Instant::now();
        let mut summary = BatchSummary::default();
        let mut floor_ms: Option<u64> = None;

        for task in tasks {
            if self.is_cancelled() {
                return Err(CutError::Cancelled);
            }
            let task = task?;
            warn_on_ordering(&task, floor_ms);
            floor_ms = Some(floor_ms.map_or(task.start_ms, |floor| floor.max(task.start_ms)));

            let frames = self.process(&task, buffer)?;
            report.record(&task)?;

            summary.tasks_completed += 1;
            summary.frames_encoded += frames as u64;
            self.progress.on_progress(&ProgressInfo {
                completed: summary.tasks_completed,
                task_id: task.id,
                destination: task.destination.clone(),
                frames,
                frames_total: summary.frames_encoded,
                elapsed: started.elapsed(),
            });
        }

        summary.elapsed = started.elapsed();
        log::info!(
            "Encoding finished: {} clips, {} frames in {:.1?}",
            summary.tasks_completed,
            summary.frames_encoded,
            summary.elapsed,
        );
        Ok(summary)
    }

    /// Cut a single task: fetch its window, encode it and finalize the clip.
    ///
    /// Returns the number of frames encoded. Does not touch the report.
    ///
    /// # Errors
    ///
    /// Returns [`CutError::EmptyWindow`] if no buffered frame falls inside
    /// the window, or any buffer / encoder error.
    pub fn process<P>(&self, task: &Task, buffer: &FrameBuffer<P>) -> Result<usize, CutError>
    where
        W: ClipWriter<P>,
    {
        let (start, end) = task.window();
        log::info!("Encoding {}: {start:.3}-{end:.3}", task.destination);

        let frames = buffer.get_sequence(start, end)?;
        let Some(first) = frames.first() else {
            return Err(CutError::EmptyWindow {
                id: task.id,
                destination: task.destination.clone(),
                start_ms: task.start_ms,
                end_ms: task.end_ms,
            });
        };

        let mut session = self.writer.open(task.destination_path(), first)?;
        for frame in &frames {
            session.submit(frame)?;
        }
        session.finish()?;

        log::debug!("{}: {} frames", task.destination, frames.len());
        Ok(frames.len())
    }
}

fn warn_on_ordering(task: &Task, floor_ms: Option<u64>) {
    if task.start_ms > task.end_ms {
        log::warn!(
            "Task {} ({}) starts after it ends ({} > {} ms)",
            task.id,
            task.destination,
            task.start_ms,
            task.end_ms,
        );
    }
    if let Some(floor) = floor_ms
        && task.start_ms < floor
    {
        log::warn!(
            "Task {} ({}) starts at {} ms, before an earlier task's start of {} ms; \
             frames below {} ms may already be evicted",
            task.id,
            task.destination,
            task.start_ms,
            floor,
            floor,
        );
    }
}
