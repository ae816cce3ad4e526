//! Lifecycle coordination of the decode producer and the task consumer.
//!
//! [`Cutter`] runs a [`FrameSource`] on a dedicated decoder thread feeding a
//! shared [`FrameBuffer`], while the calling thread works through the task
//! list with a [`TaskProcessor`]. When the processor is done (successfully or
//! not) the decoder is told to stop, the buffer releases any blocked push,
//! and the decoder thread is joined before `run` returns.
//!
//! # Example
//!
//! ```no_run
//! use clipcut::{CutOptions, cut_files};
//!
//! let summary = cut_files(
//!     "input.mp4",
//!     "scale=480:-2",
//!     "tasks.txt",
//!     "report.txt",
//!     &CutOptions::default(),
//! )?;
//! println!("{} clips written", summary.tasks_completed);
//! # Ok::<(), clipcut::CutError>(())
//! ```

use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    thread,
};

use crate::{
    buffer::FrameBuffer,
    configuration::CutOptions,
    decoder::VideoDecoder,
    encode::{ClipEncoder, ClipWriter},
    error::CutError,
    processor::{BatchSummary, TaskProcessor},
    progress::CancellationToken,
    report::ReportWriter,
    source::{FrameSource, produce},
    task::{Task, TaskReader},
};

/// Name of the producer thread.
pub const DECODER_THREAD_NAME: &str = "clipcut-decoder";

/// Stops the producer when dropped, including while unwinding.
struct StopProducer<'a, P> {
    buffer: &'a FrameBuffer<P>,
    token: &'a CancellationToken,
}

impl<P> Drop for StopProducer<'_, P> {
    fn drop(&mut self) {
        self.token.cancel();
        self.buffer.signal_finish();
    }
}

/// One decode producer and one task consumer sharing a frame buffer.
pub struct Cutter<S, W> {
    source: S,
    writer: W,
    options: CutOptions,
}

impl<S, W> Cutter<S, W>
where
    S: FrameSource,
    W: ClipWriter<S::Payload>,
{
    /// Pair a frame source with a clip writer.
    pub fn new(source: S, writer: W, options: CutOptions) -> Self {
        Self {
            source,
            writer,
            options,
        }
    }

    /// Run the batch to completion.
    ///
    /// The source's time base is installed on a fresh buffer, the producer
    /// is started on its own thread, and `tasks` are processed on the calling
    /// thread. The producer is always stopped and joined before returning.
    ///
    /// # Errors
    ///
    /// The consumer's error takes precedence; otherwise a producer failure
    /// (including a panic on the decoder thread) is reported as
    /// [`CutError::Decode`].
    pub fn run<I, O>(self, tasks: I, report: &mut ReportWriter<O>) -> Result<BatchSummary, CutError>
    where
        I: IntoIterator<Item = Result<Task, CutError>>,
        O: Write,
    {
        let Self {
            mut source,
            writer,
            options,
        } = self;

        let buffer = FrameBuffer::new(options.buffer_capacity);
        buffer.set_time_base(source.time_base())?;
        let producer_token = CancellationToken::new();
        let processor = TaskProcessor::with_options(writer, &options);
        log::debug!("Starting batch with {options:?}");

        thread::scope(|scope| {
            let producer = thread::Builder::new()
                .name(DECODER_THREAD_NAME.to_string())
                .spawn_scoped(scope, || produce(&mut source, &buffer, &producer_token))
                .map_err(|e| CutError::Decode(format!("cannot start decoder thread: {e}")))?;

            let stop = StopProducer {
                buffer: &buffer,
                token: &producer_token,
            };
            let outcome = processor.run(tasks, &buffer, report);
            drop(stop);

            let produced = producer.join();
            match (outcome, produced) {
                (Err(error), _) => Err(error),
                (Ok(_), Err(_)) => Err(CutError::Decode("decoder thread panicked".to_string())),
                (Ok(_), Ok(Err(error))) => Err(error),
                (Ok(summary), Ok(Ok(stats))) => {
                    log::debug!("Producer stopped: {stats:?}");
                    Ok(summary)
                }
            }
        })
    }
}

/// Cut every task listed in `task_path` out of `source_location`, recording
/// completed tasks in `report_path`.
///
/// The decoder is initialised before either file is opened, so an
/// unreadable source fails without touching the report.
///
/// # Errors
///
/// - [`CutError::Initialization`] if the source or filter cannot be set up.
/// - [`CutError::FileOpen`] if the task or report file cannot be opened.
/// - Any error from [`Cutter::run`].
pub fn cut_files<T, R>(
    source_location: &str,
    filter: &str,
    task_path: T,
    report_path: R,
    options: &CutOptions,
) -> Result<BatchSummary, CutError>
where
    T: AsRef<Path>,
    R: AsRef<Path>,
{
    let decoder = VideoDecoder::open(source_location, filter)?;

    let task_path = task_path.as_ref();
    let task_file = File::open(task_path).map_err(|source| CutError::FileOpen {
        path: task_path.to_path_buf(),
        source,
    })?;
    let mut report = ReportWriter::create(report_path, options.append_report)?;

    let encoder = ClipEncoder::new(options.encoder.clone());
    Cutter::new(decoder, encoder, options.clone())
        .run(TaskReader::new(BufReader::new(task_file)), &mut report)
}
