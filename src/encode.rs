//! Clip encoding.
//!
//! The task processor talks to encoders through the [`ClipWriter`] /
//! [`ClipSession`] pair: a writer opens one session per clip, sized from the
//! first frame of the window, the session receives every frame in order and
//! is finalized by [`ClipSession::finish`]. [`ClipEncoder`] is the FFmpeg
//! implementation used by the `clipcut` binary.
//!
//! Output timestamps are a plain sequence number (0, 1, 2, ...) at the
//! configured frame rate, independent of the source timestamps.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::threading::{Config as ThreadingConfig, Type as ThreadingType};
use ffmpeg_next::encoder::Video as OpenedVideoEncoder;
use ffmpeg_next::format::Flags as FormatFlags;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::picture::Type as PictureType;
use ffmpeg_next::{Dictionary, Packet, Rational};

use crate::{error::CutError, frame::Frame};

/// Opens one encode session per clip.
pub trait ClipWriter<P> {
    /// The session type produced by [`open`](ClipWriter::open).
    type Session: ClipSession<P>;

    /// Start a new clip at `destination`, sized and formatted after `sample`
    /// (the first frame of the window).
    fn open(&self, destination: &Path, sample: &Frame<P>) -> Result<Self::Session, CutError>;
}

/// An open clip being written.
pub trait ClipSession<P> {
    /// Encode one frame. Frames arrive in ascending timestamp order.
    fn submit(&mut self, frame: &Frame<P>) -> Result<(), CutError>;

    /// Flush buffered output and finalize the destination.
    ///
    /// A session dropped without calling `finish` leaves an unfinalized
    /// artifact behind.
    fn finish(self) -> Result<(), CutError>;
}

/// Options for the FFmpeg clip encoder.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// FFmpeg encoder name (default: `libx264`).
    pub codec: String,
    /// Encoder preset, passed as the `preset` option (default: `slow`).
    pub preset: Option<String>,
    /// Output frames per second (default: 25).
    pub fps: u32,
    /// Encoder worker threads. `None` lets FFmpeg decide.
    pub threads: Option<usize>,
    /// Additional encoder options, applied after the ones above.
    pub options: Vec<(String, String)>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: Some("slow".to_string()),
            fps: 25,
            threads: None,
            options: Vec::new(),
        }
    }
}

impl EncoderOptions {
    /// Set the encoder by FFmpeg name.
    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Set the encoder preset; `None` leaves the encoder default.
    pub fn preset(mut self, preset: Option<String>) -> Self {
        self.preset = preset;
        self
    }

    /// Set the output frame rate. Zero is clamped to one.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Set a fixed number of encoder threads.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Add a raw encoder option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    fn dictionary(&self) -> Dictionary<'static> {
        let mut dictionary = Dictionary::new();
        match self.threads {
            Some(threads) => dictionary.set("threads", &threads.to_string()),
            None => dictionary.set("threads", "auto"),
        }
        if let Some(preset) = &self.preset {
            dictionary.set("preset", preset);
        }
        for (key, value) in &self.options {
            dictionary.set(key, value);
        }
        dictionary
    }
}

/// FFmpeg-backed [`ClipWriter`] for decoded video frames.
///
/// The container is inferred from the destination extension.
///
/// # Example
///
/// ```no_run
/// use clipcut::{ClipEncoder, EncoderOptions};
///
/// let encoder = ClipEncoder::new(EncoderOptions::default().codec("libx264").fps(30));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClipEncoder {
    options: EncoderOptions,
}

impl ClipEncoder {
    /// Create an encoder with the given options.
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    /// The options this encoder opens sessions with.
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }
}

fn encode_error(destination: &Path, reason: impl Display) -> CutError {
    CutError::Encode {
        destination: destination.to_path_buf(),
        reason: reason.to_string(),
    }
}

impl ClipWriter<VideoFrame> for ClipEncoder {
    type Session = EncodeSession;

    fn open(&self, destination: &Path, sample: &Frame<VideoFrame>) -> Result<EncodeSession, CutError> {
        let sample = &sample.payload;
        let fps = self.options.fps.max(1) as i32;
        log::debug!(
            "Opening {} ({}x{} {:?}, codec={}, fps={fps})",
            destination.display(),
            sample.width(),
            sample.height(),
            sample.format(),
            self.options.codec,
        );

        let mut output = ffmpeg_next::format::output(&destination)
            .map_err(|e| encode_error(destination, format!("cannot open output: {e}")))?;

        // Read before adding the stream to avoid holding two borrows of `output`.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name(&self.options.codec).ok_or_else(|| {
            encode_error(destination, format!("encoder {} not available", self.options.codec))
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|e| encode_error(destination, format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|e| encode_error(destination, format!("cannot create codec context: {e}")))?
            .encoder()
            .video()
            .map_err(|e| encode_error(destination, format!("cannot create video encoder: {e}")))?;

        let time_base = Rational::new(1, fps);
        encoder.set_width(sample.width());
        encoder.set_height(sample.height());
        encoder.set_format(sample.format());
        encoder.set_aspect_ratio(sample.aspect_ratio());
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(Rational::new(fps, 1)));
        encoder.set_threading(ThreadingConfig::kind(ThreadingType::Frame));

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as_with(codec, self.options.dictionary())
            .map_err(|e| encode_error(destination, format!("cannot open encoder: {e}")))?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|e| encode_error(destination, format!("cannot write header: {e}")))?;

        Ok(EncodeSession {
            output,
            encoder,
            stream_index,
            time_base,
            next_pts: 0,
            destination: destination.to_path_buf(),
        })
    }
}

/// An open FFmpeg clip, created by [`ClipEncoder`].
pub struct EncodeSession {
    output: Output,
    encoder: OpenedVideoEncoder,
    stream_index: usize,
    time_base: Rational,
    next_pts: i64,
    destination: PathBuf,
}

impl EncodeSession {
    /// Number of frames submitted so far.
    pub fn frames_submitted(&self) -> i64 {
        self.next_pts
    }

    fn drain_packets(&mut self) -> Result<(), CutError> {
        let stream_time_base = self
            .output
            .stream(self.stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| encode_error(&self.destination, "output stream vanished"))?;

        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| encode_error(&self.destination, format!("cannot write packet: {e}")))?;
        }
        Ok(())
    }
}

impl ClipSession<VideoFrame> for EncodeSession {
    fn submit(&mut self, frame: &Frame<VideoFrame>) -> Result<(), CutError> {
        let mut picture = frame.payload.clone();
        picture.set_pts(Some(self.next_pts));
        picture.set_kind(PictureType::None);
        self.next_pts += 1;

        self.encoder
            .send_frame(&picture)
            .map_err(|e| encode_error(&self.destination, format!("send_frame failed: {e}")))?;
        self.drain_packets()
    }

    fn finish(mut self) -> Result<(), CutError> {
        self.encoder
            .send_eof()
            .map_err(|e| encode_error(&self.destination, format!("send_eof failed: {e}")))?;
        self.drain_packets()?;

        self.output
            .write_trailer()
            .map_err(|e| encode_error(&self.destination, format!("cannot write trailer: {e}")))?;
        log::debug!(
            "Finalized {} ({} frames)",
            self.destination.display(),
            self.next_pts
        );
        Ok(())
    }
}
