//! FFmpeg decode side: demux, decode and filter one video stream.
//!
//! [`VideoDecoder`] opens a source, picks its best video stream, and runs
//! every decoded picture through a user-supplied filter graph
//! (`buffer → <filter spec> → buffersink`). It implements [`FrameSource`],
//! yielding the frames produced by one demuxed packet per call.
//!
//! Every FFmpeg object is owned by the decoder and released on drop, so a
//! failure halfway through [`VideoDecoder::open`] only frees what was
//! already acquired.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::threading::{Config as ThreadingConfig, Type as ThreadingType};
use ffmpeg_next::decoder::Video as VideoDecoderContext;
use ffmpeg_next::filter::Graph as FilterGraph;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::media::Type;
use ffmpeg_next::{Error as FfmpegError, Packet, Rational};
use ffmpeg_sys_next::AVPixelFormat;

use crate::{conversion::seconds_per_tick, error::CutError, frame::Frame, source::FrameSource};

/// Filter spec used when the caller passes an empty one.
const PASSTHROUGH_FILTER: &str = "null";

/// A decoding, filtering [`FrameSource`] over one media source.
///
/// # Example
///
/// ```no_run
/// use clipcut::{FrameSource, VideoDecoder};
///
/// let decoder = VideoDecoder::open("input.mp4", "scale=480:-2,fps=15")?;
/// println!("{} s per tick", decoder.time_base());
/// # Ok::<(), clipcut::CutError>(())
/// ```
pub struct VideoDecoder {
    input: Input,
    stream_index: usize,
    decoder: VideoDecoderContext,
    graph: FilterGraph,
    time_base: f64,
    decoded: VideoFrame,
    exhausted: bool,
    location: String,
}

impl Debug for VideoDecoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoDecoder")
            .field("location", &self.location)
            .field("stream_index", &self.stream_index)
            .field("time_base", &self.time_base)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl VideoDecoder {
    /// Open `source` and prepare decoding through `filter`.
    ///
    /// `filter` is an FFmpeg filter-graph description such as
    /// `"scale=320:-1,fps=10"`; an empty string passes frames through.
    ///
    /// # Errors
    ///
    /// Returns [`CutError::Initialization`] if the input cannot be opened,
    /// has no video stream, the decoder cannot be opened, or the filter graph
    /// cannot be built.
    pub fn open(source: &str, filter: &str) -> Result<Self, CutError> {
        let init_error = |reason: String| CutError::Initialization {
            source_location: source.to_string(),
            reason,
        };

        log::debug!("Opening source {source} with filter {filter:?}");

        ffmpeg_next::init()
            .map_err(|e| init_error(format!("FFmpeg initialisation failed: {e}")))?;

        let input =
            ffmpeg_next::format::input(&source).map_err(|e| init_error(format!("cannot open input: {e}")))?;

        let (stream_index, stream_time_base, mut codec_context) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| init_error("no video stream found".to_string()))?;
            let codec_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|e| init_error(format!("cannot copy codec parameters: {e}")))?;
            (stream.index(), stream.time_base(), codec_context)
        };

        codec_context.set_threading(ThreadingConfig::kind(ThreadingType::Frame));
        let decoder = codec_context
            .decoder()
            .video()
            .map_err(|e| init_error(format!("cannot open decoder: {e}")))?;

        let mut graph =
            build_filter_graph(&decoder, stream_time_base, filter).map_err(init_error)?;

        // Filters such as `fps` renegotiate the output time base.
        let output_time_base = sink_time_base(&mut graph).unwrap_or(stream_time_base);
        let time_base = seconds_per_tick(output_time_base).ok_or_else(|| {
            init_error(format!("invalid time base {output_time_base}"))
        })?;

        log::info!(
            "Decoding {source}: stream #{stream_index}, {}x{} {:?}, time base {output_time_base}",
            decoder.width(),
            decoder.height(),
            decoder.format(),
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            graph,
            time_base,
            decoded: VideoFrame::empty(),
            exhausted: false,
            location: source.to_string(),
        })
    }

    /// Index of the decoded video stream within the container.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn receive_decoded(&mut self, frames: &mut Vec<Frame<VideoFrame>>) -> Result<(), CutError> {
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            if self.decoded.pts().is_none() {
                let timestamp = self.decoded.timestamp();
                self.decoded.set_pts(timestamp);
            }
            feed_filter(&mut self.graph, Some(&self.decoded), frames)?;
        }
        Ok(())
    }

    fn flush(&mut self, frames: &mut Vec<Frame<VideoFrame>>) -> Result<(), CutError> {
        if let Err(error) = self.decoder.send_eof() {
            log::debug!("Decoder flush failed: {error}");
        }
        self.receive_decoded(frames)?;
        feed_filter(&mut self.graph, None, frames)
    }
}

impl FrameSource for VideoDecoder {
    type Payload = VideoFrame;

    fn time_base(&self) -> f64 {
        self.time_base
    }

    fn decode_next(&mut self) -> Result<Option<Vec<Frame<VideoFrame>>>, CutError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut frames = Vec::new();
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                if packet.stream() != self.stream_index {
                    return Ok(Some(frames));
                }
                match self.decoder.send_packet(&packet) {
                    Ok(()) => self.receive_decoded(&mut frames)?,
                    Err(error) => log::debug!("Decoder rejected packet: {error}"),
                }
            }
            Err(FfmpegError::Eof) => {
                self.flush(&mut frames)?;
                self.exhausted = true;
            }
            Err(error) => {
                log::warn!("Stopping at demux error in {}: {error}", self.location);
                self.flush(&mut frames)?;
                self.exhausted = true;
            }
        }
        Ok(Some(frames))
    }
}

/// Build `buffer → spec → buffersink` for frames coming out of `decoder`.
fn build_filter_graph(
    decoder: &VideoDecoderContext,
    time_base: Rational,
    spec: &str,
) -> Result<FilterGraph, String> {
    let aspect = decoder.aspect_ratio();
    let (aspect_num, aspect_den) = if aspect.numerator() > 0 && aspect.denominator() > 0 {
        (aspect.numerator(), aspect.denominator())
    } else {
        (1, 1)
    };

    let buffer_args = format!(
        "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
        decoder.width(),
        decoder.height(),
        AVPixelFormat::from(decoder.format()) as i32,
        time_base.numerator(),
        time_base.denominator(),
        aspect_num,
        aspect_den,
    );

    let mut graph = FilterGraph::new();
    let buffer = ffmpeg_next::filter::find("buffer")
        .ok_or_else(|| "FFmpeg 'buffer' filter not found".to_string())?;
    graph
        .add(&buffer, "in", &buffer_args)
        .map_err(|e| format!("cannot create buffer source: {e}"))?;

    let buffersink = ffmpeg_next::filter::find("buffersink")
        .ok_or_else(|| "FFmpeg 'buffersink' filter not found".to_string())?;
    graph
        .add(&buffersink, "out", "")
        .map_err(|e| format!("cannot create buffer sink: {e}"))?;

    let spec = if spec.trim().is_empty() {
        PASSTHROUGH_FILTER
    } else {
        spec
    };
    graph
        .output("in", 0)
        .map_err(|e| format!("cannot link buffer source: {e}"))?
        .input("out", 0)
        .map_err(|e| format!("cannot link buffer sink: {e}"))?
        .parse(spec)
        .map_err(|e| format!("cannot parse filter {spec:?}: {e}"))?;
    graph
        .validate()
        .map_err(|e| format!("invalid filter graph: {e}"))?;

    Ok(graph)
}

fn sink_time_base(graph: &mut FilterGraph) -> Option<Rational> {
    let sink = graph.get("out")?;
    let time_base = Rational::from(unsafe {
        ffmpeg_sys_next::av_buffersink_get_time_base(sink.as_ptr())
    });
    (time_base.numerator() > 0 && time_base.denominator() > 0).then_some(time_base)
}

/// Push `frame` (or a flush when `None`) into the graph and collect every
/// frame the sink has ready.
fn feed_filter(
    graph: &mut FilterGraph,
    frame: Option<&VideoFrame>,
    frames: &mut Vec<Frame<VideoFrame>>,
) -> Result<(), CutError> {
    let fed = {
        let mut source = graph
            .get("in")
            .ok_or_else(|| CutError::Decode("filter 'in' not found".to_string()))?;
        match frame {
            Some(frame) => source.source().add(frame),
            None => source.source().flush(),
        }
    };
    if let Err(error) = fed {
        log::debug!("Filter graph rejected frame: {error}");
        return Ok(());
    }

    loop {
        let mut filtered = VideoFrame::empty();
        let received = graph
            .get("out")
            .ok_or_else(|| CutError::Decode("filter 'out' not found".to_string()))?
            .sink()
            .frame(&mut filtered);
        if received.is_err() {
            break;
        }
        let pts = filtered.pts().or_else(|| filtered.timestamp());
        match pts {
            Some(pts) => frames.push(Frame::from_video(pts, filtered)),
            None => log::debug!("Dropping filtered frame without timestamp"),
        }
    }
    Ok(())
}
