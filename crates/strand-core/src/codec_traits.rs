//! Decoder and encoder collaborator contracts.
//!
//! The scheduler in `strand-pipeline` only ever sees these traits.  Concrete
//! implementations (Y4M files, synthetic sources, in-memory sinks) live in
//! `strand-io`, so new containers or codecs plug in without touching the
//! scheduling loop.

use crate::error::{EngineError, Result};
use crate::types::{Frame, Packet, PixelFormat, Rational, StreamInfo, StreamKind};

// ─── Source description ──────────────────────────────────────────────────────

/// What an opened decoder knows about its input.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    /// Every substream in the container, indexed by position.
    pub streams: Vec<StreamInfo>,
    /// Index of the selected video substream.
    pub video_stream: usize,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Average frame rate of the selected stream, if known.
    pub frame_rate: Option<Rational>,
    /// Frame count from container metadata, if present.
    pub frame_count: Option<u64>,
    /// Duration in seconds, if known.
    pub duration_secs: Option<f64>,
}

impl SourceInfo {
    /// Time base of the selected video stream.
    pub fn video_time_base(&self) -> Rational {
        self.streams
            .get(self.video_stream)
            .map(|stream| stream.time_base)
            .unwrap_or(Rational::new(1, 1))
    }

    /// Average frame rate, falling back to one frame per video time-base tick.
    pub fn nominal_frame_rate(&self) -> Rational {
        self.frame_rate
            .filter(|rate| rate.is_valid())
            .unwrap_or_else(|| self.video_time_base().invert())
    }

    /// Frame rate and matching time base of an output carrying `frm_rate_mul`
    /// frames per input frame interval.
    pub fn output_timing(&self, frm_rate_mul: u32) -> (Rational, Rational) {
        let rate = self.nominal_frame_rate().scaled(frm_rate_mul.max(1));
        (rate, rate.invert())
    }

    /// Best-effort frame count: metadata first, then duration × frame rate,
    /// else 0 ("unknown").
    pub fn estimate_total_frames(&self) -> u64 {
        if let Some(count) = self.frame_count.filter(|&count| count > 0) {
            return count;
        }
        match (self.duration_secs, self.frame_rate) {
            (Some(secs), Some(rate)) if secs > 0.0 && rate.is_valid() => {
                let estimate = (secs * rate.as_f64()).round();
                if estimate.is_finite() && estimate > 0.0 {
                    estimate as u64
                } else {
                    0
                }
            }
            _ => 0,
        }
    }
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Result of asking a decoder for its next frame.
#[derive(Debug)]
pub enum Decoded {
    Frame(Frame),
    /// No frame available until more input is sent.
    Again,
    /// Every frame has been returned.
    Eof,
}

/// Demuxer plus video decoder for one opened source.
pub trait Decoder: Send {
    fn info(&self) -> &SourceInfo;

    /// Next demuxed unit from any substream, or `None` at end of stream.
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Feed a packet of the selected video stream.  `None` signals end of
    /// input and puts the decoder into draining mode.
    fn send_packet(&mut self, packet: Option<Packet>) -> Result<()>;

    /// Pull the next decoded frame, with `pts` in the video stream time base.
    fn receive_frame(&mut self) -> Result<Decoded>;
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Encoder plus muxer for one output.
pub trait Encoder: Send {
    /// Mapping from input substream index to output substream index.
    fn stream_map(&self) -> &StreamMap;

    /// Time base in which `write_frame` expects `pts`.
    fn video_time_base(&self) -> Rational;

    /// Time base of output substream `output_index`, if it exists.
    fn stream_time_base(&self, output_index: usize) -> Option<Rational>;

    /// Encode one frame.  `sequence_index` is the frame's position in the
    /// output video stream.
    fn write_frame(&mut self, frame: Frame, sequence_index: u64) -> Result<()>;

    /// Mux a passthrough packet already relabelled and rescaled.
    fn write_packet(&mut self, packet: Packet) -> Result<()>;

    /// Drain encoder-internal buffering.
    fn flush(&mut self) -> Result<()>;

    /// Write the container trailer.  Only called after a completed run.
    fn finish(&mut self) -> Result<()>;
}

// ─── Stream map ──────────────────────────────────────────────────────────────

/// Input substream index → output substream index, or `None` for "drop".
///
/// The selected video stream is always `None`: it travels through the
/// processor, never through passthrough.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamMap {
    entries: Vec<Option<usize>>,
}

impl StreamMap {
    /// Standard mapping: output stream 0 is the processed video; audio and
    /// subtitle streams follow in input order when `copy_streams` is set.
    /// Everything else is dropped.
    pub fn build(streams: &[StreamInfo], selected: usize, copy_streams: bool) -> Self {
        let mut next_output = 1;
        let entries = streams
            .iter()
            .map(|stream| {
                let copyable = matches!(stream.kind, StreamKind::Audio | StreamKind::Subtitle);
                if stream.index == selected || !copy_streams || !copyable {
                    return None;
                }
                let out = next_output;
                next_output += 1;
                Some(out)
            })
            .collect();
        Self { entries }
    }

    /// Drop every substream.
    pub fn drop_all(stream_count: usize) -> Self {
        Self {
            entries: vec![None; stream_count],
        }
    }

    /// Build from explicit entries, validating the selected stream is absent.
    pub fn from_entries(entries: Vec<Option<usize>>, selected: usize) -> Result<Self> {
        if entries.get(selected).copied().flatten().is_some() {
            return Err(EngineError::InvalidConfig(format!(
                "stream map must not route selected video stream {selected}"
            )));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Output index for input stream `input_index`, `None` when dropped or
    /// out of range.
    pub fn get(&self, input_index: usize) -> Option<usize> {
        self.entries.get(input_index).copied().flatten()
    }

    /// Number of substreams copied through.
    pub fn passthrough_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn entries(&self) -> &[Option<usize>] {
        &self.entries
    }
}
