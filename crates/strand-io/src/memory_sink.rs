//! In-memory [`Encoder`] that records everything it is given.
//!
//! Used by integration tests to inspect output order, timestamps, pixel data
//! and passthrough packets after a run.

use strand_core::codec_traits::{Encoder, SourceInfo, StreamMap};
use strand_core::config::EncoderConfig;
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, Packet, Rational};

/// A frame as handed to `write_frame`.
#[derive(Debug)]
pub struct WrittenFrame {
    pub sequence_index: u64,
    pub frame: Frame,
}

pub struct MemorySink {
    width: u32,
    height: u32,
    time_base: Rational,
    stream_map: StreamMap,
    /// Time base per output stream index; index 0 is the video stream.
    output_time_bases: Vec<Rational>,
    fail_on_write: Option<usize>,
    pub frames: Vec<WrittenFrame>,
    pub packets: Vec<Packet>,
    pub flushed: bool,
    pub finished: bool,
}

impl MemorySink {
    /// Sink accepting `width × height` frames at `frm_rate_mul` times the
    /// source frame rate.  Passthrough streams keep their input time base
    /// unless overridden.
    pub fn new(
        source: &SourceInfo,
        config: &EncoderConfig,
        width: u32,
        height: u32,
        frm_rate_mul: u32,
    ) -> Self {
        let (_, time_base) = source.output_timing(frm_rate_mul);
        let stream_map = StreamMap::build(&source.streams, source.video_stream, config.copy_streams);

        let mut output_time_bases = vec![time_base; stream_map.passthrough_count() + 1];
        for stream in &source.streams {
            if let Some(out) = stream_map.get(stream.index) {
                output_time_bases[out] = stream.time_base;
            }
        }

        Self {
            width,
            height,
            time_base,
            stream_map,
            output_time_bases,
            fail_on_write: None,
            frames: Vec::new(),
            packets: Vec::new(),
            flushed: false,
            finished: false,
        }
    }

    /// Give every passthrough output stream the time base `time_base`.
    pub fn with_passthrough_time_base(mut self, time_base: Rational) -> Self {
        for tb in self.output_time_bases.iter_mut().skip(1) {
            *tb = time_base;
        }
        self
    }

    /// Fail the `n`-th (zero-based) call to `write_frame`.
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Presentation timestamps of the written frames, in order.
    pub fn pts(&self) -> Vec<i64> {
        self.frames.iter().map(|w| w.frame.pts).collect()
    }

    /// First byte of each written frame.  Frames from the synthetic source
    /// are uniform, so this identifies their content.
    pub fn fills(&self) -> Vec<u8> {
        self.frames
            .iter()
            .map(|w| w.frame.data().first().copied().unwrap_or(0))
            .collect()
    }
}

impl Encoder for MemorySink {
    fn stream_map(&self) -> &StreamMap {
        &self.stream_map
    }

    fn video_time_base(&self) -> Rational {
        self.time_base
    }

    fn stream_time_base(&self, output_index: usize) -> Option<Rational> {
        self.output_time_bases.get(output_index).copied()
    }

    fn write_frame(&mut self, frame: Frame, sequence_index: u64) -> Result<()> {
        if self.fail_on_write == Some(self.frames.len()) {
            return Err(EngineError::Encode(format!(
                "injected failure writing frame {sequence_index}"
            )));
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(EngineError::Encode(format!(
                "frame {sequence_index} is {}x{}, sink expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.frames.push(WrittenFrame {
            sequence_index,
            frame,
        });
        Ok(())
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        if packet.stream_index == 0 || packet.stream_index >= self.output_time_bases.len() {
            return Err(EngineError::Encode(format!(
                "packet for unknown output stream {}",
                packet.stream_index
            )));
        }
        self.packets.push(packet);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
