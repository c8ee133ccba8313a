//! [`Encoder`] that discards everything.  Backs benchmark runs, where no
//! output file is produced.

use tracing::info;

use strand_core::codec_traits::{Encoder, SourceInfo, StreamMap};
use strand_core::error::Result;
use strand_core::types::{Frame, Packet, Rational};

pub struct NullSink {
    time_base: Rational,
    stream_map: StreamMap,
    frames: u64,
}

impl NullSink {
    pub fn new(source: &SourceInfo, frm_rate_mul: u32) -> Self {
        let (_, time_base) = source.output_timing(frm_rate_mul);
        Self {
            time_base,
            stream_map: StreamMap::drop_all(source.streams.len()),
            frames: 0,
        }
    }
}

impl Encoder for NullSink {
    fn stream_map(&self) -> &StreamMap {
        &self.stream_map
    }

    fn video_time_base(&self) -> Rational {
        self.time_base
    }

    fn stream_time_base(&self, _output_index: usize) -> Option<Rational> {
        None
    }

    fn write_frame(&mut self, _frame: Frame, _sequence_index: u64) -> Result<()> {
        self.frames += 1;
        Ok(())
    }

    fn write_packet(&mut self, _packet: Packet) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!(frames = self.frames, "Null sink finished");
        Ok(())
    }
}
