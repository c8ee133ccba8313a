//! File-based [`Encoder`] writing YUV4MPEG2.
//!
//! Frames are written raw, in call order.  The output frame rate is the
//! input rate times the frame-rate multiplier, and `pts` is expected in the
//! matching time base.  Y4M holds exactly one stream, so the stream map drops
//! every input substream.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use strand_core::codec_traits::{Encoder, SourceInfo, StreamMap};
use strand_core::config::EncoderConfig;
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, Packet, PixelFormat, Rational};

use crate::y4m::{FRAME_MARKER, Y4mHeader};

const CODECS: [&str; 2] = ["rawvideo", "y4m"];

pub struct Y4mSink {
    writer: BufWriter<File>,
    path: PathBuf,
    width: u32,
    height: u32,
    format: PixelFormat,
    time_base: Rational,
    stream_map: StreamMap,
    last_pts: Option<i64>,
    frames_written: u64,
    bytes_written: u64,
}

impl Y4mSink {
    /// Create `path` and write the stream header.
    pub fn create(
        path: impl AsRef<Path>,
        source: &SourceInfo,
        config: &EncoderConfig,
        width: u32,
        height: u32,
        frm_rate_mul: u32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !CODECS.contains(&config.codec.as_str()) {
            return Err(EngineError::Init(format!(
                "Y4M output cannot encode with codec '{}'",
                config.codec
            )));
        }
        let format = config.pix_fmt.unwrap_or(source.format);
        if format != source.format {
            return Err(EngineError::Init(format!(
                "Y4M output does not convert pixel formats ({} -> {format})",
                source.format
            )));
        }
        for (key, _) in &config.extra_options {
            warn!(key = %key, "Y4M output ignores encoder option");
        }

        let (frame_rate, time_base) = source.output_timing(frm_rate_mul);
        let header = Y4mHeader::new(width, height, frame_rate, format);
        let line = header.to_line()?;

        let file = File::create(&path).map_err(|e| EngineError::io(&path, e))?;
        let mut writer = BufWriter::with_capacity(4 * 1024 * 1024, file); // 4 MiB buffer
        writer
            .write_all(line.as_bytes())
            .map_err(|e| EngineError::io(&path, e))?;

        info!(
            path = %path.display(),
            width,
            height,
            fps = %frame_rate,
            format = %format,
            "Y4M sink opened"
        );

        Ok(Self {
            writer,
            path,
            width,
            height,
            format,
            time_base,
            stream_map: StreamMap::drop_all(source.streams.len()),
            last_pts: None,
            frames_written: 0,
            bytes_written: line.len() as u64,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_err(&self, e: std::io::Error) -> EngineError {
        EngineError::Encode(format!("Failed to write to {}: {e}", self.path.display()))
    }
}

fn write_record(writer: &mut impl Write, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(FRAME_MARKER.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(data)
}

impl Encoder for Y4mSink {
    fn stream_map(&self) -> &StreamMap {
        &self.stream_map
    }

    fn video_time_base(&self) -> Rational {
        self.time_base
    }

    fn stream_time_base(&self, _output_index: usize) -> Option<Rational> {
        None
    }

    fn write_frame(&mut self, frame: Frame, sequence_index: u64) -> Result<()> {
        if (frame.width(), frame.height(), frame.format()) != (self.width, self.height, self.format) {
            return Err(EngineError::Encode(format!(
                "frame {sequence_index} is {}x{} {}, output is {}x{} {}",
                frame.width(),
                frame.height(),
                frame.format(),
                self.width,
                self.height,
                self.format
            )));
        }
        if let Some(last) = self.last_pts
            && frame.pts <= last
        {
            return Err(EngineError::Encode(format!(
                "non-increasing pts {} after {last} at frame {sequence_index}",
                frame.pts
            )));
        }

        if let Err(e) = write_record(&mut self.writer, frame.data()) {
            return Err(self.write_err(e));
        }

        self.last_pts = Some(frame.pts);
        self.frames_written += 1;
        self.bytes_written += (FRAME_MARKER.len() + 1 + frame.data().len()) as u64;

        if self.frames_written.is_multiple_of(100) {
            debug!(
                frames = self.frames_written,
                bytes_mb = self.bytes_written / (1024 * 1024),
                "Sink progress"
            );
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        Err(EngineError::Encode(format!(
            "Y4M output has no stream {} for passthrough",
            packet.stream_index
        )))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| self.write_err(e))
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        info!(
            path = %self.path.display(),
            frames = self.frames_written,
            bytes_mb = self.bytes_written / (1024 * 1024),
            "Y4M sink finished"
        );
        Ok(())
    }
}
