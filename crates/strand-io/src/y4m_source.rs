//! File-based [`Decoder`] for YUV4MPEG2 input.
//!
//! Y4M frames are already raw, so "decoding" is a size check: each `FRAME`
//! record becomes one packet whose payload is the pixel data, and
//! `send_packet` wraps that payload in a [`Frame`] without copying.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use strand_core::codec_traits::{Decoded, Decoder, SourceInfo};
use strand_core::config::HwDeviceType;
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, FrameLedger, Packet, StreamInfo, StreamKind};

use crate::y4m::{FRAME_MARKER, Y4mHeader};

pub struct Y4mSource {
    reader: BufReader<File>,
    path: PathBuf,
    header: Y4mHeader,
    info: SourceInfo,
    next_pts: i64,
    pending: VecDeque<Frame>,
    draining: bool,
    ledger: Option<Arc<FrameLedger>>,
}

impl Y4mSource {
    /// Open `path`.  Only software decoding is available.
    pub fn open(hw: HwDeviceType, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if hw != HwDeviceType::None {
            return Err(EngineError::Init(format!(
                "Y4M input has no {hw} decode path"
            )));
        }

        let file = File::open(&path).map_err(|e| EngineError::io(&path, e))?;
        let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mut reader = BufReader::with_capacity(1024 * 1024, file);

        let mut line = Vec::new();
        reader
            .read_until(b'\n', &mut line)
            .map_err(|e| EngineError::io(&path, e))?;
        let header_len = line.len() as u64;
        let text = std::str::from_utf8(&line)
            .map_err(|_| EngineError::Init(format!("{}: header is not ASCII", path.display())))?;
        let header = Y4mHeader::parse(text.trim_end())?;

        // Assumes bare `FRAME\n` markers; parameters on the marker only make
        // this an underestimate.
        let record = header.frame_size() as u64 + FRAME_MARKER.len() as u64 + 1;
        let frame_count = file_len.saturating_sub(header_len) / record;
        let duration_secs = (frame_count > 0)
            .then(|| frame_count as f64 / header.frame_rate.as_f64());

        let info = SourceInfo {
            streams: vec![StreamInfo {
                index: 0,
                kind: StreamKind::Video,
                time_base: header.frame_rate.invert(),
                codec: "rawvideo".into(),
            }],
            video_stream: 0,
            width: header.width,
            height: header.height,
            format: header.format,
            frame_rate: Some(header.frame_rate),
            frame_count: (frame_count > 0).then_some(frame_count),
            duration_secs,
        };

        info!(
            path = %path.display(),
            width = header.width,
            height = header.height,
            format = %header.format,
            fps = %header.frame_rate,
            frames = frame_count,
            "Y4M source opened"
        );

        Ok(Self {
            reader,
            path,
            header,
            info,
            next_pts: 0,
            pending: VecDeque::new(),
            draining: false,
            ledger: None,
        })
    }

    /// Count every decoded frame in `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<FrameLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }
}

impl Decoder for Y4mSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut marker = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut marker)
            .map_err(|e| EngineError::Decode(format!("{}: {e}", self.path.display())))?;
        if n == 0 {
            debug!(frames = self.next_pts, "Y4M end of stream");
            return Ok(None);
        }
        if !marker.starts_with(FRAME_MARKER.as_bytes()) || marker.last() != Some(&b'\n') {
            return Err(EngineError::Decode(format!(
                "{}: expected FRAME marker before frame {}",
                self.path.display(),
                self.next_pts
            )));
        }

        let mut data = vec![0u8; self.header.frame_size()];
        self.reader.read_exact(&mut data).map_err(|e| {
            EngineError::Decode(format!(
                "{}: frame {} truncated: {e}",
                self.path.display(),
                self.next_pts
            ))
        })?;

        let pts = self.next_pts;
        self.next_pts += 1;
        Ok(Some(Packet {
            stream_index: self.info.video_stream,
            pts: Some(pts),
            dts: Some(pts),
            duration: 1,
            data,
            is_keyframe: true,
        }))
    }

    fn send_packet(&mut self, packet: Option<Packet>) -> Result<()> {
        let Some(packet) = packet else {
            self.draining = true;
            return Ok(());
        };
        let pts = packet.pts.unwrap_or(self.next_pts - 1);
        let frame = Frame::new(
            self.header.width,
            self.header.height,
            self.header.format,
            packet.data,
            pts,
        )
        .map_err(|e| EngineError::Decode(e.to_string()))?;
        self.pending.push_back(match &self.ledger {
            Some(ledger) => frame.with_ledger(Arc::clone(ledger)),
            None => frame,
        });
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Decoded> {
        match self.pending.pop_front() {
            Some(frame) => Ok(Decoded::Frame(frame)),
            None if self.draining => Ok(Decoded::Eof),
            None => Ok(Decoded::Again),
        }
    }
}
