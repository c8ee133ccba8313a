//! In-memory [`Decoder`] producing uniform frames.
//!
//! Every video frame is a single byte value repeated over the whole buffer,
//! which makes pixel assertions trivial: frame `i` of the output either
//! carries fill `i`, a duplicate of a neighbour, or a blend of two.
//!
//! Optional audio and subtitle substreams generate one packet per video
//! frame (subtitles every other frame) so passthrough can be exercised.

use std::collections::VecDeque;
use std::sync::Arc;

use strand_core::codec_traits::{Decoded, Decoder, SourceInfo};
use strand_core::error::{EngineError, Result};
use strand_core::types::{
    Frame, FrameLedger, Packet, PixelFormat, Rational, StreamInfo, StreamKind, rescale_ts,
};

pub struct SyntheticSource {
    info: SourceInfo,
    packets: VecDeque<Packet>,
    pending: VecDeque<Frame>,
    decoder_delay: usize,
    draining: bool,
    ledger: Option<Arc<FrameLedger>>,
    fail_decode_at: Option<usize>,
    sent: usize,
}

pub struct SyntheticSourceBuilder {
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_rate: Rational,
    video_time_base: Option<Rational>,
    fills: Vec<u8>,
    start_frame: i64,
    audio: Option<Rational>,
    subtitles: Option<Rational>,
    frame_count_metadata: Option<u64>,
    duration_metadata: Option<f64>,
    decoder_delay: usize,
    ledger: Option<Arc<FrameLedger>>,
    fail_decode_at: Option<usize>,
}

impl SyntheticSource {
    pub fn builder(width: u32, height: u32) -> SyntheticSourceBuilder {
        SyntheticSourceBuilder {
            width,
            height,
            format: PixelFormat::Gray8,
            frame_rate: Rational::new(25, 1),
            video_time_base: None,
            fills: Vec::new(),
            start_frame: 0,
            audio: None,
            subtitles: None,
            frame_count_metadata: None,
            duration_metadata: None,
            decoder_delay: 0,
            ledger: None,
            fail_decode_at: None,
        }
    }
}

impl SyntheticSourceBuilder {
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn frame_rate(mut self, rate: Rational) -> Self {
        self.frame_rate = rate;
        self
    }

    /// Video time base; defaults to one tick per frame.
    pub fn video_time_base(mut self, time_base: Rational) -> Self {
        self.video_time_base = Some(time_base);
        self
    }

    /// `n` frames with fills `0, 1, 2, …` (wrapping at 256).
    pub fn frames(mut self, n: usize) -> Self {
        self.fills = (0..n).map(|i| (i % 256) as u8).collect();
        self
    }

    /// One frame per entry, uniformly filled with that value.
    pub fn fills(mut self, fills: Vec<u8>) -> Self {
        self.fills = fills;
        self
    }

    /// Start every substream `frames` frame periods after time zero.
    pub fn start_frame(mut self, frames: i64) -> Self {
        self.start_frame = frames;
        self
    }

    /// Add an audio substream ahead of the video stream.
    pub fn with_audio(mut self, time_base: Rational) -> Self {
        self.audio = Some(time_base);
        self
    }

    /// Add a subtitle substream after the video stream.
    pub fn with_subtitles(mut self, time_base: Rational) -> Self {
        self.subtitles = Some(time_base);
        self
    }

    /// Report `count` frames in container metadata.
    pub fn frame_count_metadata(mut self, count: u64) -> Self {
        self.frame_count_metadata = Some(count);
        self
    }

    pub fn duration_metadata(mut self, secs: f64) -> Self {
        self.duration_metadata = Some(secs);
        self
    }

    /// Hold `delay` frames internally until more input or end of input.
    pub fn decoder_delay(mut self, delay: usize) -> Self {
        self.decoder_delay = delay;
        self
    }

    pub fn ledger(mut self, ledger: Arc<FrameLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Fail `send_packet` for the video packet with this zero-based index.
    pub fn fail_decode_at(mut self, index: usize) -> Self {
        self.fail_decode_at = Some(index);
        self
    }

    pub fn build(self) -> SyntheticSource {
        let frame_tb = self.frame_rate.invert();
        let video_tb = self.video_time_base.unwrap_or(frame_tb);

        let mut streams = Vec::new();
        let mut push_stream = |kind, time_base, codec: &str| {
            let index = streams.len();
            streams.push(StreamInfo {
                index,
                kind,
                time_base,
                codec: codec.into(),
            });
            index
        };
        let audio = self
            .audio
            .map(|tb| (push_stream(StreamKind::Audio, tb, "pcm_s16le"), tb));
        let video = push_stream(StreamKind::Video, video_tb, "rawvideo");
        let subtitles = self
            .subtitles
            .map(|tb| (push_stream(StreamKind::Subtitle, tb, "subrip"), tb));

        let mut packets = VecDeque::new();
        for (n, &fill) in self.fills.iter().enumerate() {
            let i = self.start_frame + n as i64;
            if let Some((index, tb)) = audio {
                packets.push_back(Packet {
                    stream_index: index,
                    pts: Some(rescale_ts(i, frame_tb, tb)),
                    dts: Some(rescale_ts(i, frame_tb, tb)),
                    duration: rescale_ts(1, frame_tb, tb),
                    data: vec![0xA0; 4],
                    is_keyframe: true,
                });
            }
            let pts = rescale_ts(i, frame_tb, video_tb);
            packets.push_back(Packet {
                stream_index: video,
                pts: Some(pts),
                dts: Some(pts),
                duration: rescale_ts(1, frame_tb, video_tb),
                data: vec![fill],
                is_keyframe: true,
            });
            if let Some((index, tb)) = subtitles
                && n % 2 == 0
            {
                packets.push_back(Packet {
                    stream_index: index,
                    pts: Some(rescale_ts(i, frame_tb, tb)),
                    dts: None,
                    duration: rescale_ts(2, frame_tb, tb),
                    data: b"sub".to_vec(),
                    is_keyframe: true,
                });
            }
        }

        let info = SourceInfo {
            streams,
            video_stream: video,
            width: self.width,
            height: self.height,
            format: self.format,
            frame_rate: Some(self.frame_rate),
            frame_count: self.frame_count_metadata,
            duration_secs: self.duration_metadata,
        };

        SyntheticSource {
            info,
            packets,
            pending: VecDeque::new(),
            decoder_delay: self.decoder_delay,
            draining: false,
            ledger: self.ledger,
            fail_decode_at: self.fail_decode_at,
            sent: 0,
        }
    }
}

impl Decoder for SyntheticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        Ok(self.packets.pop_front())
    }

    fn send_packet(&mut self, packet: Option<Packet>) -> Result<()> {
        let Some(packet) = packet else {
            self.draining = true;
            return Ok(());
        };
        if self.fail_decode_at == Some(self.sent) {
            return Err(EngineError::Decode(format!(
                "synthetic decode failure at frame {}",
                self.sent
            )));
        }
        self.sent += 1;

        let fill = packet.data.first().copied().unwrap_or(0);
        let frame = Frame::filled(
            self.info.width,
            self.info.height,
            self.info.format,
            fill,
            packet.pts.unwrap_or(0),
        );
        self.pending.push_back(match &self.ledger {
            Some(ledger) => frame.with_ledger(Arc::clone(ledger)),
            None => frame,
        });
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Decoded> {
        if self.pending.len() > self.decoder_delay || (self.draining && !self.pending.is_empty()) {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Decoded::Frame(frame));
            }
        }
        if self.draining {
            Ok(Decoded::Eof)
        } else {
            Ok(Decoded::Again)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_order_is_audio_video_subtitles() {
        let source = SyntheticSource::builder(2, 2)
            .frames(3)
            .with_audio(Rational::new(1, 48_000))
            .with_subtitles(Rational::new(1, 1000))
            .build();
        let kinds: Vec<_> = source.info().streams.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StreamKind::Audio, StreamKind::Video, StreamKind::Subtitle]
        );
        assert_eq!(source.info().video_stream, 1);
    }

    #[test]
    fn delay_holds_frames_until_drain() {
        let mut source = SyntheticSource::builder(2, 2)
            .frames(2)
            .decoder_delay(1)
            .build();
        let first = source.read_packet().expect("read").expect("packet");
        source.send_packet(Some(first)).expect("send");
        assert!(matches!(source.receive_frame(), Ok(Decoded::Again)));

        let second = source.read_packet().expect("read").expect("packet");
        source.send_packet(Some(second)).expect("send");
        match source.receive_frame().expect("receive") {
            Decoded::Frame(frame) => assert_eq!(frame.data()[0], 0),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(source.receive_frame(), Ok(Decoded::Again)));

        source.send_packet(None).expect("drain");
        assert!(matches!(source.receive_frame(), Ok(Decoded::Frame(_))));
        assert!(matches!(source.receive_frame(), Ok(Decoded::Eof)));
        assert!(source.read_packet().expect("read").is_none());
    }

    #[test]
    fn video_pts_follow_custom_time_base() {
        let mut source = SyntheticSource::builder(2, 2)
            .frames(3)
            .frame_rate(Rational::new(25, 1))
            .video_time_base(Rational::new(1, 1000))
            .build();
        let pts: Vec<_> = std::iter::from_fn(|| source.read_packet().expect("read"))
            .map(|p| p.pts)
            .collect();
        assert_eq!(pts, vec![Some(0), Some(40), Some(80)]);
    }
}
