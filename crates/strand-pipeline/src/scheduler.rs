//! Frame scheduler: decode → transform → encode on a single worker thread.
//!
//! # Loop
//!
//! ```text
//!            ┌───────────── video ─────────────┐
//! ┌───────┐  │  ┌──────────┐   ┌───────────┐   │  ┌─────────┐
//! │ demux │──┼─►│ decoder  │──►│ processor │───┼─►│ encoder │
//! └───────┘  │  └──────────┘   └───────────┘   │  └─────────┘
//!            └──── audio / subtitles ──────────┴──► rescale + relabel
//! ```
//!
//! Every demuxed packet is handled to completion before the next is read.
//! Nothing runs concurrently inside the loop: output order equals dispatch
//! order, and a frame is never reachable from two places at once.
//!
//! # Modes
//!
//! - **Filter**: one frame in, at most one out.  Output `pts` is the input
//!   `pts` rescaled from the decoder time base to the encoder time base.
//! - **Interpolate**: the first frame is written at index 0.  Every later
//!   frame F, with P the previously written source frame, contributes
//!   `M − 1` synthesized slots at `t = k / M` followed by F itself.  Across a
//!   scene change the slots are copies of P.  `N` frames produce
//!   `(N − 1) × M + 1` outputs.  Each output's `pts` is the first frame's
//!   rescaled `pts` plus its index, in the encoder time base
//!   (`1 / (fps × M)`), so a stream that starts late stays aligned with its
//!   passthrough packets.  A slot whose interpolation would block still
//!   consumes its index.
//!
//! # Control
//!
//! The [`ProcessingContext`] is polled before every read and before every
//! frame dispatch.  While paused the worker sleeps in `pause_poll` steps
//! without dropping anything it holds.  Abort returns
//! [`RunOutcome::Aborted`] at the next poll and skips decoder drain,
//! processor flush and encoder flush.
//!
//! # End of stream
//!
//! Decoder drain (frames held for reordering), then processor flush
//! (look-ahead filters), then encoder flush.  Writing the container trailer
//! is left to the caller so it can be skipped on abort.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use strand_core::codec_traits::{Decoded, Decoder, Encoder, StreamMap};
use strand_core::config::{EncoderConfig, ProcessorConfig};
use strand_core::context::ProcessingContext;
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, Packet, Rational, rescale_ts};
use strand_processors::{Filter, Interpolator, ProcessingMode, Processor};

use crate::scene::frame_difference;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Default sleep between pause checks.
pub const DEFAULT_PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Discard produced frames instead of encoding them.
    pub benchmark: bool,
    /// Copy non-video substreams that the stream map keeps.
    pub copy_streams: bool,
    /// Output frames per input frame interval (interpolation only).
    pub frm_rate_mul: u32,
    /// Scene-change threshold in percent (interpolation only).
    pub scn_det_thresh: f32,
    pub pause_poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            benchmark: false,
            copy_streams: true,
            frm_rate_mul: 2,
            scn_det_thresh: 20.0,
            pause_poll: DEFAULT_PAUSE_POLL,
        }
    }
}

impl SchedulerConfig {
    pub fn from_configs(processor: &ProcessorConfig, encoder: &EncoderConfig, benchmark: bool) -> Self {
        Self {
            benchmark,
            copy_streams: encoder.copy_streams,
            frm_rate_mul: processor.frm_rate_mul,
            scn_det_thresh: processor.scn_det_thresh,
            pause_poll: DEFAULT_PAUSE_POLL,
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// How a run ended, when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Counters and cumulative stage timings for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub frames_decoded: u64,
    /// Frames handed to the encoder.
    pub frames_written: u64,
    /// Frames produced but dropped in benchmark mode.
    pub frames_discarded: u64,
    pub scene_changes: u64,
    /// Interpolation slots that produced no frame.
    pub interpolation_skips: u64,
    pub packets_copied: u64,
    pub packets_dropped: u64,
    pub decode_us: u64,
    pub process_us: u64,
    pub encode_us: u64,
    pub elapsed_us: u64,
}

impl RunStats {
    /// Frames produced by the processor stage, written or not.
    pub fn frames_produced(&self) -> u64 {
        self.frames_written + self.frames_discarded
    }

    /// Log average stage latencies.
    pub fn report(&self) {
        let avg = |total: u64, count: u64| if count > 0 { total / count } else { 0 };
        info!(
            decode_avg_us = avg(self.decode_us, self.frames_decoded),
            process_avg_us = avg(self.process_us, self.frames_produced()),
            encode_avg_us = avg(self.encode_us, self.frames_written),
            "Stage latencies"
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: RunStats,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Abort,
}

pub struct FrameScheduler {
    config: SchedulerConfig,
    processor: Processor,
}

impl FrameScheduler {
    /// Pair an initialized processor with its run configuration.
    pub fn new(config: SchedulerConfig, processor: Processor) -> Result<Self> {
        if processor.mode() == ProcessingMode::Interpolate {
            if config.frm_rate_mul < 2 {
                return Err(EngineError::InvalidConfig(format!(
                    "interpolation needs a frame rate multiplier of at least 2 (got {})",
                    config.frm_rate_mul
                )));
            }
            if !(0.0..=100.0).contains(&config.scn_det_thresh) {
                return Err(EngineError::InvalidConfig(format!(
                    "scene threshold must be within 0-100 (got {})",
                    config.scn_det_thresh
                )));
            }
        }
        if config.pause_poll.is_zero() {
            return Err(EngineError::InvalidConfig(
                "pause poll interval must be non-zero".into(),
            ));
        }
        Ok(Self { config, processor })
    }

    pub fn mode(&self) -> ProcessingMode {
        self.processor.mode()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Run until end of stream, a fatal error, or abort.
    ///
    /// Blocks the calling thread.  `ctx` is the only state shared with other
    /// threads.  On `Ok`, `outcome` tells completion from abort; `completed`
    /// is set on `ctx` only for the former.
    #[instrument(skip_all, name = "frame_scheduler")]
    pub fn process<D, E>(
        &mut self,
        ctx: &ProcessingContext,
        decoder: &mut D,
        encoder: &mut E,
    ) -> Result<RunReport>
    where
        D: Decoder + ?Sized,
        E: Encoder + ?Sized,
    {
        let started = Instant::now();
        let info = decoder.info();
        let selected = info.video_stream;
        let stream_time_bases: Vec<Rational> = info.streams.iter().map(|s| s.time_base).collect();
        let decoder_tb = info.video_time_base();
        let estimate = info.estimate_total_frames();
        let encoder_tb = encoder.video_time_base();

        validate_stream_map(encoder.stream_map(), stream_time_bases.len(), selected)?;

        let mode = self.processor.mode();
        let total = match mode {
            ProcessingMode::Filter => estimate,
            ProcessingMode::Interpolate => estimate.saturating_mul(u64::from(self.config.frm_rate_mul)),
        };
        ctx.set_total_frames(total);

        info!(
            mode = mode.as_str(),
            processor = self.processor.processor_type(),
            total_frames = total,
            streams = stream_time_bases.len(),
            passthrough = encoder.stream_map().passthrough_count(),
            benchmark = self.config.benchmark,
            "Processing started"
        );

        let mut run = Run {
            ctx,
            config: &self.config,
            encoder,
            stream_time_bases,
            decoder_tb,
            encoder_tb,
            next_index: 0,
            pts_origin: None,
            previous: None,
            stats: RunStats::default(),
        };

        let outcome = run.run(decoder, &mut self.processor, selected)?;
        let mut stats = run.stats;
        stats.elapsed_us = started.elapsed().as_micros() as u64;

        match outcome {
            RunOutcome::Completed => {
                ctx.mark_completed();
                info!(
                    decoded = stats.frames_decoded,
                    written = stats.frames_written,
                    discarded = stats.frames_discarded,
                    scene_changes = stats.scene_changes,
                    packets_copied = stats.packets_copied,
                    elapsed_ms = stats.elapsed_us / 1000,
                    "Processing finished"
                );
            }
            RunOutcome::Aborted => {
                warn!(
                    decoded = stats.frames_decoded,
                    written = stats.frames_written,
                    "Processing aborted"
                );
            }
        }
        stats.report();

        Ok(RunReport { outcome, stats })
    }
}

fn validate_stream_map(map: &StreamMap, stream_count: usize, selected: usize) -> Result<()> {
    if map.len() != stream_count {
        return Err(EngineError::Init(format!(
            "stream map has {} entries for {stream_count} input streams",
            map.len()
        )));
    }
    if map.get(selected).is_some() {
        return Err(EngineError::Init(format!(
            "stream map routes selected video stream {selected} to passthrough"
        )));
    }
    Ok(())
}

/// Block while paused.  Returns `Abort` as soon as abort is observed.
fn wait_while_paused(ctx: &ProcessingContext, poll: Duration) -> Control {
    if ctx.is_aborted() {
        return Control::Abort;
    }
    if !ctx.is_paused() {
        return Control::Continue;
    }
    info!(processed = ctx.processed_frames(), "Paused");
    while ctx.is_paused() {
        if ctx.is_aborted() {
            return Control::Abort;
        }
        std::thread::sleep(poll);
    }
    if ctx.is_aborted() {
        return Control::Abort;
    }
    info!("Resumed");
    Control::Continue
}

// ─── Per-run state ───────────────────────────────────────────────────────────

struct Run<'a, E: Encoder + ?Sized> {
    ctx: &'a ProcessingContext,
    config: &'a SchedulerConfig,
    encoder: &'a mut E,
    stream_time_bases: Vec<Rational>,
    decoder_tb: Rational,
    encoder_tb: Rational,
    /// Sequence index of the next output slot.
    next_index: u64,
    /// Encoder-time-base `pts` of output index 0 in interpolation mode.
    pts_origin: Option<i64>,
    /// Last source frame written in interpolation mode.
    previous: Option<Frame>,
    stats: RunStats,
}

impl<E: Encoder + ?Sized> Run<'_, E> {
    fn run<D: Decoder + ?Sized>(
        &mut self,
        decoder: &mut D,
        processor: &mut Processor,
        selected: usize,
    ) -> Result<RunOutcome> {
        loop {
            if self.poll() == Control::Abort {
                return Ok(RunOutcome::Aborted);
            }

            let t_read = Instant::now();
            let packet = decoder.read_packet()?;
            self.stats.decode_us += t_read.elapsed().as_micros() as u64;

            let Some(packet) = packet else {
                break;
            };
            if packet.stream_index == selected {
                let t_send = Instant::now();
                decoder.send_packet(Some(packet))?;
                self.stats.decode_us += t_send.elapsed().as_micros() as u64;
                if self.drain(decoder, processor)? == Control::Abort {
                    return Ok(RunOutcome::Aborted);
                }
            } else {
                self.pass_through(packet)?;
            }
        }

        debug!(decoded = self.stats.frames_decoded, "Demuxer EOS, draining decoder");
        decoder.send_packet(None)?;
        if self.drain(decoder, processor)? == Control::Abort {
            return Ok(RunOutcome::Aborted);
        }

        self.flush_processor(processor)?;

        let t_flush = Instant::now();
        self.encoder.flush()?;
        self.stats.encode_us += t_flush.elapsed().as_micros() as u64;
        Ok(RunOutcome::Completed)
    }

    fn poll(&self) -> Control {
        wait_while_paused(self.ctx, self.config.pause_poll)
    }

    /// Dispatch every frame the decoder can currently return.
    fn drain<D: Decoder + ?Sized>(&mut self, decoder: &mut D, processor: &mut Processor) -> Result<Control> {
        loop {
            let t_recv = Instant::now();
            let decoded = decoder.receive_frame()?;
            self.stats.decode_us += t_recv.elapsed().as_micros() as u64;

            let frame = match decoded {
                Decoded::Frame(frame) => frame,
                Decoded::Again | Decoded::Eof => return Ok(Control::Continue),
            };
            self.stats.frames_decoded += 1;

            if self.poll() == Control::Abort {
                return Ok(Control::Abort);
            }
            match processor {
                Processor::Filter(filter) => self.filter_frame(filter.as_mut(), frame)?,
                Processor::Interpolator(interpolator) => {
                    self.interpolate_frame(interpolator.as_mut(), frame)?
                }
            }
        }
    }

    // ── Filter ───────────────────────────────────────────────────────

    fn filter_frame(&mut self, filter: &mut dyn Filter, frame: Frame) -> Result<()> {
        let t_process = Instant::now();
        let output = filter.filter(frame)?;
        self.stats.process_us += t_process.elapsed().as_micros() as u64;

        match output {
            Some(out) => self.emit_filtered(out),
            // Held inside the filter; it comes back from a later call or flush.
            None => Ok(()),
        }
    }

    fn emit_filtered(&mut self, mut frame: Frame) -> Result<()> {
        frame.pts = rescale_ts(frame.pts, self.decoder_tb, self.encoder_tb);
        let index = self.reserve_index();
        self.write(frame, index)
    }

    // ── Interpolate ──────────────────────────────────────────────────

    fn interpolate_frame(&mut self, interpolator: &mut dyn Interpolator, frame: Frame) -> Result<()> {
        let Some(prev) = self.previous.take() else {
            self.previous = Some(frame.clone());
            return self.emit_at_next_index(frame);
        };

        let difference = frame_difference(&prev, &frame)?;
        let scene_change = difference > self.config.scn_det_thresh;
        if scene_change {
            self.stats.scene_changes += 1;
            debug!(
                index = self.next_index,
                difference = f64::from(difference),
                threshold = f64::from(self.config.scn_det_thresh),
                "Scene change, duplicating previous frame"
            );
        }

        let mul = self.config.frm_rate_mul;
        for step in 1..mul {
            let t = step as f32 / mul as f32;
            let index = self.reserve_index();
            let synthesized = if scene_change {
                Some(prev.clone())
            } else {
                let t_process = Instant::now();
                let out = interpolator.interpolate(&prev, &frame, t)?;
                self.stats.process_us += t_process.elapsed().as_micros() as u64;
                if out.is_none() {
                    self.stats.interpolation_skips += 1;
                }
                out
            };
            if let Some(mut out) = synthesized {
                out.pts = self.interpolated_pts(index);
                self.write(out, index)?;
            }
        }

        drop(prev);
        self.previous = Some(frame.clone());
        self.emit_at_next_index(frame)
    }

    fn emit_at_next_index(&mut self, mut frame: Frame) -> Result<()> {
        if self.pts_origin.is_none() {
            self.pts_origin = Some(rescale_ts(frame.pts, self.decoder_tb, self.encoder_tb));
        }
        let index = self.reserve_index();
        frame.pts = self.interpolated_pts(index);
        self.write(frame, index)
    }

    fn interpolated_pts(&self, index: u64) -> i64 {
        self.pts_origin.unwrap_or(0).saturating_add(index as i64)
    }

    // ── Output ───────────────────────────────────────────────────────

    fn reserve_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn write(&mut self, frame: Frame, index: u64) -> Result<()> {
        if self.config.benchmark {
            drop(frame);
            self.stats.frames_discarded += 1;
        } else {
            let t_encode = Instant::now();
            self.encoder.write_frame(frame, index)?;
            self.stats.encode_us += t_encode.elapsed().as_micros() as u64;
            self.stats.frames_written += 1;
        }
        self.ctx.record_processed(1);
        Ok(())
    }

    fn flush_processor(&mut self, processor: &mut Processor) -> Result<()> {
        let t_process = Instant::now();
        let held = processor.flush()?;
        self.stats.process_us += t_process.elapsed().as_micros() as u64;
        if !held.is_empty() {
            debug!(frames = held.len(), "Processor flushed buffered frames");
        }
        for frame in held {
            match processor.mode() {
                ProcessingMode::Filter => self.emit_filtered(frame)?,
                ProcessingMode::Interpolate => self.emit_at_next_index(frame)?,
            }
        }
        Ok(())
    }

    // ── Passthrough ──────────────────────────────────────────────────

    fn pass_through(&mut self, mut packet: Packet) -> Result<()> {
        let input = packet.stream_index;
        let from = *self.stream_time_bases.get(input).ok_or_else(|| {
            EngineError::Decode(format!("packet for unknown input stream {input}"))
        })?;

        let target = if self.config.copy_streams && !self.config.benchmark {
            self.encoder.stream_map().get(input)
        } else {
            None
        };
        let Some(output) = target else {
            self.stats.packets_dropped += 1;
            return Ok(());
        };

        let to = self.encoder.stream_time_base(output).ok_or_else(|| {
            EngineError::Encode(format!("encoder has no output stream {output}"))
        })?;
        packet.rescale_ts(from, to);
        packet.stream_index = output;

        let t_encode = Instant::now();
        self.encoder.write_packet(packet)?;
        self.stats.encode_us += t_encode.elapsed().as_micros() as u64;
        self.stats.packets_copied += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::codec_traits::StreamMap;
    use strand_processors::{ProcessorCore, ProcessorInit};

    struct Identity;

    impl ProcessorCore for Identity {
        fn init(&mut self, _init: &ProcessorInit) -> Result<()> {
            Ok(())
        }
        fn processor_type(&self) -> &str {
            "identity"
        }
        fn output_dimensions(&self, _c: &ProcessorConfig, w: u32, h: u32) -> (u32, u32) {
            (w, h)
        }
    }

    impl Interpolator for Identity {
        fn interpolate(&mut self, prev: &Frame, _cur: &Frame, _t: f32) -> Result<Option<Frame>> {
            Ok(Some(prev.clone()))
        }
    }

    #[test]
    fn interpolation_config_is_validated() {
        let processor = || Processor::Interpolator(Box::new(Identity));
        let low_mul = SchedulerConfig {
            frm_rate_mul: 1,
            ..SchedulerConfig::default()
        };
        assert!(FrameScheduler::new(low_mul, processor()).is_err());
        let bad_thresh = SchedulerConfig {
            scn_det_thresh: 150.0,
            ..SchedulerConfig::default()
        };
        assert!(FrameScheduler::new(bad_thresh, processor()).is_err());
        let zero_poll = SchedulerConfig {
            pause_poll: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(FrameScheduler::new(zero_poll, processor()).is_err());
        assert!(FrameScheduler::new(SchedulerConfig::default(), processor()).is_ok());
    }

    #[test]
    fn stream_map_length_must_match() {
        let map = StreamMap::drop_all(2);
        let err = validate_stream_map(&map, 3, 0).expect_err("length mismatch");
        assert!(matches!(err, EngineError::Init(_)));
        validate_stream_map(&map, 2, 0).expect("matching length");
    }

    #[test]
    fn pause_check_returns_on_abort() {
        let ctx = ProcessingContext::new();
        ctx.pause();
        ctx.abort();
        assert_eq!(wait_while_paused(&ctx, Duration::from_millis(1)), Control::Abort);
    }

    #[test]
    fn unpaused_context_continues() {
        let ctx = ProcessingContext::new();
        assert_eq!(
            wait_while_paused(&ctx, Duration::from_millis(1)),
            Control::Continue
        );
    }
}
