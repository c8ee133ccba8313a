//! CLI/runtime bridge helpers.
//!
//! Keeps composition (open input → build processor → open output → run)
//! inside `strand-pipeline`, so callers depend on one entry point instead of
//! wiring decoder, factory, sink and scheduler themselves.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument};

use strand_core::codec_traits::{Decoder, Encoder, SourceInfo};
use strand_core::config::{EncoderConfig, HwDeviceType, ProcessorConfig};
use strand_core::context::ProcessingContext;
use strand_core::error::{EngineError, Result};
use strand_core::types::Rational;
use strand_io::{NullSink, Y4mSink, Y4mSource};
use strand_processors::{DeviceContext, ProcessingMode, ProcessorFactory, ProcessorInit, VideoParams};

use crate::scheduler::{FrameScheduler, RunOutcome, RunReport, SchedulerConfig};

/// One processing job as described by the caller.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub input: PathBuf,
    /// Required unless `benchmark` is set.
    pub output: Option<PathBuf>,
    pub hw: HwDeviceType,
    pub device_index: u32,
    pub processor: ProcessorConfig,
    pub encoder: EncoderConfig,
    pub benchmark: bool,
}

/// What a finished (or aborted) job reports back.
#[derive(Clone, Debug, Serialize)]
pub struct JobSummary {
    pub input: String,
    pub output: Option<String>,
    pub processor: String,
    pub mode: &'static str,
    pub input_width: u32,
    pub input_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub output_frame_rate: String,
    #[serde(flatten)]
    pub report: RunReport,
}

/// Open the input for decoding.
pub fn create_decoder(hw: HwDeviceType, input: &Path) -> Result<Y4mSource> {
    Y4mSource::open(hw, input)
}

/// Open the output.  Benchmark runs write nothing and get a [`NullSink`].
pub fn create_encoder(
    output: Option<&Path>,
    source: &SourceInfo,
    config: &EncoderConfig,
    width: u32,
    height: u32,
    frm_rate_mul: u32,
    benchmark: bool,
) -> Result<Box<dyn Encoder>> {
    if benchmark {
        return Ok(Box::new(NullSink::new(source, frm_rate_mul)));
    }
    let output = output
        .ok_or_else(|| EngineError::InvalidConfig("an output path is required".into()))?;
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    Ok(Box::new(Y4mSink::create(
        output,
        source,
        config,
        width,
        height,
        frm_rate_mul,
    )?))
}

/// Frame-rate multiplier the output runs at for a processor of `mode`.
pub fn output_rate_multiplier(mode: ProcessingMode, config: &ProcessorConfig) -> u32 {
    match mode {
        ProcessingMode::Filter => 1,
        ProcessingMode::Interpolate => config.frm_rate_mul,
    }
}

/// Describe both sides of a processor for `Processor::init`.
pub fn processor_init(
    source: &SourceInfo,
    out_width: u32,
    out_height: u32,
    encoder: &EncoderConfig,
    frm_rate_mul: u32,
    device: DeviceContext,
) -> ProcessorInit {
    let (out_rate, out_tb) = source.output_timing(frm_rate_mul);
    ProcessorInit {
        input: VideoParams {
            width: source.width,
            height: source.height,
            format: source.format,
            time_base: source.video_time_base(),
            frame_rate: source.frame_rate,
        },
        output: VideoParams {
            width: out_width,
            height: out_height,
            format: encoder.pix_fmt.unwrap_or(source.format),
            time_base: out_tb,
            frame_rate: Some(out_rate),
        },
        device,
    }
}

/// Run a scheduler over an already opened decoder and encoder.
///
/// Writes the container trailer only when the run completed.
pub fn run_prepared<D, E>(
    scheduler: &mut FrameScheduler,
    ctx: &ProcessingContext,
    decoder: &mut D,
    encoder: &mut E,
) -> Result<RunReport>
where
    D: Decoder + ?Sized,
    E: Encoder + ?Sized,
{
    let report = scheduler.process(ctx, decoder, encoder)?;
    if report.outcome == RunOutcome::Completed {
        encoder.finish()?;
    }
    Ok(report)
}

/// Open, build, run.  Every resource is owned by this call and released on
/// every return path.
#[instrument(skip_all, name = "job", fields(input = %request.input.display()))]
pub fn run_job(
    request: &JobRequest,
    factory: &ProcessorFactory,
    ctx: &ProcessingContext,
) -> Result<JobSummary> {
    if !request.benchmark && request.output.is_none() {
        return Err(EngineError::InvalidConfig(
            "an output path is required unless benchmarking".into(),
        ));
    }

    let mut decoder = create_decoder(request.hw, &request.input)?;
    let source = decoder.info().clone();

    let mut processor = factory.create(&request.processor, request.device_index)?;
    let mode = processor.mode();
    let (out_width, out_height) =
        processor.output_dimensions(&request.processor, source.width, source.height);
    let rate_mul = output_rate_multiplier(mode, &request.processor);

    let mut encoder = create_encoder(
        request.output.as_deref(),
        &source,
        &request.encoder,
        out_width,
        out_height,
        rate_mul,
        request.benchmark,
    )?;

    let device = DeviceContext {
        hw: request.hw,
        index: request.device_index,
    };
    processor.init(&processor_init(
        &source,
        out_width,
        out_height,
        &request.encoder,
        rate_mul,
        device,
    ))?;

    let processor_type = processor.processor_type().to_string();
    let config = SchedulerConfig::from_configs(&request.processor, &request.encoder, request.benchmark);
    let mut scheduler = FrameScheduler::new(config, processor)?;

    info!(
        processor = %processor_type,
        in_w = source.width,
        in_h = source.height,
        out_w = out_width,
        out_h = out_height,
        rate_mul,
        "Job prepared"
    );

    let report = run_prepared(&mut scheduler, ctx, &mut decoder, encoder.as_mut())?;
    let out_rate: Rational = source.output_timing(rate_mul).0;

    Ok(JobSummary {
        input: request.input.display().to_string(),
        output: (!request.benchmark)
            .then(|| request.output.as_ref().map(|p| p.display().to_string()))
            .flatten(),
        processor: processor_type,
        mode: mode.as_str(),
        input_width: source.width,
        input_height: source.height,
        output_width: out_width,
        output_height: out_height,
        output_frame_rate: out_rate.to_string(),
        report,
    })
}
