//! strand CLI entrypoint.
//!
//! ```bash
//! strand process -i in.y4m -o out.y4m --scaling-factor 2
//! strand process -i in.y4m -o out.y4m -p blend -m 4 --scene-thresh 30 --json
//! strand process -i in.y4m -p blend --benchmark --progress jsonl
//! strand probe -i in.y4m --json
//! strand processors
//! ```
//!
//! Exit status: 0 when the job completed, 1 on any error, 2 when the user
//! aborted (Ctrl-C or `q` on an interactive terminal).

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use strand_core::codec_traits::Decoder;
use strand_core::config::{
    EncoderConfig, HwDeviceType, ProcessorConfig, ProcessorParams, ScaleAlgorithm, ScaleParams,
};
use strand_core::context::ProcessingContext;
use strand_core::error::{EngineError, Result};
use strand_core::types::PixelFormat;
use strand_pipeline::runtime::create_decoder;
use strand_pipeline::{JobRequest, JobSummary, RunOutcome, run_job};
use strand_processors::ProcessorFactory;

#[derive(Parser, Debug)]
#[command(
    name = "strand",
    version,
    about = "Frame-accurate video filter and interpolation engine",
    arg_required_else_help = true,
    after_help = "Examples:\n  strand process -i in.y4m -o out.y4m -s 2\n  strand process -i in.y4m -o out.y4m -p blend -m 4 --json\n  strand process -i in.y4m -p blend --benchmark --progress jsonl\n  strand probe -i in.y4m --json\n  strand processors"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run decode → process → encode over one input.
    Process(ProcessArgs),
    /// Print stream information for an input.
    Probe(ProbeArgs),
    /// List registered processor tags.
    Processors(ProcessorsArgs),
}

#[derive(Args, Debug, Clone)]
struct ProcessArgs {
    /// Input video file (.y4m).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output video file. Required unless --benchmark is set.
    #[arg(short = 'o', long = "output", required_unless_present = "benchmark")]
    output: Option<PathBuf>,

    /// Processor tag, as listed by `strand processors`.
    #[arg(short = 'p', long = "processor", default_value = "scale")]
    processor: String,

    /// Output width in pixels (filters).
    #[arg(long = "width")]
    width: Option<u32>,

    /// Output height in pixels (filters).
    #[arg(long = "height")]
    height: Option<u32>,

    /// Scale both dimensions by this factor when width/height are not given.
    #[arg(short = 's', long = "scaling-factor")]
    scaling_factor: Option<f32>,

    /// Resampling kernel for `scale`: nearest, bilinear, lanczos3.
    #[arg(long = "scale-algorithm", default_value = "bilinear")]
    scale_algorithm: String,

    /// Output frames per input frame interval (interpolators).
    #[arg(short = 'm', long = "frame-rate-mul", default_value_t = 2)]
    frame_rate_mul: u32,

    /// Scene-change threshold in percent (interpolators).
    #[arg(long = "scene-thresh", default_value_t = 20.0)]
    scene_thresh: f32,

    /// Hardware acceleration: none, cuda, vaapi, vulkan.
    #[arg(long = "hwaccel", default_value = "none")]
    hwaccel: String,

    /// Hardware device index.
    #[arg(short = 'd', long = "device", default_value_t = 0)]
    device: u32,

    /// Output pixel format (defaults to the input format).
    #[arg(long = "pix-fmt")]
    pix_fmt: Option<String>,

    /// Output codec.
    #[arg(long = "codec", default_value = "rawvideo")]
    codec: String,

    /// Drop audio and subtitle streams instead of copying them.
    #[arg(long = "no-copy-streams", default_value_t = false)]
    no_copy_streams: bool,

    /// Extra encoder option as key=value. Repeatable.
    #[arg(short = 'e', long = "encoder-opt")]
    encoder_opt: Vec<String>,

    /// Run the pipeline but discard produced frames instead of encoding them.
    #[arg(long = "benchmark", default_value_t = false)]
    benchmark: bool,

    /// Disable the progress display.
    #[arg(long = "no-progress", default_value_t = false)]
    no_progress: bool,

    /// Progress output mode to stderr: auto (TTY only), off, human, jsonl.
    #[arg(long = "progress", value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    /// Emit structured JSON output to stdout.
    #[arg(long = "json", default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ProbeArgs {
    /// Input video file (.y4m).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Emit JSON probe output.
    #[arg(long = "json", default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ProcessorsArgs {
    /// Emit JSON listing.
    #[arg(long = "json", default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProgressArg {
    Auto,
    Off,
    Human,
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressMode {
    Off,
    Human,
    Jsonl,
}

struct ProgressReporter {
    notify: Arc<tokio::sync::Notify>,
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressReporter {
    /// Emit the final line and wait for the task.  `notify_one` stores a
    /// permit, so a stop issued before the task first polls is not lost.
    async fn stop(self) {
        self.notify.notify_one();
        let _ = self.handle.await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProgressSnapshot {
    processed: u64,
    total: u64,
    paused: bool,
}

const JSON_SCHEMA_VERSION: u32 = 1;
const DEFAULT_PROGRESS_TICK: Duration = Duration::from_secs(1);

const EXIT_FAILURE: i32 = 1;
const EXIT_ABORTED: i32 = 2;

/// Envelope for every JSON document written to stdout.
#[derive(Serialize)]
struct CommandJson<'a, T: Serialize> {
    schema_version: u32,
    command: &'a str,
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let json_error_command = match &cli.command {
        Commands::Process(args) if args.json => Some("process"),
        Commands::Probe(args) if args.json => Some("probe"),
        Commands::Processors(args) if args.json => Some("processors"),
        _ => None,
    };

    let result = match cli.command {
        Commands::Process(args) => {
            let rt = build_runtime();
            rt.block_on(run_process(args))
        }
        Commands::Probe(args) => run_probe(args).map(|()| RunOutcome::Completed),
        Commands::Processors(args) => run_processors(args).map(|()| RunOutcome::Completed),
    };

    match result {
        Ok(RunOutcome::Completed) => std::process::exit(0),
        Ok(RunOutcome::Aborted) => std::process::exit(EXIT_ABORTED),
        Err(err) => {
            if let Some(command) = json_error_command {
                println!("{}", command_error_json(command, &err.to_string()));
            } else {
                tracing::error!(error = %err, code = err.error_code(), "Command failed");
            }
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn init_tracing() {
    let ansi_enabled = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(ansi_enabled)
        .init();
}

fn build_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

// ─── process ─────────────────────────────────────────────────────────────────

async fn run_process(args: ProcessArgs) -> Result<RunOutcome> {
    let request = job_request(&args)?;
    let factory = ProcessorFactory::with_builtins();
    let ctx = Arc::new(ProcessingContext::new());

    let progress_mode = resolve_progress_mode(args.progress, args.no_progress);
    let progress = spawn_progress_reporter("process", Arc::clone(&ctx), progress_mode);
    spawn_interactive_controls(Arc::clone(&ctx));

    let wall_start = Instant::now();
    let worker_ctx = Arc::clone(&ctx);
    let mut job = tokio::task::spawn_blocking(move || run_job(&request, &factory, &worker_ctx));

    let joined = tokio::select! {
        joined = &mut job => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupt received, aborting");
            ctx.abort();
            (&mut job).await
        }
    };
    if let Some(progress) = progress {
        progress.stop().await;
    }
    let summary =
        joined.map_err(|e| EngineError::Pipeline(format!("processing worker failed: {e}")))??;

    let outcome = summary.report.outcome;
    let elapsed = wall_start.elapsed();
    tracing::info!(
        elapsed_s = format!("{:.2}", elapsed.as_secs_f64()),
        outcome = ?outcome,
        frames = summary.report.stats.frames_produced(),
        "Process finished"
    );

    if args.json {
        println!("{}", process_json(&summary)?);
    } else {
        println!("{}", process_human(&summary, elapsed));
    }
    Ok(outcome)
}

fn job_request(args: &ProcessArgs) -> Result<JobRequest> {
    let mut encoder = EncoderConfig {
        codec: args.codec.clone(),
        pix_fmt: args.pix_fmt.as_deref().map(parse_pix_fmt).transpose()?,
        copy_streams: !args.no_copy_streams,
        ..EncoderConfig::default()
    };
    for raw in &args.encoder_opt {
        encoder.push_option_str(raw)?;
    }

    Ok(JobRequest {
        input: args.input.clone(),
        output: args.output.clone(),
        hw: args.hwaccel.parse::<HwDeviceType>()?,
        device_index: args.device,
        processor: processor_config(args)?,
        encoder,
        benchmark: args.benchmark,
    })
}

/// Assemble the processor record from the flat argument surface.
///
/// Built-in tags get their typed params; any other tag is passed through as
/// `custom` so externally registered processors can pick their own options.
fn processor_config(args: &ProcessArgs) -> Result<ProcessorConfig> {
    let params = match args.processor.as_str() {
        "scale" => ProcessorParams::Scale(ScaleParams {
            algorithm: args.scale_algorithm.parse::<ScaleAlgorithm>()?,
        }),
        "blend" => ProcessorParams::Blend,
        _ => ProcessorParams::Custom {
            options: serde_json::Value::Null,
        },
    };
    Ok(ProcessorConfig {
        processor: args.processor.clone(),
        width: args.width.unwrap_or(0),
        height: args.height.unwrap_or(0),
        scaling_factor: args.scaling_factor.unwrap_or(0.0),
        frm_rate_mul: args.frame_rate_mul,
        scn_det_thresh: args.scene_thresh,
        params,
    })
}

fn parse_pix_fmt(name: &str) -> Result<PixelFormat> {
    PixelFormat::from_name(name)
        .ok_or_else(|| EngineError::InvalidConfig(format!("unknown pixel format '{name}'")))
}

fn process_json(summary: &JobSummary) -> Result<String> {
    let doc = CommandJson {
        schema_version: JSON_SCHEMA_VERSION,
        command: "process",
        ok: summary.report.outcome == RunOutcome::Completed,
        body: summary,
    };
    serde_json::to_string(&doc)
        .map_err(|e| EngineError::Pipeline(format!("failed to serialize summary: {e}")))
}

fn process_human(summary: &JobSummary, elapsed: Duration) -> String {
    let stats = &summary.report.stats;
    let status = match summary.report.outcome {
        RunOutcome::Completed => "ok",
        RunOutcome::Aborted => "aborted",
    };
    format!(
        "process: {status} output={} {}x{} -> {}x{} @ {} frames={} scene_changes={} elapsed_s={:.3}",
        summary.output.as_deref().unwrap_or("<discarded>"),
        summary.input_width,
        summary.input_height,
        summary.output_width,
        summary.output_height,
        summary.output_frame_rate,
        stats.frames_produced(),
        stats.scene_changes,
        elapsed.as_secs_f64()
    )
}

// ─── probe / processors ──────────────────────────────────────────────────────

fn run_probe(args: ProbeArgs) -> Result<()> {
    let decoder = create_decoder(HwDeviceType::None, &args.input)?;
    let info = decoder.info();
    let frame_rate = info.nominal_frame_rate();

    if args.json {
        let streams: Vec<_> = info
            .streams
            .iter()
            .map(|s| {
                serde_json::json!({
                    "index": s.index,
                    "kind": s.kind,
                    "codec": s.codec,
                    "time_base": s.time_base.to_string(),
                })
            })
            .collect();
        let doc = CommandJson {
            schema_version: JSON_SCHEMA_VERSION,
            command: "probe",
            ok: true,
            body: serde_json::json!({
                "input": args.input.display().to_string(),
                "width": info.width,
                "height": info.height,
                "pix_fmt": info.format.name(),
                "frame_rate": frame_rate.to_string(),
                "estimated_frames": info.estimate_total_frames(),
                "duration_secs": info.duration_secs,
                "video_stream": info.video_stream,
                "streams": streams,
            }),
        };
        println!("{}", to_json(&doc)?);
    } else {
        println!(
            "probe: {} {}x{} {} @ {} fps, ~{} frames, {} stream(s)",
            args.input.display(),
            info.width,
            info.height,
            info.format,
            frame_rate,
            info.estimate_total_frames(),
            info.streams.len()
        );
    }
    Ok(())
}

fn run_processors(args: ProcessorsArgs) -> Result<()> {
    let factory = ProcessorFactory::with_builtins();
    let tags = factory.registered();
    if args.json {
        let doc = CommandJson {
            schema_version: JSON_SCHEMA_VERSION,
            command: "processors",
            ok: true,
            body: serde_json::json!({ "processors": tags }),
        };
        println!("{}", to_json(&doc)?);
    } else {
        for tag in tags {
            println!("{tag}");
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| EngineError::Pipeline(format!("failed to serialize output: {e}")))
}

fn command_error_json(command: &str, error: &str) -> String {
    serde_json::json!({
        "schema_version": JSON_SCHEMA_VERSION,
        "command": command,
        "ok": false,
        "error": error,
    })
    .to_string()
}

// ─── Progress ────────────────────────────────────────────────────────────────

fn resolve_progress_mode(progress: ProgressArg, no_progress: bool) -> ProgressMode {
    if no_progress {
        return ProgressMode::Off;
    }
    match progress {
        ProgressArg::Auto => {
            if std::io::stderr().is_terminal() {
                ProgressMode::Human
            } else {
                ProgressMode::Off
            }
        }
        ProgressArg::Off => ProgressMode::Off,
        ProgressArg::Human => ProgressMode::Human,
        ProgressArg::Jsonl => ProgressMode::Jsonl,
    }
}

/// Reporter interval; `STRAND_PROGRESS_TICK_MS` overrides the one-second default.
fn progress_tick() -> Duration {
    parse_tick(std::env::var("STRAND_PROGRESS_TICK_MS").ok().as_deref())
}

fn parse_tick(raw: Option<&str>) -> Duration {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_PROGRESS_TICK)
}

fn current_progress_snapshot(ctx: &ProcessingContext) -> ProgressSnapshot {
    ProgressSnapshot {
        processed: ctx.processed_frames(),
        total: ctx.total_frames(),
        paused: ctx.is_paused(),
    }
}

fn emit_progress_line(
    command: &'static str,
    mode: ProgressMode,
    elapsed: Duration,
    snapshot: ProgressSnapshot,
    final_line: bool,
) {
    // Progress goes to stderr only; stdout carries the single result document.
    let secs = elapsed.as_secs_f64();
    let fps = if secs > 0.0 {
        snapshot.processed as f64 / secs
    } else {
        0.0
    };
    match mode {
        ProgressMode::Off => {}
        ProgressMode::Human => {
            let percent = if snapshot.total > 0 {
                format!("{:.1}%", snapshot.processed as f64 * 100.0 / snapshot.total as f64)
            } else {
                "?".to_string()
            };
            eprintln!(
                "progress: command={} elapsed_s={:.3} frames={}/{} ({}) fps={:.1} paused={} final={}",
                command,
                secs,
                snapshot.processed,
                snapshot.total,
                percent,
                fps,
                snapshot.paused,
                final_line
            );
        }
        ProgressMode::Jsonl => {
            let line = serde_json::json!({
                "schema_version": JSON_SCHEMA_VERSION,
                "type": "progress",
                "command": command,
                "elapsed_ms": elapsed.as_millis() as u64,
                "frames": { "processed": snapshot.processed, "total": snapshot.total },
                "fps": fps,
                "paused": snapshot.paused,
                "final": final_line,
            });
            eprintln!("{line}");
        }
    }
}

fn spawn_progress_reporter(
    command: &'static str,
    ctx: Arc<ProcessingContext>,
    mode: ProgressMode,
) -> Option<ProgressReporter> {
    if matches!(mode, ProgressMode::Off) {
        return None;
    }

    let tick = progress_tick();
    let notify = Arc::new(tokio::sync::Notify::new());
    let notify_task = notify.clone();
    let handle = tokio::spawn(async move {
        let start = Instant::now();
        let mut last = current_progress_snapshot(&ctx);
        loop {
            tokio::select! {
                _ = notify_task.notified() => {
                    let snapshot = current_progress_snapshot(&ctx);
                    emit_progress_line(command, mode, start.elapsed(), snapshot, true);
                    break;
                }
                _ = tokio::time::sleep(tick) => {
                    let snapshot = current_progress_snapshot(&ctx);
                    if snapshot != last {
                        emit_progress_line(command, mode, start.elapsed(), snapshot, false);
                        last = snapshot;
                    }
                }
            }
        }
    });

    Some(ProgressReporter { notify, handle })
}

// ─── Interactive control ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlKey {
    TogglePause,
    Abort,
}

fn parse_control(line: &str) -> Option<ControlKey> {
    match line.trim() {
        "p" | "P" => Some(ControlKey::TogglePause),
        "q" | "Q" => Some(ControlKey::Abort),
        _ => None,
    }
}

/// Read `p` / `q` lines from an interactive stdin on a detached thread.
///
/// The thread is never joined; it ends with the process.
fn spawn_interactive_controls(ctx: Arc<ProcessingContext>) {
    if !std::io::stdin().is_terminal() {
        return;
    }
    tracing::info!("Controls: 'p' + Enter toggles pause, 'q' + Enter aborts");

    let spawned = std::thread::Builder::new()
        .name("strand-controls".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_control(&line) {
                    Some(ControlKey::TogglePause) => {
                        if ctx.is_paused() {
                            ctx.resume();
                            tracing::info!("Resume requested");
                        } else {
                            ctx.pause();
                            tracing::info!("Pause requested");
                        }
                    }
                    Some(ControlKey::Abort) => {
                        ctx.abort();
                        tracing::warn!("Abort requested");
                        break;
                    }
                    None => {}
                }
                if ctx.is_completed() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Interactive controls unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ProcessArgs {
        let cli = Cli::try_parse_from(args.iter().copied()).expect("valid arguments");
        match cli.command {
            Commands::Process(args) => args,
            other => panic!("expected process, got {other:?}"),
        }
    }

    #[test]
    fn no_progress_wins_over_explicit_mode() {
        assert_eq!(resolve_progress_mode(ProgressArg::Jsonl, true), ProgressMode::Off);
        assert_eq!(resolve_progress_mode(ProgressArg::Jsonl, false), ProgressMode::Jsonl);
        assert_eq!(resolve_progress_mode(ProgressArg::Off, false), ProgressMode::Off);
    }

    #[test]
    fn tick_override_falls_back_on_bad_values() {
        assert_eq!(parse_tick(Some("10")), Duration::from_millis(10));
        assert_eq!(parse_tick(Some("0")), DEFAULT_PROGRESS_TICK);
        assert_eq!(parse_tick(Some("soon")), DEFAULT_PROGRESS_TICK);
        assert_eq!(parse_tick(None), DEFAULT_PROGRESS_TICK);
    }

    #[test]
    fn control_keys() {
        assert_eq!(parse_control("p\n"), Some(ControlKey::TogglePause));
        assert_eq!(parse_control(" Q "), Some(ControlKey::Abort));
        assert_eq!(parse_control("pause"), None);
    }

    #[test]
    fn output_is_optional_only_for_benchmark() {
        assert!(Cli::try_parse_from(["strand", "process", "-i", "in.y4m"]).is_err());
        let args = parse(&["strand", "process", "-i", "in.y4m", "--benchmark"]);
        assert!(args.output.is_none());
        assert!(job_request(&args).expect("request").benchmark);
    }

    #[test]
    fn blend_arguments_become_interpolation_config() {
        let args = parse(&[
            "strand", "process", "-i", "in.y4m", "-o", "out.y4m", "-p", "blend", "-m", "4",
            "--scene-thresh", "35",
        ]);
        let cfg = processor_config(&args).expect("config");
        assert_eq!(cfg.processor, "blend");
        assert_eq!(cfg.params, ProcessorParams::Blend);
        assert_eq!(cfg.frm_rate_mul, 4);
        assert_eq!(cfg.scn_det_thresh, 35.0);
    }

    #[test]
    fn scale_arguments_carry_algorithm_and_size() {
        let args = parse(&[
            "strand",
            "process",
            "-i",
            "in.y4m",
            "-o",
            "out.y4m",
            "--width",
            "1280",
            "--height",
            "720",
            "--scale-algorithm",
            "lanczos",
        ]);
        let cfg = processor_config(&args).expect("config");
        assert_eq!((cfg.width, cfg.height), (1280, 720));
        assert_eq!(
            cfg.params,
            ProcessorParams::Scale(ScaleParams {
                algorithm: ScaleAlgorithm::Lanczos3
            })
        );
    }

    #[test]
    fn encoder_and_hw_arguments_are_validated() {
        let args = parse(&[
            "strand", "process", "-i", "a", "-o", "b", "-e", "preset=slow", "-e", "crf=18",
            "--no-copy-streams", "--pix-fmt", "gray",
        ]);
        let request = job_request(&args).expect("request");
        assert_eq!(request.encoder.option("crf"), Some("18"));
        assert!(!request.encoder.copy_streams);
        assert_eq!(request.encoder.pix_fmt, Some(PixelFormat::Gray8));

        let bad_opt = parse(&["strand", "process", "-i", "a", "-o", "b", "-e", "novalue"]);
        assert!(job_request(&bad_opt).is_err());
        let bad_hw = parse(&["strand", "process", "-i", "a", "-o", "b", "--hwaccel", "metal"]);
        assert!(job_request(&bad_hw).is_err());
        let bad_fmt = parse(&["strand", "process", "-i", "a", "-o", "b", "--pix-fmt", "p010"]);
        assert!(job_request(&bad_fmt).is_err());
    }

    #[test]
    fn error_json_is_single_object() {
        let line = command_error_json("process", "boom \"quoted\"");
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "boom \"quoted\"");
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn progress_stop_before_first_poll_returns() {
        let ctx = Arc::new(ProcessingContext::new());
        let reporter = spawn_progress_reporter("process", ctx, ProgressMode::Jsonl)
            .expect("reporter runs when progress is on");
        // Current-thread runtime: the task has not been polled yet.
        tokio::time::timeout(Duration::from_secs(3), reporter.stop())
            .await
            .expect("stop returns without waiting for the next tick");
    }

    #[tokio::test]
    async fn progress_stop_between_ticks_returns() {
        let ctx = Arc::new(ProcessingContext::new());
        let reporter = spawn_progress_reporter("process", ctx, ProgressMode::Jsonl)
            .expect("reporter runs when progress is on");
        tokio::task::yield_now().await;
        tokio::time::timeout(Duration::from_secs(3), reporter.stop())
            .await
            .expect("stop returns while the task is parked on its tick");
    }
}
