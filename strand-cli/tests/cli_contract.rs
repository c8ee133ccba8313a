use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "strand_cli_{label}_{}_{}",
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Three 4x4 mono frames at 25 fps with fills 10, 20, 30.
fn write_tiny_y4m(path: &Path) {
    let mut bytes = b"YUV4MPEG2 W4 H4 F25:1 Ip Cmono\n".to_vec();
    for fill in [10u8, 20, 30] {
        bytes.extend_from_slice(b"FRAME\n");
        bytes.extend_from_slice(&[fill; 16]);
    }
    fs::write(path, bytes).expect("write y4m");
}

fn strand() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_strand"));
    cmd.env("STRAND_PROGRESS_TICK_MS", "10");
    cmd
}

fn nonempty_lines(s: &str) -> Vec<&str> {
    s.lines().filter(|line| !line.trim().is_empty()).collect()
}

fn single_stdout_json(output: &Output, command: &str, ok: bool) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = nonempty_lines(&stdout);
    assert_eq!(
        lines.len(),
        1,
        "stdout must contain exactly one non-empty line, got {}:\n{}",
        lines.len(),
        stdout
    );
    assert!(
        !stdout.contains("\"type\":\"progress\""),
        "stdout must not contain progress records: {stdout}"
    );
    let value: serde_json::Value = serde_json::from_str(lines[0])
        .unwrap_or_else(|e| panic!("stdout is not a JSON object: {e}\n{stdout}"));
    assert_eq!(value["schema_version"], 1, "missing schema_version: {value}");
    assert_eq!(value["command"], command, "unexpected command: {value}");
    assert_eq!(value["ok"], ok, "unexpected ok field: {value}");
    value
}

#[test]
fn help_lists_subcommands() {
    let output = strand().arg("help").output().expect("run strand help");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["process", "probe", "processors"] {
        assert!(stdout.contains(sub), "missing {sub} in help output");
    }
}

#[test]
fn process_scale_writes_output_and_one_json_line() {
    let dir = unique_temp_dir("scale");
    let input = dir.join("in.y4m");
    let out = dir.join("nested").join("out.y4m");
    write_tiny_y4m(&input);

    let output = strand()
        .args([
            "process",
            "-i",
            input.to_str().expect("utf8 input"),
            "-o",
            out.to_str().expect("utf8 output"),
            "-s",
            "2",
            "--scale-algorithm",
            "nearest",
            "--json",
            "--progress",
            "off",
        ])
        .output()
        .expect("run strand process");

    assert!(
        output.status.success(),
        "process failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = single_stdout_json(&output, "process", true);
    assert_eq!(value["outcome"], "completed");
    assert_eq!(value["mode"], "filter");
    assert_eq!(value["output_width"], 8);
    assert_eq!(value["output_height"], 8);
    assert_eq!(value["stats"]["frames_written"], 3);

    let written = fs::read(&out).expect("output file exists");
    assert!(written.starts_with(b"YUV4MPEG2 W8 H8 F25:1 Ip Cmono\nFRAME\n"));
    assert_eq!(written.len(), 31 + 3 * (6 + 64));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_blend_streams_progress_to_stderr_only() {
    let dir = unique_temp_dir("blend");
    let input = dir.join("in.y4m");
    let out = dir.join("out.y4m");
    write_tiny_y4m(&input);

    let output = strand()
        .env("RUST_LOG", "off")
        .args([
            "process",
            "-i",
            input.to_str().expect("utf8 input"),
            "-o",
            out.to_str().expect("utf8 output"),
            "-p",
            "blend",
            "-m",
            "2",
            "--json",
            "--progress",
            "jsonl",
        ])
        .output()
        .expect("run strand process");

    assert!(output.status.success(), "blend process failed");
    let value = single_stdout_json(&output, "process", true);
    assert_eq!(value["mode"], "interpolate");
    assert_eq!(value["output_frame_rate"], "50/1");
    assert_eq!(value["stats"]["frames_written"], 5);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines = nonempty_lines(&stderr);
    assert!(!lines.is_empty(), "expected progress on stderr");
    for line in &lines {
        let record: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("stderr line is not JSONL progress: {e}\n{line}"));
        assert_eq!(record["type"], "progress");
        assert_eq!(record["command"], "process");
    }
    let last: serde_json::Value =
        serde_json::from_str(lines[lines.len() - 1]).expect("final progress line");
    assert_eq!(last["final"], true);
    assert_eq!(last["frames"]["processed"], 5);

    let written = fs::read(&out).expect("output file exists");
    assert!(written.starts_with(b"YUV4MPEG2 W4 H4 F50:1"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn benchmark_needs_no_output_and_writes_nothing() {
    let dir = unique_temp_dir("benchmark");
    let input = dir.join("in.y4m");
    write_tiny_y4m(&input);

    let output = strand()
        .args([
            "process",
            "-i",
            input.to_str().expect("utf8 input"),
            "-s",
            "1",
            "--benchmark",
            "--no-progress",
            "--json",
        ])
        .output()
        .expect("run strand benchmark");

    assert!(output.status.success(), "benchmark failed");
    let value = single_stdout_json(&output, "process", true);
    assert!(value["output"].is_null());
    assert_eq!(value["stats"]["frames_written"], 0);
    assert_eq!(value["stats"]["frames_discarded"], 3);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_processor_fails_with_json_error() {
    let dir = unique_temp_dir("unknown");
    let input = dir.join("in.y4m");
    write_tiny_y4m(&input);

    let output = strand()
        .args([
            "process",
            "-i",
            input.to_str().expect("utf8 input"),
            "-o",
            dir.join("out.y4m").to_str().expect("utf8 output"),
            "-p",
            "nope",
            "--json",
        ])
        .output()
        .expect("run strand process");

    assert_eq!(output.status.code(), Some(1));
    let value = single_stdout_json(&output, "process", false);
    let error = value["error"].as_str().expect("error string");
    assert!(error.contains("nope"), "error should name the tag: {error}");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_input_exits_with_failure() {
    let dir = unique_temp_dir("missing");
    let output = strand()
        .args([
            "process",
            "-i",
            dir.join("absent.y4m").to_str().expect("utf8 input"),
            "-o",
            dir.join("out.y4m").to_str().expect("utf8 output"),
            "-s",
            "2",
        ])
        .output()
        .expect("run strand process");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "errors go to stderr without --json");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn probe_reports_stream_geometry() {
    let dir = unique_temp_dir("probe");
    let input = dir.join("in.y4m");
    write_tiny_y4m(&input);

    let output = strand()
        .args(["probe", "-i", input.to_str().expect("utf8 input"), "--json"])
        .output()
        .expect("run strand probe");

    assert!(output.status.success(), "probe failed");
    let value = single_stdout_json(&output, "probe", true);
    assert_eq!(value["width"], 4);
    assert_eq!(value["height"], 4);
    assert_eq!(value["pix_fmt"], "gray");
    assert_eq!(value["frame_rate"], "25/1");
    assert_eq!(value["estimated_frames"], 3);
    assert_eq!(value["streams"][0]["kind"], "video");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn processors_lists_builtins() {
    let output = strand()
        .args(["processors", "--json"])
        .output()
        .expect("run strand processors");

    assert!(output.status.success());
    let value = single_stdout_json(&output, "processors", true);
    assert_eq!(value["processors"], serde_json::json!(["blend", "scale"]));
}
