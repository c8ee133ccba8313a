#![doc = include_str!("../README.md")]

pub mod runtime;
pub mod scene;
pub mod scheduler;

pub use runtime::{JobRequest, JobSummary, run_job, run_prepared};
pub use scheduler::{FrameScheduler, RunOutcome, RunReport, RunStats, SchedulerConfig};
