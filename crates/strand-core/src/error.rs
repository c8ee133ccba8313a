//! Typed error hierarchy for the engine.
//!
//! Uses `thiserror` for library-grade errors.  The CLI maps these onto
//! process exit codes; library callers match on [`EngineError::kind`].
//!
//! "Would block" and "end of stream" are never errors.  Processors report
//! them as `Ok(None)`, decoders as [`Decoded::Again`] / [`Decoded::Eof`].
//! A user-initiated abort is likewise not an error: it surfaces as
//! `RunOutcome::Aborted` from the scheduler.
//!
//! # Error codes
//!
//! Each variant maps to a stable integer code via [`EngineError::error_code`]
//! for structured logging without string parsing.
//!
//! [`Decoded::Again`]: crate::codec_traits::Decoded::Again
//! [`Decoded::Eof`]: crate::codec_traits::Decoded::Eof

use std::path::PathBuf;

use crate::types::PixelFormat;

/// Coarse error category, one per fatal path of a processing run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Decoder, encoder or processor failed to come up.
    Init,
    /// The source produced something other than a frame, "again" or EOS.
    Decode,
    /// A filter or interpolator failed.
    Process,
    /// Encoding or muxing failed.
    Encode,
    /// An allocation could not be satisfied.
    ResourceExhaustion,
    /// Orchestration failure outside the four stages (worker panic, etc.).
    Pipeline,
}

/// All errors originating from the strand engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ── Initialization ───────────────────────────────────────────────
    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown processor type '{0}'")]
    UnknownProcessor(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Stages ───────────────────────────────────────────────────────
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Processing error: {0}")]
    Process(String),

    #[error("Encode error: {0}")]
    Encode(String),

    // ── Frame contracts ──────────────────────────────────────────────
    #[error("Frame layout mismatch: {format:?} {width}x{height} needs {expected} bytes, got {actual}")]
    FrameLayout {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    // ── Orchestration ────────────────────────────────────────────────
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl EngineError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable integer error code for structured logging.
    ///
    /// Codes are grouped by category:
    /// - 1xx: initialization / configuration
    /// - 2xx: decode
    /// - 3xx: process
    /// - 4xx: encode
    /// - 5xx: resources
    /// - 6xx: orchestration
    pub fn error_code(&self) -> u32 {
        match self {
            Self::Init(_) => 100,
            Self::InvalidConfig(_) => 101,
            Self::UnknownProcessor(_) => 102,
            Self::Io { .. } => 103,
            Self::Decode(_) => 200,
            Self::Process(_) => 300,
            Self::FrameLayout { .. } => 301,
            Self::Encode(_) => 400,
            Self::ResourceExhausted(_) => 500,
            Self::Pipeline(_) => 600,
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Init(_) | Self::InvalidConfig(_) | Self::UnknownProcessor(_) | Self::Io { .. } => {
                ErrorKind::Init
            }
            Self::Decode(_) => ErrorKind::Decode,
            Self::Process(_) | Self::FrameLayout { .. } => ErrorKind::Process,
            Self::Encode(_) => ErrorKind::Encode,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhaustion,
            Self::Pipeline(_) => ErrorKind::Pipeline,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EngineError>;
