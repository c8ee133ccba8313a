//! Processor capability traits.
//!
//! A processor is one of two closed kinds:
//!
//! - [`Filter`]: one input frame in, at most one frame out.
//! - [`Interpolator`]: two input frames plus a time fraction in, at most one
//!   synthesized frame out.
//!
//! The kind is fixed per concrete type and carried by the [`Processor`]
//! variant, so the scheduler dispatches on it once per run rather than per
//! frame.  `Ok(None)` from either transform means "would block": no output
//! this call, not an error.

use strand_core::config::{HwDeviceType, ProcessorConfig};
use strand_core::error::Result;
use strand_core::types::{Frame, PixelFormat, Rational};

/// Which cardinality a processor produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    Filter,
    Interpolate,
}

impl ProcessingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Interpolate => "interpolate",
        }
    }
}

/// Geometry and timing of one side of a processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
}

/// Device the processor should run on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceContext {
    pub hw: HwDeviceType,
    pub index: u32,
}

/// Everything a processor learns before the first frame arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessorInit {
    /// Decoder side.
    pub input: VideoParams,
    /// Encoder side.
    pub output: VideoParams,
    pub device: DeviceContext,
}

/// Capabilities shared by both kinds.
pub trait ProcessorCore: Send {
    /// Prepare for a run.  Called once, after decoder and encoder are open.
    fn init(&mut self, init: &ProcessorInit) -> Result<()>;

    /// Return frames still held internally, in output order.
    fn flush(&mut self) -> Result<Vec<Frame>> {
        Ok(Vec::new())
    }

    /// Registered tag of the concrete implementation.
    fn processor_type(&self) -> &str;

    /// Output size for an input of `in_w × in_h`.
    fn output_dimensions(&self, config: &ProcessorConfig, in_w: u32, in_h: u32) -> (u32, u32);
}

pub trait Filter: ProcessorCore {
    fn filter(&mut self, frame: Frame) -> Result<Option<Frame>>;
}

pub trait Interpolator: ProcessorCore {
    /// Synthesize the frame at fraction `t` (0 < t < 1) between `prev` and `cur`.
    fn interpolate(&mut self, prev: &Frame, cur: &Frame, t: f32) -> Result<Option<Frame>>;
}

/// A concrete processor tagged with its kind.
pub enum Processor {
    Filter(Box<dyn Filter>),
    Interpolator(Box<dyn Interpolator>),
}

impl Processor {
    pub fn mode(&self) -> ProcessingMode {
        match self {
            Self::Filter(_) => ProcessingMode::Filter,
            Self::Interpolator(_) => ProcessingMode::Interpolate,
        }
    }

    pub fn init(&mut self, init: &ProcessorInit) -> Result<()> {
        match self {
            Self::Filter(p) => p.init(init),
            Self::Interpolator(p) => p.init(init),
        }
    }

    pub fn flush(&mut self) -> Result<Vec<Frame>> {
        match self {
            Self::Filter(p) => p.flush(),
            Self::Interpolator(p) => p.flush(),
        }
    }

    pub fn processor_type(&self) -> &str {
        match self {
            Self::Filter(p) => p.processor_type(),
            Self::Interpolator(p) => p.processor_type(),
        }
    }

    pub fn output_dimensions(&self, config: &ProcessorConfig, in_w: u32, in_h: u32) -> (u32, u32) {
        match self {
            Self::Filter(p) => p.output_dimensions(config, in_w, in_h),
            Self::Interpolator(p) => p.output_dimensions(config, in_w, in_h),
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("mode", &self.mode())
            .field("type", &self.processor_type())
            .finish()
    }
}
