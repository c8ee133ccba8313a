//! Pluggable frame transformers.
//!
//! - [`processor`]: `Filter` / `Interpolator` capability traits and the
//!   closed [`Processor`] variant the scheduler dispatches on.
//! - [`factory`]: explicit tag → constructor registry.
//! - [`scale`], [`blend`]: built-in CPU implementations.

pub mod blend;
pub mod factory;
pub mod processor;
pub mod scale;

pub use factory::ProcessorFactory;
pub use processor::{
    DeviceContext, Filter, Interpolator, ProcessingMode, Processor, ProcessorCore, ProcessorInit,
    VideoParams,
};
